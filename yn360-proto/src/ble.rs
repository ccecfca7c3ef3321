//! BLE advertisement constants for YN360 fixtures
//!
//! The fixture exposes one writable characteristic. Its UUID differs between
//! firmware revisions, so it is discovered per address rather than fixed here.

/// Local name advertised by every YN360 fixture
pub const ADVERTISED_NAME: &str = "YONGNUO LED";

/// Match a peripheral's advertised local name against the YN360 name
pub fn is_fixture_name(name: &str) -> bool {
    name == ADVERTISED_NAME
}
