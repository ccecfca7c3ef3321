//! Fixture addresses, control handles and replica sets

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier of one BLE peripheral (a MAC address on most platforms)
///
/// Stored upper case, so `aa:bb:..` and `AA:BB:..` name the same peripheral.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct FixtureAddress(String);

impl FixtureAddress {
    pub fn new(address: impl Into<String>) -> Self {
        let mut address = address.into();
        address.make_ascii_uppercase();
        Self(address)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FixtureAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FixtureAddress {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for FixtureAddress {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<FixtureAddress> for String {
    fn from(address: FixtureAddress) -> Self {
        address.0
    }
}

/// UUID of the writable characteristic on one peripheral
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ControlHandle(Uuid);

impl ControlHandle {
    pub fn new(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for ControlHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for ControlHandle {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReplicaSetError {
    #[error("a fixture needs at least one replica address")]
    Empty,
    #[error("replica address {0} listed twice")]
    DuplicateAddress(FixtureAddress),
}

/// Peripherals believed to drive the same logical fixture
///
/// Never empty; addresses are unique and iterate in lexicographic order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicaSet {
    replicas: BTreeMap<FixtureAddress, ControlHandle>,
}

impl ReplicaSet {
    pub fn new<I>(replicas: I) -> Result<Self, ReplicaSetError>
    where
        I: IntoIterator<Item = (FixtureAddress, ControlHandle)>,
    {
        let mut map = BTreeMap::new();
        for (address, handle) in replicas {
            if map.contains_key(&address) {
                return Err(ReplicaSetError::DuplicateAddress(address));
            }
            map.insert(address, handle);
        }

        if map.is_empty() {
            return Err(ReplicaSetError::Empty);
        }

        Ok(Self { replicas: map })
    }

    pub fn len(&self) -> usize {
        self.replicas.len()
    }

    pub fn addresses(&self) -> impl Iterator<Item = &FixtureAddress> {
        self.replicas.keys()
    }

    pub fn control_handle(&self, address: &FixtureAddress) -> Option<ControlHandle> {
        self.replicas.get(address).copied()
    }

    pub fn contains(&self, address: &FixtureAddress) -> bool {
        self.replicas.contains_key(address)
    }
}
