//! YN360 command channel
//!
//! Drives one logical light fixture that may be reachable through several
//! BLE peripherals (replicas). Commands are encoded once, then tried replica
//! by replica (most recently successful first) over links that stay open for
//! a short idle window.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use yn360_channel::{BleTransport, ChannelConfig, Fixture, ReplicaSet};
//! use yn360_proto::DesiredState;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ChannelConfig::default();
//!     let transport = Arc::new(BleTransport::new(config.scan_window).await?);
//!
//!     let handle = transport
//!         .find_control_handle(&"F0:00:00:00:00:01".into(), config.connect_timeout)
//!         .await?;
//!     let replicas = ReplicaSet::new([("F0:00:00:00:00:01".into(), handle)])?;
//!
//!     let fixture = Fixture::new(transport, replicas, config);
//!     fixture.apply_desired_state(DesiredState::on().with_color_temp(4400)).await?;
//!     fixture.shutdown().await;
//!
//!     Ok(())
//! }
//! ```

mod address;
pub mod ble;
mod config;
mod connection;
mod dispatcher;
mod error;
mod fixture;
pub mod selector;
mod transport;

#[cfg(test)]
mod mock;

pub use address::{ControlHandle, FixtureAddress, ReplicaSet, ReplicaSetError};
pub use ble::{BleTransport, DiscoveredFixture};
pub use config::{ChannelConfig, FixtureFile, ReplicaEntry};
pub use connection::{ConnectionManager, LinkState};
pub use dispatcher::Dispatcher;
pub use error::{ConfigError, DispatchError, LinkError, TransportError};
pub use fixture::Fixture;
pub use transport::Transport;
