use std::time::Duration;

use crate::{ControlHandle, FixtureAddress};

/// Failure reported by the BLE stack (or a stand-in transport)
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("no Bluetooth adapter found")]
    NoAdapter,
    #[error("peripheral {0} not found")]
    PeripheralNotFound(FixtureAddress),
    #[error("characteristic {0} not found")]
    CharacteristicNotFound(ControlHandle),
    #[error("no writable characteristic on {0}")]
    NoWritableCharacteristic(FixtureAddress),
    #[error(transparent)]
    Ble(#[from] btleplug::Error),
    #[error("link failure: {0}")]
    Link(String),
}

impl TransportError {
    /// Whether another connect attempt could succeed without outside help
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::NoAdapter)
    }
}

/// Failure to reach one replica
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl LinkError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Outcome of a command that did not reach the fixture
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("invalid state: {0}")]
    InvalidState(#[from] yn360_proto::InvalidState),
    #[error("none of {attempted} replica(s) accepted the command")]
    AllReplicasUnreachable { attempted: usize },
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
    #[error("invalid fixture file {}: {source}", path.display())]
    Parse {
        path: std::path::PathBuf,
        source: serde_json::Error,
    },
    #[error(transparent)]
    Replicas(#[from] crate::ReplicaSetError),
}
