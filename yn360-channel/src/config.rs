//! Channel timing and fixture file

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{ConfigError, ControlHandle, FixtureAddress, ReplicaSet, ReplicaSetError};

/// Retry, timeout and idle settings shared by every replica of a fixture
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Connect attempts per replica before giving up on it
    pub connect_attempts: u32,
    #[serde(rename = "retry_delay_ms", with = "millis")]
    pub retry_delay: Duration,
    #[serde(rename = "connect_timeout_ms", with = "millis")]
    pub connect_timeout: Duration,
    #[serde(rename = "write_timeout_ms", with = "millis")]
    pub write_timeout: Duration,
    /// Bound on disconnects and liveness checks; a link that does not answer
    /// in time is dropped
    #[serde(rename = "disconnect_timeout_ms", with = "millis")]
    pub disconnect_timeout: Duration,
    /// Quiet period after the last write before the link is closed
    #[serde(rename = "idle_timeout_ms", with = "millis")]
    pub idle_timeout: Duration,
    /// How long to scan for a peripheral the adapter has not seen yet
    #[serde(rename = "scan_window_ms", with = "millis")]
    pub scan_window: Duration,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            connect_attempts: 3,
            retry_delay: Duration::from_secs(1),
            connect_timeout: Duration::from_secs(5),
            write_timeout: Duration::from_secs(5),
            disconnect_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(10),
            scan_window: Duration::from_secs(3),
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where S: Serializer {
        let ms = u64::try_from(duration.as_millis()).map_err(serde::ser::Error::custom)?;
        serializer.serialize_u64(ms)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where D: Deserializer<'de> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// One replica as written in the fixture file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaEntry {
    pub address: FixtureAddress,
    pub control: ControlHandle,
}

/// Everything needed to drive one logical fixture
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixtureFile {
    #[serde(default)]
    pub replicas: Vec<ReplicaEntry>,
    #[serde(default)]
    pub channel: ChannelConfig,
}

impl FixtureFile {
    /// Read a fixture file, or return the default when it does not exist
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        serde_json::from_str(&data).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn replica_set(&self) -> Result<ReplicaSet, ReplicaSetError> {
        ReplicaSet::new(
            self.replicas
                .iter()
                .map(|entry| (entry.address.clone(), entry.control)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_use_defaults() {
        let config: ChannelConfig = serde_json::from_str(r#"{"idle_timeout_ms": 2500}"#).unwrap();
        assert_eq!(config.idle_timeout, Duration::from_millis(2500));
        assert_eq!(config.connect_attempts, 3);
        assert_eq!(config.retry_delay, Duration::from_secs(1));
    }

    #[test]
    fn durations_serialize_as_millis() {
        let json = serde_json::to_value(ChannelConfig::default()).unwrap();
        assert_eq!(json["connect_timeout_ms"], 5000);
        assert_eq!(json["idle_timeout_ms"], 10000);
        assert_eq!(json["disconnect_timeout_ms"], 5000);
    }

    #[test]
    fn fixture_file_builds_replica_set() {
        let file: FixtureFile = serde_json::from_str(
            r#"{
                "replicas": [
                    {"address": "F0:00:00:00:00:02", "control": "0000ffe1-0000-1000-8000-00805f9b34fb"},
                    {"address": "F0:00:00:00:00:01", "control": "0000ffe1-0000-1000-8000-00805f9b34fb"}
                ],
                "channel": {"connect_attempts": 5}
            }"#,
        )
        .unwrap();

        assert_eq!(file.channel.connect_attempts, 5);
        let replicas = file.replica_set().unwrap();
        assert_eq!(replicas.len(), 2);
        assert_eq!(
            replicas.addresses().next(),
            Some(&FixtureAddress::from("F0:00:00:00:00:01"))
        );
    }

    #[test]
    fn missing_file_is_default() {
        let file = FixtureFile::load(Path::new("/nonexistent/yn360/fixture.json")).unwrap();
        assert_eq!(file, FixtureFile::default());
        assert_eq!(file.replica_set(), Err(ReplicaSetError::Empty));
    }
}
