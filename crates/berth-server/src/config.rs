//! Server configuration.
//!
//! Configuration is loaded from multiple sources with the following
//! priority:
//!
//! 1. Environment variables (`BERTH_*`)
//! 2. Configuration file (`/etc/berth/config.toml`)
//! 3. Default values
//!
//! ## Example Configuration File
//!
//! ```toml
//! state_dir = "/var/lib/berth/containers"
//! runtime_path = "/usr/bin/runc"
//! runtime_root = "/run/berth/runc"
//! resource_ttl_secs = 180
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

/// Default system configuration file.
const SYSTEM_CONFIG_PATH: &str = "/etc/berth/config.toml";

/// Berth server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Directory holding per-container state snapshots.
    pub state_dir: PathBuf,
    /// Path of the OCI runtime binary.
    pub runtime_path: PathBuf,
    /// State root handed to the runtime binary (`--root`), if any.
    pub runtime_root: Option<PathBuf>,
    /// Lifetime of unconsumed resource reservations, in seconds.
    pub resource_ttl_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            state_dir: PathBuf::from("/var/lib/berth/containers"),
            runtime_path: PathBuf::from("runc"),
            runtime_root: None,
            resource_ttl_secs: 180,
        }
    }
}

impl ServerConfig {
    /// Loads configuration from the system file and environment.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(SYSTEM_CONFIG_PATH))
            .merge(Env::prefixed("BERTH_"))
            .extract()
    }

    /// Loads configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("BERTH_"))
            .extract()
    }

    /// Returns the reservation TTL as a duration.
    #[must_use]
    pub const fn resource_ttl(&self) -> Duration {
        Duration::from_secs(self.resource_ttl_secs)
    }

    /// Returns the state directory for one container.
    #[must_use]
    pub fn container_dir(&self, id: &str) -> PathBuf {
        self.state_dir.join(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.runtime_path, PathBuf::from("runc"));
        assert_eq!(config.resource_ttl(), Duration::from_secs(180));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "state_dir = \"/tmp/berth-test\"\nresource_ttl_secs = 30\n",
        )
        .unwrap();

        let config = ServerConfig::load_from(&path).unwrap();
        assert_eq!(config.state_dir, PathBuf::from("/tmp/berth-test"));
        assert_eq!(config.resource_ttl(), Duration::from_secs(30));
        // Unset keys keep their defaults.
        assert_eq!(config.runtime_path, PathBuf::from("runc"));
    }

    #[test]
    fn test_container_dir() {
        let config = ServerConfig::default();
        assert_eq!(
            config.container_dir("ctr-1"),
            PathBuf::from("/var/lib/berth/containers/ctr-1")
        );
    }
}
