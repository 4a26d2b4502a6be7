//! Configuration management.
//!
//! Loaded configuration is composed into a running engine and change feed
//! by [`PermissionEngine::from_config`].
//!
//! [`PermissionEngine::from_config`]: crate::engine::PermissionEngine::from_config

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::directory::HttpDirectoryConfig;
use crate::telemetry::LoggingConfig;

/// Main engine configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EngineConfig {
    /// Snapshot cache configuration
    #[serde(default)]
    pub cache: CacheConfig,

    /// Directory service configuration
    #[serde(default)]
    pub directory: HttpDirectoryConfig,

    /// Change-feed sync configuration
    #[serde(default)]
    pub sync: SyncConfig,

    /// Super-admin flag persistence
    #[serde(default)]
    pub superadmin: SuperAdminConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Snapshot time-to-live
    #[serde(with = "humantime_serde", default = "default_ttl")]
    pub ttl: Duration,

    /// Path of the last-known-good snapshot file; `None` disables
    /// persistence.
    pub persist_path: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: default_ttl(),
            persist_path: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// Change-feed channel capacity
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SuperAdminConfig {
    /// Path of the super-admin flag file; `None` keeps flags in memory only.
    pub persist_path: Option<PathBuf>,
}

// Default value functions
fn default_ttl() -> Duration {
    Duration::from_secs(300)
}
fn default_channel_capacity() -> usize {
    256
}

impl EngineConfig {
    /// Load configuration from environment variables.
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("LEDGERLINE").separator("__"))
            .build()?;

        let cfg: EngineConfig = config.try_deserialize()?;
        Ok(cfg)
    }

    /// Load from a specific file path, with environment overrides.
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("LEDGERLINE").separator("__"))
            .build()?;

        let cfg: EngineConfig = config.try_deserialize()?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.cache.ttl, Duration::from_secs(300));
        assert!(config.cache.persist_path.is_none());
        assert_eq!(config.sync.channel_capacity, 256);
        assert!(config.superadmin.persist_path.is_none());
    }

    #[test]
    fn test_deserializes_from_toml() {
        let raw = r#"
            [cache]
            ttl = "2m"
            persist_path = "/var/lib/ledgerline/snapshots.json"

            [directory]
            base_url = "https://directory.internal"
            timeout = "5s"

            [sync]
            channel_capacity = 64
        "#;
        let config: EngineConfig = config::Config::builder()
            .add_source(config::File::from_str(raw, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(config.cache.ttl, Duration::from_secs(120));
        assert_eq!(config.directory.base_url, "https://directory.internal");
        assert_eq!(config.directory.timeout, Duration::from_secs(5));
        assert_eq!(config.sync.channel_capacity, 64);
    }
}
