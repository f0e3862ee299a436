//! Repository configuration
//!
//! Reads the `relcache.toml` configuration file.
//!
//! ## Environment Variables
//!
//! The following environment variables override config file settings:
//!
//! - `RELCACHE_CACHE_ENABLED` - `true`/`false`, turns record caching on or off
//! - `RELCACHE_MAX_BATCH_SIZE` - largest number of keys fetched per query
//!
//! These can be set in a `.env` file next to the config file.

use relsql_core::{Dialect, DialectKind};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{PersistError, PersistResult};

/// Configuration file name
pub const CONFIG_FILE_NAME: &str = "relcache.toml";

/// Environment variable names
pub const ENV_CACHE_ENABLED: &str = "RELCACHE_CACHE_ENABLED";
pub const ENV_MAX_BATCH_SIZE: &str = "RELCACHE_MAX_BATCH_SIZE";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepositoryConfig {
    /// SQL dialect of the connection
    #[serde(default)]
    pub dialect: DialectKind,
    /// Largest key batch per fetch query; the dialect's IN-list limit when unset
    #[serde(default)]
    pub max_batch_size: Option<usize>,
    /// Cache configuration
    #[serde(default)]
    pub cache: CacheConfig,
}

/// Cache-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// LRU capacity of each cache bin
    #[serde(default = "default_max_entries")]
    pub max_entries_per_bin: usize,
    /// Time-to-live of cached records, 0 = no expiry
    #[serde(default = "default_record_ttl")]
    pub record_ttl_secs: u64,
    #[serde(default = "default_short_ttl")]
    pub short_ttl_secs: u64,
    #[serde(default = "default_long_ttl")]
    pub long_ttl_secs: u64,
}

fn default_enabled() -> bool {
    true
}

fn default_max_entries() -> usize {
    10_000
}

fn default_record_ttl() -> u64 {
    300
}

fn default_short_ttl() -> u64 {
    30
}

fn default_long_ttl() -> u64 {
    600
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            max_entries_per_bin: default_max_entries(),
            record_ttl_secs: default_record_ttl(),
            short_ttl_secs: default_short_ttl(),
            long_ttl_secs: default_long_ttl(),
        }
    }
}

impl RepositoryConfig {
    /// Load configuration from a directory
    ///
    /// This also loads any `.env` file in the directory and applies
    /// environment variable overrides.
    pub fn load(dir: &Path) -> PersistResult<Self> {
        let env_path = dir.join(".env");
        if env_path.exists() {
            let _ = dotenvy::from_path(&env_path);
        }

        let config_path = dir.join(CONFIG_FILE_NAME);
        if !config_path.exists() {
            return Err(PersistError::configuration(format!(
                "Configuration file not found: {}",
                config_path.display()
            )));
        }

        let content = std::fs::read_to_string(&config_path)?;
        let mut config = Self::from_toml_str(&content)?;
        config.apply_env_overrides();

        tracing::debug!(
            "[CONFIG] Loaded {} (dialect {:?}, cache enabled: {})",
            config_path.display(),
            config.dialect,
            config.cache.enabled
        );
        Ok(config)
    }

    /// Parse a TOML document; no environment overrides are applied
    pub fn from_toml_str(content: &str) -> PersistResult<Self> {
        let config: RepositoryConfig = toml::from_str(content)?;
        if config.max_batch_size == Some(0) {
            return Err(PersistError::configuration("max_batch_size must be positive"));
        }
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration
    fn apply_env_overrides(&mut self) {
        if let Ok(enabled) = std::env::var(ENV_CACHE_ENABLED) {
            if let Ok(enabled) = enabled.parse::<bool>() {
                self.cache.enabled = enabled;
            }
        }

        if let Ok(size) = std::env::var(ENV_MAX_BATCH_SIZE) {
            if let Ok(size) = size.parse::<usize>() {
                if size > 0 {
                    self.max_batch_size = Some(size);
                }
            }
        }
    }

    /// Key batch size used by key-then-fetch reads
    pub fn batch_size(&self, dialect: &dyn Dialect) -> usize {
        self.max_batch_size
            .unwrap_or_else(|| dialect.max_in_list())
            .max(1)
    }
}
