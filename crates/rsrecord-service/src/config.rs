//! Configuration management for the record service.
//!
//! This module provides configuration loading with multiple sources:
//! 1. Default values (hardcoded)
//! 2. Configuration file (YAML)
//! 3. Environment variables (override)
//!
//! # Configuration Hierarchy
//!
//! Environment variables take precedence over config file values,
//! which take precedence over defaults.
//!
//! # Example
//!
//! ```ignore
//! use rsrecord_service::config::ServiceConfig;
//!
//! // Load from file with env overrides
//! let config = ServiceConfig::load("rsrecord.yaml")?;
//!
//! // Or load from environment only
//! let config = ServiceConfig::from_env()?;
//! ```

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File, FileFormat};
use rsrecord_domain::{RecordCacheConfig, ResolverConfig};
use serde::{Deserialize, Serialize};

/// Service configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct ServiceConfig {
    /// Resolver settings
    #[serde(default)]
    pub resolver: ResolverSettings,

    /// Record cache settings
    #[serde(default)]
    pub cache: CacheSettings,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Resolver settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ResolverSettings {
    /// Deadline for a whole load call, in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Sources resolved concurrently within one batch
    #[serde(default = "default_max_concurrent_sources")]
    pub max_concurrent_sources: usize,

    /// Largest batch a single request may ask for
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            max_concurrent_sources: default_max_concurrent_sources(),
            max_batch_size: default_max_batch_size(),
        }
    }
}

fn default_timeout() -> u64 {
    30
}

fn default_max_concurrent_sources() -> usize {
    4
}

fn default_max_batch_size() -> usize {
    500
}

/// Record cache settings.
///
/// # Example YAML Configuration
///
/// ```yaml
/// cache:
///   enabled: true
///   ttl_secs: 300
///   primary_sources: [solr]
///   fallback_sources: [summon]
/// ```
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct CacheSettings {
    /// Attach a record cache to the resolver
    #[serde(default)]
    pub enabled: bool,

    /// Maximum number of cached records
    #[serde(default = "default_max_capacity")]
    pub max_capacity: u64,

    /// Time-to-live for cached records, in seconds
    #[serde(default = "default_ttl")]
    pub ttl_secs: u64,

    /// Sources looked up in the cache before the backend
    #[serde(default)]
    pub primary_sources: Vec<String>,

    /// Sources looked up in the cache after every other tier
    #[serde(default)]
    pub fallback_sources: Vec<String>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            max_capacity: default_max_capacity(),
            ttl_secs: default_ttl(),
            primary_sources: Vec::new(),
            fallback_sources: Vec::new(),
        }
    }
}

fn default_max_capacity() -> u64 {
    100_000
}

fn default_ttl() -> u64 {
    300
}

/// Logging settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct LoggingSettings {
    /// Log level: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Use JSON format (true for production, false for development)
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] ConfigError),

    #[error("configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("invalid configuration: {message}")]
    Invalid { message: String },
}

impl ServiceConfig {
    /// Load configuration from a YAML file with environment variable overrides.
    ///
    /// Environment variables are prefixed with `RSRECORD_` and use `__` as separator.
    /// For example:
    /// - `RSRECORD_RESOLVER__TIMEOUT_SECS=5` overrides `resolver.timeout_secs`
    /// - `RSRECORD_CACHE__ENABLED=true` overrides `cache.enabled`
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigLoadError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigLoadError::FileNotFound {
                path: path.display().to_string(),
            });
        }

        let config = Config::builder()
            .add_source(Config::try_from(&ServiceConfig::default())?)
            .add_source(File::from(path).format(FileFormat::Yaml))
            .add_source(env_source())
            .build()?;

        let service_config: ServiceConfig = config.try_deserialize()?;
        service_config.validate()?;

        Ok(service_config)
    }

    /// Load configuration from environment variables only.
    pub fn from_env() -> Result<Self, ConfigLoadError> {
        let config = Config::builder()
            .add_source(Config::try_from(&ServiceConfig::default())?)
            .add_source(env_source())
            .build()?;

        let service_config: ServiceConfig = config.try_deserialize()?;
        service_config.validate()?;

        Ok(service_config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.resolver.timeout_secs == 0 {
            return Err(invalid("resolver.timeout_secs must be greater than 0"));
        }

        if self.resolver.max_concurrent_sources == 0 {
            return Err(invalid(
                "resolver.max_concurrent_sources must be greater than 0",
            ));
        }

        if self.resolver.max_batch_size == 0 {
            return Err(invalid("resolver.max_batch_size must be greater than 0"));
        }

        if self.cache.enabled && self.cache.ttl_secs == 0 {
            return Err(invalid("cache.ttl_secs must be greater than 0"));
        }

        let primary: HashSet<&str> = self
            .cache
            .primary_sources
            .iter()
            .map(String::as_str)
            .collect();
        let mut both: Vec<&str> = self
            .cache
            .fallback_sources
            .iter()
            .map(String::as_str)
            .filter(|source| primary.contains(source))
            .collect();
        if !both.is_empty() {
            both.sort_unstable();
            return Err(ConfigLoadError::Invalid {
                message: format!(
                    "cache sources cannot be both primary and fallback: {:?}",
                    both
                ),
            });
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(ConfigLoadError::Invalid {
                message: format!(
                    "logging.level must be one of: {:?}, got: {}",
                    valid_levels, self.logging.level
                ),
            });
        }

        Ok(())
    }

    /// Resolver configuration derived from the `resolver` section.
    pub fn resolver_config(&self) -> ResolverConfig {
        ResolverConfig::default()
            .with_timeout(Duration::from_secs(self.resolver.timeout_secs))
            .with_max_concurrent_sources(self.resolver.max_concurrent_sources)
    }

    /// Cache configuration derived from the `cache` section.
    ///
    /// Returns `None` when the cache is disabled.
    pub fn cache_config(&self) -> Option<RecordCacheConfig> {
        if !self.cache.enabled {
            return None;
        }

        let config = RecordCacheConfig::default()
            .with_max_capacity(self.cache.max_capacity)
            .with_ttl(Duration::from_secs(self.cache.ttl_secs));
        let config = self
            .cache
            .primary_sources
            .iter()
            .fold(config, |config, source| config.with_primary_source(source));
        let config = self
            .cache
            .fallback_sources
            .iter()
            .fold(config, |config, source| config.with_fallback_source(source));

        Some(config)
    }
}

/// Environment overrides: `RSRECORD_SECTION__KEY`.
///
/// Source lists are comma separated, e.g.
/// `RSRECORD_CACHE__PRIMARY_SOURCES=solr,summon`.
fn env_source() -> Environment {
    Environment::with_prefix("RSRECORD")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("cache.primary_sources")
        .with_list_parse_key("cache.fallback_sources")
}

fn invalid(message: &str) -> ConfigLoadError {
    ConfigLoadError::Invalid {
        message: message.to_string(),
    }
}
