use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

use crate::cache::strategy::{CachePolicy, CacheStrategy};
use crate::infrastructure::error::{CacheError, Result};
use crate::infrastructure::logging::{LogFormat, LogOutput, LoggingConfig};

/// Top-level configuration for a cache deployment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub manager: ManagerSettings,

    /// Policy for names without an entry in `caches`
    pub default_policy: CachePolicy,

    /// Per-name policies used when a cache is requested without one
    pub caches: HashMap<String, CachePolicy>,

    pub logging: LoggingSettings,
}

/// Tuning shared by every manager a factory creates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerSettings {
    pub maintenance_interval_seconds: u64,
    pub write_back_interval_seconds: u64,
    /// Values whose encoding is at most this size are never compressed
    pub compression_threshold_bytes: usize,
    /// Compressed output must be at most this fraction of the input
    pub compression_max_ratio: f64,
    pub memory_pressure_threshold_percent: f64,
    /// Tier-1 is shrunk to this fraction of its entries under pressure
    pub memory_pressure_target_ratio: f64,
    pub key_prefix: String,
    pub stats_key_prefix: String,
    pub publish_stats: bool,
    pub access_window: usize,
    pub min_prediction_samples: usize,
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self {
            maintenance_interval_seconds: 60,
            write_back_interval_seconds: 30,
            compression_threshold_bytes: 1024,
            compression_max_ratio: 0.8,
            memory_pressure_threshold_percent: 80.0,
            memory_pressure_target_ratio: 0.7,
            key_prefix: "smartcache".to_string(),
            stats_key_prefix: "cache_stats".to_string(),
            publish_stats: true,
            access_window: 100,
            min_prediction_samples: 10,
        }
    }
}

impl ManagerSettings {
    pub fn maintenance_interval(&self) -> Duration {
        Duration::from_secs(self.maintenance_interval_seconds.max(1))
    }

    pub fn write_back_interval(&self) -> Duration {
        Duration::from_secs(self.write_back_interval_seconds.max(1))
    }

    pub fn validate(&self) -> Result<()> {
        if self.maintenance_interval_seconds == 0 || self.write_back_interval_seconds == 0 {
            return Err(CacheError::config("loop intervals must be at least one second"));
        }
        if !(0.0..=1.0).contains(&self.compression_max_ratio) {
            return Err(CacheError::config("compression_max_ratio must be within 0..=1"));
        }
        if !(0.0..=1.0).contains(&self.memory_pressure_target_ratio) {
            return Err(CacheError::config(
                "memory_pressure_target_ratio must be within 0..=1",
            ));
        }
        if !(0.0..=100.0).contains(&self.memory_pressure_threshold_percent) {
            return Err(CacheError::config(
                "memory_pressure_threshold_percent must be within 0..=100",
            ));
        }
        if self.key_prefix.is_empty() || self.stats_key_prefix.is_empty() {
            return Err(CacheError::config("key prefixes must not be empty"));
        }
        if self.access_window == 0 {
            return Err(CacheError::config("access_window must be positive"));
        }
        Ok(())
    }
}

/// Serializable logging section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
    pub format: LogFormat,
    pub output: LogOutput,
    pub include_file_location: bool,
    pub filter: Option<String>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            output: LogOutput::Stdout,
            include_file_location: true,
            filter: None,
        }
    }
}

impl LoggingSettings {
    pub fn to_logging_config(&self) -> Result<LoggingConfig> {
        let level = Level::from_str(&self.level)
            .map_err(|_| CacheError::config(format!("unknown log level `{}`", self.level)))?;
        Ok(LoggingConfig {
            level,
            format: self.format,
            output: self.output,
            include_file_location: self.include_file_location,
            filter: self.filter.clone(),
            ..LoggingConfig::default()
        })
    }
}

impl CacheSettings {
    /// Defaults, then `path` if given, then `.env` and `SMART_CACHE_*` variables
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut loader = ConfigLoader::new();
        if let Some(path) = path {
            loader = loader.add_source(ConfigSource::File(path.to_path_buf()));
        }
        loader.add_source(ConfigSource::Environment).load()
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CacheError::config(format!("cannot read {}: {}", path.display(), e))
        })?;

        match ConfigFormat::from_path(path)? {
            ConfigFormat::Toml => Ok(toml::from_str(&content)?),
            ConfigFormat::Yaml => Ok(serde_yaml::from_str(&content)?),
            ConfigFormat::Json => Ok(serde_json::from_str(&content)?),
        }
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = match ConfigFormat::from_path(path)? {
            ConfigFormat::Toml => toml::to_string_pretty(self)
                .map_err(|e| CacheError::config(format!("TOML serialization error: {}", e)))?,
            ConfigFormat::Yaml => serde_yaml::to_string(self)?,
            ConfigFormat::Json => serde_json::to_string_pretty(self)?,
        };

        std::fs::write(path, content)
            .map_err(|e| CacheError::config(format!("cannot write {}: {}", path.display(), e)))
    }

    /// Apply `SMART_CACHE_*` overrides read through `lookup`
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("SMART_CACHE_MAINTENANCE_INTERVAL") {
            self.manager.maintenance_interval_seconds =
                parse_var("SMART_CACHE_MAINTENANCE_INTERVAL", &value)?;
        }
        if let Some(value) = lookup("SMART_CACHE_WRITE_BACK_INTERVAL") {
            self.manager.write_back_interval_seconds =
                parse_var("SMART_CACHE_WRITE_BACK_INTERVAL", &value)?;
        }
        if let Some(value) = lookup("SMART_CACHE_COMPRESSION_THRESHOLD") {
            self.manager.compression_threshold_bytes =
                parse_var("SMART_CACHE_COMPRESSION_THRESHOLD", &value)?;
        }
        if let Some(value) = lookup("SMART_CACHE_MEMORY_PRESSURE_THRESHOLD") {
            self.manager.memory_pressure_threshold_percent =
                parse_var("SMART_CACHE_MEMORY_PRESSURE_THRESHOLD", &value)?;
        }
        if let Some(value) = lookup("SMART_CACHE_KEY_PREFIX") {
            self.manager.key_prefix = value;
        }
        if let Some(value) = lookup("SMART_CACHE_PUBLISH_STATS") {
            self.manager.publish_stats = parse_var("SMART_CACHE_PUBLISH_STATS", &value)?;
        }
        if let Some(value) = lookup("SMART_CACHE_DEFAULT_STRATEGY") {
            self.default_policy.strategy = CacheStrategy::from_str(&value)?;
        }
        if let Some(value) = lookup("SMART_CACHE_DEFAULT_TTL") {
            self.default_policy.ttl_seconds = parse_var("SMART_CACHE_DEFAULT_TTL", &value)?;
        }
        if let Some(value) = lookup("SMART_CACHE_DEFAULT_MAX_SIZE") {
            self.default_policy.max_size = parse_var("SMART_CACHE_DEFAULT_MAX_SIZE", &value)?;
        }
        if let Some(value) = lookup("SMART_CACHE_LOG_LEVEL") {
            self.logging.level = value;
        }
        Ok(())
    }

    /// Policy for a cache requested without an explicit one: configured,
    /// then built-in preset, then the default policy
    pub fn policy_for(&self, name: &str) -> CachePolicy {
        self.caches
            .get(name)
            .cloned()
            .or_else(|| CachePolicy::preset(name))
            .unwrap_or_else(|| self.default_policy.clone())
    }

    pub fn validate(&self) -> Result<()> {
        self.manager.validate()?;
        self.default_policy.validate()?;
        for (name, policy) in &self.caches {
            policy
                .validate()
                .map_err(|e| CacheError::config(format!("cache `{}`: {}", name, e)))?;
        }
        self.logging.to_logging_config()?;
        Ok(())
    }
}

fn parse_var<T: FromStr>(name: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| CacheError::config(format!("invalid value `{}` for {}", raw, name)))
}

/// Where configuration comes from, applied in insertion order
#[derive(Debug, Clone)]
pub enum ConfigSource {
    Default,
    File(PathBuf),
    /// `.env` file plus process environment
    Environment,
    /// Explicit `SMART_CACHE_*` style key/value pairs
    Overrides(HashMap<String, String>),
}

/// Layers configuration sources into validated [`CacheSettings`]
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    sources: Vec<ConfigSource>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            sources: vec![ConfigSource::Default],
        }
    }

    pub fn add_source(mut self, source: ConfigSource) -> Self {
        self.sources.push(source);
        self
    }

    pub fn load(&self) -> Result<CacheSettings> {
        let mut settings = CacheSettings::default();

        for source in &self.sources {
            match source {
                ConfigSource::Default => {}
                ConfigSource::File(path) => {
                    // a missing file is skipped, not an error
                    if path.exists() {
                        settings = CacheSettings::from_file(path)?;
                    }
                }
                ConfigSource::Environment => {
                    dotenvy::dotenv().ok();
                    settings.apply_overrides(|name| std::env::var(name).ok())?;
                }
                ConfigSource::Overrides(values) => {
                    settings.apply_overrides(|name| values.get(name).cloned())?;
                }
            }
        }

        settings.validate()?;
        Ok(settings)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Yaml,
    Json,
}

impl ConfigFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Ok(ConfigFormat::Toml),
            Some("yaml") | Some("yml") => Ok(ConfigFormat::Yaml),
            Some("json") => Ok(ConfigFormat::Json),
            _ => Err(CacheError::config(format!(
                "unsupported configuration format: {}",
                path.display()
            ))),
        }
    }
}
