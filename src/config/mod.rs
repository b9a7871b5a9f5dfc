//! Configuration module for Shutterlift
//!
//! Handles loading and parsing of YAML configuration files with support for
//! environment variable expansion and validation.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

mod loader;

pub use loader::ConfigLoader;

// ============================================================================
// Environment Variable Expansion
// ============================================================================

/// Expand environment variables in a string.
///
/// Supports two syntaxes:
/// - `${VAR_NAME}` - Simple expansion, keeps placeholder if var not found
/// - `${VAR_NAME:-default}` - Expansion with default value
///
/// Variable names must start with a letter or underscore and contain only
/// uppercase letters, digits, and underscores.
fn expand_env_vars(s: &str) -> String {
    let re = regex_lite::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)(?::-([^}]+))?\}").unwrap();
    let mut last_match = 0;
    let mut result = String::with_capacity(s.len());

    for cap in re.captures_iter(s) {
        let full_match = cap.get(0).unwrap();
        let var_name = cap.get(1).unwrap().as_str();

        result.push_str(&s[last_match..full_match.start()]);

        let value = match std::env::var(var_name) {
            Ok(val) => val,
            Err(_) => {
                if let Some(default) = cap.get(2) {
                    default.as_str().to_string()
                } else {
                    // No env var and no default. Keep the original placeholder.
                    full_match.as_str().to_string()
                }
            }
        };
        result.push_str(&value);

        last_match = full_match.end();
    }

    result.push_str(&s[last_match..]);

    result
}

/// Custom deserializer for strings with environment variable expansion.
fn deserialize_with_env<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::de::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    Ok(expand_env_vars(&s))
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub watch: WatchConfig,
    pub cloudinary: CloudinaryConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Config {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        ConfigLoader::load(path)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.watch.directory.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError(
                "Watch directory must not be empty".into(),
            ));
        }

        if glob::Pattern::new(&self.watch.pattern).is_err() {
            return Err(ConfigError::ValidationError(format!(
                "Invalid watch pattern '{}'",
                self.watch.pattern
            )));
        }

        if self.cloudinary.cloud_name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "Cloudinary cloud_name must not be empty".into(),
            ));
        }

        if self.cloudinary.api_key.trim().is_empty() || self.cloudinary.api_secret.trim().is_empty()
        {
            return Err(ConfigError::ValidationError(
                "Cloudinary api_key and api_secret must not be empty".into(),
            ));
        }

        if let Some(ref base) = self.cloudinary.api_base {
            if !base.starts_with("http://") && !base.starts_with("https://") {
                return Err(ConfigError::ValidationError(
                    "Invalid api_base: must start with http:// or https://".into(),
                ));
            }
        }

        if self.retry.max_tries == 0 {
            return Err(ConfigError::ValidationError(
                "retry.max_tries must be at least 1".into(),
            ));
        }

        if self.retry.sweep_interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "retry.sweep_interval_ms must be greater than zero".into(),
            ));
        }

        if self.worker.max_concurrent == 0 {
            return Err(ConfigError::ValidationError(
                "worker.max_concurrent must be at least 1".into(),
            ));
        }

        Ok(())
    }
}

/// Watched directory configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Directory observed for new image files. Created at startup if missing.
    pub directory: PathBuf,

    /// Glob pattern a file name must match to be picked up. Default: "*.jpg"
    #[serde(default = "default_watch_pattern")]
    pub pattern: String,
}

fn default_watch_pattern() -> String {
    "*.jpg".to_string()
}

/// Cloudinary upload API configuration
///
/// # Example
///
/// ```yaml
/// cloudinary:
///   cloud_name: "demo"
///   api_key: "${CLOUDINARY_API_KEY}"
///   api_secret: "${CLOUDINARY_API_SECRET}"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudinaryConfig {
    /// Account cloud name, appears in the upload URL path
    pub cloud_name: String,

    /// API key. Supports ${VAR} and ${VAR:-default} expansion.
    #[serde(deserialize_with = "deserialize_with_env")]
    pub api_key: String,

    /// API secret used for request signing. Supports ${VAR} expansion.
    #[serde(deserialize_with = "deserialize_with_env")]
    pub api_secret: String,

    /// Override for the API base URL, mainly for testing.
    /// Default: https://api.cloudinary.com
    #[serde(default)]
    pub api_base: Option<String>,
}

/// Retry behavior configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Immediate upload attempts per file before deferring. Default: 5
    #[serde(default = "default_max_tries")]
    pub max_tries: u32,

    /// Pause between deferred-retry sweeps in milliseconds. Default: 300000 (5 minutes)
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_tries: default_max_tries(),
            sweep_interval_ms: default_sweep_interval_ms(),
        }
    }
}

fn default_max_tries() -> u32 {
    5
}

fn default_sweep_interval_ms() -> u64 {
    300_000
}

/// Upload worker pool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Maximum files handled concurrently. Default: 1 (uploads run one at a time)
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
        }
    }
}

fn default_max_concurrent() -> usize {
    1
}

/// Metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
            port: default_metrics_port(),
        }
    }
}

fn default_metrics_enabled() -> bool {
    true
}

fn default_metrics_port() -> u16 {
    9090
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config {
            watch: WatchConfig {
                directory: PathBuf::from("/tmp/drop"),
                pattern: default_watch_pattern(),
            },
            cloudinary: CloudinaryConfig {
                cloud_name: "demo".into(),
                api_key: "key".into(),
                api_secret: "secret".into(),
                api_base: None,
            },
            retry: RetryConfig::default(),
            worker: WorkerConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }

    #[test]
    fn test_retry_defaults() {
        let retry = RetryConfig::default();
        assert_eq!(retry.max_tries, 5);
        assert_eq!(retry.sweep_interval_ms, 300_000);
    }

    #[test]
    fn test_default_worker_is_serial() {
        assert_eq!(WorkerConfig::default().max_concurrent, 1);
    }

    #[test]
    fn test_validation_accepts_defaults() {
        assert!(test_config().validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_empty_directory() {
        let mut config = test_config();
        config.watch.directory = PathBuf::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_bad_pattern() {
        let mut config = test_config();
        config.watch.pattern = "[".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_zero_tries() {
        let mut config = test_config();
        config.retry.max_tries = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_bad_api_base() {
        let mut config = test_config();
        config.cloudinary.api_base = Some("ftp://example.com".into());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_expand_env_vars_default_syntax() {
        let expanded = expand_env_vars("${SHUTTERLIFT_MISSING_VAR:-fallback}");
        assert_eq!(expanded, "fallback");
    }

    #[test]
    fn test_expand_env_vars_keeps_unknown_placeholder() {
        let expanded = expand_env_vars("${SHUTTERLIFT_MISSING_VAR}");
        assert_eq!(expanded, "${SHUTTERLIFT_MISSING_VAR}");
    }
}
