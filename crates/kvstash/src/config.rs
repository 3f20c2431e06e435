//! Cache configuration.

use std::sync::Arc;
use std::time::Duration;

use kvstash_observability::{CommandSink, LogFormat, StderrSink, TracingSink};
use serde::{Deserialize, Serialize};

use crate::CacheError;

/// Top-level cache configuration.
///
/// Every field has a default, so an empty file is a valid config.
///
/// ```toml
/// lock_prefix = "__lock:"
///
/// [spin]
/// interval_ms = 100
/// max_wait_ms = 30000
///
/// [lock]
/// hold_on_error = false
///
/// [log]
/// enabled = true
/// target = "stderr"
/// format = "json"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Prefix of lock-marker keys.
    #[serde(default = "default_lock_prefix")]
    pub lock_prefix: String,

    /// Redis address, used by the Spin-hosted store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redis_address: Option<String>,

    /// Spin-wait behavior.
    #[serde(default)]
    pub spin: SpinConfig,

    /// Distributed lock behavior.
    #[serde(default)]
    pub lock: LockConfig,

    /// Command logging.
    #[serde(default)]
    pub log: LogConfig,
}

fn default_lock_prefix() -> String {
    "__lock:".to_string()
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            lock_prefix: default_lock_prefix(),
            redis_address: None,
            spin: SpinConfig::default(),
            lock: LockConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl CacheConfig {
    /// Load config from a file (`.json`, otherwise TOML).
    pub fn load(path: &str) -> Result<Self, CacheError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| CacheError::ConfigError(format!("failed to read {path}: {e}")))?;

        if path.ends_with(".json") {
            let config: Self = serde_json::from_str(&content)
                .map_err(|e| CacheError::ConfigError(format!("failed to parse JSON {path}: {e}")))?;
            config.validate()?;
            Ok(config)
        } else {
            Self::from_toml_str(&content)
        }
    }

    /// Parse a TOML config.
    pub fn from_toml_str(content: &str) -> Result<Self, CacheError> {
        let config: Self =
            toml::from_str(content).map_err(|e| CacheError::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check values serde cannot reject on its own.
    pub fn validate(&self) -> Result<(), CacheError> {
        self.spin.validate()
    }

    /// Render as TOML.
    pub fn to_toml_string(&self) -> Result<String, CacheError> {
        toml::to_string_pretty(self).map_err(|e| CacheError::ConfigError(e.to_string()))
    }
}

/// Spin-wait configuration.
///
/// The defaults poll every 100ms forever.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpinConfig {
    /// First poll interval in milliseconds.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Interval multiplier applied after each poll (1.0 = fixed).
    #[serde(default = "default_backoff")]
    pub backoff: f64,

    /// Upper bound for the poll interval in milliseconds.
    #[serde(default = "default_max_interval_ms")]
    pub max_interval_ms: u64,

    /// Give up after this many milliseconds. Unset waits forever.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_wait_ms: Option<u64>,
}

fn default_interval_ms() -> u64 {
    100
}

fn default_backoff() -> f64 {
    1.0
}

fn default_max_interval_ms() -> u64 {
    1000
}

impl Default for SpinConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            backoff: default_backoff(),
            max_interval_ms: default_max_interval_ms(),
            max_wait_ms: None,
        }
    }
}

impl SpinConfig {
    /// First poll interval.
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Interval cap.
    pub fn max_interval(&self) -> Duration {
        Duration::from_millis(self.max_interval_ms.max(self.interval_ms))
    }

    /// Maximum total wait, if bounded.
    pub fn max_wait(&self) -> Option<Duration> {
        self.max_wait_ms.map(Duration::from_millis)
    }

    /// `backoff` must be finite and at least 1.0.
    pub fn validate(&self) -> Result<(), CacheError> {
        if !self.backoff.is_finite() || self.backoff < 1.0 {
            return Err(CacheError::ConfigError(format!(
                "spin.backoff must be a finite number >= 1.0, got {}",
                self.backoff
            )));
        }
        Ok(())
    }
}

/// Distributed lock configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LockConfig {
    /// Keep the lock until its TTL when the critical section fails.
    #[serde(default)]
    pub hold_on_error: bool,
}

/// Where command logs go.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogTarget {
    /// `tracing` events at debug level.
    #[default]
    Tracing,
    /// Lines on stderr.
    Stderr,
}

/// Command logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log every store round-trip.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Log destination.
    #[serde(default)]
    pub target: LogTarget,

    /// Line format for the stderr target.
    #[serde(default)]
    pub format: LogFormat,
}

fn default_true() -> bool {
    true
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            target: LogTarget::default(),
            format: LogFormat::default(),
        }
    }
}

impl LogConfig {
    /// Build the configured sink.
    pub fn sink(&self) -> Arc<dyn CommandSink> {
        match self.target {
            LogTarget::Tracing => Arc::new(TracingSink),
            LogTarget::Stderr => Arc::new(StderrSink::new(self.format)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CacheConfig::default();
        assert_eq!(config.lock_prefix, "__lock:");
        assert_eq!(config.spin.interval(), Duration::from_millis(100));
        assert_eq!(config.spin.max_wait(), None);
        assert_eq!(config.spin.backoff, 1.0);
        assert!(!config.lock.hold_on_error);
        assert!(config.log.enabled);
        assert_eq!(config.log.target, LogTarget::Tracing);
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = CacheConfig::from_toml_str("").unwrap();
        assert_eq!(config.lock_prefix, "__lock:");
        assert_eq!(config.spin.interval_ms, 100);
    }

    #[test]
    fn test_partial_toml() {
        let config = CacheConfig::from_toml_str(
            r#"
lock_prefix = "lk:"
redis_address = "redis://localhost:6379"

[spin]
interval_ms = 10
backoff = 2.0
max_wait_ms = 500

[lock]
hold_on_error = true

[log]
target = "stderr"
format = "json"
"#,
        )
        .unwrap();
        assert_eq!(config.lock_prefix, "lk:");
        assert_eq!(config.redis_address.as_deref(), Some("redis://localhost:6379"));
        assert_eq!(config.spin.interval(), Duration::from_millis(10));
        assert_eq!(config.spin.max_interval_ms, 1000);
        assert_eq!(config.spin.max_wait(), Some(Duration::from_millis(500)));
        assert!(config.lock.hold_on_error);
        assert!(config.log.enabled);
        assert_eq!(config.log.target, LogTarget::Stderr);
        assert_eq!(config.log.format, LogFormat::Json);
    }

    #[test]
    fn test_invalid_toml() {
        let err = CacheConfig::from_toml_str("[spin]\ninterval_ms = \"fast\"").unwrap_err();
        assert!(matches!(err, CacheError::ConfigError(_)));
    }

    #[test]
    fn test_toml_round_trip() {
        let mut config = CacheConfig::default();
        config.spin.max_wait_ms = Some(250);
        let rendered = config.to_toml_string().unwrap();
        let parsed = CacheConfig::from_toml_str(&rendered).unwrap();
        assert_eq!(parsed.spin.max_wait_ms, Some(250));
        assert_eq!(parsed.lock_prefix, config.lock_prefix);
    }

    #[test]
    fn test_load_json_file() {
        let path = std::env::temp_dir().join(format!("kvstash-config-{}.json", std::process::id()));
        std::fs::write(&path, r#"{"spin": {"interval_ms": 5}}"#).unwrap();
        let config = CacheConfig::load(path.to_str().unwrap()).unwrap();
        assert_eq!(config.spin.interval_ms, 5);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_load_missing_file() {
        let err = CacheConfig::load("/nonexistent/kvstash.toml").unwrap_err();
        assert!(matches!(err, CacheError::ConfigError(_)));
    }

    #[test]
    fn test_rejects_unusable_backoff() {
        for backoff in ["inf", "nan", "1e300", "0.5"] {
            let content = format!("[spin]\nbackoff = {backoff}");
            let result = CacheConfig::from_toml_str(&content);
            if backoff == "1e300" {
                // Finite: accepted, the spinner caps the interval instead.
                assert!(result.is_ok());
            } else {
                assert!(matches!(result, Err(CacheError::ConfigError(_))), "backoff = {backoff}");
            }
        }
    }
}
