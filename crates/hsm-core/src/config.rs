//! Runtime configuration.
//!
//! JSON から読み込む。全フィールドに default があるので `{}` も有効な設定。

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Number of executor workers.
    pub workers: usize,

    /// How long an idle worker waits on the queue before checking shutdown.
    pub poll_timeout_ms: u64,

    /// Type ids the registry must contain at startup.
    pub expected_task_types: Vec<i32>,

    /// Put tasks of unregistered types back on the queue instead of
    /// discarding them.
    pub defer_unregistered: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            poll_timeout_ms: 200,
            expected_task_types: Vec::new(),
            defer_unregistered: true,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

impl RuntimeConfig {
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::Invalid("workers must be at least 1".to_string()));
        }
        if self.poll_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "poll_timeout_ms must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_uses_defaults() {
        let config = RuntimeConfig::from_json_str("{}").unwrap();
        assert_eq!(config, RuntimeConfig::default());
        assert_eq!(config.poll_timeout(), Duration::from_millis(200));
    }

    #[test]
    fn fields_override_defaults() {
        let config = RuntimeConfig::from_json_str(
            r#"{"workers": 8, "expected_task_types": [1, 2], "defer_unregistered": false}"#,
        )
        .unwrap();
        assert_eq!(config.workers, 8);
        assert_eq!(config.expected_task_types, vec![1, 2]);
        assert!(!config.defer_unregistered);
        assert_eq!(config.poll_timeout_ms, 200);
    }

    #[test]
    fn zero_workers_is_invalid() {
        let err = RuntimeConfig::from_json_str(r#"{"workers": 0}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = RuntimeConfig::from_json_file("/nonexistent/hsm.json").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/hsm.json"));
    }
}
