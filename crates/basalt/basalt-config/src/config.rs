use serde::Deserialize;
use std::path::Path;

/// Environment variable holding the upstream API key.
pub const API_KEY_ENV: &str = "DATABENTO_API_KEY";

#[derive(Deserialize, Debug, Clone)]
pub struct BasaltConfig {
    /// Ring capacity. Must be a power of two.
    #[serde(default = "defaults::queue_size")]
    pub queue_size: usize,
    #[serde(default = "defaults::dataset")]
    pub dataset: String,
    #[serde(default = "defaults::symbols")]
    pub symbols: Vec<String>,
    /// Replay window bounds, ISO-8601 (`YYYY-MM-DDTHH:MM:SS`).
    #[serde(default = "defaults::start_time")]
    pub start_time: String,
    #[serde(default = "defaults::end_time")]
    pub end_time: String,
    /// Upstream schema selector: `bbo-1s` or `bbo-1m`.
    #[serde(default = "defaults::schema")]
    pub schema: String,
    #[serde(default = "defaults::fetch_timeout_seconds")]
    pub fetch_timeout_seconds: u64,
    #[serde(default = "defaults::enable_sample_output")]
    pub enable_sample_output: bool,
    #[serde(default = "defaults::sample_print_every")]
    pub sample_print_every: u64,
    #[serde(default = "defaults::log_level")]
    pub log_level: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read '{path}'")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config")]
    Parse(#[from] toml::de::Error),

    #[error("queue_size must be a power of two, got {got}")]
    QueueSize { got: usize },

    #[error("DATABENTO_API_KEY environment variable not set")]
    ApiKeyMissing,

    #[error("DATABENTO_API_KEY environment variable is empty")]
    ApiKeyEmpty,
}

mod defaults {
    pub fn queue_size() -> usize {
        1 << 20 // 1M slots
    }

    pub fn dataset() -> String {
        "GLBX.MDP3".into()
    }

    pub fn symbols() -> Vec<String> {
        vec!["ES.FUT".into(), "NQ.FUT".into(), "YM.FUT".into()]
    }

    pub fn start_time() -> String {
        "2022-06-10T14:30:00".into()
    }

    pub fn end_time() -> String {
        "2022-06-10T14:35:00".into()
    }

    pub fn schema() -> String {
        "bbo-1s".into()
    }

    pub fn fetch_timeout_seconds() -> u64 {
        30
    }

    pub fn enable_sample_output() -> bool {
        true
    }

    pub fn sample_print_every() -> u64 {
        1000
    }

    pub fn log_level() -> String {
        "info".into()
    }
}

impl Default for BasaltConfig {
    fn default() -> Self {
        Self {
            queue_size: defaults::queue_size(),
            dataset: defaults::dataset(),
            symbols: defaults::symbols(),
            start_time: defaults::start_time(),
            end_time: defaults::end_time(),
            schema: defaults::schema(),
            fetch_timeout_seconds: defaults::fetch_timeout_seconds(),
            enable_sample_output: defaults::enable_sample_output(),
            sample_print_every: defaults::sample_print_every(),
            log_level: defaults::log_level(),
        }
    }
}

impl BasaltConfig {
    pub fn load(path: impl AsRef<Path> + ToString) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        let config: BasaltConfig = toml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads the file if it exists, otherwise falls back to the built-in
    /// defaults so a bare checkout runs without any configuration.
    pub fn load_or_default(path: impl AsRef<Path> + ToString) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !self.queue_size.is_power_of_two() {
            return Err(ConfigError::QueueSize {
                got: self.queue_size,
            });
        }
        Ok(())
    }
}

/// Reads the upstream API key from the environment. A missing or empty key
/// is a fatal startup condition.
pub fn api_key_from_env() -> Result<String, ConfigError> {
    match std::env::var(API_KEY_ENV) {
        Ok(key) if key.is_empty() => Err(ConfigError::ApiKeyEmpty),
        Ok(key) => Ok(key),
        Err(_) => Err(ConfigError::ApiKeyMissing),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config: BasaltConfig = toml::from_str("").unwrap();
        assert_eq!(config.queue_size, 1 << 20);
        assert_eq!(config.schema, "bbo-1s");
        assert_eq!(config.symbols.len(), 3);
        assert_eq!(config.fetch_timeout_seconds, 30);
        assert!(config.enable_sample_output);
    }

    #[test]
    fn explicit_fields_override_defaults() {
        let config: BasaltConfig = toml::from_str(
            r#"
            queue_size = 4096
            schema = "bbo-1m"
            symbols = ["CL.FUT"]
            enable_sample_output = false
            "#,
        )
        .unwrap();
        assert_eq!(config.queue_size, 4096);
        assert_eq!(config.schema, "bbo-1m");
        assert_eq!(config.symbols, vec!["CL.FUT".to_string()]);
        assert!(!config.enable_sample_output);
        // Untouched fields keep their defaults.
        assert_eq!(config.sample_print_every, 1000);
    }

    #[test]
    fn non_power_of_two_queue_is_rejected() {
        let config: BasaltConfig = toml::from_str("queue_size = 1000").unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::QueueSize { got: 1000 })
        ));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = BasaltConfig::load("/nonexistent/basalt.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn load_or_default_tolerates_missing_file() {
        let config = BasaltConfig::load_or_default("/nonexistent/basalt.toml").unwrap();
        assert_eq!(config.dataset, "GLBX.MDP3");
    }
}
