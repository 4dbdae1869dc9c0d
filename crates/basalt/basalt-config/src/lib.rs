pub mod config;
pub use config::{api_key_from_env, BasaltConfig, ConfigError};
