use std::path::PathBuf;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use tracing::info;
use validator::Validate;

/// Default values for configuration
const DEFAULT_GATEWAY_TIMEOUT_SECS: u64 = 30;
const DEFAULT_GUEST_TOKEN_LEN: u32 = 12;
const DEFAULT_NOTIFICATION_CAPACITY: u32 = 100;
const ENV_PREFIX: &str = "CARTSYNC";

/// Configuration for a cart session.
///
/// Layered: built-in defaults, then an optional config
/// file, then `CARTSYNC_`-prefixed environment variables.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct CartConfig {
    /// Base URL of the remote cart service
    #[validate(url)]
    pub gateway_url: String,

    /// Request timeout applied to every gateway call
    #[serde(default = "default_gateway_timeout")]
    pub gateway_timeout_secs: u64,

    /// Directory for the persistent store; `None` keeps persistence
    /// in memory only (storage disabled)
    #[serde(default)]
    pub storage_dir: Option<PathBuf>,

    /// Random token length of generated guest identifiers (min 10)
    #[serde(default = "default_guest_token_len")]
    #[validate(range(min = 10, max = 64))]
    pub guest_token_len: u32,

    /// Capacity of the in-memory notification buffer
    #[serde(default = "default_notification_capacity")]
    #[validate(range(min = 1))]
    pub notification_capacity: u32,
}

fn default_gateway_timeout() -> u64 {
    DEFAULT_GATEWAY_TIMEOUT_SECS
}

fn default_guest_token_len() -> u32 {
    DEFAULT_GUEST_TOKEN_LEN
}

fn default_notification_capacity() -> u32 {
    DEFAULT_NOTIFICATION_CAPACITY
}

impl CartConfig {
    /// Builds a configuration with defaults for everything but the
    /// gateway endpoint.
    pub fn new(gateway_url: impl Into<String>) -> Self {
        Self {
            gateway_url: gateway_url.into(),
            gateway_timeout_secs: DEFAULT_GATEWAY_TIMEOUT_SECS,
            storage_dir: None,
            guest_token_len: DEFAULT_GUEST_TOKEN_LEN,
            notification_capacity: DEFAULT_NOTIFICATION_CAPACITY,
        }
    }

    /// Loads configuration from an optional file plus environment
    /// overrides and validates the result.
    pub fn load(config_file: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("gateway_timeout_secs", DEFAULT_GATEWAY_TIMEOUT_SECS as i64)?
            .set_default("guest_token_len", DEFAULT_GUEST_TOKEN_LEN as i64)?
            .set_default("notification_capacity", DEFAULT_NOTIFICATION_CAPACITY as i64)?;

        if let Some(path) = config_file {
            builder = builder.add_source(File::with_name(path));
        }

        let settings = builder
            .add_source(Environment::with_prefix(ENV_PREFIX))
            .build()?;

        let cfg: CartConfig = settings.try_deserialize()?;
        cfg.validate()
            .map_err(|e| ConfigError::Message(e.to_string()))?;

        info!(gateway_url = %cfg.gateway_url, "cart configuration loaded");
        Ok(cfg)
    }
}
