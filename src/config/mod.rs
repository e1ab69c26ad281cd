//! Configuration management
//!
//! Layers, lowest priority first: built-in defaults, an optional TOML file,
//! then `RINGLINE__SECTION__KEY` environment variables.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const ENV_PREFIX: &str = "RINGLINE";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub identity: IdentityConfig,
    pub call: CallConfig,
    pub store: StoreConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Signed-in user; unset means signed out
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CallConfig {
    /// Period of the talk-time ticker
    pub tick_interval_ms: u64,
    /// Buffered events per subscriber before it starts lagging
    pub event_capacity: usize,
}

/// Root node names in the realtime database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub calls_root: String,
    pub active_calls_root: String,
    pub history_root: String,
    pub profiles_root: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` wins when set
    pub level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            identity: IdentityConfig::default(),
            call: CallConfig::default(),
            store: StoreConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for CallConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1000,
            event_capacity: 64,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            calls_root: "Calls".to_string(),
            active_calls_root: "ActiveCalls".to_string(),
            history_root: "CallHistory".to_string(),
            profiles_root: "ListComptes".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl CallConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

impl Config {
    /// Load configuration, reading `path` if given and present
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        Self::load_with_prefix(path, ENV_PREFIX)
    }

    fn load_with_prefix(path: Option<&Path>, prefix: &str) -> Result<Self, config::ConfigError> {
        let mut builder =
            config::Config::builder().add_source(config::Config::try_from(&Config::default())?);

        if let Some(path) = path {
            builder = builder.add_source(
                config::File::from(path)
                    .format(config::FileFormat::Toml)
                    .required(false),
            );
        }

        let config: Config = builder
            .add_source(
                config::Environment::with_prefix(prefix)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if self.call.tick_interval_ms == 0 {
            return Err(config::ConfigError::Message(
                "call.tick_interval_ms must be positive".to_string(),
            ));
        }
        if self.call.event_capacity == 0 {
            return Err(config::ConfigError::Message(
                "call.event_capacity must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Render as TOML, e.g. to write a starter config file
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.call.tick_interval(), Duration::from_secs(1));
        assert_eq!(config.store.calls_root, "Calls");
        assert_eq!(config.store.profiles_root, "ListComptes");
        assert!(config.identity.user_id.is_none());
    }

    #[test]
    fn test_load_without_file_gives_defaults() {
        let config = Config::load(None).unwrap();
        assert_eq!(config.call, CallConfig::default());
        assert_eq!(config.store, StoreConfig::default());
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[identity]\nuser_id = \"alice\"\n\n[call]\ntick_interval_ms = 250\n"
        )
        .unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.identity.user_id.as_deref(), Some("alice"));
        assert_eq!(config.call.tick_interval_ms, 250);
        // Untouched keys keep their defaults
        assert_eq!(config.call.event_capacity, 64);
        assert_eq!(config.store.history_root, "CallHistory");
    }

    #[test]
    fn test_missing_file_is_not_an_error() {
        let config = Config::load(Some(Path::new("/nonexistent/ringline.toml"))).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_environment_overrides_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[call]\ntick_interval_ms = 250\n").unwrap();

        std::env::set_var("RINGLINE_ENVTEST__CALL__TICK_INTERVAL_MS", "500");
        std::env::set_var("RINGLINE_ENVTEST__STORE__HISTORY_ROOT", "History");
        let config = Config::load_with_prefix(Some(file.path()), "RINGLINE_ENVTEST").unwrap();
        std::env::remove_var("RINGLINE_ENVTEST__CALL__TICK_INTERVAL_MS");
        std::env::remove_var("RINGLINE_ENVTEST__STORE__HISTORY_ROOT");

        assert_eq!(config.call.tick_interval_ms, 500);
        assert_eq!(config.store.history_root, "History");
        assert_eq!(config.store.calls_root, "Calls");
    }

    #[test]
    fn test_zero_tick_rejected() {
        let mut config = Config::default();
        config.call.tick_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_roundtrip() {
        let rendered = Config::default().to_toml().unwrap();
        assert!(rendered.contains("[store]"));
        let parsed: Config = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed, Config::default());
    }
}
