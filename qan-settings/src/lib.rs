//! Layered configuration for the QAN collector, following this codebase's convention of
//! defaults < config file < environment, merged through the `config` crate.

use std::fmt;
use std::path::PathBuf;

use config::{Config, ConfigError, Environment, File};
use serde_derive::Deserialize;

const ENV_PREFIX: &str = "QAN";
const ENV_SEPARATOR: &str = "__";

const MIN_ADAPTIVE_BASE_INTERVAL_SECS: u64 = 1;

/// `mysql.collection_interval` accepts either an integer number of seconds or the literal
/// string `"adaptive"`. Modeled as an enum with a hand-written `Deserialize` since this is
/// not a shape `config`/`serde` untag automatically across TOML and environment-variable
/// sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionInterval {
    Fixed(u64),
    Adaptive,
}

impl Default for CollectionInterval {
    fn default() -> Self {
        CollectionInterval::Adaptive
    }
}

impl fmt::Display for CollectionInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectionInterval::Fixed(secs) => write!(f, "{}", secs),
            CollectionInterval::Adaptive => write!(f, "adaptive"),
        }
    }
}

impl<'de> serde::Deserialize<'de> for CollectionInterval {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Int(u64),
            Str(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Int(secs) => Ok(CollectionInterval::Fixed(secs)),
            Raw::Str(s) => parse_collection_interval(&s).map_err(serde::de::Error::custom),
        }
    }
}

/// Parses the well-defined rules this system uses in place of the source's broken
/// `fmt.Sscanf`-based parser: integer seconds >= 1, or the case-sensitive literal
/// `"adaptive"`. Anything else is a configuration error, never a silent fallback.
pub fn parse_collection_interval(raw: &str) -> Result<CollectionInterval, String> {
    if raw == "adaptive" {
        return Ok(CollectionInterval::Adaptive);
    }
    match raw.parse::<u64>() {
        Ok(secs) if secs >= 1 => Ok(CollectionInterval::Fixed(secs)),
        Ok(_) => Err("collection_interval must be >= 1 second".to_owned()),
        Err(_) => Err(format!(
            "collection_interval must be an integer number of seconds or \"adaptive\", got {:?}",
            raw
        )),
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AdaptiveSettings {
    pub base_interval: u64,
    pub state_directory: String,
    pub enabled: bool,
}

impl Default for AdaptiveSettings {
    fn default() -> Self {
        Self {
            base_interval: MIN_ADAPTIVE_BASE_INTERVAL_SECS,
            state_directory: String::new(),
            enabled: false,
        }
    }
}

impl AdaptiveSettings {
    pub fn state_directory(&self) -> Option<PathBuf> {
        if self.state_directory.is_empty() {
            None
        } else {
            Some(PathBuf::from(&self.state_directory))
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MysqlSettings {
    pub enabled: bool,
    pub endpoint: String,
    pub username: String,
    pub password: String,
    pub database: String,
    pub collection_interval: CollectionInterval,
    pub adaptive: AdaptiveSettings,
}

impl Default for MysqlSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: String::new(),
            username: String::new(),
            password: String::new(),
            database: "information_schema".to_owned(),
            collection_interval: CollectionInterval::Adaptive,
            adaptive: AdaptiveSettings::default(),
        }
    }
}

impl MysqlSettings {
    /// Whether this instance should run under the adaptive governor, per the resolved
    /// interaction between `collection_interval` and `adaptive.enabled`.
    pub fn is_adaptive(&self) -> bool {
        self.adaptive.enabled || self.collection_interval == CollectionInterval::Adaptive
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PostgresqlSettings {
    pub enabled: bool,
    pub endpoint: String,
    pub username: String,
    pub password: String,
    pub database: String,
    pub collection_interval: u64,
}

impl Default for PostgresqlSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: String::new(),
            username: String::new(),
            password: String::new(),
            database: String::new(),
            collection_interval: 60,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub mysql: MysqlSettings,
    pub postgresql: PostgresqlSettings,
    #[serde(default)]
    pub human_logs: bool,
    #[serde(default)]
    pub statsd_host: Option<String>,
    #[serde(default)]
    pub statsd_port: Option<u16>,
}

impl Settings {
    /// Loads settings from built-in defaults, an optional TOML file, then environment
    /// variables prefixed `QAN__` (nested keys separated by `__`), highest precedence last.
    pub fn with_env_and_config_file(filename: Option<&str>) -> Result<Self, ConfigError> {
        let mut config = Config::new();
        if let Some(filename) = filename {
            config.merge(File::with_name(filename))?;
        }
        config.merge(Environment::with_prefix(ENV_PREFIX).separator(ENV_SEPARATOR))?;
        let settings: Settings = config.try_into()?;
        settings.normalize().map_err(ConfigError::Message)
    }

    /// Applies the resolved interactions between config keys that the raw deserialized
    /// struct cannot express on its own.
    fn normalize(mut self) -> Result<Self, String> {
        if self.mysql.database.is_empty() {
            self.mysql.database = "information_schema".to_owned();
        }
        if self.mysql.adaptive.base_interval < MIN_ADAPTIVE_BASE_INTERVAL_SECS {
            self.mysql.adaptive.base_interval = MIN_ADAPTIVE_BASE_INTERVAL_SECS;
        }
        Ok(self)
    }

    pub fn banner(&self) -> String {
        format!(
            "qan-collector: mysql.enabled={} postgresql.enabled={}",
            self.mysql.enabled, self.postgresql.enabled
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_fixed_interval() {
        assert_eq!(
            parse_collection_interval("30").unwrap(),
            CollectionInterval::Fixed(30)
        );
    }

    #[test]
    fn parses_adaptive_interval() {
        assert_eq!(
            parse_collection_interval("adaptive").unwrap(),
            CollectionInterval::Adaptive
        );
    }

    #[test]
    fn rejects_uppercase_adaptive() {
        assert!(parse_collection_interval("Adaptive").is_err());
    }

    #[test]
    fn rejects_zero_seconds() {
        assert!(parse_collection_interval("0").is_err());
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_collection_interval("soon").is_err());
    }

    #[test]
    fn mysql_defaults_to_information_schema() {
        let settings = MysqlSettings::default();
        assert_eq!(settings.database, "information_schema");
        assert!(settings.is_adaptive());
    }

    #[test]
    fn adaptive_enabled_overrides_fixed_interval() {
        let mut settings = MysqlSettings::default();
        settings.collection_interval = CollectionInterval::Fixed(5);
        settings.adaptive.enabled = true;
        assert!(settings.is_adaptive());
    }

    #[test]
    fn empty_state_directory_disables_persistence() {
        let settings = AdaptiveSettings::default();
        assert!(settings.state_directory().is_none());
    }
}
