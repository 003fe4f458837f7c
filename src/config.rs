//! Configuration management for the housie engine
//!
//! Defaults, TOML files and `HOUSIE_*` environment overrides, validated
//! before use.

use crate::errors::{ConfigurationError, HousieResult};
use crate::games::ticket_generator::DEFAULT_MAX_ATTEMPTS;
use crate::games::types::GameSettings;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Top-level engine configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HousieConfig {
    pub scheduler: SchedulerConfig,
    pub generator: GeneratorConfig,
    pub events: EventsConfig,
    pub tickets: TicketsConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Inter-draw interval used when a game does not name one
    pub default_interval_ms: u64,
    /// Shortest interval `start` accepts
    pub min_interval_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            default_interval_ms: 5000,
            min_interval_ms: 10,
        }
    }
}

impl SchedulerConfig {
    pub fn default_interval(&self) -> Duration {
        Duration::from_millis(self.default_interval_ms)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Row-assignment retry budget per ticket
    pub max_attempts: usize,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EventsConfig {
    pub channel_capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1024,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TicketsConfig {
    pub default_max_tickets: u32,
    pub default_max_tickets_per_user: u32,
}

impl Default for TicketsConfig {
    fn default() -> Self {
        Self {
            default_max_tickets: 100,
            default_max_tickets_per_user: 6,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "housie=info".to_string(),
        }
    }
}

impl From<&HousieConfig> for GameSettings {
    /// Per-game settings seeded from the configured defaults, auto-play off
    fn from(config: &HousieConfig) -> Self {
        GameSettings {
            auto_play: false,
            auto_play_interval_ms: config.scheduler.default_interval_ms,
            max_tickets: config.tickets.default_max_tickets,
            max_tickets_per_user: config.tickets.default_max_tickets_per_user,
        }
    }
}

/// Configuration loader with environment variable support
pub struct ConfigLoader {
    config_path: Option<String>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self { config_path: None }
    }

    /// Set the configuration file path
    pub fn with_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = Some(path.as_ref().to_string_lossy().to_string());
        self
    }

    /// Load configuration from file and environment variables
    pub fn load(&self) -> HousieResult<HousieConfig> {
        let mut config = match self.config_path {
            Some(ref path) => self.load_from_file(path)?,
            None => HousieConfig::default(),
        };

        self.apply_env_overrides(&mut config)?;
        self.validate(&config)?;

        Ok(config)
    }

    fn load_from_file(&self, path: &str) -> HousieResult<HousieConfig> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigurationError::LoadFailed(format!("Failed to read {}: {}", path, e)))?;

        toml::from_str(&content)
            .map_err(|e| ConfigurationError::LoadFailed(format!("Failed to parse TOML: {}", e)).into())
    }

    fn apply_env_overrides(&self, config: &mut HousieConfig) -> HousieResult<()> {
        if let Some(ms) = env_parse("HOUSIE_SCHEDULER_INTERVAL_MS", "Invalid interval")? {
            config.scheduler.default_interval_ms = ms;
        }
        if let Some(ms) = env_parse("HOUSIE_SCHEDULER_MIN_INTERVAL_MS", "Invalid interval")? {
            config.scheduler.min_interval_ms = ms;
        }
        if let Some(attempts) = env_parse("HOUSIE_GENERATOR_MAX_ATTEMPTS", "Invalid attempt count")? {
            config.generator.max_attempts = attempts;
        }
        if let Some(capacity) = env_parse("HOUSIE_EVENTS_CAPACITY", "Invalid channel capacity")? {
            config.events.channel_capacity = capacity;
        }
        if let Ok(filter) = env::var("HOUSIE_LOG") {
            config.logging.filter = filter;
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self, config: &HousieConfig) -> HousieResult<()> {
        if config.scheduler.min_interval_ms == 0 {
            return Err(invalid("scheduler.min_interval_ms", 0, "Minimum interval cannot be zero"));
        }

        if config.scheduler.default_interval_ms < config.scheduler.min_interval_ms {
            return Err(invalid(
                "scheduler.default_interval_ms",
                config.scheduler.default_interval_ms,
                "Default interval is below the minimum interval",
            ));
        }

        if config.generator.max_attempts == 0 {
            return Err(invalid("generator.max_attempts", 0, "Retry budget cannot be zero"));
        }

        if config.events.channel_capacity == 0 {
            return Err(invalid("events.channel_capacity", 0, "Channel capacity cannot be zero"));
        }

        if config.tickets.default_max_tickets == 0 {
            return Err(invalid("tickets.default_max_tickets", 0, "Ticket capacity cannot be zero"));
        }

        if config.tickets.default_max_tickets_per_user > config.tickets.default_max_tickets {
            return Err(invalid(
                "tickets.default_max_tickets_per_user",
                config.tickets.default_max_tickets_per_user,
                "Per-user limit exceeds game capacity",
            ));
        }

        if config.logging.filter.trim().is_empty() {
            return Err(ConfigurationError::MissingRequired("logging.filter".to_string()).into());
        }

        Ok(())
    }

    /// Save configuration to file
    pub fn save(&self, config: &HousieConfig, path: &str) -> HousieResult<()> {
        let toml_string = toml::to_string_pretty(config)
            .map_err(|e| ConfigurationError::SaveFailed(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, toml_string)
            .map_err(|e| ConfigurationError::SaveFailed(format!("Failed to write to {}: {}", path, e)).into())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn env_parse<T: FromStr>(key: &str, reason: &str) -> HousieResult<Option<T>> {
    match env::var(key) {
        Ok(value) => value.parse().map(Some).map_err(|_| {
            ConfigurationError::InvalidValue {
                field: key.to_string(),
                value,
                reason: reason.to_string(),
            }
            .into()
        }),
        Err(_) => Ok(None),
    }
}

fn invalid(field: &str, value: impl ToString, reason: &str) -> crate::errors::HousieError {
    ConfigurationError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
    .into()
}

/// Write a default configuration file
pub fn generate_sample_config(path: &str) -> HousieResult<()> {
    ConfigLoader::new().save(&HousieConfig::default(), path)
}
