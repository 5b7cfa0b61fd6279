//! Layered configuration: built-in defaults, then the JSON file named by
//! `EXAM_SCHEDULER_CONFIG`, then `EXAM_SCHEDULER_*` environment variables
//! (`__` separates nested sections, e.g. `EXAM_SCHEDULER_SCHEDULING__MAX_DATES`).

use figment::{
    Figment,
    providers::{Env, Format, Json, Serialized},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::ConfigError;

pub const ENV_PREFIX: &str = "EXAM_SCHEDULER_";
pub const CONFIG_PATH_VAR: &str = "EXAM_SCHEDULER_CONFIG";

/// Knobs of the scheduling core.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SchedulingConfig {
    /// Ordered time-of-day labels tried on every exam date.
    pub time_labels: Vec<String>,
    /// Maximum number of weekday dates searched per placement.
    pub max_dates: u32,
    pub duration_minutes: u32,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            time_labels: vec!["9:00".to_string(), "14:00".to_string()],
            max_dates: 50,
            duration_minutes: 120,
        }
    }
}

impl SchedulingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.time_labels.is_empty() {
            return Err(ConfigError::Invalid("at least one time label is required".to_string()));
        }
        if self.time_labels.iter().any(|label| label.trim().is_empty()) {
            return Err(ConfigError::Invalid("time labels must not be blank".to_string()));
        }
        if self.max_dates == 0 {
            return Err(ConfigError::Invalid("max_dates must be positive".to_string()));
        }
        if self.duration_minutes == 0 {
            return Err(ConfigError::Invalid("duration_minutes must be positive".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub bind_address: String,
    /// JSON dataset loaded into the in-memory store at startup.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dataset_path: Option<PathBuf>,
    pub scheduling: SchedulingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".to_string(),
            dataset_path: None,
            scheduling: SchedulingConfig::default(),
        }
    }
}

impl AppConfig {
    /// Provider chain, lowest priority first.
    pub fn figment() -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Ok(path) = std::env::var(CONFIG_PATH_VAR) {
            figment = figment.merge(Json::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).ignore(&["config"]).split("__"))
    }

    pub fn load() -> Result<Self, ConfigError> {
        Self::extract(&Self::figment())
    }

    /// Extracts and validates a configuration from any provider chain.
    pub fn extract(figment: &Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract()?;
        config.scheduling.validate()?;
        Ok(config)
    }
}
