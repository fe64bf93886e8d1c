//! Core runtime configuration.
//!
//! Resolved once when the database is opened and handed to the services that
//! need it; nothing reads configuration during an operation.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::inventory::DEFAULT_SEARCH_THRESHOLD;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Clinic-wide settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CoreConfig {
    /// Shown on reports and exported documents
    pub clinic_name: String,
    /// `tracing` filter directive used when `RUST_LOG` is unset
    pub log_filter: String,
    /// Take consumables recorded at visit completion out of stock
    pub deduct_consumables_on_completion: bool,
    pub default_appointment_minutes: u32,
    /// Minimum similarity (0.0 - 1.0) for stock name search
    pub stock_search_threshold: f64,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            clinic_name: "Clinic".to_string(),
            log_filter: "clinic_ops_core=info".to_string(),
            deduct_consumables_on_completion: false,
            default_appointment_minutes: 30,
            stock_search_threshold: DEFAULT_SEARCH_THRESHOLD,
        }
    }
}

impl CoreConfig {
    /// Parse JSON; missing fields take their defaults.
    pub fn from_json_str(json: &str) -> ConfigResult<Self> {
        let config: CoreConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.clinic_name.trim().is_empty() {
            return Err(ConfigError::Invalid("clinic_name cannot be empty".into()));
        }
        if self.default_appointment_minutes == 0 {
            return Err(ConfigError::Invalid(
                "default_appointment_minutes must be greater than zero".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.stock_search_threshold) {
            return Err(ConfigError::Invalid(format!(
                "stock_search_threshold must be within 0.0 - 1.0, got {}",
                self.stock_search_threshold
            )));
        }
        if let Err(e) = EnvFilter::try_new(&self.log_filter) {
            return Err(ConfigError::Invalid(format!("log_filter: {}", e)));
        }
        Ok(())
    }

    pub fn to_json(&self) -> ConfigResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
