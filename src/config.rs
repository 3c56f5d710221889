//! Engine configuration
//!
//! Defaults match the reference deployment (system clock at UTC+7, 50 instances
//! per generated month). Every value can be overridden through `EVENTLOOM_*`
//! environment variables.

use crate::error::{AppError, AppResult};
use log::info;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_SYSTEM_OFFSET_SECONDS: i32 = 7 * 3600;
pub const DEFAULT_MAX_INSTANCES_PER_MONTH: usize = 50;
pub const DEFAULT_MAX_MONTHLY_ATTEMPTS: u32 = 12;
pub const DEFAULT_MAX_YEARLY_SKIPS: u32 = 8;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub database_url: String,
    /// Offset of the clock every notify time is expressed in.
    pub system_offset_seconds: i32,
    pub max_instances_per_month: usize,
    pub max_monthly_attempts: u32,
    pub max_yearly_skips: u32,
    pub sweep_interval_secs: u64,
    /// How far ahead the sweep looks, in months.
    pub sweep_window_months: u32,
    pub webhook_url: Option<String>,
    pub directory_file: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite:eventloom.db?mode=rwc".to_string(),
            system_offset_seconds: DEFAULT_SYSTEM_OFFSET_SECONDS,
            max_instances_per_month: DEFAULT_MAX_INSTANCES_PER_MONTH,
            max_monthly_attempts: DEFAULT_MAX_MONTHLY_ATTEMPTS,
            max_yearly_skips: DEFAULT_MAX_YEARLY_SKIPS,
            sweep_interval_secs: 60,
            sweep_window_months: 1,
            webhook_url: None,
            directory_file: None,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> AppResult<Self> {
        let mut config = Self::default();

        if let Ok(url) = env::var("EVENTLOOM_DATABASE_URL") {
            config.database_url = url;
        }
        if let Some(v) = parse_env("EVENTLOOM_SYSTEM_OFFSET_SECONDS")? {
            config.system_offset_seconds = v;
        }
        if let Some(v) = parse_env("EVENTLOOM_MAX_INSTANCES_PER_MONTH")? {
            config.max_instances_per_month = v;
        }
        if let Some(v) = parse_env("EVENTLOOM_MAX_MONTHLY_ATTEMPTS")? {
            config.max_monthly_attempts = v;
        }
        if let Some(v) = parse_env("EVENTLOOM_MAX_YEARLY_SKIPS")? {
            config.max_yearly_skips = v;
        }
        if let Some(v) = parse_env("EVENTLOOM_SWEEP_INTERVAL_SECS")? {
            config.sweep_interval_secs = v;
        }
        if let Some(v) = parse_env("EVENTLOOM_SWEEP_WINDOW_MONTHS")? {
            config.sweep_window_months = v;
        }
        if let Ok(url) = env::var("EVENTLOOM_WEBHOOK_URL") {
            config.webhook_url = Some(url);
        }
        if let Ok(path) = env::var("EVENTLOOM_DIRECTORY_FILE") {
            config.directory_file = Some(PathBuf::from(path));
        }

        Ok(config)
    }

    /// Validates ranges that would otherwise surface as odd runtime behavior.
    pub fn validate(&self) -> AppResult<()> {
        info!("Validating engine configuration");

        if self.database_url.trim().is_empty() {
            return Err(AppError::config("database url cannot be empty"));
        }
        // chrono accepts offsets strictly inside one day
        if self.system_offset_seconds.abs() >= 86_400 {
            return Err(AppError::config(format!(
                "system offset {}s is out of range",
                self.system_offset_seconds
            )));
        }
        if self.max_instances_per_month == 0 {
            return Err(AppError::config("max_instances_per_month must be at least 1"));
        }
        if self.sweep_interval_secs == 0 {
            return Err(AppError::config("sweep_interval_secs must be at least 1"));
        }
        if self.sweep_window_months == 0 {
            return Err(AppError::config("sweep_window_months must be at least 1"));
        }
        if let Some(url) = &self.webhook_url {
            crate::messaging::webhook::validate_webhook_url(url)?;
        }

        Ok(())
    }
}

fn parse_env<T: FromStr>(key: &str) -> AppResult<Option<T>> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| AppError::config(format!("{} has an invalid value: {}", key, raw))),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for key in [
            "EVENTLOOM_DATABASE_URL",
            "EVENTLOOM_SYSTEM_OFFSET_SECONDS",
            "EVENTLOOM_MAX_INSTANCES_PER_MONTH",
            "EVENTLOOM_MAX_MONTHLY_ATTEMPTS",
            "EVENTLOOM_MAX_YEARLY_SKIPS",
            "EVENTLOOM_SWEEP_INTERVAL_SECS",
            "EVENTLOOM_SWEEP_WINDOW_MONTHS",
            "EVENTLOOM_WEBHOOK_URL",
            "EVENTLOOM_DIRECTORY_FILE",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    fn test_defaults_validate() {
        let config = EngineConfig::default();
        assert_eq!(config.system_offset_seconds, 25_200);
        assert_eq!(config.max_instances_per_month, 50);
        assert_eq!(config.max_monthly_attempts, 12);
        assert!(config.validate().is_ok());
    }

    #[test]
    #[serial]
    fn test_from_env_overrides() {
        clear_env();
        env::set_var("EVENTLOOM_SYSTEM_OFFSET_SECONDS", "0");
        env::set_var("EVENTLOOM_MAX_INSTANCES_PER_MONTH", "10");
        env::set_var("EVENTLOOM_DATABASE_URL", "sqlite::memory:");

        let config = EngineConfig::from_env().unwrap();
        assert_eq!(config.system_offset_seconds, 0);
        assert_eq!(config.max_instances_per_month, 10);
        assert_eq!(config.database_url, "sqlite::memory:");
        clear_env();
    }

    #[test]
    #[serial]
    fn test_from_env_rejects_garbage() {
        clear_env();
        env::set_var("EVENTLOOM_SWEEP_INTERVAL_SECS", "soon");
        let result = EngineConfig::from_env();
        assert!(matches!(result, Err(AppError::Config(_))));
        clear_env();
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let config = EngineConfig {
            system_offset_seconds: 90_000,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());

        let config = EngineConfig {
            max_instances_per_month: 0,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());

        let config = EngineConfig {
            webhook_url: Some("http://push.example.com/notify".to_string()),
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
