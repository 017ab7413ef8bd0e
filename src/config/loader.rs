/// Configuration loading from TOML file
use std::path::Path;
use std::str::FromStr;

use chrono::NaiveTime;
use chrono_tz::Tz;

use crate::error::{CollectorError, Result};
use crate::types::Config;

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| CollectorError::ConfigError(format!("Failed to read config file: {}", e)))?;

    let mut config: Config = toml::from_str(&content)
        .map_err(|e| CollectorError::ConfigError(format!("Failed to parse config: {}", e)))?;

    // PIN may come from the environment instead of the file
    if let Ok(pin) = std::env::var("FYERS_PIN") {
        if !pin.trim().is_empty() {
            config.pin = pin.trim().to_string();
        }
    }

    // Validate config
    validate_config(&config)?;

    Ok(config)
}

/// Parse a wall-clock time from "HH:MM" or "HH:MM:SS"
pub fn parse_time_of_day(value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .map_err(|_| CollectorError::ConfigError(format!("Invalid time of day: {}", value)))
}

fn validate_config(config: &Config) -> Result<()> {
    // Validate exchange timezone
    Tz::from_str(&config.exchange_timezone).map_err(|_| {
        CollectorError::ConfigError(format!(
            "Unknown exchange_timezone: {}",
            config.exchange_timezone
        ))
    })?;

    // Validate session window
    let open = parse_time_of_day(&config.session_open)?;
    let close = parse_time_of_day(&config.session_close)?;
    if open >= close {
        return Err(CollectorError::ConfigError(format!(
            "session_open {} must be before session_close {}",
            config.session_open, config.session_close
        )));
    }

    // Validate daily schedule times
    parse_time_of_day(&config.refresh_check_time)?;
    parse_time_of_day(&config.access_renewal_time)?;
    parse_time_of_day(&config.retention_time)?;

    if config.collect_interval_sec == 0 {
        return Err(CollectorError::ConfigError(
            "collect_interval_sec must be > 0".to_string(),
        ));
    }

    // Renewal threshold must leave a retry margin before hard expiry
    if config.refresh_renew_after_days < 1 {
        return Err(CollectorError::ConfigError(format!(
            "Invalid refresh_renew_after_days: {}",
            config.refresh_renew_after_days
        )));
    }
    if config.refresh_renew_after_days >= config.refresh_hard_expiry_days {
        return Err(CollectorError::ConfigError(
            "refresh_renew_after_days must be < refresh_hard_expiry_days".to_string(),
        ));
    }

    if config.retention_days == 0 {
        return Err(CollectorError::ConfigError(
            "retention_days must be > 0".to_string(),
        ));
    }

    if config.http_timeout_sec == 0 {
        return Err(CollectorError::ConfigError(
            "http_timeout_sec must be > 0".to_string(),
        ));
    }

    if config.login_command.is_empty() {
        return Err(CollectorError::ConfigError(
            "login_command is empty".to_string(),
        ));
    }

    Ok(())
}
