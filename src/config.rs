use std::env;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub base_fare: f64,
    pub per_km_rate: f64,
    pub default_radius_km: f64,
    pub default_driver_count: usize,
    /// Attempts at grabbing a ride's entry before giving up with Conflict.
    pub transition_retries: u32,
    pub event_buffer_size: usize,
    /// When set, accepting a ride requires the driver to be online in the
    /// availability registry.
    pub enforce_availability: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: 8000,
            log_level: "info".to_string(),
            base_fare: 50.0,
            per_km_rate: 10.0,
            default_radius_km: 2.0,
            default_driver_count: 3,
            transition_retries: 8,
            event_buffer_size: 1024,
            enforce_availability: true,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        let defaults = Self::default();

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", defaults.http_port)?,
            log_level: env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
            base_fare: parse_or_default("BASE_FARE", defaults.base_fare)?,
            per_km_rate: parse_or_default("PER_KM_RATE", defaults.per_km_rate)?,
            default_radius_km: parse_or_default("DEFAULT_RADIUS_KM", defaults.default_radius_km)?,
            default_driver_count: parse_or_default(
                "DEFAULT_DRIVER_COUNT",
                defaults.default_driver_count,
            )?,
            transition_retries: parse_or_default(
                "TRANSITION_RETRIES",
                defaults.transition_retries,
            )?,
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", defaults.event_buffer_size)?,
            enforce_availability: parse_or_default(
                "ENFORCE_AVAILABILITY",
                defaults.enforce_availability,
            )?,
        })
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}
