use std::{env, fmt::Display, str::FromStr};

use chrono::Duration;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Environment variable {0} is required")]
    Missing(&'static str),

    #[error("Invalid {key} value: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub port: u16,
    pub nats_url: Option<String>,
    pub session_ttl: Duration,
    pub low_stock_window: Duration,
    pub mail_from: String,
    pub cors_origin: Option<String>,
}

/// One year. Keeps `now + ttl` and `now - window` in range.
const MAX_HOURS: i64 = 24 * 365;

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_url = lookup("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let session_hours: i64 = try_load(&lookup, "SESSION_TTL_HOURS", "168")?;
        let window_hours: i64 = try_load(&lookup, "LOW_STOCK_WINDOW_HOURS", "24")?;
        if session_hours <= 0 {
            return Err(ConfigError::Invalid { key: "SESSION_TTL_HOURS", reason: "must be positive".into() });
        }
        if window_hours < 0 {
            return Err(ConfigError::Invalid { key: "LOW_STOCK_WINDOW_HOURS", reason: "cannot be negative".into() });
        }
        for (key, hours) in [("SESSION_TTL_HOURS", session_hours), ("LOW_STOCK_WINDOW_HOURS", window_hours)] {
            if hours > MAX_HOURS {
                return Err(ConfigError::Invalid { key, reason: format!("cannot exceed {MAX_HOURS} hours") });
            }
        }

        Ok(Self {
            database_url,
            database_max_connections: try_load(&lookup, "DATABASE_MAX_CONNECTIONS", "10")?,
            port: try_load(&lookup, "PORT", "8083")?,
            nats_url: lookup("NATS_URL").filter(|v| !v.is_empty()),
            session_ttl: Duration::hours(session_hours),
            low_stock_window: Duration::hours(window_hours),
            mail_from: lookup("MAIL_FROM").unwrap_or_else(|| "no-reply@dulcescaseros.local".to_string()),
            cors_origin: lookup("CORS_ORIGIN").filter(|v| !v.is_empty()),
        })
    }
}

fn try_load<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &'static str, default: &str) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    lookup(key)
        .unwrap_or_else(|| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e: T::Err| ConfigError::Invalid { key, reason: e.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[("DATABASE_URL", "postgres://localhost/dulces")])).unwrap();
        assert_eq!(config.port, 8083);
        assert_eq!(config.database_max_connections, 10);
        assert_eq!(config.session_ttl, Duration::hours(168));
        assert_eq!(config.low_stock_window, Duration::hours(24));
        assert!(config.nats_url.is_none());
    }

    #[test]
    fn test_missing_database_url() {
        assert!(matches!(Config::from_lookup(lookup(&[])), Err(ConfigError::Missing("DATABASE_URL"))));
    }

    #[test]
    fn test_invalid_values() {
        let err = Config::from_lookup(lookup(&[("DATABASE_URL", "postgres://x"), ("PORT", "eighty")])).unwrap_err();
        assert!(err.to_string().starts_with("Invalid PORT value"));
        let err = Config::from_lookup(lookup(&[("DATABASE_URL", "postgres://x"), ("SESSION_TTL_HOURS", "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "SESSION_TTL_HOURS", .. }));
    }

    #[test]
    fn test_hour_settings_are_capped() {
        let config = Config::from_lookup(lookup(&[("DATABASE_URL", "postgres://x"), ("SESSION_TTL_HOURS", "8760")])).unwrap();
        assert_eq!(config.session_ttl, Duration::hours(8760));
        for key in ["SESSION_TTL_HOURS", "LOW_STOCK_WINDOW_HOURS"] {
            let err = Config::from_lookup(lookup(&[("DATABASE_URL", "postgres://x"), (key, "9223372036854775807")])).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid { key: k, .. } if k == key), "{key}");
            let err = Config::from_lookup(lookup(&[("DATABASE_URL", "postgres://x"), (key, "8761")])).unwrap_err();
            assert_eq!(err.to_string(), format!("Invalid {key} value: cannot exceed 8760 hours"));
        }
    }
}
