//! Process configuration from environment variables.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `PORT` | `4000` |
//! | `APP_ENV` | `development` |
//! | `BOOKSHELF_DB_DSN` | unset (in-memory stores) |
//! | `DB_MAX_CONNECTIONS` | `25` |
//! | `DB_IDLE_TIMEOUT_SECS` | `900` |
//! | `DB_QUERY_TIMEOUT_SECS` | `3` |
//! | `AUTH_TOKEN_TTL_HOURS` | `24` |
//! | `ACTIVATION_TOKEN_TTL_HOURS` | `72` |
//! | `BCRYPT_COST` | `12` |
//! | `LOG_FORMAT` | `json` |

use core::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use bookshelf_auth::DEFAULT_COST;
use bookshelf_infra::DbConfig;
use bookshelf_observability::LogFormat;

const MIN_BCRYPT_COST: u32 = 4;
const MAX_BCRYPT_COST: u32 = 31;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub env: String,
    /// `None` selects the in-memory stores.
    pub db: Option<DbConfig>,
    pub auth_token_ttl: chrono::Duration,
    pub activation_token_ttl: chrono::Duration,
    pub bcrypt_cost: u32,
    pub log_format: LogFormat,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unset keys take their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &'static str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = parse_or(get("PORT"), "PORT", 4000_u16)?;
        let env = get("APP_ENV").unwrap_or_else(|| "development".to_string());

        let db = match get("BOOKSHELF_DB_DSN") {
            Some(dsn) => {
                let mut db = DbConfig::new(dsn);
                db.max_connections = parse_or(get("DB_MAX_CONNECTIONS"), "DB_MAX_CONNECTIONS", db.max_connections)?;
                db.idle_timeout = Duration::from_secs(parse_or(
                    get("DB_IDLE_TIMEOUT_SECS"),
                    "DB_IDLE_TIMEOUT_SECS",
                    db.idle_timeout.as_secs(),
                )?);
                let query_secs = parse_or(
                    get("DB_QUERY_TIMEOUT_SECS"),
                    "DB_QUERY_TIMEOUT_SECS",
                    db.query_timeout.as_secs(),
                )?;
                if query_secs == 0 {
                    return Err(invalid("DB_QUERY_TIMEOUT_SECS", "0", "must be greater than zero"));
                }
                db.query_timeout = Duration::from_secs(query_secs);
                Some(db)
            }
            None => None,
        };

        let auth_hours = parse_or(get("AUTH_TOKEN_TTL_HOURS"), "AUTH_TOKEN_TTL_HOURS", 24_i64)?;
        let activation_hours = parse_or(
            get("ACTIVATION_TOKEN_TTL_HOURS"),
            "ACTIVATION_TOKEN_TTL_HOURS",
            72_i64,
        )?;
        for (key, hours) in [
            ("AUTH_TOKEN_TTL_HOURS", auth_hours),
            ("ACTIVATION_TOKEN_TTL_HOURS", activation_hours),
        ] {
            if hours <= 0 {
                return Err(invalid(key, hours.to_string(), "must be greater than zero"));
            }
        }

        let bcrypt_cost = parse_or(get("BCRYPT_COST"), "BCRYPT_COST", DEFAULT_COST)?;
        if !(MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&bcrypt_cost) {
            return Err(invalid("BCRYPT_COST", bcrypt_cost.to_string(), "must be between 4 and 31"));
        }

        let log_format = parse_or(get("LOG_FORMAT"), "LOG_FORMAT", LogFormat::Json)?;

        Ok(Self {
            port,
            env,
            db,
            auth_token_ttl: chrono::Duration::hours(auth_hours),
            activation_token_ttl: chrono::Duration::hours(activation_hours),
            bcrypt_cost,
            log_format,
        })
    }
}

fn parse_or<T>(raw: Option<String>, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: core::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| invalid(key, raw.clone(), e.to_string())),
    }
}

fn invalid(key: &'static str, value: impl Into<String>, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        key,
        value: value.into(),
        reason: reason.into(),
    }
}
