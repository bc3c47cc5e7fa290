//! Process configuration.
//!
//! Loaded once at startup from the environment (and `.env`, via `dotenv`)
//! and handed by value to whatever needs it. Every required variable is
//! checked before anything connects, and all of the missing ones are
//! reported in a single error.

use crate::logging::LogLevel;
use crate::scheduler::OverlapPolicy;
use thiserror::Error;

pub const REQUIRED_VARS: &[&str] = &[
    "PORT",
    "IQ_AIR_API_KEY",
    "IQ_API_BASE_URL",
    "POSTGRES_USER",
    "POSTGRES_PASSWORD",
    "POSTGRES_DB",
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Required environment variables are missing or undefined: {}", .0.join(", "))]
    Missing(Vec<String>),

    #[error("Invalid value for {var}: '{value}' ({reason})")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Where and how to reach the air quality provider.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub api_key: String,
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub dbname: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub provider: ProviderConfig,
    pub database: DatabaseConfig,
    pub log_level: LogLevel,
    pub log_file: Option<String>,
    pub overlap: OverlapPolicy,
}

impl Config {
    /// Reads `.env` (if present) and then the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let missing: Vec<String> = REQUIRED_VARS
            .iter()
            .filter(|var| get(**var).is_none())
            .map(|var| var.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }

        // Presence was checked above.
        let required = |key: &str| get(key).unwrap_or_default();

        let port = parse_var("PORT", &required("PORT"))?;
        let db_port = match get("POSTGRES_PORT") {
            Some(raw) => parse_var("POSTGRES_PORT", &raw)?,
            None => 5432,
        };
        let log_level = match get("LOG_LEVEL") {
            Some(raw) => raw.parse::<LogLevel>().map_err(|reason| ConfigError::Invalid {
                var: "LOG_LEVEL",
                value: raw.clone(),
                reason,
            })?,
            None => LogLevel::Info,
        };
        let overlap = match get("INGEST_OVERLAP") {
            Some(raw) => raw.parse::<OverlapPolicy>().map_err(|reason| ConfigError::Invalid {
                var: "INGEST_OVERLAP",
                value: raw.clone(),
                reason,
            })?,
            None => OverlapPolicy::default(),
        };

        Ok(Config {
            port,
            provider: ProviderConfig {
                api_key: required("IQ_AIR_API_KEY"),
                base_url: required("IQ_API_BASE_URL").trim_end_matches('/').to_string(),
            },
            database: DatabaseConfig {
                host: get("POSTGRES_HOST").unwrap_or_else(|| "localhost".to_string()),
                port: db_port,
                user: required("POSTGRES_USER"),
                password: required("POSTGRES_PASSWORD"),
                dbname: required("POSTGRES_DB"),
            },
            log_level,
            log_file: get("LOG_FILE"),
            overlap,
        })
    }
}

fn parse_var<T>(var: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
        var,
        value: raw.to_string(),
        reason: e.to_string(),
    })
}
