// ABOUTME: Server configuration loaded from environment variables
// ABOUTME: Parses host, port, database path, CORS origin, rate limits, and dev mode

use axum::http::HeaderValue;
use std::env;
use std::net::IpAddr;
use std::num::ParseIntError;
use std::path::PathBuf;
use thiserror::Error;

use crate::middleware::RateLimitConfig;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 4001;
pub const DEFAULT_CORS_ORIGIN: &str = "http://localhost:5173";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid port number: {0}")]
    InvalidPort(#[from] ParseIntError),
    #[error("Port {0} is out of valid range (1-65535)")]
    PortOutOfRange(u16),
    #[error("Invalid host address '{0}'")]
    InvalidHost(String),
    #[error("Invalid CORS origin '{0}'")]
    InvalidCorsOrigin(String),
    #[error("{name} must be a positive integer, got '{value}'")]
    InvalidNumber { name: &'static str, value: String },
    #[error("{name} must be true or false, got '{value}'")]
    InvalidBool { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub db_path: PathBuf,
    pub cors_origin: HeaderValue,
    pub rate_limit: RateLimitConfig,
    pub dev_mode: bool,
}

impl Config {
    /// Read configuration from the process environment (after `.env` is loaded)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from any key lookup, so tests never touch the real environment
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host_str = lookup("BENOS_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());
        let host = host_str
            .trim()
            .parse::<IpAddr>()
            .map_err(|_| ConfigError::InvalidHost(host_str.clone()))?;

        let port = match lookup("BENOS_PORT").or_else(|| lookup("PORT")) {
            Some(raw) => raw.trim().parse::<u16>()?,
            None => DEFAULT_PORT,
        };
        if port == 0 {
            return Err(ConfigError::PortOutOfRange(port));
        }

        let db_path = lookup("BENOS_DB_PATH")
            .filter(|raw| !raw.trim().is_empty())
            .map(|raw| expand_home(raw.trim()))
            .unwrap_or_else(benos_core::default_database_path);

        let origin = lookup("CORS_ORIGIN").unwrap_or_else(|| DEFAULT_CORS_ORIGIN.to_string());
        let cors_origin = HeaderValue::from_str(origin.trim())
            .map_err(|_| ConfigError::InvalidCorsOrigin(origin.clone()))?;

        let rate_limit = RateLimitConfig {
            enabled: parse_bool(&lookup, "RATE_LIMIT_ENABLED", true)?,
            requests_per_minute: parse_positive(&lookup, "RATE_LIMIT_RPM", 120)?,
            burst: parse_positive(&lookup, "RATE_LIMIT_BURST", 20)?,
        };

        Ok(Config {
            host,
            port,
            db_path,
            cors_origin,
            rate_limit,
            dev_mode: parse_bool(&lookup, "BENOS_DEV_MODE", false)?,
        })
    }
}

fn parse_bool<F>(lookup: &F, name: &'static str, default: bool) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(name) else {
        return Ok(default);
    };
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidBool { name, value: raw }),
    }
}

fn parse_positive<F>(lookup: &F, name: &'static str, default: u32) -> Result<u32, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(name) else {
        return Ok(default);
    };
    match raw.trim().parse::<u32>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(ConfigError::InvalidNumber { name, value: raw }),
    }
}

/// `~/x` becomes `$HOME/x`
fn expand_home(raw: &str) -> PathBuf {
    match raw.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(rest),
        None => PathBuf::from(raw),
    }
}
