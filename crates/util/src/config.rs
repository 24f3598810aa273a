use std::net::SocketAddr;

use chrono_tz::Tz;
use thiserror::Error;

use super::{env_or, server_bind_address};

pub const DEFAULT_DATABASE_URL: &str = "sqlite://tailor.db?mode=rwc";
pub const DEFAULT_SHOP_TIMEZONE: &str = "UTC";

/// Application runtime environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
    Test,
}

impl Environment {
    fn parse(value: &str) -> Result<Self, ConfigError> {
        match value {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            "test" => Ok(Self::Test),
            other => Err(ConfigError::InvalidEnvironment(other.to_string())),
        }
    }

    /// Returns the canonical name used for logging/metrics labels.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Test => "test",
        }
    }
}

/// Runtime configuration resolved from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub environment: Environment,
    pub database_url: String,
    /// Timezone whose calendar decides when order numbering restarts.
    pub shop_timezone: Tz,
}

impl AppConfig {
    /// Constructs the configuration by reading and validating environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let environment = Environment::parse(&env_or("APP_ENV", "development"))?;
        let bind_addr = server_bind_address()?;
        let database_url = env_or("DATABASE_URL", DEFAULT_DATABASE_URL);
        let timezone_name = env_or("SHOP_TIMEZONE", DEFAULT_SHOP_TIMEZONE);
        let shop_timezone = timezone_name
            .parse::<Tz>()
            .map_err(|_| ConfigError::InvalidTimezone(timezone_name))?;

        Ok(Self {
            bind_addr,
            environment,
            database_url,
            shop_timezone,
        })
    }
}

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("APP_ENV must be one of 'development', 'production', or 'test' (got {0})")]
    InvalidEnvironment(String),
    #[error("invalid APP_BIND_ADDR value: {0}")]
    BindAddress(#[from] std::net::AddrParseError),
    #[error("SHOP_TIMEZONE must be an IANA timezone name (got {0})")]
    InvalidTimezone(String),
}
