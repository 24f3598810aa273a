//! Process-level helpers shared by the binaries: `.env` loading and
//! environment-driven configuration.
pub mod config;

use std::{env, net::SocketAddr};

pub use config::{AppConfig, ConfigError, Environment, DEFAULT_DATABASE_URL, DEFAULT_SHOP_TIMEZONE};

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";

/// Serializes tests that mutate process environment variables.
#[cfg(test)]
pub(crate) static ENV_GUARD: std::sync::Mutex<()> = std::sync::Mutex::new(());

/// Loads variables from `.env` when present; a missing file is not an error.
pub fn load_env_file() {
    let _ = dotenvy::dotenv();
}

/// Reads `name`, treating unset and blank values alike.
pub(crate) fn env_or(name: &str, default: &str) -> String {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// Address from `APP_BIND_ADDR`, or [`DEFAULT_BIND_ADDR`].
pub fn server_bind_address() -> Result<SocketAddr, std::net::AddrParseError> {
    env_or("APP_BIND_ADDR", DEFAULT_BIND_ADDR).parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_address_defaults_when_unset_or_blank() {
        let _lock = ENV_GUARD.lock().expect("env guard poisoned");
        env::remove_var("APP_BIND_ADDR");
        assert_eq!(server_bind_address().unwrap().to_string(), DEFAULT_BIND_ADDR);

        env::set_var("APP_BIND_ADDR", "   ");
        assert_eq!(server_bind_address().unwrap().to_string(), DEFAULT_BIND_ADDR);
        env::remove_var("APP_BIND_ADDR");
    }

    #[test]
    fn bind_address_reads_env() {
        let _lock = ENV_GUARD.lock().expect("env guard poisoned");
        env::set_var("APP_BIND_ADDR", "0.0.0.0:9000");
        let addr = server_bind_address().expect("custom address should parse");
        assert_eq!(addr.to_string(), "0.0.0.0:9000");
        env::remove_var("APP_BIND_ADDR");
    }
}
