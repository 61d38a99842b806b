//! config-rs/lib.rs
//! Shared configuration utilities for consistent service configuration.
//! Provides standardized environment readers and bind-address management.

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

/// Load a `.env` file if present. Safe to call more than once.
pub fn load_env() {
    if dotenv::dotenv().is_ok() {
        log::debug!("Loaded environment from .env file");
    }
}

/// Read an environment variable with a typed default.
///
/// # Arguments
/// * `name` - The environment variable name, e.g. "STAGE_TIMEOUT_MS"
/// * `default` - The value to use when the variable is unset or unparsable
pub fn env_or<T: FromStr>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => raw.parse::<T>().unwrap_or_else(|_| {
            log::warn!("Invalid value in {}, using default", name);
            default
        }),
        Err(_) => default,
    }
}

/// Read an optional environment variable, treating empty strings as unset.
pub fn env_opt(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Read a millisecond duration from the environment.
pub fn env_duration_ms(name: &str, default_ms: u64) -> Duration {
    Duration::from_millis(env_or(name, default_ms))
}

/// Read a second-granularity duration from the environment.
pub fn env_duration_secs(name: &str, default_secs: u64) -> Duration {
    Duration::from_secs(env_or(name, default_secs))
}

/// Get service port from environment variables with proper fallback.
///
/// # Arguments
/// * `service_name` - The name of the service (e.g., "ADVISOR")
/// * `default_port` - The default port to use if not specified in environment
pub fn get_service_port(service_name: &str, default_port: u16) -> u16 {
    let var_name = format!("{}_SERVICE_PORT", service_name.to_uppercase());
    env::var(&var_name)
        .unwrap_or_else(|_| default_port.to_string())
        .parse::<u16>()
        .unwrap_or_else(|_| {
            log::warn!("Invalid port in {}, using default {}", var_name, default_port);
            default_port
        })
}

/// Create a SocketAddr for binding a service.
///
/// Honors a full `{SERVICE}_SERVICE_ADDR` override, otherwise binds
/// `0.0.0.0` on the configured or default port.
pub fn get_bind_address(service_name: &str, default_port: u16) -> SocketAddr {
    let var_name = format!("{}_SERVICE_ADDR", service_name.to_uppercase());

    if let Ok(addr_str) = env::var(&var_name) {
        if let Ok(addr) = addr_str.parse::<SocketAddr>() {
            return addr;
        }
        log::warn!("Invalid address format in {}, using default", var_name);
    }

    let port = get_service_port(service_name, default_port);
    SocketAddr::from(([0, 0, 0, 0], port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_or_typed() {
        std::env::set_var("CFG_TEST_PORT", "9000");
        assert_eq!(env_or::<u16>("CFG_TEST_PORT", 8000), 9000);

        std::env::set_var("CFG_TEST_PORT", "not-a-number");
        assert_eq!(env_or::<u16>("CFG_TEST_PORT", 8000), 8000);

        std::env::remove_var("CFG_TEST_PORT");
        assert_eq!(env_or::<u16>("CFG_TEST_PORT", 8000), 8000);
    }

    #[test]
    fn test_env_opt_treats_empty_as_unset() {
        std::env::set_var("CFG_TEST_KEY", "  ");
        assert_eq!(env_opt("CFG_TEST_KEY"), None);

        std::env::set_var("CFG_TEST_KEY", "secret");
        assert_eq!(env_opt("CFG_TEST_KEY"), Some("secret".to_string()));
        std::env::remove_var("CFG_TEST_KEY");
    }

    #[test]
    fn test_env_duration_helpers() {
        std::env::set_var("CFG_TEST_TIMEOUT_MS", "250");
        assert_eq!(
            env_duration_ms("CFG_TEST_TIMEOUT_MS", 1000),
            Duration::from_millis(250)
        );
        std::env::remove_var("CFG_TEST_TIMEOUT_MS");
        assert_eq!(
            env_duration_secs("CFG_TEST_TTL_SECS", 1800),
            Duration::from_secs(1800)
        );
    }

    #[test]
    fn test_get_bind_address() {
        std::env::set_var("BINDTEST_SERVICE_ADDR", "127.0.0.1:9123");
        assert_eq!(
            get_bind_address("BINDTEST", 8090),
            "127.0.0.1:9123".parse().unwrap()
        );

        std::env::remove_var("BINDTEST_SERVICE_ADDR");
        std::env::set_var("BINDTEST_SERVICE_PORT", "9001");
        assert_eq!(get_bind_address("BINDTEST", 8090).port(), 9001);

        std::env::remove_var("BINDTEST_SERVICE_PORT");
        assert_eq!(get_bind_address("BINDTEST", 8090).port(), 8090);
    }
}
