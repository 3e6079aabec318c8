//! Configuration Module
//!
//! Handles loading cache and server settings from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::domains::{console, hours, memberships, schedule};

/// Cache layer and admin server configuration.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Admin HTTP server port
    pub server_port: u16,
    /// Background sweep interval in seconds (0 disables the sweeper)
    pub sweep_interval: u64,
    /// Upper bound on one data source call, in milliseconds
    pub source_timeout_ms: u64,
    /// TTL in seconds for schedule reads
    pub schedule_ttl: u64,
    /// TTL in seconds for business hours reads
    pub hours_ttl: u64,
    /// TTL in seconds for membership reads
    pub membership_ttl: u64,
    /// TTL in seconds for CSR console reads
    pub console_ttl: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SERVER_PORT` - Admin HTTP port (default: 3000)
    /// - `SWEEP_INTERVAL` - Expired-entry sweep frequency in seconds (default: 30)
    /// - `SOURCE_TIMEOUT_MS` - Data source call timeout (default: 5000)
    /// - `SCHEDULE_TTL` - Schedule TTL in seconds (default: 300)
    /// - `HOURS_TTL` - Business hours TTL in seconds (default: 1800)
    /// - `MEMBERSHIP_TTL` - Membership TTL in seconds (default: 600)
    /// - `CONSOLE_TTL` - CSR console TTL in seconds (default: 120)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            server_port: env_or("SERVER_PORT", defaults.server_port),
            sweep_interval: env_or("SWEEP_INTERVAL", defaults.sweep_interval),
            source_timeout_ms: env_or("SOURCE_TIMEOUT_MS", defaults.source_timeout_ms),
            schedule_ttl: env_or("SCHEDULE_TTL", defaults.schedule_ttl),
            hours_ttl: env_or("HOURS_TTL", defaults.hours_ttl),
            membership_ttl: env_or("MEMBERSHIP_TTL", defaults.membership_ttl),
            console_ttl: env_or("CONSOLE_TTL", defaults.console_ttl),
        }
    }

    pub fn source_timeout(&self) -> Duration {
        Duration::from_millis(self.source_timeout_ms)
    }

    pub fn schedule_ttl(&self) -> Duration {
        Duration::from_secs(self.schedule_ttl)
    }

    pub fn hours_ttl(&self) -> Duration {
        Duration::from_secs(self.hours_ttl)
    }

    pub fn membership_ttl(&self) -> Duration {
        Duration::from_secs(self.membership_ttl)
    }

    pub fn console_ttl(&self) -> Duration {
        Duration::from_secs(self.console_ttl)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 3000,
            sweep_interval: 30,
            source_timeout_ms: 5_000,
            schedule_ttl: schedule::DEFAULT_TTL.as_secs(),
            hours_ttl: hours::DEFAULT_TTL.as_secs(),
            membership_ttl: memberships::DEFAULT_TTL.as_secs(),
            console_ttl: console::DEFAULT_TTL.as_secs(),
        }
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.server_port, 3000);
        assert_eq!(config.sweep_interval, 30);
        assert_eq!(config.schedule_ttl(), Duration::from_secs(300));
        assert_eq!(config.hours_ttl(), Duration::from_secs(1800));
        assert_eq!(config.membership_ttl(), Duration::from_secs(600));
        assert_eq!(config.console_ttl(), Duration::from_secs(120));
        assert_eq!(config.source_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_env_or_falls_back_on_garbage() {
        env::set_var("DIRECTORY_CACHE_TEST_PORT", "not-a-number");
        assert_eq!(env_or("DIRECTORY_CACHE_TEST_PORT", 8080u16), 8080);

        env::set_var("DIRECTORY_CACHE_TEST_PORT", "9090");
        assert_eq!(env_or("DIRECTORY_CACHE_TEST_PORT", 8080u16), 9090);

        env::remove_var("DIRECTORY_CACHE_TEST_PORT");
        assert_eq!(env_or("DIRECTORY_CACHE_TEST_PORT", 8080u16), 8080);
    }
}
