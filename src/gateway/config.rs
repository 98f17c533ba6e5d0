// Copyright (c) 2026 Vela Contributors.
// Licensed under the MIT license.

//! Gateway configuration
//!
//! Every tuning knob is environment-overridable and independently
//! validated: a value that fails to parse falls back to its default with a
//! warning instead of aborting startup. The defaults are policy choices,
//! not contracts.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

/// Gateway configuration
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Listen port
    pub port: u16,
    /// Connection attempts a single client may make per window before
    /// being blocked
    pub max_connections_per_client: u32,
    /// Sliding admission window
    pub window_duration: Duration,
    /// How long a client stays blocked after exceeding the limit
    pub block_duration: Duration,
    /// Header size limit, sized for origins with heavy cookies
    pub max_header_bytes: usize,
    /// Keep-alive timeout for idle connections
    pub keep_alive_timeout: Duration,
    /// Deadline for reading a complete request
    pub request_timeout: Duration,
    /// Root directory for the default application's static files
    pub static_root: PathBuf,
    /// Mount prefix for the bare-style tunnel (plain requests and upgrades)
    pub bare_prefix: String,
    /// Upgrade endpoint paths for the wisp-style tunnel: primary and
    /// content-filtering
    pub wisp_paths: Vec<String>,
    /// Mount prefix for Ultraviolet proxied-page routes
    pub uv_prefix: String,
    /// Mount prefix for Scramjet proxied-page routes
    pub scram_prefix: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            max_connections_per_client: 1000,
            window_duration: Duration::from_secs(60),
            block_duration: Duration::from_secs(30),
            max_header_bytes: 32 * 1024,
            keep_alive_timeout: Duration::from_secs(65),
            request_timeout: Duration::from_secs(120),
            static_root: PathBuf::from("public"),
            bare_prefix: "/bare/".to_string(),
            wisp_paths: vec!["/wisp".to_string(), "/wisp-cf".to_string()],
            uv_prefix: "/~/uv/".to_string(),
            scram_prefix: "/~/scram/".to_string(),
        }
    }
}

impl GatewayConfig {
    /// Create a new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a config from the process environment
    ///
    /// Unset variables keep their defaults; unparseable ones are logged
    /// and replaced individually.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            port: env_or("PORT", defaults.port),
            max_connections_per_client: env_or(
                "VELA_MAX_CONNECTIONS_PER_IP",
                defaults.max_connections_per_client,
            ),
            window_duration: Duration::from_secs(env_or(
                "VELA_WINDOW_DURATION",
                defaults.window_duration.as_secs(),
            )),
            block_duration: Duration::from_secs(env_or(
                "VELA_BLOCK_DURATION",
                defaults.block_duration.as_secs(),
            )),
            max_header_bytes: env_or("VELA_MAX_HEADER_SIZE", defaults.max_header_bytes),
            keep_alive_timeout: Duration::from_secs(env_or(
                "VELA_KEEPALIVE_TIMEOUT",
                defaults.keep_alive_timeout.as_secs(),
            )),
            request_timeout: Duration::from_secs(env_or(
                "VELA_REQUEST_TIMEOUT",
                defaults.request_timeout.as_secs(),
            )),
            static_root: env::var("VELA_STATIC_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.static_root),
            ..defaults
        }
    }

    /// Set the listen port
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the per-client admission limit
    pub fn max_connections_per_client(mut self, max: u32) -> Self {
        self.max_connections_per_client = max;
        self
    }

    /// Set the admission window duration
    pub fn window_duration(mut self, window: Duration) -> Self {
        self.window_duration = window;
        self
    }

    /// Set the post-limit block duration
    pub fn block_duration(mut self, block: Duration) -> Self {
        self.block_duration = block;
        self
    }

    /// Set the keep-alive idle timeout
    pub fn keep_alive_timeout(mut self, timeout: Duration) -> Self {
        self.keep_alive_timeout = timeout;
        self
    }

    /// Set the static root directory
    pub fn static_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.static_root = root.into();
        self
    }

    /// Set the bare tunnel mount prefix
    pub fn bare_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.bare_prefix = prefix.into();
        self
    }

    /// Set the wisp tunnel upgrade paths
    pub fn wisp_paths(mut self, paths: Vec<String>) -> Self {
        self.wisp_paths = paths;
        self
    }
}

/// Read an env var, falling back to `default` when unset or unparseable
fn env_or<T: FromStr + std::fmt::Display>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => match raw.parse() {
            Ok(value) => value,
            Err(_) => {
                warn!(
                    "Invalid value {:?} for {}, using default {}",
                    raw, key, default
                );
                default
            }
        },
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::default();
        assert_eq!(config.max_connections_per_client, 1000);
        assert_eq!(config.window_duration, Duration::from_secs(60));
        assert_eq!(config.block_duration, Duration::from_secs(30));
        assert_eq!(config.max_header_bytes, 32 * 1024);
        assert_eq!(config.wisp_paths.len(), 2);
    }

    #[test]
    fn test_builder() {
        let config = GatewayConfig::new()
            .port(9090)
            .max_connections_per_client(5)
            .window_duration(Duration::from_secs(1));

        assert_eq!(config.port, 9090);
        assert_eq!(config.max_connections_per_client, 5);
    }

    #[test]
    fn test_keepalive_timeout_from_env() {
        env::set_var("VELA_KEEPALIVE_TIMEOUT", "7");
        let config = GatewayConfig::from_env();
        assert_eq!(config.keep_alive_timeout, Duration::from_secs(7));
        env::remove_var("VELA_KEEPALIVE_TIMEOUT");
    }

    #[test]
    fn test_env_or_invalid_falls_back() {
        env::set_var("VELA_TEST_BOGUS_PORT", "not-a-number");
        let value: u16 = env_or("VELA_TEST_BOGUS_PORT", 8080);
        assert_eq!(value, 8080);
        env::remove_var("VELA_TEST_BOGUS_PORT");
    }
}
