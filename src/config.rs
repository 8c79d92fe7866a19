use crate::proxy::ExecuteOptions;
use std::env;
use std::time::Duration;

/// Default outbound timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Default number of redirects followed before giving up.
pub const DEFAULT_MAX_REDIRECTS: usize = 5;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub timeout_ms: u64,
    pub max_redirects: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 5000,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            max_redirects: DEFAULT_MAX_REDIRECTS,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            port: parse_var("PORT").unwrap_or(defaults.port),
            timeout_ms: parse_var::<u64>("PROXY_TIMEOUT_MS")
                .filter(|ms| *ms > 0)
                .unwrap_or(defaults.timeout_ms),
            max_redirects: parse_var("PROXY_MAX_REDIRECTS").unwrap_or(defaults.max_redirects),
        }
    }

    pub fn execute_options(&self) -> ExecuteOptions {
        ExecuteOptions {
            timeout: Duration::from_millis(self.timeout_ms),
            max_redirects: self.max_redirects,
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}
