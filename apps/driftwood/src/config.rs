use std::env;
use std::time::Duration;

pub const DEFAULT_BACKEND_PORT: u16 = 443;
pub const DEFAULT_RECONNECT_MS: u64 = 5_000;

/// Runtime configuration for the mirror client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Port the local launcher daemon serves on.
    pub backend_port: u16,
    /// Reconnect backoff after a transport error, in milliseconds.
    pub reconnect_ms: u64,
}

impl Config {
    /// Load configuration from environment variables, falling back to the
    /// defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let backend_port = env::var("DRIFTWOOD_BACKEND_PORT")
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(DEFAULT_BACKEND_PORT);
        let reconnect_ms = env::var("DRIFTWOOD_RECONNECT_MS")
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(DEFAULT_RECONNECT_MS);
        Self {
            backend_port,
            reconnect_ms,
        }
    }

    pub fn reconnect_backoff(&self) -> Duration {
        Duration::from_millis(self.reconnect_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_port: DEFAULT_BACKEND_PORT,
            reconnect_ms: DEFAULT_RECONNECT_MS,
        }
    }
}
