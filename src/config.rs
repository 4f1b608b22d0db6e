use std::env;

/// Process-level engine configuration, read from the environment once at
/// startup. Per-session game rules live in `GameConfig` instead.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// TCP port the WebSocket server binds.
    pub port: u16,
    /// How often the background sweep scans sessions for expired deadlines.
    pub sweep_interval_ms: u64,
    /// Bounded retry count for optimistic-concurrency conflicts.
    pub max_retries: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            port: 6174,
            sweep_interval_ms: 500,
            max_retries: 5,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            port: parse_var("IMPOSTER_PORT", defaults.port),
            sweep_interval_ms: parse_var("IMPOSTER_SWEEP_INTERVAL_MS", defaults.sweep_interval_ms),
            max_retries: parse_var("IMPOSTER_MAX_RETRIES", defaults.max_retries),
        }
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => match raw.parse() {
            Ok(v) => v,
            Err(_) => {
                tracing::warn!("invalid {} value {:?}, using default", key, raw);
                default
            }
        },
        Err(_) => default,
    }
}
