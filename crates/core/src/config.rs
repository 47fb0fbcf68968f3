//! Monitor tuning knobs, environment-driven.

use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Number of non-trivial outcomes retained per job for history and
/// reliability calculation.
pub const HISTORY_LIMIT: usize = 10;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_secs(key: &str, default: u64) -> Duration {
    let secs = env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default);
    Duration::from_secs(secs)
}

/// Monitor timing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Cadence of the reconciliation loop.
    pub poll_interval: Duration,
    /// Allowed delay after a schedule match before a job counts as late.
    pub grace_period: Duration,
    /// Default time allowed between a start and its finish.
    pub job_timeout: Duration,
    /// Long-poll wait applied when the caller does not pass one.
    pub long_poll_timeout: Duration,
    /// Upper bound of the random stagger added to every long-poll wait.
    pub long_poll_jitter: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            grace_period: Duration::from_secs(120),
            job_timeout: Duration::from_secs(300),
            long_poll_timeout: Duration::from_secs(120),
            long_poll_jitter: Duration::from_secs(20),
        }
    }
}

impl MonitorConfig {
    /// Build config from environment variables (call `load_dotenv()` first).
    ///
    /// Every value is read as whole seconds; unset or unparseable variables
    /// fall back to the defaults.
    pub fn from_env() -> Self {
        Self {
            poll_interval: env_secs("VIGIL_POLL_INTERVAL_SECS", 5),
            grace_period: env_secs("VIGIL_GRACE_PERIOD_SECS", 120),
            job_timeout: env_secs("VIGIL_JOB_TIMEOUT_SECS", 300),
            long_poll_timeout: env_secs("VIGIL_LONG_POLL_TIMEOUT_SECS", 120),
            long_poll_jitter: env_secs("VIGIL_LONG_POLL_JITTER_SECS", 20),
        }
    }
}
