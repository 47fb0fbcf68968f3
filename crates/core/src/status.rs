//! Job outcome codes and their severity classification.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A job outcome or anomaly status code.
///
/// Codes are store-defined and open-ended: non-negative values are reported
/// by job clients, negative values are synthesized by the monitor itself.
/// Codes this crate does not recognize classify as errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusCode(pub i32);

impl StatusCode {
    /// Job finished successfully.
    pub const SUCCESS: StatusCode = StatusCode(0);
    /// Job finished with a failure exit.
    pub const FAIL: StatusCode = StatusCode(1);
    /// Job finished in an indeterminate state.
    pub const UNKNOWN: StatusCode = StatusCode(2);
    /// Job could not be launched at all.
    pub const COULD_NOT_START: StatusCode = StatusCode(3);
    /// A start was suppressed because the previous run still holds the lock.
    pub const ALREADY_RUNNING: StatusCode = StatusCode(4);
    /// Job finished but reported a warning.
    pub const WARNING: StatusCode = StatusCode(5);
    /// A start was suppressed by an inhibit setting.
    pub const INHIBITED: StatusCode = StatusCode(6);
    /// Monitor-synthesized: the job had not started when its scheduled
    /// minute passed.
    pub const LATE: StatusCode = StatusCode(-1);
    /// Monitor-synthesized: the job never started within its grace period.
    pub const MISSED: StatusCode = StatusCode(-2);
    /// Monitor-synthesized: a started job ran past its allowed duration.
    pub const TIMEOUT: StatusCode = StatusCode(-3);

    /// Whether this code represents a healthy outcome.
    pub fn is_ok(self) -> bool {
        matches!(
            self,
            Self::SUCCESS | Self::ALREADY_RUNNING | Self::INHIBITED
        )
    }

    /// Whether this code is informational only.
    ///
    /// Trivial codes never displace a more significant status and never
    /// enter a job's outcome history.
    pub fn is_trivial(self) -> bool {
        matches!(self, Self::LATE | Self::ALREADY_RUNNING | Self::INHIBITED)
    }

    /// Whether this code represents a warning-level anomaly.
    pub fn is_warning(self) -> bool {
        matches!(
            self,
            Self::UNKNOWN | Self::WARNING | Self::LATE | Self::MISSED | Self::TIMEOUT
        )
    }

    /// Whether this code represents an error.
    ///
    /// Everything that is neither ok nor a warning is an error, so
    /// classification stays total over unrecognized codes.
    pub fn is_error(self) -> bool {
        !self.is_ok() && !self.is_warning()
    }

    /// Human-readable name for this code.
    pub fn label(self) -> String {
        match self {
            Self::SUCCESS => "Succeeded".to_string(),
            Self::FAIL => "Failed".to_string(),
            Self::UNKNOWN => "Unknown".to_string(),
            Self::COULD_NOT_START => "Could not start".to_string(),
            Self::ALREADY_RUNNING => "Already running".to_string(),
            Self::WARNING => "Warning".to_string(),
            Self::INHIBITED => "Inhibited".to_string(),
            Self::LATE => "Late".to_string(),
            Self::MISSED => "Missed".to_string(),
            Self::TIMEOUT => "Timed out".to_string(),
            other => format!("Status {}", other.0),
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}
