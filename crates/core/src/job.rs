//! Job identity and registration records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Store-assigned job identifier.
pub type JobId = i64;

/// A job registration as the store reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobInfo {
    pub id: JobId,
    /// When the registration was installed or last updated.
    pub installed: DateTime<Utc>,
    /// Set once the job has been withdrawn from the store.
    pub deleted: Option<DateTime<Utc>>,
    /// Cron schedule spec, when the job is expected on a schedule.
    pub time: Option<String>,
    /// IANA timezone the schedule is evaluated in (UTC when absent).
    pub timezone: Option<String>,
}

impl JobInfo {
    /// Whether the registration is still live.
    pub fn is_live(&self) -> bool {
        self.deleted.is_none()
    }
}
