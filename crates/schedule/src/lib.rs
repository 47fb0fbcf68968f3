//! Cron schedule matching with timezone support.
//!
//! Wraps the `cron` crate's 6-field parser behind minute-granularity
//! matching: standard 5-field specs are normalized by prepending a seconds
//! field, and an instant matches when the schedule includes the minute it
//! falls in, evaluated in the schedule's timezone.

use std::str::FromStr;

use chrono::{DateTime, Timelike, Utc};
use chrono_tz::Tz;
use cron::Schedule;
use thiserror::Error;

/// Error constructing a [`CronSchedule`].
#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("invalid cron expression: {0}")]
    InvalidExpression(#[from] cron::error::Error),

    #[error("invalid timezone: {0}")]
    InvalidTimezone(String),
}

/// A parsed cron schedule bound to a timezone.
#[derive(Debug, Clone)]
pub struct CronSchedule {
    schedule: Schedule,
    timezone: Tz,
}

impl CronSchedule {
    /// Parse a cron spec with an optional IANA timezone name (UTC when absent).
    ///
    /// Standard 5-field specs are normalized to the 6-field form the `cron`
    /// crate requires by prepending a seconds field. Shortcut specs such as
    /// `@daily` pass through unchanged.
    pub fn new(spec: &str, timezone: Option<&str>) -> Result<Self, ScheduleError> {
        let schedule = Schedule::from_str(&normalize_cron(spec))?;
        let timezone = match timezone {
            Some(name) => name
                .parse::<Tz>()
                .map_err(|_| ScheduleError::InvalidTimezone(name.to_string()))?,
            None => Tz::UTC,
        };
        Ok(Self { schedule, timezone })
    }

    /// Whether the schedule fires in the minute containing `instant`.
    ///
    /// Minute granularity: any two instants within the same minute agree.
    pub fn matches(&self, instant: DateTime<Utc>) -> bool {
        instant
            .with_timezone(&self.timezone)
            .with_second(0)
            .and_then(|t| t.with_nanosecond(0))
            .map(|minute| self.schedule.includes(minute))
            .unwrap_or(false)
    }

    /// The timezone the schedule is evaluated in.
    pub fn timezone(&self) -> Tz {
        self.timezone
    }
}

/// Normalize a 5-field cron expression to 6-field by prepending "0 " for seconds.
fn normalize_cron(spec: &str) -> String {
    let trimmed = spec.trim();
    if trimmed.split_whitespace().count() == 5 {
        format!("0 {}", trimmed)
    } else {
        trimmed.to_string()
    }
}

// ── Tests ────────────────────────────────────────────────────────────
