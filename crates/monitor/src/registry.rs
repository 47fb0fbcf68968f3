//! In-memory job status registry and the event application rules.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use vigil_core::{EventKind, JobEvent, JobId, JobInfo, StatusCode, HISTORY_LIMIT};
use vigil_schedule::CronSchedule;

/// Per-job anomaly detection limits.
#[derive(Debug, Clone, Copy)]
pub struct JobConfig {
    /// Allowed delay after a schedule match before the job counts as late.
    pub grace_period: Duration,
    /// Time allowed between a start and its finish.
    pub timeout: Duration,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            grace_period: Duration::from_secs(120),
            timeout: Duration::from_secs(300),
        }
    }
}

/// Live status of a single job.
#[derive(Debug, Clone, Serialize)]
pub struct JobStatus {
    /// Most significant recent outcome, per the precedence rules of
    /// [`JobRegistry::apply_event`].
    pub status: Option<StatusCode>,
    /// Whether a start without a matching finish has been seen.
    pub running: bool,
    /// Last non-trivial outcomes, oldest first, capped at [`HISTORY_LIMIT`].
    pub history: VecDeque<StatusCode>,
    /// Percentage of successes in `history` (0 when empty).
    pub reliability: u8,
    /// Store registration timestamp, used to detect re-registration.
    pub installed: DateTime<Utc>,
    /// Whether a schedule matcher is currently attached.
    pub scheduled: bool,
}

/// All live monitoring state, keyed by job id.
///
/// Owned exclusively by the monitor task; nothing here is synchronized.
/// The deadline maps hold absolute instants: `miss_deadlines` is the
/// start-by deadline armed when a schedule match passes without a start,
/// `run_deadlines` the finish-by deadline armed by each start.
#[derive(Default)]
pub struct JobRegistry {
    status: HashMap<JobId, JobStatus>,
    config: HashMap<JobId, JobConfig>,
    schedules: HashMap<JobId, CronSchedule>,
    last_start: HashMap<JobId, DateTime<Utc>>,
    run_deadlines: HashMap<JobId, DateTime<Utc>>,
    miss_deadlines: HashMap<JobId, DateTime<Utc>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a job with a blank status and its detection limits.
    pub fn insert_job(&mut self, info: &JobInfo, config: JobConfig) {
        self.status.insert(
            info.id,
            JobStatus {
                status: None,
                running: false,
                history: VecDeque::with_capacity(HISTORY_LIMIT),
                reliability: 0,
                installed: info.installed,
                scheduled: false,
            },
        );
        self.config.insert(info.id, config);
    }

    /// Forget a job everywhere: status, config, matcher, timers.
    ///
    /// Returns whether the job was known; a second removal is a no-op.
    pub fn remove(&mut self, id: JobId) -> bool {
        let present = self.status.remove(&id).is_some();
        self.config.remove(&id);
        self.schedules.remove(&id);
        self.last_start.remove(&id);
        self.run_deadlines.remove(&id);
        self.miss_deadlines.remove(&id);
        present
    }

    pub fn contains(&self, id: JobId) -> bool {
        self.status.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.status.len()
    }

    pub fn is_empty(&self) -> bool {
        self.status.is_empty()
    }

    pub fn job_ids(&self) -> Vec<JobId> {
        self.status.keys().copied().collect()
    }

    pub fn status(&self, id: JobId) -> Option<&JobStatus> {
        self.status.get(&id)
    }

    /// The full status map, for snapshot capture.
    pub fn jobs(&self) -> &HashMap<JobId, JobStatus> {
        &self.status
    }

    pub fn installed(&self, id: JobId) -> Option<DateTime<Utc>> {
        self.status.get(&id).map(|job| job.installed)
    }

    pub fn set_installed(&mut self, id: JobId, at: DateTime<Utc>) {
        if let Some(job) = self.status.get_mut(&id) {
            job.installed = at;
        }
    }

    /// Attach a schedule matcher and mark the job scheduled.
    pub fn attach_matcher(&mut self, id: JobId, schedule: CronSchedule) {
        self.schedules.insert(id, schedule);
        if let Some(job) = self.status.get_mut(&id) {
            job.scheduled = true;
        }
    }

    /// Drop any schedule matcher and mark the job unscheduled.
    pub fn detach_matcher(&mut self, id: JobId) {
        self.schedules.remove(&id);
        if let Some(job) = self.status.get_mut(&id) {
            job.scheduled = false;
        }
    }

    /// Apply one event to a live job.
    ///
    /// Status precedence: a trivial code lands only over an absent or ok
    /// status; a warning lands unless the current status is an error; a
    /// final code always lands. Non-trivial codes also enter the history,
    /// whether or not the status field moved. Start events mark the job
    /// running and arm its finish-by deadline; finish events (and TIMEOUT
    /// warnings) mark it stopped and clear that deadline.
    ///
    /// Events for unknown ids are ignored.
    pub fn apply_event(&mut self, id: JobId, event: &JobEvent) {
        let job = match self.status.get_mut(&id) {
            Some(job) => job,
            None => return,
        };

        if let Some(status) = event.status {
            let prev = job.status;
            if status.is_trivial() {
                if prev.map(StatusCode::is_ok).unwrap_or(true) {
                    job.status = Some(status);
                }
            } else if status.is_warning() {
                if !prev.map(StatusCode::is_error).unwrap_or(false) {
                    job.status = Some(status);
                }
            } else {
                job.status = Some(status);
            }

            if !status.is_trivial() {
                if job.history.len() == HISTORY_LIMIT {
                    job.history.pop_front();
                }
                job.history.push_back(status);
            }
        }

        if event.kind == EventKind::Start {
            job.running = true;
            self.last_start.insert(id, event.datetime);
            let timeout = self.config.get(&id).copied().unwrap_or_default().timeout;
            let timeout =
                chrono::Duration::from_std(timeout).unwrap_or(chrono::Duration::zero());
            self.run_deadlines.insert(id, event.datetime + timeout);
            self.miss_deadlines.remove(&id);
        } else if event.kind == EventKind::Finish
            || event.status == Some(StatusCode::TIMEOUT)
        {
            job.running = false;
            self.run_deadlines.remove(&id);
        }
    }

    /// Recompute a job's reliability from its current history.
    pub fn recompute_reliability(&mut self, id: JobId) {
        if let Some(job) = self.status.get_mut(&id) {
            job.reliability = reliability(&job.history);
        }
    }

    /// Find jobs whose schedule matches `at` without a start inside the
    /// grace period, and arm their start-by deadlines.
    ///
    /// A job started at exactly `at - grace` still counts as on time.
    pub fn flag_late_starts(&mut self, at: DateTime<Utc>) -> Vec<JobId> {
        let mut late = Vec::new();
        for (&id, schedule) in &self.schedules {
            if !schedule.matches(at) {
                continue;
            }
            let grace = self.config.get(&id).copied().unwrap_or_default().grace_period;
            let grace = chrono::Duration::from_std(grace).unwrap_or(chrono::Duration::zero());
            let on_time = self
                .last_start
                .get(&id)
                .map(|start| *start + grace >= at)
                .unwrap_or(false);
            if on_time {
                continue;
            }
            self.miss_deadlines.insert(id, at + grace);
            late.push(id);
        }
        late.sort_unstable();
        late
    }

    /// Drain every start-by deadline strictly before `now`.
    pub fn take_due_miss_deadlines(&mut self, now: DateTime<Utc>) -> Vec<JobId> {
        take_due(&mut self.miss_deadlines, now)
    }

    /// Drain every finish-by deadline strictly before `now`.
    pub fn take_due_run_deadlines(&mut self, now: DateTime<Utc>) -> Vec<JobId> {
        take_due(&mut self.run_deadlines, now)
    }
}

fn reliability(history: &VecDeque<StatusCode>) -> u8 {
    if history.is_empty() {
        return 0;
    }
    let successes = history
        .iter()
        .filter(|s| **s == StatusCode::SUCCESS)
        .count();
    (100 * successes / history.len()) as u8
}

fn take_due(deadlines: &mut HashMap<JobId, DateTime<Utc>>, now: DateTime<Utc>) -> Vec<JobId> {
    let mut due: Vec<JobId> = deadlines
        .iter()
        .filter(|(_, deadline)| **deadline < now)
        .map(|(&id, _)| id)
        .collect();
    for id in &due {
        deadlines.remove(id);
    }
    due.sort_unstable();
    due
}

// ── Tests ────────────────────────────────────────────────────────────
