//! The monitor task: bootstrap replay and the reconciliation loop.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Timelike, Utc};
use tokio::sync::{watch, Notify};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use vigil_core::{JobId, JobInfo, MonitorConfig, StatusCode, Watermarks, HISTORY_LIMIT};
use vigil_schedule::CronSchedule;
use vigil_store::{JobStore, StoreError};

use crate::error::MonitorError;
use crate::handle::MonitorHandle;
use crate::registry::{JobConfig, JobRegistry};
use crate::snapshot::StatusSnapshot;

/// Events fetched per job at bootstrap, as a multiple of the history cap.
///
/// Start and warning events share the fetch window with finishes, so a
/// margin is needed to reliably recover a full outcome history.
const BOOTSTRAP_EVENT_MARGIN: usize = 4;

/// Most minute boundaries replayed by the late-start catch-up in one tick.
///
/// A forward clock jump past this cap (resume after suspend, a large NTP
/// step) scans only the most recent hour instead of one boundary per
/// elapsed minute.
const MAX_MINUTE_CATCHUP: i64 = 60;

/// The monitor task: exclusive owner of all live monitoring state.
///
/// Construct with [`JobMonitor::new`], hand the [`MonitorHandle`] to
/// readers, and drive the monitor itself either with [`run`](Self::run)
/// (wall clock) or with explicit [`bootstrap`](Self::bootstrap) and
/// [`tick`](Self::tick) calls for deterministic replay.
pub struct JobMonitor {
    store: Arc<dyn JobStore>,
    config: MonitorConfig,
    registry: JobRegistry,
    watermarks: Watermarks,
    /// Minute-truncated instant of the last minute handled by
    /// [`sync_minutes`](Self::sync_minutes).
    last_minute: Option<DateTime<Utc>>,
    snapshot_tx: watch::Sender<Option<Arc<StatusSnapshot>>>,
    new_event: Arc<Notify>,
}

impl JobMonitor {
    /// Build a monitor over `store` along with its reader handle.
    ///
    /// No snapshot is visible through the handle until bootstrap completes.
    pub fn new(store: Arc<dyn JobStore>, config: MonitorConfig) -> (Self, MonitorHandle) {
        let (snapshot_tx, snapshot_rx) = watch::channel(None);
        let new_event = Arc::new(Notify::new());
        let handle = MonitorHandle {
            snapshot_rx,
            new_event: Arc::clone(&new_event),
            long_poll_timeout: config.long_poll_timeout,
            long_poll_jitter: config.long_poll_jitter,
        };
        let monitor = Self {
            store,
            config,
            registry: JobRegistry::new(),
            watermarks: Watermarks::default(),
            last_minute: None,
            snapshot_tx,
            new_event,
        };
        (monitor, handle)
    }

    /// Bootstrap, then reconcile forever at the configured poll interval.
    ///
    /// Returns only if the store cannot be read during bootstrap; once the
    /// first snapshot is out, store failures degrade to stale data instead.
    pub async fn run(mut self) -> Result<(), MonitorError> {
        self.bootstrap().await?;
        let period = self.config.poll_interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            self.tick(Utc::now()).await;
        }
    }

    /// Reconstruct live status by replaying recent history for every job,
    /// then publish the first snapshot, unblocking status readers.
    pub async fn bootstrap(&mut self) -> Result<(), MonitorError> {
        let jobs = self.store.get_jobs().await?;
        info!(jobs = jobs.len(), "replaying event history");

        for listed in &jobs {
            let id = listed.id;
            if self.initialize_job(id).await?.is_none() {
                warn!(job_id = id, "job vanished during bootstrap, skipping");
                continue;
            }
            let mut events = self
                .store
                .get_job_events(id, BOOTSTRAP_EVENT_MARGIN * HISTORY_LIMIT)
                .await?;
            // Stored newest first; replay oldest first.
            events.reverse();
            for event in &events {
                self.watermarks.observe(event);
                self.registry.apply_event(id, event);
            }
            self.registry.recompute_reliability(id);
        }

        self.publish_snapshot();
        info!(jobs = self.registry.len(), "initial status ready");
        Ok(())
    }

    /// One reconciliation pass at the given instant.
    ///
    /// [`run`](Self::run) calls this with the wall clock every poll
    /// interval; tests drive it directly for deterministic replay.
    pub async fn tick(&mut self, now: DateTime<Utc>) {
        let ingested = self.ingest_new_events().await;
        self.sync_minutes(now).await;
        self.sweep_deadlines(now).await;
        self.publish_snapshot();
        if ingested > 0 {
            self.new_event.notify_waiters();
        }
    }

    // ── Event ingestion ──────────────────────────────────────────────

    /// Pull and apply everything past the current watermarks.
    ///
    /// Returns the number of events fetched; a read failure is retried on
    /// the next tick since the watermarks have not moved.
    async fn ingest_new_events(&mut self) -> usize {
        let events = match self.store.get_events_since(self.watermarks).await {
            Ok(events) => events,
            Err(e) => {
                warn!(error = %e, "event fetch failed, retrying next tick");
                return 0;
            }
        };

        for event in &events {
            // Watermarks advance first: events of vanished jobs must not
            // be re-fetched forever.
            self.watermarks.observe(event);

            let id = event.job_id;
            if !self.registry.contains(id) {
                match self.initialize_job(id).await {
                    Ok(Some(_)) => info!(job_id = id, "initialized job from its first event"),
                    Ok(None) => {
                        warn!(job_id = id, "event for vanished job, skipping");
                        continue;
                    }
                    Err(e) => {
                        warn!(job_id = id, error = %e, "job lookup failed, skipping event");
                        continue;
                    }
                }
            }
            self.registry.apply_event(id, event);
            self.registry.recompute_reliability(id);
        }
        events.len()
    }

    /// Set up registry state for a job, or report it vanished.
    ///
    /// Re-fetches the registration so a job deleted between a listing and
    /// this call is detected; `Ok(None)` is that expected race, not an
    /// error.
    async fn initialize_job(&mut self, id: JobId) -> Result<Option<JobInfo>, StoreError> {
        let info = match self.store.get_job_info(id).await? {
            Some(info) if info.is_live() => info,
            _ => return Ok(None),
        };
        self.registry.insert_job(&info, self.default_job_config());
        self.attach_schedule(id, &info);
        Ok(Some(info))
    }

    fn default_job_config(&self) -> JobConfig {
        JobConfig {
            grace_period: self.config.grace_period,
            timeout: self.config.job_timeout,
        }
    }

    /// Replace a job's schedule matcher from its registration.
    ///
    /// The old matcher is dropped first, so a registration whose spec no
    /// longer parses leaves the job unscheduled rather than matching the
    /// outdated spec.
    fn attach_schedule(&mut self, id: JobId, info: &JobInfo) {
        self.registry.detach_matcher(id);
        let spec = match info.time.as_deref() {
            Some(spec) => spec,
            None => return,
        };
        match CronSchedule::new(spec, info.timezone.as_deref()) {
            Ok(schedule) => self.registry.attach_matcher(id, schedule),
            Err(e) => {
                warn!(
                    job_id = id,
                    schedule = %spec,
                    error = %e,
                    "invalid schedule, job left unscheduled"
                );
            }
        }
    }

    // ── Minute handling ──────────────────────────────────────────────

    /// Run the schedule checks for every wall-clock minute boundary
    /// crossed since the previous tick.
    ///
    /// Each crossed boundary gets its own late-start scan, so a stalled
    /// monitor catches up on the minutes it slept through. The job-set
    /// diff runs once per tick that crossed at least one boundary. A
    /// backwards clock step re-anchors the cursor without scanning, and
    /// a forward jump past [`MAX_MINUTE_CATCHUP`] replays only the most
    /// recent boundaries under the cap.
    async fn sync_minutes(&mut self, now: DateTime<Utc>) {
        let minute = truncate_minute(now);
        let last = match self.last_minute {
            Some(last) => last,
            None => {
                self.last_minute = Some(minute);
                return;
            }
        };

        if minute < last {
            warn!(previous = %last, current = %minute, "clock moved backwards, re-anchoring");
            self.last_minute = Some(minute);
            return;
        }
        if minute == last {
            return;
        }

        let gap = (minute - last).num_minutes();
        let mut at = if gap > MAX_MINUTE_CATCHUP {
            warn!(minutes = gap, "clock jumped forward, capping late-start catch-up");
            minute - chrono::Duration::minutes(MAX_MINUTE_CATCHUP - 1)
        } else {
            last + chrono::Duration::minutes(1)
        };
        while at <= minute {
            self.check_late_starts(at).await;
            at += chrono::Duration::minutes(1);
        }
        self.last_minute = Some(minute);

        self.sync_jobs().await;
    }

    /// Flag every scheduled job that has not started by `at`, writing one
    /// LATE warning each and arming their start-by deadlines.
    async fn check_late_starts(&mut self, at: DateTime<Utc>) {
        for id in self.registry.flag_late_starts(at) {
            warn!(job_id = id, minute = %at, "job late");
            self.write_warning(id, StatusCode::LATE).await;
        }
    }

    /// Diff the registry against the store's current job list.
    ///
    /// Re-registered jobs (newer `installed`) get their schedule
    /// re-attached, unknown jobs are initialized without event replay, and
    /// jobs gone from the list are forgotten entirely.
    async fn sync_jobs(&mut self) {
        let jobs = match self.store.get_jobs().await {
            Ok(jobs) => jobs,
            Err(e) => {
                warn!(error = %e, "job list fetch failed, skipping sync");
                return;
            }
        };

        let mut listed = HashSet::with_capacity(jobs.len());
        for info in &jobs {
            listed.insert(info.id);
            match self.registry.installed(info.id) {
                Some(previous) if info.installed > previous => {
                    debug!(job_id = info.id, "job registration updated");
                    self.registry.set_installed(info.id, info.installed);
                    self.attach_schedule(info.id, info);
                }
                Some(_) => {}
                None => match self.initialize_job(info.id).await {
                    Ok(Some(_)) => info!(job_id = info.id, "new job discovered"),
                    Ok(None) => warn!(job_id = info.id, "job vanished before initialization"),
                    Err(e) => {
                        warn!(job_id = info.id, error = %e, "job initialization failed")
                    }
                },
            }
        }

        for id in self.registry.job_ids() {
            if !listed.contains(&id) {
                info!(job_id = id, "job removed from store");
                self.registry.remove(id);
            }
        }
    }

    // ── Deadline sweeps ──────────────────────────────────────────────

    /// Fire every elapsed deadline exactly once: MISSED for jobs that
    /// never started within grace, TIMEOUT for runs past their limit.
    ///
    /// Both warnings round-trip through the store and take effect on the
    /// registry when they come back as events.
    async fn sweep_deadlines(&mut self, now: DateTime<Utc>) {
        for id in self.registry.take_due_miss_deadlines(now) {
            warn!(job_id = id, "job missed its scheduled start");
            self.write_warning(id, StatusCode::MISSED).await;
        }
        for id in self.registry.take_due_run_deadlines(now) {
            warn!(job_id = id, "job run timed out");
            self.write_warning(id, StatusCode::TIMEOUT).await;
        }
    }

    /// Best-effort warning write; failures are logged and dropped.
    async fn write_warning(&self, id: JobId, status: StatusCode) {
        if let Err(e) = self.store.log_warning(id, status).await {
            warn!(job_id = id, status = %status, error = %e, "warning write failed");
        }
    }

    fn publish_snapshot(&self) {
        let snapshot = Arc::new(StatusSnapshot::capture(&self.registry, self.watermarks));
        self.snapshot_tx.send_replace(Some(snapshot));
    }
}

fn truncate_minute(t: DateTime<Utc>) -> DateTime<Utc> {
    t.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(t)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn truncate_minute_drops_seconds() {
        let t = Utc.with_ymd_and_hms(2024, 3, 5, 9, 41, 37).unwrap();
        assert_eq!(
            truncate_minute(t),
            Utc.with_ymd_and_hms(2024, 3, 5, 9, 41, 0).unwrap()
        );
    }
}
