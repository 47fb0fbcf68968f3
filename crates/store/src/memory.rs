//! In-memory [`JobStore`] with a producer-side API for embedded use.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use vigil_core::{EventKind, JobEvent, JobId, JobInfo, StatusCode, Watermarks};

use crate::error::StoreError;
use crate::traits::JobStore;

/// Job rows plus the three append-only event lanes.
#[derive(Default)]
struct Lanes {
    jobs: HashMap<JobId, JobInfo>,
    start: Vec<JobEvent>,
    warn: Vec<JobEvent>,
    finish: Vec<JobEvent>,
}

/// Mutex-guarded in-memory store.
///
/// Lane ids start at 1 and increment per lane, so watermark filtering
/// behaves exactly like a durable store with per-table sequences.
pub struct MemoryStore {
    inner: Mutex<Lanes>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Lanes::default()),
        }
    }

    /// Insert or update a registration; sets `installed` and clears any
    /// deletion marker.
    pub fn add_job(
        &self,
        id: JobId,
        time: Option<&str>,
        timezone: Option<&str>,
        installed: DateTime<Utc>,
    ) {
        let mut inner = self.inner.lock().unwrap();
        inner.jobs.insert(
            id,
            JobInfo {
                id,
                installed,
                deleted: None,
                time: time.map(str::to_string),
                timezone: timezone.map(str::to_string),
            },
        );
    }

    /// Mark a registration deleted; its events remain readable.
    pub fn remove_job(&self, id: JobId, at: DateTime<Utc>) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(job) = inner.jobs.get_mut(&id) {
            job.deleted = Some(at);
        }
    }

    /// Record a start event; returns its lane id.
    pub fn log_start(&self, id: JobId, at: DateTime<Utc>) -> i64 {
        let mut inner = self.inner.lock().unwrap();
        push(&mut inner.start, id, EventKind::Start, None, at)
    }

    /// Record a finish event with its outcome; returns its lane id.
    pub fn log_finish(&self, id: JobId, status: StatusCode, at: DateTime<Utc>) -> i64 {
        let mut inner = self.inner.lock().unwrap();
        push(&mut inner.finish, id, EventKind::Finish, Some(status), at)
    }

    /// Record a warning event at an explicit instant; returns its lane id.
    pub fn log_warning_at(&self, id: JobId, status: StatusCode, at: DateTime<Utc>) -> i64 {
        let mut inner = self.inner.lock().unwrap();
        push(&mut inner.warn, id, EventKind::Warn, Some(status), at)
    }

    /// Warning codes recorded so far for one job, in insertion order.
    pub fn warnings_for(&self, id: JobId) -> Vec<StatusCode> {
        let inner = self.inner.lock().unwrap();
        inner
            .warn
            .iter()
            .filter(|e| e.job_id == id)
            .filter_map(|e| e.status)
            .collect()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn push(
    lane: &mut Vec<JobEvent>,
    job_id: JobId,
    kind: EventKind,
    status: Option<StatusCode>,
    at: DateTime<Utc>,
) -> i64 {
    let id = lane.len() as i64 + 1;
    lane.push(JobEvent {
        id,
        job_id,
        kind,
        status,
        datetime: at,
    });
    id
}

/// Tie-break ordering of the lanes: start < warn < finish.
fn lane_rank(kind: EventKind) -> u8 {
    match kind {
        EventKind::Start => 1,
        EventKind::Warn => 2,
        EventKind::Finish => 3,
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn get_jobs(&self) -> Result<Vec<JobInfo>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut jobs: Vec<JobInfo> = inner
            .jobs
            .values()
            .filter(|j| j.is_live())
            .cloned()
            .collect();
        jobs.sort_by_key(|j| j.id);
        Ok(jobs)
    }

    async fn get_job_info(&self, id: JobId) -> Result<Option<JobInfo>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.jobs.get(&id).cloned())
    }

    async fn get_job_events(
        &self,
        id: JobId,
        limit: usize,
    ) -> Result<Vec<JobEvent>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut events: Vec<JobEvent> = inner
            .start
            .iter()
            .chain(inner.warn.iter())
            .chain(inner.finish.iter())
            .filter(|e| e.job_id == id)
            .cloned()
            .collect();
        events.sort_by(|a, b| {
            b.datetime
                .cmp(&a.datetime)
                .then_with(|| lane_rank(b.kind).cmp(&lane_rank(a.kind)))
                .then_with(|| b.id.cmp(&a.id))
        });
        events.truncate(limit);
        Ok(events)
    }

    async fn get_events_since(&self, since: Watermarks) -> Result<Vec<JobEvent>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut events: Vec<JobEvent> = inner
            .start
            .iter()
            .filter(|e| e.id > since.start)
            .chain(inner.warn.iter().filter(|e| e.id > since.warn))
            .chain(inner.finish.iter().filter(|e| e.id > since.finish))
            .cloned()
            .collect();
        events.sort_by(|a, b| {
            a.datetime
                .cmp(&b.datetime)
                .then_with(|| lane_rank(a.kind).cmp(&lane_rank(b.kind)))
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(events)
    }

    async fn log_warning(&self, id: JobId, status: StatusCode) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        push(&mut inner.warn, id, EventKind::Warn, Some(status), Utc::now());
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 5, h, m, s).unwrap()
    }

    #[tokio::test]
    async fn job_events_newest_first_with_lane_tiebreak() {
        let store = MemoryStore::new();
        store.add_job(1, None, None, at(8, 0, 0));
        store.log_start(1, at(9, 0, 0));
        store.log_finish(1, StatusCode::SUCCESS, at(9, 5, 0));
        // A start and a finish at the same instant: the finish sorts first.
        store.log_start(1, at(10, 0, 0));
        store.log_finish(1, StatusCode::FAIL, at(10, 0, 0));

        let events = store.get_job_events(1, 10).await.unwrap();
        let kinds: Vec<EventKind> = events.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                EventKind::Finish,
                EventKind::Start,
                EventKind::Finish,
                EventKind::Start
            ]
        );
        assert_eq!(events[0].status, Some(StatusCode::FAIL));
    }

    #[tokio::test]
    async fn job_events_respects_limit() {
        let store = MemoryStore::new();
        for i in 0..5 {
            store.log_start(1, at(9, i, 0));
        }
        let events = store.get_job_events(1, 2).await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].datetime, at(9, 4, 0));
    }

    #[tokio::test]
    async fn job_events_excludes_other_jobs() {
        let store = MemoryStore::new();
        store.log_start(1, at(9, 0, 0));
        store.log_start(2, at(9, 1, 0));
        let events = store.get_job_events(1, 10).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].job_id, 1);
    }

    #[tokio::test]
    async fn events_since_filters_each_lane_independently() {
        let store = MemoryStore::new();
        let first_start = store.log_start(1, at(9, 0, 0));
        store.log_finish(1, StatusCode::SUCCESS, at(9, 1, 0));
        store.log_start(1, at(10, 0, 0));

        let since = Watermarks {
            start: first_start,
            warn: 0,
            finish: 0,
        };
        let events = store.get_events_since(since).await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, EventKind::Finish);
        assert_eq!(events[1].kind, EventKind::Start);
        assert_eq!(events[1].datetime, at(10, 0, 0));
    }

    #[tokio::test]
    async fn events_since_is_oldest_first() {
        let store = MemoryStore::new();
        store.log_finish(1, StatusCode::FAIL, at(11, 0, 0));
        store.log_start(1, at(9, 0, 0));

        let events = store.get_events_since(Watermarks::default()).await.unwrap();
        assert_eq!(events[0].datetime, at(9, 0, 0));
        assert_eq!(events[1].datetime, at(11, 0, 0));
    }

    #[tokio::test]
    async fn removed_job_hidden_from_listing_but_row_remains() {
        let store = MemoryStore::new();
        store.add_job(1, Some("0 * * * *"), None, at(8, 0, 0));
        store.add_job(2, None, None, at(8, 0, 0));
        store.remove_job(1, at(9, 0, 0));

        let listed = store.get_jobs().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, 2);

        let row = store.get_job_info(1).await.unwrap().unwrap();
        assert_eq!(row.deleted, Some(at(9, 0, 0)));
    }

    #[tokio::test]
    async fn re_adding_a_job_revives_and_bumps_installed() {
        let store = MemoryStore::new();
        store.add_job(1, Some("0 * * * *"), None, at(8, 0, 0));
        store.remove_job(1, at(9, 0, 0));
        store.add_job(1, Some("30 * * * *"), Some("Asia/Tokyo"), at(10, 0, 0));

        let row = store.get_job_info(1).await.unwrap().unwrap();
        assert!(row.is_live());
        assert_eq!(row.installed, at(10, 0, 0));
        assert_eq!(row.time.as_deref(), Some("30 * * * *"));
    }

    #[tokio::test]
    async fn warnings_land_in_the_warn_lane() {
        let store = MemoryStore::new();
        store.log_warning(1, StatusCode::MISSED).await.unwrap();
        store.log_warning_at(1, StatusCode::TIMEOUT, at(9, 0, 0));

        assert_eq!(
            store.warnings_for(1),
            vec![StatusCode::MISSED, StatusCode::TIMEOUT]
        );
        let events = store.get_events_since(Watermarks::default()).await.unwrap();
        assert!(events.iter().all(|e| e.kind == EventKind::Warn));
    }
}
