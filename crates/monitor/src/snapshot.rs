//! Immutable point-in-time view of the whole registry.

use std::collections::HashMap;

use serde::Serialize;

use vigil_core::{JobId, Watermarks};

use crate::registry::{JobRegistry, JobStatus};

/// A frozen copy of every job's status plus the watermarks it reflects.
///
/// Snapshots are shared as `Arc<StatusSnapshot>`; readers never see the
/// registry the monitor task is mutating.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub watermarks: Watermarks,
    pub jobs: HashMap<JobId, JobStatus>,
    /// Jobs whose current status classifies as a warning.
    pub num_warning: usize,
    /// Jobs whose current status classifies as an error.
    pub num_error: usize,
}

impl StatusSnapshot {
    /// Freeze the registry's current state, recounting the aggregates.
    pub fn capture(registry: &JobRegistry, watermarks: Watermarks) -> Self {
        let jobs = registry.jobs().clone();
        let mut num_warning = 0;
        let mut num_error = 0;
        for job in jobs.values() {
            match job.status {
                Some(status) if status.is_warning() => num_warning += 1,
                Some(status) if status.is_error() => num_error += 1,
                _ => {}
            }
        }
        Self {
            watermarks,
            jobs,
            num_warning,
            num_error,
        }
    }

    /// Status of a single job, if known.
    pub fn job(&self, id: JobId) -> Option<&JobStatus> {
        self.jobs.get(&id)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use vigil_core::{EventKind, JobEvent, JobInfo, StatusCode};

    use crate::registry::JobConfig;

    use super::*;

    fn finish(job_id: JobId, status: StatusCode) -> JobEvent {
        JobEvent {
            id: 1,
            job_id,
            kind: EventKind::Finish,
            status: Some(status),
            datetime: Utc.with_ymd_and_hms(2024, 3, 5, 9, 0, 0).unwrap(),
        }
    }

    fn registry_with_jobs(ids: &[JobId]) -> JobRegistry {
        let mut registry = JobRegistry::new();
        for &id in ids {
            let info = JobInfo {
                id,
                installed: Utc.with_ymd_and_hms(2024, 3, 5, 8, 0, 0).unwrap(),
                deleted: None,
                time: None,
                timezone: None,
            };
            registry.insert_job(&info, JobConfig::default());
        }
        registry
    }

    #[test]
    fn capture_counts_warning_and_error_jobs() {
        let mut registry = registry_with_jobs(&[1, 2, 3, 4]);
        registry.apply_event(1, &finish(1, StatusCode::SUCCESS));
        registry.apply_event(2, &finish(2, StatusCode::FAIL));
        registry.apply_event(3, &finish(3, StatusCode::WARNING));
        // Job 4 has no status yet and counts as neither.

        let snapshot = StatusSnapshot::capture(&registry, Watermarks::default());
        assert_eq!(snapshot.jobs.len(), 4);
        assert_eq!(snapshot.num_warning, 1);
        assert_eq!(snapshot.num_error, 1);
    }

    #[test]
    fn capture_carries_the_given_watermarks() {
        let registry = registry_with_jobs(&[]);
        let marks = Watermarks {
            start: 3,
            warn: 1,
            finish: 2,
        };
        let snapshot = StatusSnapshot::capture(&registry, marks);
        assert_eq!(snapshot.watermarks, marks);
    }

    #[test]
    fn snapshot_serializes_for_serving_layers() {
        let mut registry = registry_with_jobs(&[1]);
        registry.apply_event(1, &finish(1, StatusCode::SUCCESS));
        registry.recompute_reliability(1);

        let snapshot = StatusSnapshot::capture(&registry, Watermarks::default());
        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(value["num_warning"], 0);
        assert_eq!(value["jobs"]["1"]["status"], 0);
        assert_eq!(value["jobs"]["1"]["reliability"], 100);
    }
}
