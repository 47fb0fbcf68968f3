//! The [`JobStore`] trait, the monitor's only view of durable state.

use async_trait::async_trait;
use vigil_core::{JobEvent, JobId, JobInfo, StatusCode, Watermarks};

use crate::error::StoreError;

/// Read and warning-write access to the job store.
///
/// Implementations back this with whatever durable engine they like; the
/// monitor relies only on the ordering contracts documented per method.
/// Errors are surfaced to the caller, never retried internally.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// All live (non-deleted) job registrations.
    async fn get_jobs(&self) -> Result<Vec<JobInfo>, StoreError>;

    /// A single registration by id, including deleted rows.
    ///
    /// `Ok(None)` means the id is unknown. Callers treat a missing or
    /// deleted row as a vanished job.
    async fn get_job_info(&self, id: JobId) -> Result<Option<JobInfo>, StoreError>;

    /// The most recent events of one job, newest first.
    ///
    /// Ordered by datetime descending with finish before warn before start
    /// on ties, capped at `limit`.
    async fn get_job_events(&self, id: JobId, limit: usize)
        -> Result<Vec<JobEvent>, StoreError>;

    /// Every event whose lane id is strictly above the corresponding
    /// watermark, across all jobs, oldest first.
    ///
    /// Ordered by datetime ascending with start before warn before finish
    /// on ties.
    async fn get_events_since(&self, since: Watermarks) -> Result<Vec<JobEvent>, StoreError>;

    /// Append a warning event for a job, stamped with the store's clock.
    async fn log_warning(&self, id: JobId, status: StatusCode) -> Result<(), StoreError>;
}
