//! Scheduled-job surveillance core.
//!
//! [`JobMonitor`] replays the durable event log into an in-memory registry,
//! watches for late starts, missed runs, and stalled executions, and
//! publishes immutable status snapshots that reader tasks consume through a
//! [`MonitorHandle`], including long-pollers that block until something new
//! arrives.

pub mod error;
pub mod handle;
pub mod monitor;
pub mod registry;
pub mod snapshot;

pub use error::MonitorError;
pub use handle::MonitorHandle;
pub use monitor::JobMonitor;
pub use registry::{JobConfig, JobRegistry, JobStatus};
pub use snapshot::StatusSnapshot;
