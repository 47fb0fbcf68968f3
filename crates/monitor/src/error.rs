use thiserror::Error;

use vigil_store::StoreError;

/// Errors surfaced by the monitor and its reader handle.
#[derive(Error, Debug)]
pub enum MonitorError {
    /// The store could not be read while reconstructing initial status.
    /// Steady-state read failures are logged and retried instead.
    #[error("store unavailable during bootstrap: {0}")]
    Bootstrap(#[from] StoreError),

    /// The monitor task is gone; no further snapshots will be published.
    #[error("monitor stopped")]
    Stopped,
}
