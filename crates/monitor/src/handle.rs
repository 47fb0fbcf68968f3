//! Reader-facing handle: bootstrap-gated status reads and long-polling.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::{watch, Notify};

use vigil_core::Watermarks;

use crate::error::MonitorError;
use crate::snapshot::StatusSnapshot;

/// Cheap-to-clone reader handle onto a running [`JobMonitor`](crate::JobMonitor).
///
/// Clone one handle per reader task; every method may be called from any
/// number of tasks concurrently.
#[derive(Clone)]
pub struct MonitorHandle {
    pub(crate) snapshot_rx: watch::Receiver<Option<Arc<StatusSnapshot>>>,
    pub(crate) new_event: Arc<Notify>,
    pub(crate) long_poll_timeout: Duration,
    pub(crate) long_poll_jitter: Duration,
}

impl MonitorHandle {
    /// The latest status snapshot, waiting for bootstrap to complete first.
    ///
    /// Callers never observe the partially replayed pre-bootstrap state.
    /// Fails only when the monitor task is gone.
    pub async fn job_status(&mut self) -> Result<Arc<StatusSnapshot>, MonitorError> {
        let guard = self
            .snapshot_rx
            .wait_for(Option::is_some)
            .await
            .map_err(|_| MonitorError::Stopped)?;
        match guard.as_ref() {
            Some(snapshot) => Ok(Arc::clone(snapshot)),
            None => Err(MonitorError::Stopped),
        }
    }

    /// Block until some lane advances past `seen`, the wait times out, or
    /// the monitor stops; returns the latest snapshot in every case.
    ///
    /// The effective wait is `timeout` (defaulting to the configured
    /// long-poll timeout) plus a uniformly random stagger of up to the
    /// configured jitter, so simultaneous pollers do not re-arrive in
    /// lockstep.
    pub async fn wait_for_event_since(
        &mut self,
        seen: Watermarks,
        timeout: Option<Duration>,
    ) -> Result<Arc<StatusSnapshot>, MonitorError> {
        // The registered future must borrow a local handle on the
        // notifier, not `self`, which the status reads below re-borrow.
        let new_event = Arc::clone(&self.new_event);
        let notified = new_event.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        // Read the cursor only after registering: the monitor publishes
        // before notifying, so any notification a not-yet-registered
        // waiter missed is already reflected in this snapshot.
        let snapshot = self.job_status().await?;
        if snapshot.watermarks.any_ahead_of(&seen) {
            return Ok(snapshot);
        }

        let wait = timeout.unwrap_or(self.long_poll_timeout) + self.jitter();
        let _ = tokio::time::timeout(wait, notified).await;
        self.job_status().await
    }

    fn jitter(&self) -> Duration {
        if self.long_poll_jitter.is_zero() {
            return Duration::ZERO;
        }
        rand::thread_rng().gen_range(Duration::ZERO..=self.long_poll_jitter)
    }
}
