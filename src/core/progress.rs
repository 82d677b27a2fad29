//! In-memory progress slot for the job driven by one runner.
//!
//! Only the latest frame is kept. The slot is updated by the runner's read
//! loop and read by whatever displays it (CLI printer, TUI poller).

use std::sync::Arc;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::models::ProgressFrame;
use super::reducer::{Applied, ProgressState};
use crate::error::JobError;

#[derive(Debug, Default)]
struct TrackedJob {
    /// Identifier of the current (or last) run
    pub run_id: Option<Uuid>,
    pub state: ProgressState,
}

/// Thread-safe holder of the latest progress state.
#[derive(Clone, Default)]
pub struct ProgressTracker {
    inner: Arc<RwLock<TrackedJob>>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the slot for a new run. Fails while another run is streaming.
    pub async fn try_begin(&self, run_id: Uuid) -> Result<(), JobError> {
        let mut job = self.inner.write().await;
        if !job.state.phase.can_trigger() {
            return Err(JobError::AlreadyRunning);
        }
        job.run_id = Some(run_id);
        job.state.begin();
        Ok(())
    }

    /// Apply a frame if `run_id` still owns the slot and `cancel` has not
    /// fired. The token is checked under the write lock, so nothing lands
    /// after a teardown that completed before this call took the lock.
    pub async fn apply(
        &self,
        run_id: Uuid,
        frame: ProgressFrame,
        cancel: &CancellationToken,
    ) -> Applied {
        let mut job = self.inner.write().await;
        if job.run_id != Some(run_id) || cancel.is_cancelled() {
            return Applied::Ignored;
        }
        job.state.apply(frame)
    }

    pub async fn fail(&self, run_id: Uuid, reason: impl Into<String>) {
        self.update(run_id, |state| state.fail(reason)).await;
    }

    pub async fn close(&self, run_id: Uuid) {
        self.update(run_id, ProgressState::close).await;
    }

    pub async fn cancel(&self, run_id: Uuid) {
        self.update(run_id, ProgressState::cancel).await;
    }

    async fn update(&self, run_id: Uuid, f: impl FnOnce(&mut ProgressState)) {
        let mut job = self.inner.write().await;
        if job.run_id == Some(run_id) {
            f(&mut job.state);
        }
    }

    pub async fn state(&self) -> ProgressState {
        self.inner.read().await.state.clone()
    }
}
