//! Drives one bulk job invocation from trigger to status refresh.
//!
//! A runner owns a single progress slot. [`JobRunner::start`] claims the slot
//! (rejecting a second trigger while one is streaming), spawns the read loop
//! and hands back a [`JobHandle`]. Dropping the handle cancels the job: the
//! read loop checks the token at every suspension point and applies nothing
//! after it fires.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::api::BulkJobApi;
use crate::config::AppConfig;
use crate::core::decoder::decode_frames;
use crate::core::models::{BulkResource, BulkUpdateStatus, ProgressFrame};
use crate::core::notifications::{JobEvent, NotificationChannel};
use crate::core::progress::ProgressTracker;
use crate::core::reducer::{Applied, ProgressState};
use crate::core::status::StatusCache;
use crate::error::JobError;
use crate::logging::LogThrottle;

const PROGRESS_LOG_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy)]
pub struct RunnerSettings {
    /// Streams open longer than this fail with [`JobError::Timeout`]
    pub max_stream_duration: Duration,
    /// Delay between the terminal frame and the status refresh
    pub refresh_grace: Duration,
}

impl RunnerSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            max_stream_duration: config.max_stream_duration(),
            refresh_grace: config.refresh_grace(),
        }
    }
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// How a run ended.
#[derive(Debug)]
pub enum JobOutcome {
    /// The terminal frame arrived. `status` is the post-job refresh, if it
    /// succeeded and the run was not cancelled during the grace period.
    Completed {
        last: ProgressFrame,
        status: Option<BulkUpdateStatus>,
    },
    /// The stream closed before a terminal frame.
    Incomplete { last: Option<ProgressFrame> },
    Failed {
        error: JobError,
        last: Option<ProgressFrame>,
    },
    Cancelled,
}

#[derive(Clone)]
pub struct JobRunner {
    api: Arc<dyn BulkJobApi>,
    tracker: ProgressTracker,
    status: StatusCache,
    settings: RunnerSettings,
    notifier: Option<Arc<dyn NotificationChannel>>,
}

impl JobRunner {
    pub fn new(api: Arc<dyn BulkJobApi>, status: StatusCache, settings: RunnerSettings) -> Self {
        Self {
            api,
            tracker: ProgressTracker::new(),
            status,
            settings,
            notifier: None,
        }
    }

    pub fn with_notifier(mut self, notifier: Option<Arc<dyn NotificationChannel>>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn tracker(&self) -> &ProgressTracker {
        &self.tracker
    }

    pub fn status(&self) -> &StatusCache {
        &self.status
    }

    /// Cold-start or manual refresh of the aggregate status.
    pub async fn refresh_status(&self) -> Result<BulkUpdateStatus, JobError> {
        self.status.refresh(self.api.as_ref()).await
    }

    pub async fn start(&self, resource: BulkResource) -> Result<JobHandle, JobError> {
        self.start_observed(resource, None).await
    }

    /// Start a job; `observer` receives the state after every applied frame,
    /// in wire order.
    pub async fn start_observed(
        &self,
        resource: BulkResource,
        observer: Option<mpsc::Sender<ProgressState>>,
    ) -> Result<JobHandle, JobError> {
        let run_id = Uuid::now_v7();
        self.tracker.try_begin(run_id).await?;

        let cancel = CancellationToken::new();
        let run = Run {
            run_id,
            resource,
            runner: self.clone(),
            cancel: cancel.clone(),
            observer,
        };

        let span = info_span!("bulk_job", run_id = %run_id, resource = %resource);
        let task = tokio::spawn(run.drive().instrument(span));

        Ok(JobHandle {
            run_id,
            cancel: cancel.clone(),
            task,
            _guard: cancel.drop_guard(),
        })
    }
}

/// Scoped ownership of a running job. Dropping it cancels the job.
pub struct JobHandle {
    run_id: Uuid,
    cancel: CancellationToken,
    task: JoinHandle<JobOutcome>,
    _guard: DropGuard,
}

impl JobHandle {
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the run to end, including the post-job status refresh.
    pub async fn wait(self) -> JobOutcome {
        let JobHandle { task, _guard, .. } = self;
        match task.await {
            Ok(outcome) => outcome,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(_) => JobOutcome::Cancelled,
        }
    }
}

struct Run {
    run_id: Uuid,
    resource: BulkResource,
    runner: JobRunner,
    cancel: CancellationToken,
    observer: Option<mpsc::Sender<ProgressState>>,
}

impl Run {
    async fn drive(self) -> JobOutcome {
        let started = Instant::now();
        let settings = self.runner.settings;
        // Covers the start request too: a server that never sends headers
        // must not hold the slot.
        let deadline = sleep(settings.max_stream_duration);
        tokio::pin!(deadline);

        let bytes = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return self.cancelled().await,
            _ = &mut deadline => {
                return self.failed(JobError::Timeout(settings.max_stream_duration)).await;
            }
            result = self.runner.api.start_bulk_job(self.resource) => result,
        };
        let bytes = match bytes {
            Ok(bytes) => bytes,
            Err(e) => return self.failed(e).await,
        };
        self.notify(JobEvent::Started {
            run_id: self.run_id.to_string(),
            resource: self.resource,
        });

        let mut frames = Box::pin(decode_frames(bytes));
        let throttle = LogThrottle::new(PROGRESS_LOG_INTERVAL);

        let last = loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return self.cancelled().await,
                _ = &mut deadline => {
                    return self.failed(JobError::Timeout(settings.max_stream_duration)).await;
                }
                next = frames.next() => next,
            };

            let frame = match next {
                Some(Ok(frame)) => frame,
                Some(Err(e)) => return self.failed(e).await,
                None => return self.incomplete().await,
            };

            if frame.is_final || throttle.should_log() {
                debug!(
                    stage = %frame.stage,
                    current = frame.current,
                    total = frame.total,
                    percentage = frame.percentage,
                    "Progress"
                );
            }

            let applied = self
                .runner
                .tracker
                .apply(self.run_id, frame.clone(), &self.cancel)
                .await;
            match applied {
                Applied::Updated => self.observe().await,
                Applied::Terminal => break frame,
                Applied::Ignored => return self.cancelled().await,
            }
        };
        // Nothing after the terminal frame is read; dropping the body closes it.
        drop(frames);
        self.observe().await;

        let duration_secs = started.elapsed().as_secs();
        info!(
            processed = last.processed.len(),
            errors = last.errors.len(),
            duration_secs,
            "Bulk job complete"
        );
        self.notify(JobEvent::Completed {
            run_id: self.run_id.to_string(),
            resource: self.resource,
            processed: last.processed.len(),
            succeeded: last.succeeded(),
            errors: last.errors.len(),
            duration_secs,
        });

        // Give the server time to persist before reading aggregate counts.
        let status = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            _ = sleep(settings.refresh_grace) => {
                self.runner.refresh_status().await.ok()
            }
        };

        JobOutcome::Completed { last, status }
    }

    async fn observe(&self) {
        let Some(observer) = &self.observer else {
            return;
        };
        let state = self.runner.tracker.state().await;
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {}
            _ = observer.send(state) => {}
        }
    }

    async fn failed(&self, error: JobError) -> JobOutcome {
        warn!(error = %error, "Bulk job failed");
        self.runner.tracker.fail(self.run_id, error.to_string()).await;
        self.observe().await;
        self.notify(JobEvent::Failed {
            run_id: self.run_id.to_string(),
            resource: self.resource,
            error: error.to_string(),
        });
        JobOutcome::Failed {
            error,
            last: self.runner.tracker.state().await.latest,
        }
    }

    async fn incomplete(&self) -> JobOutcome {
        warn!("Progress stream closed without a final frame");
        self.runner.tracker.close(self.run_id).await;
        self.observe().await;
        JobOutcome::Incomplete {
            last: self.runner.tracker.state().await.latest,
        }
    }

    /// Release the slot without touching the displayed progress.
    async fn cancelled(&self) -> JobOutcome {
        info!("Bulk job cancelled");
        self.runner.tracker.cancel(self.run_id).await;
        JobOutcome::Cancelled
    }

    fn notify(&self, event: JobEvent) {
        let Some(notifier) = self.runner.notifier.clone() else {
            return;
        };
        tokio::spawn(async move {
            if let Err(e) = notifier.notify(event).await {
                warn!(error = %e, "Failed to send notification");
            }
        });
    }
}
