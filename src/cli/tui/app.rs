//! TUI application state and logic.

use crate::cli::format::outcome_summary;
use crate::core::models::BulkResource;
use crate::core::reducer::ProgressState;
use crate::core::runner::{JobHandle, JobRunner};
use crate::core::status::CachedStatus;

/// Snapshot of runner state taken on each poll.
#[derive(Debug, Default)]
pub struct AppData {
    pub status: Option<CachedStatus>,
    pub progress: ProgressState,
}

/// Current view being displayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum View {
    /// Status counts and the live progress of the current job.
    Dashboard,
    /// Errors accumulated by the current (or last) job.
    Errors { scroll: u16 },
    /// Per-unit results of the current (or last) job.
    Processed { selected: usize },
}

impl Default for View {
    fn default() -> Self {
        View::Dashboard
    }
}

/// Actions that can be triggered by user input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Quit,
    Up,
    Down,
    Start,
    Cancel,
    Refresh,
    Errors,
    Processed,
    Back,
}

/// Main TUI application state.
pub struct TuiApp {
    runner: JobRunner,
    job: Option<JobHandle>,
    pub resource: BulkResource,
    pub title: String,
    pub view: View,
    pub data: AppData,
    pub running: bool,
    pub error: Option<String>,
    pub notice: Option<String>,
}

impl TuiApp {
    pub fn new(runner: JobRunner, resource: BulkResource, title: String) -> Self {
        Self {
            runner,
            job: None,
            resource,
            title,
            view: View::default(),
            data: AppData::default(),
            running: true,
            error: None,
            notice: None,
        }
    }

    /// Cold-start status fetch.
    pub async fn init(&mut self) {
        self.refresh_status().await;
    }

    /// A completed job keeps its handle until the post-job status refresh
    /// is done; replacing it earlier would cancel that refresh.
    pub fn can_start(&self) -> bool {
        self.job.is_none() && self.data.progress.phase.can_trigger()
    }

    pub fn job_active(&self) -> bool {
        self.job.is_some()
    }

    pub async fn refresh_status(&mut self) {
        match self.runner.refresh_status().await {
            Ok(_) => self.error = None,
            // The cache keeps the previous value; only report it
            Err(e) => self.error = Some(e.to_string()),
        }
        self.data.status = self.runner.status().get().await;
    }

    /// Pull the latest progress and status; collect a finished job.
    pub async fn poll(&mut self) {
        if let Some(job) = self.job.take_if(|job| job.is_finished()) {
            let outcome = job.wait().await;
            self.notice = Some(outcome_summary(&outcome));
        }

        self.data.progress = self.runner.tracker().state().await;
        self.data.status = self.runner.status().get().await;
    }

    async fn start_job(&mut self) {
        if !self.can_start() {
            let message = if self.data.progress.phase.can_trigger() {
                "The previous job is still refreshing status"
            } else {
                "A bulk job is already running"
            };
            self.error = Some(message.to_string());
            return;
        }
        match self.runner.start(self.resource).await {
            Ok(handle) => {
                self.error = None;
                self.notice = Some(format!("Started {} ({})", self.resource, handle.run_id()));
                self.job = Some(handle);
                self.view = View::Dashboard;
            }
            Err(e) => self.error = Some(e.to_string()),
        }
        self.data.progress = self.runner.tracker().state().await;
    }

    fn cancel_job(&mut self) {
        if let Some(job) = &self.job {
            job.cancel();
        }
    }

    /// Tear down: cancels any in-flight job.
    pub fn shutdown(&mut self) {
        self.job.take();
    }

    /// Handle an action and update state accordingly.
    pub async fn handle_action(&mut self, action: Action) {
        match action {
            Action::Quit => self.running = false,
            Action::Start => self.start_job().await,
            Action::Cancel => self.cancel_job(),
            Action::Refresh => self.refresh_status().await,
            Action::Errors => self.view = View::Errors { scroll: 0 },
            Action::Processed => self.view = View::Processed { selected: 0 },
            Action::Back => self.view = View::Dashboard,
            Action::Up => self.navigate_up(),
            Action::Down => self.navigate_down(),
        }
    }

    fn processed_len(&self) -> usize {
        self.data
            .progress
            .latest
            .as_ref()
            .map(|f| f.processed.len())
            .unwrap_or(0)
    }

    fn navigate_up(&mut self) {
        match &self.view {
            View::Dashboard => {}
            View::Errors { scroll } => {
                self.view = View::Errors {
                    scroll: scroll.saturating_sub(1),
                };
            }
            View::Processed { selected } => {
                self.view = View::Processed {
                    selected: selected.saturating_sub(1),
                };
            }
        }
    }

    fn navigate_down(&mut self) {
        match &self.view {
            View::Dashboard => {}
            View::Errors { scroll } => {
                self.view = View::Errors {
                    scroll: scroll.saturating_add(1),
                };
            }
            View::Processed { selected } => {
                if *selected + 1 < self.processed_len() {
                    self.view = View::Processed {
                        selected: *selected + 1,
                    };
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::BulkJobApi;
    use crate::core::decoder::ByteStream;
    use crate::core::models::BulkUpdateStatus;
    use crate::core::reducer::JobPhase;
    use crate::core::runner::RunnerSettings;
    use crate::core::status::StatusCache;
    use crate::error::JobError;
    use async_trait::async_trait;
    use bytes::Bytes;
    use futures::{StreamExt, stream};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::time::sleep;

    /// Stream that never produces anything; status always fails.
    struct Silent;

    #[async_trait]
    impl BulkJobApi for Silent {
        async fn start_bulk_job(&self, _resource: BulkResource) -> Result<ByteStream, JobError> {
            Ok(stream::pending().boxed())
        }

        async fn fetch_status(&self) -> Result<BulkUpdateStatus, JobError> {
            Err(JobError::Request {
                status: 503,
                message: None,
            })
        }
    }

    fn app() -> TuiApp {
        let runner = JobRunner::new(Arc::new(Silent), StatusCache::new(), RunnerSettings::default());
        TuiApp::new(runner, BulkResource::AltTexts, "test".into())
    }

    #[tokio::test]
    async fn start_is_disabled_while_running_and_quit_cancels() {
        let mut app = app();

        app.handle_action(Action::Start).await;
        assert!(app.job_active());
        assert_eq!(app.data.progress.phase, JobPhase::Running);
        assert!(!app.can_start());

        app.handle_action(Action::Start).await;
        assert_eq!(app.error.as_deref(), Some("A bulk job is already running"));

        app.handle_action(Action::Cancel).await;
        for _ in 0..50 {
            app.poll().await;
            if !app.job_active() {
                break;
            }
            sleep(Duration::from_millis(5)).await;
        }
        assert!(!app.job_active());
        assert_eq!(app.data.progress.phase, JobPhase::Cancelled);
        assert_eq!(app.notice.as_deref(), Some("Cancelled"));
        assert!(app.can_start());
    }

    /// Finishes immediately with a final frame; counts status reads.
    #[derive(Default)]
    struct Finishing {
        refreshes: AtomicUsize,
    }

    #[async_trait]
    impl BulkJobApi for Finishing {
        async fn start_bulk_job(&self, _resource: BulkResource) -> Result<ByteStream, JobError> {
            let frame = Bytes::from_static(
                b"data: {\"final\":true,\"current\":1,\"total\":1,\"percentage\":100}\n",
            );
            Ok(stream::iter(vec![Ok(frame)]).boxed())
        }

        async fn fetch_status(&self) -> Result<BulkUpdateStatus, JobError> {
            self.refreshes.fetch_add(1, Ordering::SeqCst);
            Ok(BulkUpdateStatus::default())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn restart_waits_for_post_job_refresh() {
        let api = Arc::new(Finishing::default());
        let settings = RunnerSettings {
            max_stream_duration: Duration::from_secs(60),
            refresh_grace: Duration::from_secs(1),
        };
        let runner = JobRunner::new(api.clone(), StatusCache::new(), settings);
        let mut app = TuiApp::new(runner, BulkResource::AltTexts, "test".into());

        app.handle_action(Action::Start).await;
        while app.data.progress.phase != JobPhase::Completed {
            sleep(Duration::from_millis(10)).await;
            app.poll().await;
        }
        assert!(app.job_active());
        assert!(!app.can_start());

        // Inside the grace period
        sleep(Duration::from_millis(300)).await;
        app.handle_action(Action::Start).await;
        assert_eq!(
            app.error.as_deref(),
            Some("The previous job is still refreshing status")
        );

        sleep(Duration::from_secs(5)).await;
        app.poll().await;
        assert!(!app.job_active());
        assert_eq!(api.refreshes.load(Ordering::SeqCst), 1);
        assert!(app.notice.as_deref().unwrap().starts_with("Completed"));

        app.handle_action(Action::Start).await;
        assert!(app.job_active());
        sleep(Duration::from_secs(5)).await;
        app.poll().await;
        assert!(!app.job_active());
        assert_eq!(api.refreshes.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failed_refresh_reports_error_without_status() {
        let mut app = app();
        app.init().await;
        assert!(app.error.as_deref().unwrap().contains("503"));
        assert!(app.data.status.is_none());
    }

    #[tokio::test]
    async fn view_navigation() {
        let mut app = app();
        app.handle_action(Action::Errors).await;
        app.handle_action(Action::Down).await;
        app.handle_action(Action::Down).await;
        app.handle_action(Action::Up).await;
        assert_eq!(app.view, View::Errors { scroll: 1 });

        app.handle_action(Action::Processed).await;
        app.handle_action(Action::Down).await;
        assert_eq!(app.view, View::Processed { selected: 0 });

        app.handle_action(Action::Back).await;
        assert_eq!(app.view, View::Dashboard);
        app.handle_action(Action::Quit).await;
        assert!(!app.running);
    }
}
