//! Progress state reduction.
//!
//! Frames are full snapshots, so reducing is a wholesale replace of the
//! latest slot. The only state carried across frames is the job phase.

use serde::Serialize;
use tracing::warn;

use crate::core::models::ProgressFrame;

/// Lifecycle of one job invocation as seen by the client.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum JobPhase {
    #[default]
    Idle,
    Running,
    /// A frame with `final: true` was applied.
    Completed,
    /// The stream closed without a final frame.
    Incomplete,
    Failed { reason: String },
    /// The consumer cancelled or tore down the job.
    Cancelled,
}

impl JobPhase {
    /// Whether a new job may be triggered from this phase.
    pub fn can_trigger(&self) -> bool {
        !matches!(self, JobPhase::Running)
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobPhase::Idle | JobPhase::Running)
    }
}

/// Displayed progress for the job driven by one runner.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProgressState {
    pub phase: JobPhase,
    pub latest: Option<ProgressFrame>,
    pub frames_applied: u64,
}

/// What applying a frame did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// The frame replaced the latest slot.
    Updated,
    /// The frame was the terminal frame; the job is complete.
    Terminal,
    /// The job is no longer running; the frame was dropped.
    Ignored,
}

impl ProgressState {
    /// Reset for a fresh run. Previous progress is discarded.
    pub fn begin(&mut self) {
        *self = ProgressState {
            phase: JobPhase::Running,
            latest: None,
            frames_applied: 0,
        };
    }

    pub fn apply(&mut self, frame: ProgressFrame) -> Applied {
        if self.phase != JobPhase::Running {
            return Applied::Ignored;
        }

        if let Some(prev) = &self.latest {
            if frame.percentage < prev.percentage {
                warn!(
                    previous = prev.percentage,
                    current = frame.percentage,
                    "Progress percentage went backwards"
                );
            }
        }

        let terminal = frame.is_final;
        self.latest = Some(frame);
        self.frames_applied += 1;

        if terminal {
            self.phase = JobPhase::Completed;
            Applied::Terminal
        } else {
            Applied::Updated
        }
    }

    /// Mark the run failed. Frames already applied stay visible.
    pub fn fail(&mut self, reason: impl Into<String>) {
        if self.phase == JobPhase::Running {
            self.phase = JobPhase::Failed {
                reason: reason.into(),
            };
        }
    }

    /// The stream ended; if no final frame arrived the run is incomplete.
    pub fn close(&mut self) {
        if self.phase == JobPhase::Running {
            self.phase = JobPhase::Incomplete;
        }
    }

    pub fn cancel(&mut self) {
        if self.phase == JobPhase::Running {
            self.phase = JobPhase::Cancelled;
        }
    }

    /// Errors accumulated by the server so far.
    pub fn errors(&self) -> &[String] {
        self.latest.as_ref().map(|f| f.errors.as_slice()).unwrap_or(&[])
    }
}

/// Pure form of [`ProgressState::apply`].
pub fn reduce(mut state: ProgressState, frame: ProgressFrame) -> ProgressState {
    state.apply(frame);
    state
}

#[cfg(test)]
mod tests {
    use super::*;

    fn running() -> ProgressState {
        let mut state = ProgressState::default();
        state.begin();
        state
    }

    fn frame(current: u64, percentage: f64, errors: &[&str]) -> ProgressFrame {
        ProgressFrame {
            stage: format!("Processing workspace {} of 3", current),
            current,
            total: 3,
            percentage,
            message: format!("{}/3 done", current),
            errors: errors.iter().map(|e| e.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn last_frame_wins_without_merging() {
        let f1 = frame(1, 33.0, &["a", "b"]);
        let f2 = ProgressFrame {
            message: "unrelated".into(),
            ..frame(2, 66.0, &["c"])
        };
        let f3 = frame(3, 90.0, &[]);

        let state = reduce(reduce(reduce(running(), f1), f2), f3.clone());

        assert_eq!(state.latest, Some(f3));
        assert!(state.errors().is_empty());
        assert_eq!(state.frames_applied, 3);
        assert_eq!(state.phase, JobPhase::Running);
    }

    #[test]
    fn final_frame_completes_and_later_frames_are_ignored() {
        let mut state = running();
        let last = ProgressFrame {
            is_final: true,
            ..frame(3, 100.0, &["img 5 failed"])
        };

        assert_eq!(state.apply(frame(1, 33.0, &[])), Applied::Updated);
        assert_eq!(state.apply(last.clone()), Applied::Terminal);
        assert_eq!(state.apply(frame(2, 50.0, &[])), Applied::Ignored);

        assert_eq!(state.phase, JobPhase::Completed);
        assert_eq!(state.latest, Some(last));
        assert!(state.phase.can_trigger());
    }

    #[test]
    fn failure_keeps_partial_progress_and_allows_retrigger() {
        let mut state = running();
        state.apply(frame(2, 66.0, &["img 5 failed"]));
        state.fail("connection reset");

        assert_eq!(
            state.phase,
            JobPhase::Failed {
                reason: "connection reset".into()
            }
        );
        assert_eq!(state.errors(), ["img 5 failed".to_string()]);
        assert!(state.phase.can_trigger());

        state.begin();
        assert_eq!(state.phase, JobPhase::Running);
        assert!(state.latest.is_none());
    }

    #[test]
    fn close_without_final_is_incomplete() {
        let mut state = running();
        state.apply(frame(1, 33.0, &[]));
        state.close();
        assert_eq!(state.phase, JobPhase::Incomplete);
        assert!(state.phase.is_terminal());

        // Closing after completion leaves the phase alone
        let mut done = running();
        done.apply(ProgressFrame {
            is_final: true,
            ..Default::default()
        });
        done.close();
        assert_eq!(done.phase, JobPhase::Completed);
    }

    #[test]
    fn backwards_percentage_is_still_applied() {
        let mut state = running();
        state.apply(frame(2, 66.0, &[]));
        state.apply(frame(2, 60.0, &[]));
        assert_eq!(state.latest.unwrap().percentage, 60.0);
    }

    #[test]
    fn frames_before_begin_are_ignored() {
        let mut state = ProgressState::default();
        assert_eq!(state.apply(frame(1, 10.0, &[])), Applied::Ignored);
        assert!(state.phase.can_trigger());
        assert!(state.latest.is_none());
    }
}
