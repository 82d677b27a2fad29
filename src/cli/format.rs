//! Text formatting shared by the line printer and the TUI.

use chrono::{DateTime, Utc};

use crate::core::reducer::JobPhase;
use crate::core::runner::JobOutcome;

pub fn progress_bar(percentage: f64, width: usize) -> String {
    let percentage = percentage.clamp(0.0, 100.0);
    let filled = ((percentage / 100.0) * width as f64).round() as usize;
    let empty = width - filled.min(width);
    format!("[{}{}]", "█".repeat(filled.min(width)), "░".repeat(empty))
}

/// "just now", "42s ago", "5m ago", "2h ago"
pub fn format_age(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - at).num_seconds().max(0);
    if secs < 5 {
        "just now".to_string()
    } else if secs < 60 {
        format!("{}s ago", secs)
    } else if secs < 3600 {
        format!("{}m ago", secs / 60)
    } else {
        format!("{}h ago", secs / 3600)
    }
}

pub fn phase_label(phase: &JobPhase) -> &'static str {
    match phase {
        JobPhase::Idle => "Idle",
        JobPhase::Running => "Running",
        JobPhase::Completed => "Completed",
        JobPhase::Incomplete => "Stream closed early",
        JobPhase::Failed { .. } => "Failed",
        JobPhase::Cancelled => "Cancelled",
    }
}

pub fn outcome_summary(outcome: &JobOutcome) -> String {
    match outcome {
        JobOutcome::Completed { last, status } => {
            let mut summary = format!(
                "Completed: {}/{} processed, {} error(s)",
                last.current,
                last.total,
                last.errors.len()
            );
            if let Some(status) = status {
                summary.push_str(&format!(
                    "; {} workspace(s) still need an update",
                    status.workspaces_needing_update
                ));
            }
            summary
        }
        JobOutcome::Incomplete { last } => match last {
            Some(last) => format!(
                "Stream closed before completion at {}/{}",
                last.current, last.total
            ),
            None => "Stream closed before any progress was reported".to_string(),
        },
        JobOutcome::Failed { error, last } => match last {
            Some(last) if !last.errors.is_empty() => {
                format!("Failed: {} ({} error(s) reported)", error, last.errors.len())
            }
            _ => format!("Failed: {}", error),
        },
        JobOutcome::Cancelled => "Cancelled".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::ProgressFrame;
    use crate::error::JobError;
    use chrono::Duration;

    #[test]
    fn progress_bar_clamps_and_fills() {
        assert_eq!(progress_bar(0.0, 4), "[░░░░]");
        assert_eq!(progress_bar(50.0, 4), "[██░░]");
        assert_eq!(progress_bar(100.0, 4), "[████]");
        assert_eq!(progress_bar(250.0, 4), "[████]");
        assert_eq!(progress_bar(-3.0, 4), "[░░░░]");
    }

    #[test]
    fn age_buckets() {
        let now = Utc::now();
        assert_eq!(format_age(now, now), "just now");
        assert_eq!(format_age(now - Duration::seconds(42), now), "42s ago");
        assert_eq!(format_age(now - Duration::minutes(5), now), "5m ago");
        assert_eq!(format_age(now - Duration::hours(2), now), "2h ago");
    }

    #[test]
    fn failure_summary_mentions_reported_errors() {
        let outcome = JobOutcome::Failed {
            error: JobError::Transport("connection reset".into()),
            last: Some(ProgressFrame {
                errors: vec!["img 5 failed".into()],
                ..Default::default()
            }),
        };
        assert_eq!(
            outcome_summary(&outcome),
            "Failed: transport error: connection reset (1 error(s) reported)"
        );

        let start = JobOutcome::Failed {
            error: JobError::JobStart {
                status: 500,
                message: None,
            },
            last: None,
        };
        assert_eq!(
            outcome_summary(&start),
            "Failed: bulk job failed to start (HTTP 500)"
        );
    }
}
