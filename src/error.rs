//! Error taxonomy for bulk job operations.

use std::time::Duration;

use thiserror::Error;

/// Errors raised while starting, streaming or refreshing a bulk job.
#[derive(Debug, Error)]
pub enum JobError {
    /// The initiating request returned a non-2xx status.
    #[error("bulk job failed to start (HTTP {status}){}", fmt_message(.message))]
    JobStart { status: u16, message: Option<String> },

    /// Network failure while starting the job or reading its stream.
    #[error("transport error: {0}")]
    Transport(String),

    /// A single `data:` line did not hold a valid progress frame.
    #[error("malformed progress frame {line:?}: {source}")]
    FrameParse {
        line: String,
        #[source]
        source: serde_json::Error,
    },

    /// The stream stayed open longer than the configured maximum.
    #[error("bulk job exceeded the maximum stream duration of {}s", .0.as_secs())]
    Timeout(Duration),

    /// The aggregate status could not be refreshed.
    #[error("status refresh failed: {0}")]
    StatusRefresh(String),

    /// A plain request/response call returned a non-2xx status.
    #[error("request failed (HTTP {status}){}", fmt_message(.message))]
    Request { status: u16, message: Option<String> },

    /// A response arrived but its body did not have the expected shape.
    #[error("unexpected response body: {0}")]
    Decode(String),

    /// A job is already streaming on this runner.
    #[error("a bulk job is already running")]
    AlreadyRunning,

    /// A path segment is not a lowercase slug.
    #[error("invalid path segment {0:?}: expected [a-z0-9-]+")]
    InvalidSlug(String),

    /// An authenticated call was made without a configured token.
    #[error("no bearer token configured")]
    MissingToken,
}

impl From<reqwest::Error> for JobError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            JobError::Decode(err.to_string())
        } else {
            JobError::Transport(err.to_string())
        }
    }
}

fn fmt_message(message: &Option<String>) -> String {
    match message {
        Some(m) => format!(": {}", m),
        None => String::new(),
    }
}
