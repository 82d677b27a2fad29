//! Tracing setup for bulkctl.
//!
//! Console output is either human-readable or JSON. `RUST_LOG` overrides the
//! default filter. The TUI discards log output entirely so it cannot tear
//! the alternate screen.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::Level;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::config::AppConfig;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogSink {
    #[default]
    Stderr,
    Discard,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LogConfig {
    /// Emit JSON lines instead of pretty text
    pub json: bool,
    /// Default to DEBUG instead of INFO
    pub verbose: bool,
    pub sink: LogSink,
}

impl LogConfig {
    pub fn from_app(config: &AppConfig, sink: LogSink) -> Self {
        Self {
            json: config.json_logs,
            verbose: config.verbose,
            sink,
        }
    }
}

/// Install the global subscriber. Call once, after config is loaded.
pub fn init(config: LogConfig) {
    let level = if config.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("bulkctl={}", level.as_str().to_lowercase())));

    let registry = tracing_subscriber::registry().with(env_filter);

    match (config.sink, config.json) {
        (LogSink::Discard, _) => registry.with(fmt::layer().with_writer(std::io::sink)).init(),
        (LogSink::Stderr, true) => registry
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_span_events(FmtSpan::CLOSE)
                    .with_current_span(true)
                    .with_target(true),
            )
            .init(),
        (LogSink::Stderr, false) => registry
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .init(),
    }
}

/// Lets one message through per interval; everything in between is dropped.
///
/// Used for per-frame progress logging, which would otherwise emit a line
/// for every frame of a long job.
pub struct LogThrottle {
    interval: Duration,
    last: Mutex<Option<Instant>>,
}

impl LogThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: Mutex::new(None),
        }
    }

    pub fn should_log(&self) -> bool {
        let Ok(mut last) = self.last.lock() else {
            return true;
        };
        let now = Instant::now();
        match *last {
            Some(at) if now.duration_since(at) < self.interval => false,
            _ => {
                *last = Some(now);
                true
            }
        }
    }

    pub fn reset(&self) {
        if let Ok(mut last) = self.last.lock() {
            *last = None;
        }
    }
}
