//! Client for streamed bulk job progress.
//!
//! A bulk job is started with a `POST`, reports progress as `data: <json>`
//! lines on the response body, and ends with a frame marked `final`. This
//! crate decodes that stream, reduces it into display state, and refreshes
//! the aggregate status once the job is done.

pub mod api;
pub mod cli;
pub mod config;
pub mod context;
pub mod core;
pub mod error;
pub mod logging;

pub use error::JobError;
