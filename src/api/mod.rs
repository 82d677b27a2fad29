//! Client side of the bulk job REST contract.
//!
//! ## Architecture
//!
//! - `endpoints`: path construction and segment validation
//! - `client`: reqwest-backed [`ApiClient`]
//!
//! The runner only depends on [`BulkJobApi`], so tests can drive it with
//! in-memory byte streams.

pub mod client;
pub mod endpoints;

use async_trait::async_trait;

use crate::core::decoder::ByteStream;
use crate::core::models::{BulkResource, BulkUpdateStatus};
use crate::error::JobError;

pub use client::ApiClient;
pub use endpoints::Endpoints;

/// The two calls a bulk job run needs.
#[async_trait]
pub trait BulkJobApi: Send + Sync {
    /// Start a batch job and return its response body, unbuffered.
    async fn start_bulk_job(&self, resource: BulkResource) -> Result<ByteStream, JobError>;

    /// Read the aggregate status counts.
    async fn fetch_status(&self) -> Result<BulkUpdateStatus, JobError>;
}
