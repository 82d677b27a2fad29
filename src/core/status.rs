//! Cached aggregate status with stale-on-error semantics.
//!
//! Each successful fetch replaces the cached value wholesale. A failed fetch
//! keeps the previous value and marks it stale, so a transient error never
//! blanks the dashboard.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::api::BulkJobApi;
use crate::core::models::BulkUpdateStatus;
use crate::error::JobError;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CachedStatus {
    pub status: BulkUpdateStatus,
    /// Time of the fetch that produced `status`
    pub fetched_at: DateTime<Utc>,
    /// The most recent refresh failed; `status` is older than it looks
    pub stale: bool,
    pub last_error: Option<String>,
}

#[derive(Clone, Default)]
pub struct StatusCache {
    inner: Arc<RwLock<Option<CachedStatus>>>,
}

impl StatusCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self) -> Option<CachedStatus> {
        self.inner.read().await.clone()
    }

    /// Fetch and replace the cached status.
    pub async fn refresh(&self, api: &dyn BulkJobApi) -> Result<BulkUpdateStatus, JobError> {
        match api.fetch_status().await {
            Ok(status) => {
                if !status.is_consistent() {
                    warn!(
                        total = status.total_workspaces,
                        with_alt_texts = status.workspaces_with_alt_texts,
                        "Server reported more workspaces with alt texts than workspaces"
                    );
                }
                debug!(
                    total = status.total_workspaces,
                    needing_update = status.workspaces_needing_update,
                    "Status refreshed"
                );

                *self.inner.write().await = Some(CachedStatus {
                    status,
                    fetched_at: Utc::now(),
                    stale: false,
                    last_error: None,
                });
                Ok(status)
            }
            Err(e) => {
                let err = JobError::StatusRefresh(e.to_string());
                warn!(error = %err, "Keeping cached status");

                if let Some(cached) = self.inner.write().await.as_mut() {
                    cached.stale = true;
                    cached.last_error = Some(e.to_string());
                }
                Err(err)
            }
        }
    }
}
