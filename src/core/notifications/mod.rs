mod slack;

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{NotificationChannelType, NotificationConfig};
use crate::core::models::BulkResource;

/// Bulk job lifecycle events that trigger notifications
#[derive(Debug, Clone)]
pub enum JobEvent {
    Started {
        run_id: String,
        resource: BulkResource,
    },
    Completed {
        run_id: String,
        resource: BulkResource,
        processed: usize,
        succeeded: usize,
        errors: usize,
        duration_secs: u64,
    },
    Failed {
        run_id: String,
        resource: BulkResource,
        error: String,
    },
}

/// Trait for notification channel implementations (Slack, etc.)
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    async fn notify(&self, event: JobEvent) -> Result<()>;
}

/// Build the notifier selected in config, if any
pub fn create_notifier(config: &NotificationConfig) -> Option<Arc<dyn NotificationChannel>> {
    match &config.channel {
        NotificationChannelType::None => None,
        NotificationChannelType::Slack => {
            let webhook = config.slack_webhook.as_ref()?;
            if webhook.is_empty() {
                return None;
            }
            Some(Arc::new(slack::SlackNotifier::new(webhook.clone())))
        }
    }
}
