use super::{JobEvent, NotificationChannel};
use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Value, json};

pub struct SlackNotifier {
    webhook_url: String,
    client: reqwest::Client,
}

impl SlackNotifier {
    pub fn new(webhook_url: String) -> Self {
        Self {
            webhook_url,
            client: reqwest::Client::new(),
        }
    }

    fn format_message(&self, event: &JobEvent) -> Value {
        match event {
            JobEvent::Started { run_id, resource } => blocks(
                "Bulk Update Started",
                vec![field("Resource", resource), field("Run", short(run_id))],
                None,
            ),
            JobEvent::Completed {
                run_id,
                resource,
                processed,
                succeeded,
                errors,
                duration_secs,
            } => blocks(
                "Bulk Update Complete",
                vec![
                    field("Resource", resource),
                    field("Run", short(run_id)),
                    field("Processed", format!("{} ({} ok)", processed, succeeded)),
                    field("Errors", errors),
                    field("Duration", format!("{}s", duration_secs)),
                ],
                None,
            ),
            JobEvent::Failed {
                run_id,
                resource,
                error,
            } => blocks(
                "Bulk Update Failed",
                vec![field("Resource", resource), field("Run", short(run_id))],
                Some(format!("*Error:*\n```{}```", error)),
            ),
        }
    }
}

fn short(run_id: &str) -> String {
    format!("`{}`", &run_id[..8.min(run_id.len())])
}

fn field(name: &str, value: impl std::fmt::Display) -> Value {
    json!({ "type": "mrkdwn", "text": format!("*{}:*\n{}", name, value) })
}

fn blocks(title: &str, fields: Vec<Value>, detail: Option<String>) -> Value {
    let mut blocks = vec![
        json!({
            "type": "header",
            "text": { "type": "plain_text", "text": title, "emoji": true }
        }),
        json!({ "type": "section", "fields": fields }),
    ];
    if let Some(detail) = detail {
        blocks.push(json!({
            "type": "section",
            "text": { "type": "mrkdwn", "text": detail }
        }));
    }
    json!({ "blocks": blocks })
}

#[async_trait]
impl NotificationChannel for SlackNotifier {
    async fn notify(&self, event: JobEvent) -> Result<()> {
        let payload = self.format_message(&event);
        self.client
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::BulkResource;

    #[test]
    fn failed_event_carries_error_section() {
        let notifier = SlackNotifier::new("http://localhost/hook".into());
        let message = notifier.format_message(&JobEvent::Failed {
            run_id: "0192f0c4-aaaa-bbbb".into(),
            resource: BulkResource::Certificates,
            error: "transport error: connection reset".into(),
        });

        let blocks = message["blocks"].as_array().unwrap();
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0]["text"]["text"], "Bulk Update Failed");
        assert!(blocks[1]["fields"][1]["text"]
            .as_str()
            .unwrap()
            .contains("`0192f0c4`"));
        assert!(blocks[2]["text"]["text"]
            .as_str()
            .unwrap()
            .contains("connection reset"));
    }

    #[test]
    fn completed_event_summarises_counts() {
        let notifier = SlackNotifier::new("http://localhost/hook".into());
        let message = notifier.format_message(&JobEvent::Completed {
            run_id: "abc".into(),
            resource: BulkResource::AltTexts,
            processed: 3,
            succeeded: 2,
            errors: 1,
            duration_secs: 42,
        });

        let fields = message["blocks"][1]["fields"].as_array().unwrap();
        assert_eq!(fields.len(), 5);
        assert_eq!(fields[0]["text"], "*Resource:*\nalt-texts");
        assert_eq!(fields[2]["text"], "*Processed:*\n3 (2 ok)");
    }
}
