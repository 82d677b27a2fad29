use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// One progress update from a bulk job stream.
///
/// Each frame is a full snapshot: `errors` and `processed` are already
/// cumulative on the server side.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProgressFrame {
    pub stage: String,
    pub current: u64,
    pub total: u64,
    pub percentage: f64,
    pub message: String,
    pub errors: Vec<String>,
    pub processed: Vec<ProcessedItem>,
    #[serde(rename = "final")]
    pub is_final: bool,
}

impl ProgressFrame {
    /// Number of processed units that reported success.
    pub fn succeeded(&self) -> usize {
        self.processed.iter().filter(|p| p.success()).count()
    }
}

/// Outcome for one unit of work, per resource type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProcessedItem {
    AltText(AltTextResult),
    Certificate(CertificateResult),
}

impl ProcessedItem {
    pub fn success(&self) -> bool {
        match self {
            ProcessedItem::AltText(r) => r.success,
            ProcessedItem::Certificate(r) => r.success,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            ProcessedItem::AltText(r) => r.error.as_deref(),
            ProcessedItem::Certificate(r) => r.error.as_deref(),
        }
    }

    /// Short human label for lists.
    pub fn label(&self) -> String {
        match self {
            ProcessedItem::AltText(r) => format!(
                "{} (#{}) {} alt texts",
                r.workspace_name, r.workspace_id, r.alt_texts_generated
            ),
            ProcessedItem::Certificate(r) => match &r.gstin {
                Some(gstin) => format!("certificate #{} {}", r.certificate_id, gstin),
                None => format!("certificate #{}", r.certificate_id),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AltTextResult {
    pub workspace_id: u64,
    #[serde(default)]
    pub workspace_name: String,
    #[serde(default)]
    pub alt_texts_generated: u64,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateResult {
    pub certificate_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gstin: Option<String>,
    #[serde(default)]
    pub verified: bool,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregate counts polled from the status endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkUpdateStatus {
    pub total_workspaces: u64,
    pub workspaces_with_alt_texts: u64,
    pub workspaces_needing_update: u64,
}

impl BulkUpdateStatus {
    pub fn is_consistent(&self) -> bool {
        self.workspaces_with_alt_texts <= self.total_workspaces
    }
}

/// Response of the single-unit update endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SingleUpdateResult {
    pub success: bool,
    #[serde(default)]
    pub alt_texts_generated: Option<u64>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Batch operations the server exposes as `bulk-update-<resource>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum BulkResource {
    /// Regenerate alt text for every workspace image
    AltTexts,
    /// Re-verify every uploaded GST certificate
    Certificates,
}

impl BulkResource {
    pub fn slug(&self) -> &'static str {
        match self {
            Self::AltTexts => "alt-texts",
            Self::Certificates => "certificates",
        }
    }
}

impl std::fmt::Display for BulkResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.slug())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_frame_without_stage_uses_defaults() {
        let json = r#"{"final":true,"current":3,"total":3,"percentage":100,"message":"Done","errors":["img 5 failed"],"processed":[]}"#;
        let frame: ProgressFrame = serde_json::from_str(json).unwrap();

        assert!(frame.is_final);
        assert_eq!(frame.stage, "");
        assert_eq!(frame.percentage, 100.0);
        assert_eq!(frame.errors, vec!["img 5 failed".to_string()]);
    }

    #[test]
    fn processed_items_pick_variant_by_identifying_key() {
        let json = r#"{"processed":[
            {"workspaceId":1,"workspaceName":"A","altTextsGenerated":4,"success":true},
            {"certificateId":9,"gstin":"27AAPFU0939F1ZV","verified":false,"success":false,"error":"expired"}
        ]}"#;
        let frame: ProgressFrame = serde_json::from_str(json).unwrap();

        assert!(!frame.is_final);
        match &frame.processed[0] {
            ProcessedItem::AltText(r) => {
                assert_eq!(r.workspace_id, 1);
                assert_eq!(r.alt_texts_generated, 4);
            }
            other => panic!("expected alt text result, got {:?}", other),
        }
        match &frame.processed[1] {
            ProcessedItem::Certificate(r) => {
                assert_eq!(r.certificate_id, 9);
                assert_eq!(r.error.as_deref(), Some("expired"));
            }
            other => panic!("expected certificate result, got {:?}", other),
        }
        assert_eq!(frame.succeeded(), 1);
        assert_eq!(frame.processed[1].error(), Some("expired"));
    }

    #[test]
    fn status_consistency() {
        let status: BulkUpdateStatus = serde_json::from_str(
            r#"{"totalWorkspaces":50,"workspacesWithAltTexts":20,"workspacesNeedingUpdate":30}"#,
        )
        .unwrap();
        assert!(status.is_consistent());

        let broken = BulkUpdateStatus {
            total_workspaces: 1,
            workspaces_with_alt_texts: 2,
            workspaces_needing_update: 0,
        };
        assert!(!broken.is_consistent());
    }
}
