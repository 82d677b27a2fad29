use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_FILE: &str = "bulkctl.toml";
const ENV_PREFIX: &str = "BULKCTL_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Origin of the back-office API, e.g. `https://app.example.com`
    pub base_url: String,
    /// Path segment under `/api/` that owns the bulk endpoints
    pub domain: String,
    /// Bearer token sent with every request when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    pub max_stream_secs: u64,
    pub refresh_grace_ms: u64,
    pub request_timeout_secs: u64,
    pub verbose: bool,
    pub json_logs: bool,
    #[serde(default)]
    pub notifications: NotificationConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            domain: "seo".to_string(),
            token: None,
            max_stream_secs: 3600,
            refresh_grace_ms: 1000,
            request_timeout_secs: 30,
            verbose: false,
            json_logs: false,
            notifications: NotificationConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotificationConfig {
    #[serde(default)]
    pub channel: NotificationChannelType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slack_webhook: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationChannelType {
    #[default]
    None,
    Slack,
}

impl AppConfig {
    /// Layer defaults, the config file, `BULKCTL_*` env vars and CLI overrides,
    /// in that order.
    pub fn new<T: Serialize>(config_path: Option<&Path>, overrides: Option<&T>) -> Result<Self> {
        let path = config_path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os("BULKCTL_CONFIG").map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

        let figment = Self::figment(&path).merge(Env::prefixed(ENV_PREFIX).split("__"));
        Self::extract(figment, overrides)
            .with_context(|| format!("Failed to load configuration ({})", path.display()))
    }

    /// Defaults plus the given file, without the environment layer.
    pub fn from_file<T: Serialize>(path: &Path, overrides: Option<&T>) -> Result<Self> {
        Self::extract(Self::figment(path), overrides)
    }

    fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(AppConfig::default())).merge(Toml::file(path))
    }

    fn extract<T: Serialize>(mut figment: Figment, overrides: Option<&T>) -> Result<Self> {
        if let Some(overrides) = overrides {
            figment = figment.merge(Serialized::defaults(overrides));
        }
        let config: AppConfig = figment.extract()?;
        Ok(config)
    }

    /// Write this configuration as TOML. Refuses to overwrite unless `force`.
    pub fn write_to(&self, path: &Path, force: bool) -> Result<()> {
        if path.exists() && !force {
            anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file {}", path.display()))?;
        Ok(())
    }

    pub fn max_stream_duration(&self) -> Duration {
        Duration::from_secs(self.max_stream_secs)
    }

    pub fn refresh_grace(&self) -> Duration {
        Duration::from_millis(self.refresh_grace_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[derive(Serialize)]
    struct Overrides {
        #[serde(skip_serializing_if = "Option::is_none")]
        domain: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        verbose: Option<bool>,
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let config = AppConfig::from_file(&dir.path().join("absent.toml"), None::<&Overrides>)
            .unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.refresh_grace(), Duration::from_secs(1));
    }

    #[test]
    fn file_values_are_overridden_by_cli() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bulkctl.toml");
        std::fs::write(
            &path,
            r#"
base_url = "https://backoffice.example.com"
domain = "compliance"
max_stream_secs = 120

[notifications]
channel = "slack"
slack_webhook = "https://hooks.slack.com/services/T/B/X"
"#,
        )
        .unwrap();

        let overrides = Overrides {
            domain: Some("seo".into()),
            verbose: None,
        };
        let config = AppConfig::from_file(&path, Some(&overrides)).unwrap();

        assert_eq!(config.base_url, "https://backoffice.example.com");
        assert_eq!(config.domain, "seo");
        assert_eq!(config.max_stream_duration(), Duration::from_secs(120));
        assert!(!config.verbose);
        assert_eq!(config.notifications.channel, NotificationChannelType::Slack);
    }

    #[test]
    fn written_config_reloads_identically() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bulkctl.toml");
        let config = AppConfig {
            token: Some("secret".into()),
            ..AppConfig::default()
        };

        config.write_to(&path, false).unwrap();
        assert!(config.write_to(&path, false).is_err());
        config.write_to(&path, true).unwrap();

        let loaded = AppConfig::from_file(&path, None::<&Overrides>).unwrap();
        assert_eq!(loaded, config);
    }
}
