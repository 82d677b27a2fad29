use std::sync::Arc;

use crate::api::ApiClient;
use crate::config::AppConfig;
use crate::core::notifications::create_notifier;
use crate::core::runner::{JobRunner, RunnerSettings};
use crate::core::status::StatusCache;
use crate::error::JobError;

#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<AppConfig>,
    pub client: ApiClient,
    pub runner: JobRunner,
}

impl AppContext {
    pub fn new(config: AppConfig) -> Result<Self, JobError> {
        let client = ApiClient::new(&config)?;
        let runner = JobRunner::new(
            Arc::new(client.clone()),
            StatusCache::new(),
            RunnerSettings::from_config(&config),
        )
        .with_notifier(create_notifier(&config.notifications));

        Ok(Self {
            config: Arc::new(config),
            client,
            runner,
        })
    }
}
