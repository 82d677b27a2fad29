//! HTTP client for the back-office bulk job API.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info};

use super::BulkJobApi;
use super::endpoints::Endpoints;
use crate::config::AppConfig;
use crate::core::decoder::ByteStream;
use crate::core::models::{BulkResource, BulkUpdateStatus, SingleUpdateResult};
use crate::error::JobError;

/// Client for the bulk job endpoints of one API domain.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    endpoints: Endpoints,
    token: Option<String>,
    request_timeout: Duration,
}

impl ApiClient {
    pub fn new(config: &AppConfig) -> Result<Self, JobError> {
        let endpoints = Endpoints::new(&config.base_url, &config.domain)?;
        let http = reqwest::Client::builder()
            .connect_timeout(config.request_timeout())
            .user_agent(concat!("bulkctl/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            endpoints,
            token: config.token.clone().filter(|t| !t.is_empty()),
            request_timeout: config.request_timeout(),
        })
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Regenerate alt texts for a single unit (e.g. one workspace).
    pub async fn update_single(&self, unit: &str, id: &str) -> Result<SingleUpdateResult, JobError> {
        let url = self.endpoints.single_update(unit, id)?;
        debug!(url = %url, "Single unit update");

        let response = self
            .authorize(self.http.post(&url))
            .timeout(self.request_timeout)
            .send()
            .await?;
        read_json(response).await
    }

    /// GET an arbitrary resource with the configured bearer token.
    pub async fn get_authenticated(&self, path: &str) -> Result<Value, JobError> {
        let token = self.token.as_deref().ok_or(JobError::MissingToken)?;
        let url = self.endpoints.resolve(path);

        let response = self
            .http
            .get(&url)
            .bearer_auth(token)
            .timeout(self.request_timeout)
            .send()
            .await?;
        read_json(response).await
    }
}

#[async_trait]
impl BulkJobApi for ApiClient {
    async fn start_bulk_job(&self, resource: BulkResource) -> Result<ByteStream, JobError> {
        let url = self.endpoints.bulk_update(resource);
        info!(url = %url, resource = %resource, "Starting bulk job");

        // No request timeout here: the body stays open for the whole job.
        let response = self.authorize(self.http.post(&url)).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(JobError::JobStart {
                status: status.as_u16(),
                message: error_message(response).await,
            });
        }

        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map_err(JobError::from))
            .boxed())
    }

    async fn fetch_status(&self) -> Result<BulkUpdateStatus, JobError> {
        let url = self.endpoints.bulk_status();
        let response = self
            .authorize(self.http.get(&url))
            .timeout(self.request_timeout)
            .send()
            .await?;
        read_json(response).await
    }
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, JobError> {
    let status = response.status();
    if !status.is_success() {
        return Err(JobError::Request {
            status: status.as_u16(),
            message: error_message(response).await,
        });
    }
    Ok(response.json::<T>().await?)
}

/// Pull `message` or `error` out of a JSON error body, if there is one.
async fn error_message(response: Response) -> Option<String> {
    let body = response.text().await.ok()?;
    let value: Value = serde_json::from_str(&body).ok()?;
    ["message", "error"]
        .iter()
        .find_map(|key| value.get(*key).and_then(Value::as_str))
        .map(str::to_string)
}
