//! URL construction for the bulk job REST contract.
//!
//! ```text
//! POST /api/<domain>/bulk-update-<resource>      streamed progress
//! GET  /api/<domain>/bulk-update-status          aggregate counts
//! POST /api/<domain>/update-<unit>-alt-text/<id> single unit
//! ```

use std::sync::LazyLock;

use regex::Regex;

use crate::core::models::BulkResource;
use crate::error::JobError;

static SLUG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").expect("slug pattern compiles"));

/// Check that a value can be spliced into a path segment.
pub fn validate_slug(value: &str) -> Result<&str, JobError> {
    if SLUG.is_match(value) {
        Ok(value)
    } else {
        Err(JobError::InvalidSlug(value.to_string()))
    }
}

#[derive(Debug, Clone)]
pub struct Endpoints {
    base_url: String,
    domain: String,
}

impl Endpoints {
    pub fn new(base_url: &str, domain: &str) -> Result<Self, JobError> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            domain: validate_slug(domain)?.to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn bulk_update(&self, resource: BulkResource) -> String {
        format!(
            "{}/api/{}/bulk-update-{}",
            self.base_url,
            self.domain,
            resource.slug()
        )
    }

    pub fn bulk_status(&self) -> String {
        format!("{}/api/{}/bulk-update-status", self.base_url, self.domain)
    }

    pub fn single_update(&self, unit: &str, id: &str) -> Result<String, JobError> {
        Ok(format!(
            "{}/api/{}/update-{}-alt-text/{}",
            self.base_url,
            self.domain,
            validate_slug(unit)?,
            validate_slug(id)?
        ))
    }

    /// Absolute URLs pass through; anything else is joined to the base URL.
    pub fn resolve(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}/{}", self.base_url, path.trim_start_matches('/'))
        }
    }
}
