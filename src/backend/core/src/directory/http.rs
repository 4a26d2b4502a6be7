//! HTTP directory backend: the REST client for the hosted directory API.
//!
//! Endpoints:
//! - `GET /users/{id}/roles`        -> `["accountant", ...]`
//! - `GET /users/{id}/overrides`    -> `[UserOverride, ...]`
//! - `GET /users/{id}/profile`      -> `{"is_super_admin": bool}`
//! - `GET /roles/{slug}/permissions`-> `["transactions.post", ...]`
//!
//! Transport failures, timeouts, and unexpected statuses map to
//! `DirectoryUnavailable`; a 404 on a role maps to `UnknownRole`.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::authz::models::{PermissionCode, RoleSlug, UserId, UserOverride};
use crate::error::{AuthzError, Result};

use super::{DirectoryProfile, DirectoryService};

/// Configuration for the HTTP directory client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpDirectoryConfig {
    /// Base URL of the directory API.
    pub base_url: String,

    /// Request timeout.
    #[serde(with = "humantime_serde", default = "default_timeout")]
    pub timeout: Duration,
}

fn default_timeout() -> Duration {
    Duration::from_secs(10)
}

impl Default for HttpDirectoryConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8090".to_string(),
            timeout: default_timeout(),
        }
    }
}

/// HTTP directory backend.
#[derive(Debug, Clone)]
pub struct HttpDirectory {
    client: reqwest::Client,
    base_url: String,
}

impl HttpDirectory {
    /// Create a client against the configured base URL.
    pub fn new(config: HttpDirectoryConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AuthzError::Configuration(e.to_string()))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "directory read");

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AuthzError::DirectoryUnavailable(format!(
                "{url} returned {status}"
            )));
        }
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl DirectoryService for HttpDirectory {
    async fn fetch_roles(&self, user: &UserId) -> Result<Vec<RoleSlug>> {
        self.get_json(&format!("/users/{user}/roles")).await
    }

    async fn fetch_overrides(&self, user: &UserId) -> Result<Vec<UserOverride>> {
        self.get_json(&format!("/users/{user}/overrides")).await
    }

    async fn fetch_profile(&self, user: &UserId) -> Result<DirectoryProfile> {
        self.get_json(&format!("/users/{user}/profile")).await
    }

    async fn fetch_role_permissions(&self, role: &RoleSlug) -> Result<Vec<PermissionCode>> {
        let url = format!("{}/roles/{role}/permissions", self.base_url);
        debug!(url = %url, "directory read");

        let response = self.client.get(&url).send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => Err(AuthzError::UnknownRole(role.clone())),
            status if status.is_success() => Ok(response.json().await?),
            status => Err(AuthzError::DirectoryUnavailable(format!(
                "{url} returned {status}"
            ))),
        }
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
