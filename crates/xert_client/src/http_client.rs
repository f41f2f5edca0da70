//! HTTP client implementation for the Xert API.
//!
//! This module provides a reqwest-based implementation of the
//! [`XertClient`](crate::XertClient) trait. Every request obtains a valid
//! bearer token from the [`AuthManager`] first; transient upstream failures
//! get one immediate retry, everything else propagates to the caller.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use crate::auth::AuthManager;
use crate::retry::RetryPolicy;
use crate::{ApiError, XertClient};

const USER_AGENT: &str = "xert-ha-poller/0.1";

/// Client for the Xert API using reqwest.
pub struct ReqwestXertClient {
    base_url: String,
    auth: Arc<AuthManager>,
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl ReqwestXertClient {
    /// Create a new client instance.
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the Xert API (e.g., "https://www.xertonline.com")
    /// * `auth` - Shared auth manager supplying bearer tokens
    pub fn new(base_url: &str, auth: Arc<AuthManager>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .expect("reqwest client build should not fail");
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
            client,
            retry: RetryPolicy::default(),
        }
    }

    /// Execute an authenticated GET, retrying once on transient failure.
    async fn get_json(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<serde_json::Value, ApiError> {
        self.retry
            .retry_if(|| self.fetch_once(endpoint, query), ApiError::is_transient)
            .await
    }

    async fn fetch_once(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<serde_json::Value, ApiError> {
        let token = self.auth.access_token().await.map_err(ApiError::Auth)?;
        let url = format!("{}/oauth{}", self.base_url, endpoint);
        let resp = self
            .client
            .get(&url)
            .bearer_auth(&token)
            .header(reqwest::header::ACCEPT, "application/json")
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .header(reqwest::header::CACHE_CONTROL, "no-cache")
            .query(query)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let body_snippet: String = body.chars().take(256).collect();
            return Err(ApiError::from_status(status.as_u16(), body_snippet));
        }
        resp.json()
            .await
            .map_err(|e| ApiError::Permanent(format!("decoding response: {e}")))
    }
}

#[async_trait]
impl XertClient for ReqwestXertClient {
    async fn get_training_info(&self) -> Result<serde_json::Value, ApiError> {
        tracing::debug!("fetching training info");
        self.get_json("/training_info", &[]).await
    }

    async fn get_activities(&self, lookback_days: u32) -> Result<serde_json::Value, ApiError> {
        let to = Utc::now().timestamp();
        let from = to - i64::from(lookback_days) * 24 * 3600;
        tracing::debug!(from, to, "fetching activities");
        self.get_json(
            "/activity",
            &[("from", from.to_string()), ("to", to.to_string())],
        )
        .await
    }

    async fn get_activity_detail(
        &self,
        activity_path: &str,
    ) -> Result<serde_json::Value, ApiError> {
        tracing::debug!(activity_path, "fetching activity detail");
        self.get_json(&format!("/activity/{activity_path}"), &[])
            .await
    }
}
