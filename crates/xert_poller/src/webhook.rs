//! Home Assistant webhook delivery.
//!
//! One POST per detected change, no internal retries: retry policy belongs to
//! the scheduler, which withholds the fingerprint commit on failure.

use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;

use crate::error::DispatchError;

/// Outbound event body, as Home Assistant automations expect it.
#[derive(Debug, Serialize)]
struct WebhookEvent<'a> {
    event_type: &'a str,
    data: EventData<'a>,
}

#[derive(Debug, Serialize)]
struct EventData<'a> {
    available: bool,
    parsed: &'a serde_json::Value,
}

/// Client for sending webhook events to the hub.
pub struct WebhookDispatcher {
    client: reqwest::Client,
    url: String,
    token: Option<SecretString>,
}

impl WebhookDispatcher {
    pub fn new(ha_url: &str, webhook_id: &str, token: Option<SecretString>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .expect("reqwest client build should not fail");
        Self {
            client,
            url: format!("{}/api/webhook/{webhook_id}", ha_url.trim_end_matches('/')),
            token,
        }
    }

    /// POST one event to the hub webhook endpoint.
    ///
    /// Network failures and 5xx are transient, other non-2xx (e.g. an unknown
    /// webhook id) permanent. Either way the caller must not commit.
    pub async fn send(
        &self,
        event_type: &str,
        payload: &serde_json::Value,
    ) -> Result<(), DispatchError> {
        let available = payload
            .get("success")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        let event = WebhookEvent {
            event_type,
            data: EventData {
                available,
                parsed: payload,
            },
        };

        let mut request = self.client.post(&self.url).json(&event);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token.expose_secret());
        }

        let resp = request
            .send()
            .await
            .map_err(|e| DispatchError::Transient(format!("sending webhook: {e}")))?;

        let status = resp.status();
        if status.is_success() {
            tracing::debug!(event_type, "webhook delivered");
            return Ok(());
        }

        let body: String = resp
            .text()
            .await
            .unwrap_or_default()
            .chars()
            .take(256)
            .collect();
        if status.is_server_error() {
            Err(DispatchError::Transient(format!("{status}: {body}")))
        } else {
            Err(DispatchError::Permanent(format!("{status}: {body}")))
        }
    }
}
