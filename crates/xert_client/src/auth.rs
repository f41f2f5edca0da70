//! OAuth2 token lifecycle for the Xert API.
//!
//! Handles:
//! - Password grant on first run (or when the refresh token is rejected)
//! - Refresh grant ahead of access-token expiry
//! - Persisting every successful grant through the token store
//! - Serializing concurrent refresh attempts behind one lock

use chrono::{DateTime, Duration, TimeZone, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::token_store::TokenStore;
use crate::{AuthError, Credential};

// Xert issues tokens against a shared public client.
const CLIENT_ID: &str = "xert_public";
const CLIENT_SECRET: &str = "xert_public";

/// Seconds shaved off the reported token lifetime to absorb clock skew.
const EXPIRY_SKEW_SECS: i64 = 5;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: i64,
    #[serde(default)]
    created_at: Option<i64>,
}

/// Manages the single in-process credential.
///
/// The credential slot lives behind an async mutex held for the whole
/// check-then-refresh sequence, so concurrent callers that find an expiring
/// token trigger exactly one grant exchange and share its result.
pub struct AuthManager {
    client: reqwest::Client,
    token_url: String,
    username: String,
    password: SecretString,
    refresh_margin: Duration,
    store: TokenStore,
    credential: Mutex<Option<Credential>>,
}

impl AuthManager {
    /// Create a manager, hydrating the credential slot from the token store.
    /// An unreadable store is treated as empty so a restart can still log in.
    pub async fn new(
        base_url: &str,
        username: impl Into<String>,
        password: SecretString,
        refresh_margin_secs: i64,
        store: TokenStore,
    ) -> Self {
        let credential = match store.load().await {
            Ok(credential) => credential,
            Err(e) => {
                tracing::warn!("failed to load stored tokens: {e}");
                None
            }
        };
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .expect("reqwest client build should not fail");
        Self {
            client,
            token_url: format!("{}/oauth/token", base_url.trim_end_matches('/')),
            username: username.into(),
            password,
            refresh_margin: Duration::seconds(refresh_margin_secs),
            store,
            credential: Mutex::new(credential),
        }
    }

    /// Return a valid access token, refreshing or re-authenticating as needed.
    ///
    /// The common path is lock, check, clone, with no network I/O. An expiring
    /// credential is refreshed under the same lock; callers queued behind the
    /// refresh observe the renewed credential on the fast path.
    pub async fn access_token(&self) -> Result<String, AuthError> {
        let mut slot = self.credential.lock().await;

        if let Some(credential) = slot.as_ref() {
            if credential.is_valid_for(self.refresh_margin) {
                return Ok(credential.access_token.clone());
            }
        }

        let refresh_token = slot
            .as_ref()
            .map(|c| c.refresh_token.clone())
            .filter(|t| !t.is_empty());

        let renewed = match refresh_token {
            Some(token) => match self.refresh_grant(&token).await {
                Ok(credential) => Some(credential),
                Err(e) => {
                    tracing::warn!("token refresh failed, falling back to login: {e}");
                    None
                }
            },
            None => None,
        };

        let credential = match renewed {
            Some(credential) => credential,
            None => self.password_grant().await?,
        };

        self.persist(&credential).await;
        let access_token = credential.access_token.clone();
        *slot = Some(credential);
        Ok(access_token)
    }

    async fn password_grant(&self) -> Result<Credential, AuthError> {
        tracing::info!("authenticating with password grant");
        let resp = self
            .client
            .post(&self.token_url)
            .basic_auth(CLIENT_ID, Some(CLIENT_SECRET))
            .form(&[
                ("grant_type", "password"),
                ("username", self.username.as_str()),
                ("password", self.password.expose_secret()),
            ])
            .send()
            .await?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = body_snippet(resp).await;
            return Err(AuthError::LoginFailed(format!("{status}: {body}")));
        }
        let token: TokenResponse = resp.json().await?;
        tracing::info!("password grant successful");
        Ok(credential_from_response(token, None))
    }

    async fn refresh_grant(&self, refresh_token: &str) -> Result<Credential, AuthError> {
        tracing::info!("refreshing access token");
        let resp = self
            .client
            .post(&self.token_url)
            .basic_auth(CLIENT_ID, Some(CLIENT_SECRET))
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .send()
            .await?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = body_snippet(resp).await;
            return Err(AuthError::RefreshFailed(format!("{status}: {body}")));
        }
        let token: TokenResponse = resp.json().await?;
        tracing::info!("token refresh successful");
        Ok(credential_from_response(token, Some(refresh_token)))
    }

    /// A store failure is logged, never propagated: the in-memory credential
    /// stays authoritative for this run and only a restart is affected.
    async fn persist(&self, credential: &Credential) {
        if let Err(e) = self.store.save(credential).await {
            tracing::warn!("failed to persist tokens: {e}");
        }
    }
}

/// Build a credential from a token response. A response that omits the
/// refresh token keeps the one used for the exchange.
fn credential_from_response(token: TokenResponse, previous_refresh: Option<&str>) -> Credential {
    let created_at = token
        .created_at
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
        .unwrap_or_else(Utc::now);
    let expires_at = expiry_from(created_at, token.expires_in);
    let refresh_token = token
        .refresh_token
        .filter(|t| !t.is_empty())
        .or_else(|| previous_refresh.map(str::to_string))
        .unwrap_or_default();
    Credential {
        access_token: token.access_token,
        refresh_token,
        expires_at,
    }
}

fn expiry_from(created_at: DateTime<Utc>, expires_in: i64) -> DateTime<Utc> {
    created_at + Duration::seconds(expires_in.max(0)) - Duration::seconds(EXPIRY_SKEW_SECS)
}

async fn body_snippet(resp: reqwest::Response) -> String {
    resp.text()
        .await
        .unwrap_or_default()
        .chars()
        .take(256)
        .collect()
}
