//! `XertClient` trait, credential types and the reqwest-based implementation
//! used by the poller service.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod auth;
pub mod http_client;
pub mod retry;
pub mod token_store;

/// Login or refresh exchange failure.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("login rejected: {0}")]
    LoginFailed(String),
    #[error("refresh rejected: {0}")]
    RefreshFailed(String),
    #[error("api rejected access token: {0}")]
    Unauthorized(String),
}

/// Upstream API failure, classified by whether a retry could help.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("transient api error: {0}")]
    Transient(String),
    #[error("permanent api error: {0}")]
    Permanent(String),
    #[error("auth error: {0}")]
    Auth(#[from] AuthError),
}

impl ApiError {
    /// Eligible for the single immediate retry inside the client.
    pub fn is_transient(&self) -> bool {
        matches!(self, ApiError::Transient(_))
    }

    /// Classify a non-success HTTP status.
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            401 | 403 => ApiError::Auth(AuthError::Unauthorized(format!("{status}: {body}"))),
            408 | 429 => ApiError::Transient(format!("{status}: {body}")),
            s if s >= 500 => ApiError::Transient(format!("{status}: {body}")),
            _ => ApiError::Permanent(format!("{status}: {body}")),
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ApiError::Permanent(format!("decoding response: {e}"))
        } else {
            ApiError::Transient(format!("http error: {e}"))
        }
    }
}

/// Token persistence failure.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("token store io: {0}")]
    Io(#[from] std::io::Error),
    #[error("token store encoding: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// OAuth2 credential pair with its access-token expiry.
///
/// Round-trips exactly through the token store; `expires_at` already accounts
/// for the clock-skew allowance applied when the token response was parsed.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl Credential {
    /// True while the access token stays valid beyond `margin`.
    pub fn is_valid_for(&self, margin: Duration) -> bool {
        !self.access_token.is_empty() && Utc::now() + margin < self.expires_at
    }
}

/// One independently polled category of upstream data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Domain {
    TrainingInfo,
    Activities,
}

impl Domain {
    pub const ALL: [Domain; 2] = [Domain::TrainingInfo, Domain::Activities];

    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::TrainingInfo => "training_info",
            Domain::Activities => "activities",
        }
    }
}

impl std::fmt::Display for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload fetched for one domain in one poll cycle.
#[derive(Clone, Debug)]
pub struct FetchResult {
    pub domain: Domain,
    pub payload: serde_json::Value,
    pub fetched_at: DateTime<Utc>,
}

#[async_trait]
pub trait XertClient: Send + Sync + 'static {
    /// Fitness signature, training status and load.
    async fn get_training_info(&self) -> Result<serde_json::Value, ApiError>;

    /// Activity list bounded by the lookback window.
    async fn get_activities(&self, lookback_days: u32) -> Result<serde_json::Value, ApiError>;

    /// Detailed data for a single activity, addressed by its list `path`.
    async fn get_activity_detail(&self, activity_path: &str)
    -> Result<serde_json::Value, ApiError>;

    /// Fetch the payload for `domain`, stamping the result.
    async fn fetch(&self, domain: Domain, lookback_days: u32) -> Result<FetchResult, ApiError> {
        let payload = match domain {
            Domain::TrainingInfo => self.get_training_info().await?,
            Domain::Activities => self.get_activities(lookback_days).await?,
        };
        Ok(FetchResult {
            domain,
            payload,
            fetched_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_validity_respects_margin() {
        let cred = Credential {
            access_token: "tok".into(),
            refresh_token: "ref".into(),
            expires_at: Utc::now() + Duration::seconds(120),
        };
        assert!(cred.is_valid_for(Duration::seconds(60)));
        assert!(!cred.is_valid_for(Duration::seconds(300)));
    }

    #[test]
    fn empty_access_token_is_never_valid() {
        let cred = Credential {
            access_token: String::new(),
            refresh_token: "ref".into(),
            expires_at: Utc::now() + Duration::seconds(3600),
        };
        assert!(!cred.is_valid_for(Duration::zero()));
    }

    #[test]
    fn status_classification() {
        assert!(ApiError::from_status(500, String::new()).is_transient());
        assert!(ApiError::from_status(429, String::new()).is_transient());
        assert!(!ApiError::from_status(404, String::new()).is_transient());
        assert!(matches!(
            ApiError::from_status(401, String::new()),
            ApiError::Auth(AuthError::Unauthorized(_))
        ));
    }

    #[test]
    fn credential_round_trips_through_json() {
        let cred = Credential {
            access_token: "a".into(),
            refresh_token: "r".into(),
            expires_at: Utc::now(),
        };
        let json = serde_json::to_string(&cred).expect("serialize");
        let back: Credential = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(cred, back);
    }
}
