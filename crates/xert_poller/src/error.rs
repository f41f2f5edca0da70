//! Error types for the poller service.

use thiserror::Error;
use xert_client::{ApiError, AuthError, StoreError};

/// Webhook delivery failure, classified by whether a later attempt could help.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("transient webhook failure: {0}")]
    Transient(String),
    #[error("permanent webhook failure: {0}")]
    Permanent(String),
}

/// Everything a poll cycle can fail with. Caught and logged at the per-domain
/// cycle boundary; never fatal to the process.
#[derive(Debug, Error)]
pub enum PollerError {
    #[error("auth error: {0}")]
    Auth(#[from] AuthError),

    #[error("api error: {0}")]
    Api(#[from] ApiError),

    #[error("dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("configuration error: {0}")]
    Config(String),
}
