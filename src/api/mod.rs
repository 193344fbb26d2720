//! Client for the external game-data API
//!
//! This module handles:
//! - Fetching a clan's war log and its current war
//! - Classifying every HTTP-level outcome into a small error taxonomy
//!
//! The client neither retries nor rate limits. Callers pace requests through
//! the shared limiter and decide when a transient failure is retried.

mod client;
mod types;

pub use client::{classify_status, HttpApiClient};
pub use types::{
    CurrentWar, WarAttack, WarLogEntry, WarLogResponse, WarMember, WarSide, WarState,
};

use crate::tag::ClanTag;
use async_trait::async_trait;
use thiserror::Error;

/// Classified failure of an API call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// Credentials rejected or caller IP blocked; requires operator action
    #[error("Access forbidden: {0}")]
    Forbidden(String),

    /// The clan or its public war data does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Timeout, connection failure, throttling or server error
    #[error("Transient failure: {0}")]
    Transient(String),

    /// The response body could not be decoded
    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl ApiError {
    /// Short label used in ledger notes and logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Forbidden(_) => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::Transient(_) => "transient",
            Self::Malformed(_) => "malformed",
        }
    }

    /// Returns true if the error must halt the crawl
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Forbidden(_))
    }

    /// Returns true if the same request may succeed later
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Result type for API calls
pub type ApiResult<T> = Result<T, ApiError>;

/// Read access to the game-data API
///
/// Implementations must never panic for expected HTTP outcomes.
#[async_trait]
pub trait ApiClient: Send + Sync {
    /// Fetches the finished wars of a clan
    async fn fetch_war_log(&self, tag: &ClanTag) -> ApiResult<Vec<WarLogEntry>>;

    /// Fetches the clan's current war, whatever its phase
    async fn fetch_current_war(&self, tag: &ClanTag) -> ApiResult<CurrentWar>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(ApiError::Forbidden("x".into()).kind(), "forbidden");
        assert_eq!(ApiError::NotFound("x".into()).kind(), "not_found");
        assert_eq!(ApiError::Transient("x".into()).kind(), "transient");
        assert_eq!(ApiError::Malformed("x".into()).kind(), "malformed");
    }

    #[test]
    fn test_only_forbidden_is_fatal() {
        assert!(ApiError::Forbidden("x".into()).is_fatal());
        assert!(!ApiError::NotFound("x".into()).is_fatal());
        assert!(!ApiError::Transient("x".into()).is_fatal());
        assert!(ApiError::Transient("x".into()).is_retryable());
        assert!(!ApiError::Malformed("x".into()).is_retryable());
    }
}
