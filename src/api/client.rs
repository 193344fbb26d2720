//! HTTP implementation of the API client
//!
//! This module handles:
//! - Building the HTTP client with timeouts and a bearer token
//! - Building endpoint URLs with the tag percent-encoded
//! - Classifying transport errors and HTTP statuses

use crate::api::types::{CurrentWar, WarLogEntry, WarLogResponse};
use crate::api::{ApiClient, ApiError, ApiResult};
use crate::config::ApiConfig;
use crate::tag::ClanTag;
use crate::{ArchiverError, ConfigError};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

/// Error body the API sends alongside non-success statuses
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    reason: Option<String>,
    message: Option<String>,
}

/// Reason the API gives when a clan hides its war log
const PRIVATE_WAR_LOG: &str = "privateWarLog";

/// API client over HTTPS
pub struct HttpApiClient {
    client: Client,
    base_url: Url,
    token: String,
}

impl HttpApiClient {
    /// Creates a new client from the API configuration
    ///
    /// # Returns
    ///
    /// * `Ok(HttpApiClient)` - Ready to issue requests
    /// * `Err(ArchiverError)` - The base URL is unusable or the HTTP client failed to build
    pub fn new(config: &ApiConfig) -> Result<Self, ArchiverError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base-url: {}", e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ConfigError::InvalidUrl(format!(
                "base-url '{}' cannot carry a path",
                config.base_url
            ))
            .into());
        }

        let client = Client::builder()
            .user_agent(concat!("clanwar-archiver/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.timeout_secs.min(10)))
            .gzip(true)
            .brotli(true)
            .build()?;

        Ok(Self {
            client,
            base_url,
            token: config.token.clone(),
        })
    }

    /// Builds `{base}/clans/{tag}/{resource}` with the tag percent-encoded
    pub fn endpoint(&self, tag: &ClanTag, resource: &str) -> ApiResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::Malformed(format!("base URL {} has no path", self.base_url)))?
            .pop_if_empty()
            .extend(&["clans", tag.as_str(), resource]);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> ApiResult<T> {
        tracing::trace!("GET {}", url);

        let response = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| classify_transport(&e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::Transient(format!("Failed to read body: {}", e)))?;

        if let Some(error) = classify_status(status, &body) {
            return Err(error);
        }

        serde_json::from_str(&body).map_err(|e| ApiError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl ApiClient for HttpApiClient {
    async fn fetch_war_log(&self, tag: &ClanTag) -> ApiResult<Vec<WarLogEntry>> {
        let url = self.endpoint(tag, "warlog")?;
        let log: WarLogResponse = self.get_json(url).await?;
        Ok(log.items)
    }

    async fn fetch_current_war(&self, tag: &ClanTag) -> ApiResult<CurrentWar> {
        let url = self.endpoint(tag, "currentwar")?;
        self.get_json(url).await
    }
}

/// Classifies an HTTP status and body
///
/// | Condition | Classification |
/// |-----------|----------------|
/// | 2xx | None (success) |
/// | 403 with reason `privateWarLog` | NotFound |
/// | 401, 403 | Forbidden |
/// | 400, 404 | NotFound |
/// | 429, 5xx | Transient |
/// | anything else | Malformed |
pub fn classify_status(status: StatusCode, body: &str) -> Option<ApiError> {
    if status.is_success() {
        return None;
    }

    let details: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    let reason = details
        .reason
        .clone()
        .unwrap_or_else(|| status.as_str().to_string());
    let describe = || match &details.message {
        Some(message) => format!("HTTP {} {}: {}", status.as_u16(), reason, message),
        None => format!("HTTP {} {}", status.as_u16(), reason),
    };

    let error = match status {
        StatusCode::FORBIDDEN if reason == PRIVATE_WAR_LOG => {
            ApiError::NotFound("war log is private".to_string())
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ApiError::Forbidden(describe()),
        StatusCode::BAD_REQUEST | StatusCode::NOT_FOUND => ApiError::NotFound(describe()),
        StatusCode::TOO_MANY_REQUESTS => ApiError::Transient(describe()),
        s if s.is_server_error() => ApiError::Transient(describe()),
        _ => ApiError::Malformed(describe()),
    };
    Some(error)
}

fn classify_transport(error: &reqwest::Error) -> ApiError {
    if error.is_timeout() {
        ApiError::Transient("Request timeout".to_string())
    } else if error.is_connect() {
        ApiError::Transient("Connection refused".to_string())
    } else if error.is_decode() {
        ApiError::Malformed(error.to_string())
    } else {
        ApiError::Transient(error.to_string())
    }
}
