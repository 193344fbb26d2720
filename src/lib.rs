//! Clan War Archiver: war discovery and archival for clan tags
//!
//! This crate walks the clan tag space of an external game-data API, archives
//! every finished war it can see, follows opponent tags found in those wars,
//! and watches one tracked clan's live war to notify members before it starts.

pub mod api;
pub mod config;
pub mod crawler;
pub mod monitor;
pub mod notify;
pub mod output;
pub mod state;
pub mod storage;
pub mod tag;
pub mod war;

use thiserror::Error;

/// Main error type for archiver operations
#[derive(Debug, Error)]
pub enum ArchiverError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Tag error: {0}")]
    Tag(#[from] TagError),

    #[error("API error: {0}")]
    Api(#[from] api::ApiError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Normalization error: {0}")]
    Normalize(#[from] war::NormalizeError),

    #[error("Notification error: {0}")]
    Notify(#[from] notify::NotifyError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Task failed: {0}")]
    Task(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ArchiverError {
    /// Returns true if this error must halt the whole crawl
    ///
    /// Only credential or IP-block responses from the API qualify: every
    /// further request would burn rate budget against a failing endpoint.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Api(api::ApiError::Forbidden(_)))
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid tag in config: {0}")]
    InvalidTag(String),
}

/// Tag-specific errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TagError {
    #[error("Tag is empty")]
    Empty,

    #[error("Tag '{tag}' has {len} symbols, expected {min}-{max}")]
    Length {
        tag: String,
        len: usize,
        min: usize,
        max: usize,
    },

    #[error("Tag '{tag}' contains invalid symbol '{symbol}'")]
    InvalidSymbol { tag: String, symbol: char },

    #[error("Invalid enumerator bounds: min {min}, max {max}")]
    Bounds { min: usize, max: usize },
}

/// Result type alias for archiver operations
pub type Result<T> = std::result::Result<T, ArchiverError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for tag operations
pub type TagResult<T> = std::result::Result<T, TagError>;

// Re-export commonly used types
pub use config::Config;
pub use state::{CandidateStatus, LiveWarSession, MonitorState};
pub use tag::{ClanTag, TagEnumerator};
pub use war::{AttackRecord, WarRecord, WarResult};
