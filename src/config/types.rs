use serde::Deserialize;

/// Main configuration structure for the archiver
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub monitor: Option<MonitorConfig>,
    #[serde(default)]
    pub notify: NotifyConfig,
    pub output: OutputConfig,
}

/// Game-data API access and request pacing
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the API (e.g., "https://api.clashofclans.com/v1")
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Bearer token issued by the API
    pub token: String,

    /// Per-request timeout (seconds)
    #[serde(rename = "timeout-secs", default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Requests allowed per window across all workers and the monitor
    #[serde(rename = "requests-per-window", default = "default_requests_per_window")]
    pub requests_per_window: u32,

    /// Length of the rate-limit window (seconds)
    #[serde(rename = "window-secs", default = "default_window_secs")]
    pub window_secs: u64,
}

/// Crawl behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Number of concurrent workers
    pub workers: usize,

    /// Capacity of the in-memory work queue
    #[serde(rename = "queue-capacity")]
    pub queue_capacity: usize,

    /// Fewest tag body symbols the enumerator emits
    #[serde(rename = "min-length", default = "default_min_length")]
    pub min_length: usize,

    /// Most tag body symbols the enumerator emits
    #[serde(rename = "max-length", default = "default_max_length")]
    pub max_length: usize,

    /// Tags enqueued before brute-force enumeration starts
    #[serde(rename = "seed-tags", default)]
    pub seed_tags: Vec<String>,

    /// Pause while waiting for workers once enumeration is exhausted (milliseconds)
    #[serde(rename = "idle-poll-ms", default = "default_idle_poll_ms")]
    pub idle_poll_ms: u64,

    /// Transient failures tolerated per tag before it is marked failed
    #[serde(rename = "max-transient-attempts", default = "default_max_transient_attempts")]
    pub max_transient_attempts: u32,

    /// Delay before the first retry of a transiently failed tag; doubles per attempt (milliseconds)
    #[serde(rename = "retry-backoff-ms", default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Upper bound on the retry delay (milliseconds)
    #[serde(rename = "retry-backoff-max-ms", default = "default_retry_backoff_max_ms")]
    pub retry_backoff_max_ms: u64,

    /// Log crawl progress every N finished tags
    #[serde(rename = "progress-every", default = "default_progress_every")]
    pub progress_every: usize,
}

/// Live war monitor configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    /// Tag of the clan whose current war is tracked
    #[serde(rename = "clan-tag")]
    pub clan_tag: String,

    /// Time between polls (seconds)
    #[serde(rename = "poll-interval-secs", default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// How far ahead of the war start members are notified (minutes)
    #[serde(rename = "lead-window-minutes", default = "default_lead_window_minutes")]
    pub lead_window_minutes: i64,

    /// Who receives war-start notifications
    #[serde(default)]
    pub recipients: Vec<String>,
}

/// Notification delivery configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotifyConfig {
    /// Webhook receiving one POST per recipient; notifications are only logged when absent
    #[serde(rename = "webhook-url", default)]
    pub webhook_url: Option<String>,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_requests_per_window() -> u32 {
    30
}

fn default_window_secs() -> u64 {
    1
}

fn default_min_length() -> usize {
    crate::tag::MIN_BODY_LEN
}

fn default_max_length() -> usize {
    crate::tag::MAX_BODY_LEN
}

fn default_idle_poll_ms() -> u64 {
    500
}

fn default_max_transient_attempts() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    30_000
}

fn default_retry_backoff_max_ms() -> u64 {
    30 * 60 * 1000
}

fn default_progress_every() -> usize {
    50
}

fn default_poll_interval_secs() -> u64 {
    300
}

fn default_lead_window_minutes() -> i64 {
    60
}
