use crate::config::types::{
    ApiConfig, Config, CrawlerConfig, MonitorConfig, NotifyConfig, OutputConfig,
};
use crate::tag::{ClanTag, MAX_BODY_LEN, MIN_BODY_LEN};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_api_config(&config.api)?;
    validate_crawler_config(&config.crawler)?;
    if let Some(monitor) = &config.monitor {
        validate_monitor_config(monitor)?;
    }
    validate_notify_config(&config.notify)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates API configuration
fn validate_api_config(config: &ApiConfig) -> Result<(), ConfigError> {
    validate_http_url("base-url", &config.base_url)?;

    if config.token.trim().is_empty() {
        return Err(ConfigError::Validation("token cannot be empty".to_string()));
    }

    if config.timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "timeout-secs must be >= 1".to_string(),
        ));
    }

    if config.requests_per_window == 0 {
        return Err(ConfigError::Validation(
            "requests-per-window must be >= 1".to_string(),
        ));
    }

    if config.window_secs == 0 {
        return Err(ConfigError::Validation(
            "window-secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.workers < 1 || config.workers > 64 {
        return Err(ConfigError::Validation(format!(
            "workers must be between 1 and 64, got {}",
            config.workers
        )));
    }

    if config.queue_capacity < config.workers {
        return Err(ConfigError::Validation(format!(
            "queue-capacity must be >= workers ({}), got {}",
            config.workers, config.queue_capacity
        )));
    }

    let bounds = MIN_BODY_LEN..=MAX_BODY_LEN;
    if !bounds.contains(&config.min_length) || !bounds.contains(&config.max_length) {
        return Err(ConfigError::Validation(format!(
            "min-length and max-length must be between {} and {}, got {} and {}",
            MIN_BODY_LEN, MAX_BODY_LEN, config.min_length, config.max_length
        )));
    }

    if config.min_length > config.max_length {
        return Err(ConfigError::Validation(format!(
            "min-length ({}) cannot exceed max-length ({})",
            config.min_length, config.max_length
        )));
    }

    for seed in &config.seed_tags {
        ClanTag::parse(seed)
            .map_err(|e| ConfigError::InvalidTag(format!("Invalid seed tag '{}': {}", seed, e)))?;
    }

    if config.max_transient_attempts == 0 {
        return Err(ConfigError::Validation(
            "max-transient-attempts must be >= 1".to_string(),
        ));
    }

    if config.retry_backoff_ms < 100 {
        return Err(ConfigError::Validation(format!(
            "retry-backoff-ms must be >= 100, got {}",
            config.retry_backoff_ms
        )));
    }

    if config.retry_backoff_max_ms < config.retry_backoff_ms {
        return Err(ConfigError::Validation(format!(
            "retry-backoff-max-ms ({}) cannot be below retry-backoff-ms ({})",
            config.retry_backoff_max_ms, config.retry_backoff_ms
        )));
    }

    if config.progress_every == 0 {
        return Err(ConfigError::Validation(
            "progress-every must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates live monitor configuration
fn validate_monitor_config(config: &MonitorConfig) -> Result<(), ConfigError> {
    ClanTag::parse(&config.clan_tag).map_err(|e| {
        ConfigError::InvalidTag(format!("Invalid clan-tag '{}': {}", config.clan_tag, e))
    })?;

    if config.poll_interval_secs < 10 {
        return Err(ConfigError::Validation(format!(
            "poll-interval-secs must be >= 10, got {}",
            config.poll_interval_secs
        )));
    }

    if config.lead_window_minutes < 1 {
        return Err(ConfigError::Validation(format!(
            "lead-window-minutes must be >= 1, got {}",
            config.lead_window_minutes
        )));
    }

    if config.recipients.iter().any(|r| r.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "recipients cannot contain empty entries".to_string(),
        ));
    }

    Ok(())
}

/// Validates notification configuration
fn validate_notify_config(config: &NotifyConfig) -> Result<(), ConfigError> {
    if let Some(webhook) = &config.webhook_url {
        validate_http_url("webhook-url", webhook)?;
    }
    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// Validates that a value is an absolute HTTP(S) URL
fn validate_http_url(field: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", field, value, e)))?;

    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} '{}' must use HTTP or HTTPS",
            field, value
        )));
    }

    if url.cannot_be_a_base() {
        return Err(ConfigError::InvalidUrl(format!(
            "{} '{}' cannot carry a path",
            field, value
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn crawler() -> CrawlerConfig {
        CrawlerConfig {
            workers: 4,
            queue_capacity: 16,
            min_length: 7,
            max_length: 9,
            seed_tags: vec!["#2PP2PQ9L".to_string()],
            idle_poll_ms: 500,
            max_transient_attempts: 3,
            retry_backoff_ms: 30_000,
            retry_backoff_max_ms: 1_800_000,
            progress_every: 50,
        }
    }

    #[test]
    fn test_validate_crawler_config() {
        assert!(validate_crawler_config(&crawler()).is_ok());

        let mut config = crawler();
        config.workers = 0;
        assert!(validate_crawler_config(&config).is_err());

        let mut config = crawler();
        config.queue_capacity = 2;
        assert!(validate_crawler_config(&config).is_err());

        let mut config = crawler();
        config.min_length = 9;
        config.max_length = 8;
        assert!(validate_crawler_config(&config).is_err());

        let mut config = crawler();
        config.max_length = 12;
        assert!(validate_crawler_config(&config).is_err());

        let mut config = crawler();
        config.retry_backoff_ms = 0;
        assert!(validate_crawler_config(&config).is_err());

        let mut config = crawler();
        config.retry_backoff_max_ms = 1_000;
        assert!(validate_crawler_config(&config).is_err());

        let mut config = crawler();
        config.seed_tags = vec!["#NOPE".to_string()];
        assert!(matches!(
            validate_crawler_config(&config),
            Err(ConfigError::InvalidTag(_))
        ));
    }

    #[test]
    fn test_validate_http_url() {
        assert!(validate_http_url("base-url", "https://api.example.com/v1").is_ok());
        assert!(validate_http_url("base-url", "http://127.0.0.1:8080").is_ok());

        assert!(validate_http_url("base-url", "").is_err());
        assert!(validate_http_url("base-url", "ftp://example.com").is_err());
        assert!(validate_http_url("base-url", "mailto:x@example.com").is_err());
    }

    #[test]
    fn test_validate_monitor_config() {
        let mut config = MonitorConfig {
            clan_tag: "#2PP2PQ9L".to_string(),
            poll_interval_secs: 300,
            lead_window_minutes: 60,
            recipients: vec!["@leader".to_string()],
        };
        assert!(validate_monitor_config(&config).is_ok());

        config.poll_interval_secs = 1;
        assert!(validate_monitor_config(&config).is_err());

        config.poll_interval_secs = 300;
        config.clan_tag = "bad".to_string();
        assert!(validate_monitor_config(&config).is_err());
    }
}
