// SPDX-FileCopyrightText: 2026 Ratelane Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Checks semantic constraints that serde attributes cannot express, such as
//! non-empty paths, parseable URLs, positive timeouts and the ordering
//! between the visibility timeout and the task time limit.

use crate::diagnostic::ConfigError;
use crate::model::RatelaneConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Collects every failure instead of stopping at the first one.
pub fn validate_config(config: &RatelaneConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    let host = config.server.host.trim();
    if host.is_empty() {
        fail("server.host must not be empty".to_string());
    } else if host.parse::<std::net::IpAddr>().is_err()
        && !host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-')
    {
        fail(format!(
            "server.host `{host}` is not a valid IP address or hostname"
        ));
    }

    if config
        .server
        .bearer_token
        .as_deref()
        .is_some_and(|t| t.trim().is_empty())
    {
        fail("server.bearer_token must not be empty when set".to_string());
    }

    if config.storage.database_path.trim().is_empty() {
        fail("storage.database_path must not be empty".to_string());
    }

    let base_url = config.gateway.base_url.trim();
    if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
        fail(format!(
            "gateway.base_url must be an http(s) URL, got `{base_url}`"
        ));
    }
    if config.gateway.default_azure_api_version.trim().is_empty() {
        fail("gateway.default_azure_api_version must not be empty".to_string());
    }

    for (name, value) in [
        ("gateway.timeout_secs", config.gateway.timeout_secs),
        ("worker.poll_interval_ms", config.worker.poll_interval_ms),
        (
            "worker.task_time_limit_secs",
            config.worker.task_time_limit_secs,
        ),
        (
            "worker.retry_backoff_base_ms",
            config.worker.retry_backoff_base_ms,
        ),
        ("aggregator.poll_interval_ms", config.aggregator.poll_interval_ms),
        ("aggregator.claim_lease_secs", config.aggregator.claim_lease_secs),
        ("webhook.timeout_secs", config.webhook.timeout_secs),
        (
            "cache.message_result_ttl_secs",
            config.cache.message_result_ttl_secs,
        ),
        (
            "cache.batch_results_ttl_secs",
            config.cache.batch_results_ttl_secs,
        ),
        ("cache.sweep_interval_secs", config.cache.sweep_interval_secs),
    ] {
        if value == 0 {
            fail(format!("{name} must be greater than 0"));
        }
    }

    if config.worker.concurrency == 0 {
        fail("worker.concurrency must be at least 1".to_string());
    }
    if config.worker.max_attempts == 0 {
        fail("worker.max_attempts must be at least 1".to_string());
    }
    if config.dispatch.max_batch_size == 0 {
        fail("dispatch.max_batch_size must be at least 1".to_string());
    }

    // A lock shorter than the time limit would redeliver tasks that are still running.
    if config.worker.visibility_timeout_secs <= config.worker.task_time_limit_secs {
        fail(format!(
            "worker.visibility_timeout_secs ({}) must be greater than worker.task_time_limit_secs ({})",
            config.worker.visibility_timeout_secs, config.worker.task_time_limit_secs
        ));
    }

    if config.worker.retry_backoff_base_ms > config.worker.retry_backoff_max_ms {
        fail(format!(
            "worker.retry_backoff_base_ms ({}) must not exceed worker.retry_backoff_max_ms ({})",
            config.worker.retry_backoff_base_ms, config.worker.retry_backoff_max_ms
        ));
    }

    if !matches!(
        config.logging.level.as_str(),
        "trace" | "debug" | "info" | "warn" | "error"
    ) {
        fail(format!(
            "logging.level must be one of trace, debug, info, warn, error; got `{}`",
            config.logging.level
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn messages(config: &RatelaneConfig) -> Vec<String> {
        validate_config(config)
            .unwrap_err()
            .into_iter()
            .map(|e| e.to_string())
            .collect()
    }

    #[test]
    fn default_config_validates() {
        assert!(validate_config(&RatelaneConfig::default()).is_ok());
    }

    #[test]
    fn empty_database_path_fails_validation() {
        let mut config = RatelaneConfig::default();
        config.storage.database_path = "  ".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(|e| matches!(
            e,
            ConfigError::Validation { message } if message.contains("database_path")
        )));
    }

    #[test]
    fn visibility_timeout_must_exceed_task_limit() {
        let mut config = RatelaneConfig::default();
        config.worker.visibility_timeout_secs = 600;
        config.worker.task_time_limit_secs = 600;
        let msgs = messages(&config);
        assert!(msgs.iter().any(|m| m.contains("visibility_timeout_secs")));
    }

    #[test]
    fn backoff_base_above_max_fails() {
        let mut config = RatelaneConfig::default();
        config.worker.retry_backoff_base_ms = 5000;
        config.worker.retry_backoff_max_ms = 1000;
        let msgs = messages(&config);
        assert!(msgs.iter().any(|m| m.contains("retry_backoff_base_ms")));
    }

    #[test]
    fn all_errors_are_collected() {
        let mut config = RatelaneConfig::default();
        config.worker.concurrency = 0;
        config.webhook.timeout_secs = 0;
        config.gateway.base_url = "ftp://nope".to_string();
        let msgs = messages(&config);
        assert_eq!(msgs.len(), 3, "got: {msgs:?}");
    }

    #[test]
    fn unknown_log_level_fails() {
        let mut config = RatelaneConfig::default();
        config.logging.level = "loud".to_string();
        assert!(messages(&config).iter().any(|m| m.contains("logging.level")));
    }
}
