// SPDX-FileCopyrightText: 2026 Ratelane Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Ratelane configuration system.

use figment::Jail;
use ratelane_config::diagnostic::ConfigError;
use ratelane_config::model::RatelaneConfig;
use ratelane_config::{load_and_validate_str, load_config_from_path, load_config_from_str};

/// Valid TOML with every section deserializes successfully.
#[test]
fn valid_toml_deserializes_into_ratelane_config() {
    let toml = r#"
[server]
host = "0.0.0.0"
port = 9000
bearer_token = "secret"
metrics_enabled = false

[storage]
database_path = "/tmp/ratelane-test.db"
wal_mode = false

[gateway]
base_url = "http://gateway:9080"
timeout_secs = 20
default_azure_api_version = "2023-12-01"

[worker]
concurrency = 8
poll_interval_ms = 100
visibility_timeout_secs = 120
task_time_limit_secs = 90
max_attempts = 5
retry_backoff_base_ms = 250
retry_backoff_max_ms = 4000

[aggregator]
poll_interval_ms = 50
claim_lease_secs = 60

[webhook]
timeout_secs = 5

[cache]
message_result_ttl_secs = 60
batch_results_ttl_secs = 120
sweep_interval_secs = 30

[dispatch]
max_batch_size = 10

[logging]
level = "debug"
json = true
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.server.port, 9000);
    assert_eq!(config.server.bearer_token.as_deref(), Some("secret"));
    assert!(!config.server.metrics_enabled);
    assert_eq!(config.storage.database_path, "/tmp/ratelane-test.db");
    assert!(!config.storage.wal_mode);
    assert_eq!(config.gateway.base_url, "http://gateway:9080");
    assert_eq!(config.gateway.timeout_secs, 20);
    assert_eq!(config.worker.concurrency, 8);
    assert_eq!(config.worker.max_attempts, 5);
    assert_eq!(config.aggregator.claim_lease_secs, 60);
    assert_eq!(config.webhook.timeout_secs, 5);
    assert_eq!(config.cache.batch_results_ttl_secs, 120);
    assert_eq!(config.dispatch.max_batch_size, 10);
    assert!(config.logging.json);
    assert!(load_and_validate_str(toml).is_ok());
}

#[test]
fn empty_toml_yields_documented_defaults() {
    let config = load_config_from_str("").unwrap();
    assert_eq!(config.gateway.timeout_secs, 60);
    assert_eq!(config.gateway.default_azure_api_version, "2024-05-01-preview");
    assert_eq!(config.worker.concurrency, 4);
    assert_eq!(config.worker.visibility_timeout_secs, 1860);
    assert_eq!(config.worker.task_time_limit_secs, 1800);
    assert_eq!(config.worker.max_attempts, 3);
    assert_eq!(config.worker.retry_backoff_base_ms, 1000);
    assert_eq!(config.worker.retry_backoff_max_ms, 60_000);
    assert_eq!(config.aggregator.claim_lease_secs, 300);
    assert_eq!(config.webhook.timeout_secs, 30);
    assert_eq!(config.cache.message_result_ttl_secs, 3600);
    assert_eq!(config.cache.batch_results_ttl_secs, 86_400);
    assert_eq!(config.dispatch.max_batch_size, 1000);
    assert!(config.server.bearer_token.is_none());
}

#[test]
fn unknown_field_produces_suggestion() {
    let toml = r#"
[worker]
concurency = 2
"#;

    let errors = load_and_validate_str(toml).unwrap_err();
    let unknown = errors
        .iter()
        .find_map(|e| match e {
            ConfigError::UnknownKey {
                key, suggestion, ..
            } => Some((key.clone(), suggestion.clone())),
            _ => None,
        })
        .expect("should produce an UnknownKey error");
    assert_eq!(unknown.0, "concurency");
    assert_eq!(unknown.1.as_deref(), Some("concurrency"));
}

#[test]
fn unknown_section_is_rejected() {
    let err = load_config_from_str("[redis]\nurl = \"redis://\"\n").unwrap_err();
    assert!(format!("{err}").contains("redis"));
}

#[test]
fn wrong_type_is_reported_with_key() {
    let toml = r#"
[server]
port = "eighty"
"#;
    let errors = load_and_validate_str(toml).unwrap_err();
    assert!(errors.iter().any(|e| matches!(
        e,
        ConfigError::InvalidType { key, .. } if key == "server.port"
    )));
}

#[test]
fn semantic_validation_runs_after_parse() {
    let toml = r#"
[worker]
visibility_timeout_secs = 10
task_time_limit_secs = 30
"#;
    let errors = load_and_validate_str(toml).unwrap_err();
    assert!(
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { .. }))
    );
}

#[test]
fn env_overrides_file_values() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "custom.toml",
            r#"
[gateway]
base_url = "http://from-file:9080"

[worker]
concurrency = 2
"#,
        )?;
        jail.set_env("RATELANE_GATEWAY_BASE_URL", "http://from-env:9080");
        jail.set_env("RATELANE_WORKER_MAX_ATTEMPTS", "7");
        jail.set_env("RATELANE_SERVER_BEARER_TOKEN", "tok");

        let config: RatelaneConfig =
            load_config_from_path(std::path::Path::new("custom.toml"))?;
        assert_eq!(config.gateway.base_url, "http://from-env:9080");
        assert_eq!(config.worker.concurrency, 2);
        assert_eq!(config.worker.max_attempts, 7);
        assert_eq!(config.server.bearer_token.as_deref(), Some("tok"));
        Ok(())
    });
}

#[test]
fn server_debug_redacts_bearer_token() {
    let config = load_config_from_str("[server]\nbearer_token = \"hunter2\"\n").unwrap();
    let debug = format!("{:?}", config.server);
    assert!(!debug.contains("hunter2"));
    assert!(debug.contains("[redacted]"));
}
