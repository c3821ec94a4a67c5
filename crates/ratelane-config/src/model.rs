// SPDX-FileCopyrightText: 2026 Ratelane Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Ratelane dispatch pipeline.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level Ratelane configuration.
///
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RatelaneConfig {
    /// HTTP API settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// SQLite storage settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Upstream gateway settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Processing worker pool settings.
    #[serde(default)]
    pub worker: WorkerConfig,

    /// Batch aggregator settings.
    #[serde(default)]
    pub aggregator: AggregatorConfig,

    /// Webhook notifier settings.
    #[serde(default)]
    pub webhook: WebhookConfig,

    /// Counter store result cache settings.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Dispatcher limits.
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Log output settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP API configuration.
#[derive(Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Bearer token required on non-public routes. `None` leaves the API open.
    #[serde(default)]
    pub bearer_token: Option<String>,

    /// Expose Prometheus metrics at `/metrics`.
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field(
                "bearer_token",
                &self.bearer_token.as_ref().map(|_| "[redacted]"),
            )
            .field("metrics_enabled", &self.metrics_enabled)
            .finish()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            bearer_token: None,
            metrics_enabled: true,
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8501
}

fn default_true() -> bool {
    true
}

/// SQLite storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_true")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: true,
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("ratelane").join("ratelane.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("ratelane.db"))
        .to_string_lossy()
        .into_owned()
}

/// Upstream gateway configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Base URL of the rate-limiting gateway; `/v1/chat/completions` is appended.
    #[serde(default = "default_gateway_url")]
    pub base_url: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_gateway_timeout")]
    pub timeout_secs: u64,

    /// `api-version` sent to azure providers lacking one in their config.
    #[serde(default = "default_azure_api_version")]
    pub default_azure_api_version: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: default_gateway_url(),
            timeout_secs: default_gateway_timeout(),
            default_azure_api_version: default_azure_api_version(),
        }
    }
}

impl GatewayConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_gateway_url() -> String {
    "http://127.0.0.1:9080".to_string()
}

fn default_gateway_timeout() -> u64 {
    60
}

fn default_azure_api_version() -> String {
    "2024-05-01-preview".to_string()
}

/// Processing worker pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WorkerConfig {
    /// Number of concurrent processing loops.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Idle poll interval when the task queue is empty.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// How long a dequeued task stays locked before it is redelivered.
    #[serde(default = "default_visibility_timeout")]
    pub visibility_timeout_secs: u64,

    /// Hard bound on one processing attempt.
    #[serde(default = "default_task_time_limit")]
    pub task_time_limit_secs: u64,

    /// Processing attempts before a retryable failure becomes terminal.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_backoff_base_ms")]
    pub retry_backoff_base_ms: u64,

    #[serde(default = "default_backoff_max_ms")]
    pub retry_backoff_max_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            poll_interval_ms: default_poll_interval_ms(),
            visibility_timeout_secs: default_visibility_timeout(),
            task_time_limit_secs: default_task_time_limit(),
            max_attempts: default_max_attempts(),
            retry_backoff_base_ms: default_backoff_base_ms(),
            retry_backoff_max_ms: default_backoff_max_ms(),
        }
    }
}

impl WorkerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn visibility_timeout(&self) -> Duration {
        Duration::from_secs(self.visibility_timeout_secs)
    }

    pub fn task_time_limit(&self) -> Duration {
        Duration::from_secs(self.task_time_limit_secs)
    }
}

fn default_concurrency() -> usize {
    4
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_visibility_timeout() -> u64 {
    1860
}

fn default_task_time_limit() -> u64 {
    1800
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    1000
}

fn default_backoff_max_ms() -> u64 {
    60_000
}

/// Batch aggregator configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AggregatorConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Age after which another aggregator may re-take an unfinished claim.
    #[serde(default = "default_claim_lease")]
    pub claim_lease_secs: u64,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            claim_lease_secs: default_claim_lease(),
        }
    }
}

impl AggregatorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn claim_lease(&self) -> Duration {
        Duration::from_secs(self.claim_lease_secs)
    }
}

fn default_claim_lease() -> u64 {
    300
}

/// Webhook notifier configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WebhookConfig {
    #[serde(default = "default_webhook_timeout")]
    pub timeout_secs: u64,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_webhook_timeout(),
        }
    }
}

impl WebhookConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_webhook_timeout() -> u64 {
    30
}

/// Result cache lifetimes in the counter store.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    #[serde(default = "default_message_ttl")]
    pub message_result_ttl_secs: u64,

    #[serde(default = "default_batch_ttl")]
    pub batch_results_ttl_secs: u64,

    /// How often expired entries are purged.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            message_result_ttl_secs: default_message_ttl(),
            batch_results_ttl_secs: default_batch_ttl(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

impl CacheConfig {
    pub fn message_result_ttl(&self) -> Duration {
        Duration::from_secs(self.message_result_ttl_secs)
    }

    pub fn batch_results_ttl(&self) -> Duration {
        Duration::from_secs(self.batch_results_ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

fn default_message_ttl() -> u64 {
    3600
}

fn default_batch_ttl() -> u64 {
    86_400
}

fn default_sweep_interval() -> u64 {
    3600
}

/// Dispatcher limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DispatchConfig {
    /// Largest accepted batch submission.
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_batch_size: default_max_batch_size(),
        }
    }
}

fn default_max_batch_size() -> usize {
    1000
}

/// Log output configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Level for `ratelane` targets (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
