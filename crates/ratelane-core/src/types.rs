// SPDX-FileCopyrightText: 2026 Ratelane Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared across adapter traits and the pipeline.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::RatelaneError;

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the role an adapter plays in the pipeline.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AdapterType {
    RecordStore,
    CounterStore,
    Queue,
    Gateway,
}

// --- Lifecycle states ---

/// Lifecycle state of a single message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Pending,
    Processing,
    /// A retryable gateway failure occurred; another attempt is scheduled.
    Retrying,
    Completed,
    Failed,
}

impl MessageStatus {
    /// Terminal states are never left once entered.
    pub fn is_terminal(self) -> bool {
        matches!(self, MessageStatus::Completed | MessageStatus::Failed)
    }
}

/// Whether a terminal message's response has reached its batch's counter.
///
/// `Owed` is set together with the terminal write and cleared once the
/// increment has landed, so a redelivered task can finish a count that an
/// earlier delivery started but did not complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum ResponseTally {
    /// The message is open or ended without counting (a preflight failure).
    NotOwed,
    Owed,
    Counted,
}

/// Lifecycle state of a batch.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Processing,
    Completed,
}

/// Outcome of the most recent webhook delivery for a batch.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum WebhookStatus {
    Pending,
    Success,
    Failed,
}

// --- Records ---

/// A logical routing target for messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Queue {
    pub queue_id: String,
    pub created_at: String,
}

/// Well-known provider settings plus a passthrough map for anything else.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Model name sent with every chat request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// API version header value (Azure-style providers).
    #[serde(
        default,
        alias = "azure_api_version",
        skip_serializing_if = "Option::is_none"
    )]
    pub api_version: Option<String>,

    /// Provider-specific keys, stored and returned untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ProviderConfig {
    /// Rejects present-but-blank well-known fields.
    pub fn validate(&self) -> Result<(), RatelaneError> {
        if self.model.as_deref().is_some_and(|m| m.trim().is_empty()) {
            return Err(RatelaneError::Validation(
                "provider config `model` must not be empty".into(),
            ));
        }
        if self
            .api_version
            .as_deref()
            .is_some_and(|v| v.trim().is_empty())
        {
            return Err(RatelaneError::Validation(
                "provider config `api_version` must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// An upstream AI service configuration attached to a queue.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Provider {
    pub provider_id: String,
    pub queue_id: String,
    pub provider_name: String,
    pub provider_type: String,
    pub api_key: String,
    /// Requests allowed per `time_window`; enforced by the gateway.
    pub limit: u32,
    /// Rate-limit window in seconds.
    pub time_window: u64,
    pub config: ProviderConfig,
    pub created_at: String,
}

impl Provider {
    pub fn is_azure(&self) -> bool {
        self.provider_type.eq_ignore_ascii_case("azure")
    }
}

impl std::fmt::Debug for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Provider")
            .field("provider_id", &self.provider_id)
            .field("queue_id", &self.queue_id)
            .field("provider_name", &self.provider_name)
            .field("provider_type", &self.provider_type)
            .field("api_key", &"[redacted]")
            .field("limit", &self.limit)
            .field("time_window", &self.time_window)
            .field("config", &self.config)
            .finish()
    }
}

/// Provider registration input.
#[derive(Clone, Deserialize)]
pub struct NewProvider {
    pub provider_name: String,
    pub provider_type: String,
    pub api_key: String,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default = "default_time_window")]
    pub time_window: u64,
    #[serde(default)]
    pub config: ProviderConfig,
}

fn default_limit() -> u32 {
    1000
}

fn default_time_window() -> u64 {
    3600
}

/// One prompt/response unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub message_id: String,
    pub batch_id: Option<String>,
    pub queue_id: String,
    pub provider_id: Option<String>,
    pub status: MessageStatus,
    pub prompt: String,
    pub system_prompt: Option<String>,
    pub supportive_variable: serde_json::Value,
    pub result: Option<String>,
    pub error_message: Option<String>,
    /// Processing attempts started so far.
    pub attempts: u32,
    pub created_at: String,
    pub updated_at: String,
}

/// Caller input for one message.
#[derive(Debug, Clone, Deserialize)]
pub struct NewMessage {
    pub prompt: String,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub supportive_variable: Option<serde_json::Value>,
}

/// A group of messages tracked to completion as a unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    pub batch_id: String,
    pub request_count: u32,
    pub response_count: u32,
    pub webhook_url: Option<String>,
    pub webhook_event: Option<String>,
    pub webhook_status: WebhookStatus,
    pub webhook_last_called_at: Option<String>,
    pub status: BatchStatus,
    pub created_at: String,
    pub updated_at: String,
}

impl Batch {
    /// Share of requests answered, in percent.
    pub fn completion_percentage(&self) -> f64 {
        if self.request_count == 0 {
            return 0.0;
        }
        f64::from(self.response_count) / f64::from(self.request_count) * 100.0
    }
}

/// Everything needed to insert a batch and its messages in one go.
#[derive(Debug, Clone)]
pub struct NewBatch {
    pub batch_id: String,
    pub queue_id: String,
    pub webhook_url: Option<String>,
    pub webhook_event: Option<String>,
    /// `(message_id, input)` pairs in submission order.
    pub messages: Vec<(String, NewMessage)>,
}

/// Result of trying to move a message into `processing`.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageClaim {
    /// The message is now `processing`; carries the updated record.
    Claimed(Message),
    /// The message already reached a terminal state.
    AlreadyTerminal {
        status: MessageStatus,
        batch_id: Option<String>,
        tally: ResponseTally,
    },
    NotFound,
}

/// A durable queue entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub id: i64,
    pub queue_name: String,
    pub payload: String,
    pub status: String,
    pub attempts: i32,
    pub max_attempts: i32,
    pub available_at: String,
    pub created_at: String,
    pub updated_at: String,
    pub locked_until: Option<String>,
}

// --- Gateway ---

/// Chat message role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// One turn of a chat request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

/// A normalized chat request, independent of the upstream wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: Option<String>,
    pub messages: Vec<ChatMessage>,
}

impl ChatRequest {
    /// Builds a request with the system prompt (if any) ahead of the user prompt.
    pub fn from_prompts(model: Option<String>, system_prompt: Option<&str>, prompt: &str) -> Self {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system_prompt.filter(|s| !s.is_empty()) {
            messages.push(ChatMessage {
                role: ChatRole::System,
                content: system.to_string(),
            });
        }
        messages.push(ChatMessage {
            role: ChatRole::User,
            content: prompt.to_string(),
        });
        Self { model, messages }
    }
}

/// Normalized gateway response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayResponse {
    pub content: String,
    #[serde(default)]
    pub usage: serde_json::Value,
    #[serde(default)]
    pub model: String,
    /// Provider type that served the request.
    pub provider: String,
}

// --- Aggregation ---

/// Per-batch counters as held in the counter store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchCounters {
    pub request_count: i64,
    pub response_count: i64,
}

/// Aggregated outcome for one message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub message_id: String,
    pub status: MessageStatus,
    pub prompt: String,
    pub result: Option<String>,
    pub error_message: Option<String>,
}

impl From<&Message> for ResultRecord {
    fn from(message: &Message) -> Self {
        Self {
            message_id: message.message_id.clone(),
            status: message.status,
            prompt: message.prompt.clone(),
            result: message.result.clone(),
            error_message: message.error_message.clone(),
        }
    }
}

/// Aggregated result set for a completed batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResults {
    pub batch_id: String,
    pub status: BatchStatus,
    pub request_count: u32,
    pub response_count: u32,
    pub results: Vec<ResultRecord>,
    pub completed_at: String,
}

/// Event name carried by completion signals.
pub const BATCH_COMPLETE_EVENT: &str = "batch_complete";

/// Notification that a batch's response count reached its request count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionSignal {
    pub batch_id: String,
    pub event: String,
}

impl CompletionSignal {
    pub fn batch_complete(batch_id: impl Into<String>) -> Self {
        Self {
            batch_id: batch_id.into(),
            event: BATCH_COMPLETE_EVENT.to_string(),
        }
    }
}

/// Payload of a processing task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessTask {
    pub message_id: String,
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn message_status_round_trips_through_strings() {
        for status in [
            MessageStatus::Pending,
            MessageStatus::Processing,
            MessageStatus::Retrying,
            MessageStatus::Completed,
            MessageStatus::Failed,
        ] {
            let s = status.to_string();
            assert_eq!(MessageStatus::from_str(&s).unwrap(), status);
            assert_eq!(serde_json::to_string(&status).unwrap(), format!("\"{s}\""));
        }
        assert_eq!(MessageStatus::Retrying.to_string(), "retrying");
    }

    #[test]
    fn only_completed_and_failed_are_terminal() {
        assert!(MessageStatus::Completed.is_terminal());
        assert!(MessageStatus::Failed.is_terminal());
        assert!(!MessageStatus::Pending.is_terminal());
        assert!(!MessageStatus::Processing.is_terminal());
        assert!(!MessageStatus::Retrying.is_terminal());
    }

    #[test]
    fn provider_config_accepts_legacy_api_version_key() {
        let config: ProviderConfig = serde_json::from_value(serde_json::json!({
            "model": "gpt-4o",
            "azure_api_version": "2024-05-01-preview",
            "deployment": "eastus"
        }))
        .unwrap();
        assert_eq!(config.model.as_deref(), Some("gpt-4o"));
        assert_eq!(config.api_version.as_deref(), Some("2024-05-01-preview"));
        assert_eq!(config.extra.get("deployment").unwrap(), "eastus");
    }

    #[test]
    fn provider_config_rejects_blank_model() {
        let config = ProviderConfig {
            model: Some("  ".into()),
            ..ProviderConfig::default()
        };
        assert!(config.validate().is_err());
        assert!(ProviderConfig::default().validate().is_ok());
    }

    #[test]
    fn provider_debug_redacts_api_key() {
        let provider = Provider {
            provider_id: "p1".into(),
            queue_id: "q1".into(),
            provider_name: "primary".into(),
            provider_type: "azure".into(),
            api_key: "sk-secret".into(),
            limit: 10,
            time_window: 60,
            config: ProviderConfig::default(),
            created_at: "2026-01-01T00:00:00.000Z".into(),
        };
        let debug = format!("{provider:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(provider.is_azure());
    }

    #[test]
    fn chat_request_orders_system_before_user() {
        let req = ChatRequest::from_prompts(Some("m".into()), Some("be brief"), "hello");
        assert_eq!(req.messages.len(), 2);
        assert_eq!(req.messages[0].role, ChatRole::System);
        assert_eq!(req.messages[0].content, "be brief");
        assert_eq!(req.messages[1].role, ChatRole::User);

        let req = ChatRequest::from_prompts(None, None, "hello");
        assert_eq!(req.messages.len(), 1);
        assert_eq!(req.messages[0].role, ChatRole::User);
    }

    #[test]
    fn completion_percentage_handles_empty_batch() {
        let mut batch = Batch {
            batch_id: "b".into(),
            request_count: 0,
            response_count: 0,
            webhook_url: None,
            webhook_event: None,
            webhook_status: WebhookStatus::Pending,
            webhook_last_called_at: None,
            status: BatchStatus::Processing,
            created_at: String::new(),
            updated_at: String::new(),
        };
        assert_eq!(batch.completion_percentage(), 0.0);
        batch.request_count = 4;
        batch.response_count = 1;
        assert_eq!(batch.completion_percentage(), 25.0);
    }

    #[test]
    fn completion_signal_serializes_to_wire_shape() {
        let signal = CompletionSignal::batch_complete("b-1");
        let json = serde_json::to_value(&signal).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"batch_id": "b-1", "event": "batch_complete"})
        );
    }
}
