// SPDX-FileCopyrightText: 2026 Ratelane Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock gateway client for deterministic testing.
//!
//! `MockGateway` implements `GatewayClient` with scripted replies, so
//! processing tests never touch the network.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use ratelane_core::types::{ChatRequest, GatewayResponse, Provider};
use ratelane_core::{Adapter, AdapterType, GatewayClient, HealthStatus, RatelaneError};

/// One scripted gateway outcome.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Respond successfully with this content.
    Content(String),
    /// Fail with a gateway error carrying this HTTP status.
    Status(u16),
    /// Fail as if the gateway could not be reached.
    Unreachable,
}

/// A call the mock received.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub provider_id: String,
    pub request: ChatRequest,
}

/// A gateway client that replays scripted replies.
///
/// Replies are popped from a FIFO queue. When the queue is empty the mock
/// answers with `"mock response"`.
#[derive(Clone, Default)]
pub struct MockGateway {
    replies: Arc<Mutex<VecDeque<MockReply>>>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
    delay: Option<Duration>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock pre-loaded with the given replies.
    pub fn with_replies(replies: Vec<MockReply>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(VecDeque::from(replies))),
            ..Self::default()
        }
    }

    /// Sleep this long before every reply.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Append a reply to the script.
    pub async fn push_reply(&self, reply: MockReply) {
        self.replies.lock().await.push_back(reply);
    }

    /// Every call received so far.
    pub async fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.calls.lock().await.len()
    }
}

#[async_trait]
impl Adapter for MockGateway {
    fn name(&self) -> &str {
        "mock-gateway"
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Gateway
    }

    async fn health_check(&self) -> Result<HealthStatus, RatelaneError> {
        Ok(HealthStatus::Healthy)
    }
}

#[async_trait]
impl GatewayClient for MockGateway {
    async fn send_request(
        &self,
        provider: &Provider,
        request: &ChatRequest,
    ) -> Result<GatewayResponse, RatelaneError> {
        self.calls.lock().await.push(RecordedCall {
            provider_id: provider.provider_id.clone(),
            request: request.clone(),
        });
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let reply = self
            .replies
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| MockReply::Content("mock response".to_string()));
        match reply {
            MockReply::Content(content) => Ok(GatewayResponse {
                content,
                usage: serde_json::json!({"prompt_tokens": 10, "completion_tokens": 20}),
                model: request.model.clone().unwrap_or_else(|| "mock-model".to_string()),
                provider: provider.provider_type.clone(),
            }),
            MockReply::Status(code) => Err(RatelaneError::Gateway {
                message: format!("gateway request failed: {code} - mock failure"),
                status: Some(code),
                source: None,
            }),
            MockReply::Unreachable => Err(RatelaneError::Gateway {
                message: "request to gateway failed: connection refused".to_string(),
                status: None,
                source: None,
            }),
        }
    }
}
