// SPDX-FileCopyrightText: 2026 Ratelane Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed producers for the two durable queues the pipeline uses.

use std::sync::Arc;
use std::time::Duration;

use ratelane_core::types::{CompletionSignal, ProcessTask};
use ratelane_core::{DurableQueue, RatelaneError};
use tracing::debug;

/// Queue carrying one processing task per message.
pub const PROCESS_MESSAGE_QUEUE: &str = "process_message";

/// Queue carrying batch completion signals to the aggregator.
pub const BATCH_AGGREGATOR_QUEUE: &str = "batch_aggregator";

/// Schedules processing tasks on [`PROCESS_MESSAGE_QUEUE`].
#[derive(Clone)]
pub struct TaskScheduler {
    queue: Arc<dyn DurableQueue>,
}

impl TaskScheduler {
    pub fn new(queue: Arc<dyn DurableQueue>) -> Self {
        Self { queue }
    }

    /// Schedule processing of `message_id` after `delay`.
    pub async fn schedule(&self, message_id: &str, delay: Duration) -> Result<i64, RatelaneError> {
        let payload = serde_json::to_string(&ProcessTask {
            message_id: message_id.to_string(),
        })
        .map_err(|e| RatelaneError::Internal(format!("failed to encode task: {e}")))?;
        let id = self
            .queue
            .enqueue(PROCESS_MESSAGE_QUEUE, &payload, delay)
            .await?;
        debug!(message_id, entry_id = id, delay_ms = delay.as_millis() as u64, "task scheduled");
        Ok(id)
    }
}

/// Publishes completion signals on [`BATCH_AGGREGATOR_QUEUE`].
#[derive(Clone)]
pub struct CompletionChannel {
    queue: Arc<dyn DurableQueue>,
}

impl CompletionChannel {
    pub fn new(queue: Arc<dyn DurableQueue>) -> Self {
        Self { queue }
    }

    pub async fn publish(&self, batch_id: &str) -> Result<(), RatelaneError> {
        let payload = serde_json::to_string(&CompletionSignal::batch_complete(batch_id))
            .map_err(|e| RatelaneError::Internal(format!("failed to encode signal: {e}")))?;
        self.queue
            .enqueue(BATCH_AGGREGATOR_QUEUE, &payload, Duration::ZERO)
            .await?;
        debug!(batch_id, "completion signal published");
        Ok(())
    }
}
