// SPDX-FileCopyrightText: 2026 Ratelane Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable, at-least-once named queues with manual acknowledgement.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::RatelaneError;
use crate::traits::adapter::Adapter;
use crate::types::QueueEntry;

/// A durable point-to-point queue.
///
/// Entries become visible once their delay elapses. A dequeued entry is
/// locked for the visibility timeout; if it is neither acked nor nacked
/// before the lock expires it is delivered again.
#[async_trait]
pub trait DurableQueue: Adapter {
    /// Enqueues a payload, visible after `delay`. Returns the entry ID.
    async fn enqueue(
        &self,
        queue_name: &str,
        payload: &str,
        delay: Duration,
    ) -> Result<i64, RatelaneError>;

    /// Takes the oldest visible entry and locks it for `visibility_timeout`.
    async fn dequeue(
        &self,
        queue_name: &str,
        visibility_timeout: Duration,
    ) -> Result<Option<QueueEntry>, RatelaneError>;

    /// Marks an entry as successfully handled.
    async fn ack(&self, id: i64) -> Result<(), RatelaneError>;

    /// Records a failed delivery; the entry is retried until its attempt cap.
    async fn nack(&self, id: i64) -> Result<(), RatelaneError>;
}
