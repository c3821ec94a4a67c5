// SPDX-FileCopyrightText: 2026 Ratelane Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Record store trait: the durable source of truth for queues, providers,
//! messages and batches.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::RatelaneError;
use crate::traits::adapter::Adapter;
use crate::types::{
    Batch, Message, MessageClaim, NewBatch, NewProvider, Provider, Queue, WebhookStatus,
};

/// Durable record storage used by the dispatcher, processing tasks and aggregator.
///
/// Status-changing writes are conditional so that concurrent or redelivered
/// tasks cannot move a record out of a terminal state.
#[async_trait]
pub trait RecordStore: Adapter {
    // --- Queues and providers ---

    /// Registers a queue and its providers. Fails with `QueueAlreadyExists`.
    async fn create_queue(
        &self,
        queue_id: &str,
        providers: &[NewProvider],
    ) -> Result<(Queue, Vec<Provider>), RatelaneError>;

    async fn get_queue(&self, queue_id: &str) -> Result<Option<Queue>, RatelaneError>;

    async fn list_providers(&self, queue_id: &str) -> Result<Vec<Provider>, RatelaneError>;

    /// Returns the provider that serves a queue (oldest registered first).
    async fn provider_for_queue(&self, queue_id: &str) -> Result<Option<Provider>, RatelaneError>;

    // --- Batches and messages ---

    /// Inserts a batch and all its `pending` messages atomically.
    async fn create_batch(&self, batch: &NewBatch) -> Result<Batch, RatelaneError>;

    async fn get_batch(&self, batch_id: &str) -> Result<Option<Batch>, RatelaneError>;

    async fn get_message(&self, message_id: &str) -> Result<Option<Message>, RatelaneError>;

    /// Messages of a batch in submission order.
    async fn messages_for_batch(&self, batch_id: &str) -> Result<Vec<Message>, RatelaneError>;

    /// Moves a non-terminal message to `processing` and counts the attempt.
    async fn begin_processing(&self, message_id: &str) -> Result<MessageClaim, RatelaneError>;

    /// Moves a non-terminal message to `completed`. Returns false if it was already terminal.
    async fn complete_message(
        &self,
        message_id: &str,
        result: &str,
        provider_id: &str,
    ) -> Result<bool, RatelaneError>;

    /// Moves a non-terminal message to `failed`. Returns false if it was already terminal.
    ///
    /// `counts` marks the failure as owing a batch response.
    async fn fail_message(
        &self,
        message_id: &str,
        error: &str,
        counts: bool,
    ) -> Result<bool, RatelaneError>;

    /// Settles an owed response after the batch counter was incremented.
    ///
    /// Returns false if nothing was owed.
    async fn mark_response_counted(&self, message_id: &str) -> Result<bool, RatelaneError>;

    /// Moves a non-terminal message to `retrying` and records the last error.
    async fn mark_retrying(&self, message_id: &str, error: &str) -> Result<bool, RatelaneError>;

    // --- Aggregation ---

    /// Takes the batch's aggregation claim.
    ///
    /// Succeeds only if no aggregation has completed and no other claim is
    /// younger than `lease`.
    async fn claim_aggregation(&self, batch_id: &str, lease: Duration)
    -> Result<bool, RatelaneError>;

    /// Drops an unfinished aggregation claim so it can be re-taken immediately.
    async fn release_aggregation(&self, batch_id: &str) -> Result<(), RatelaneError>;

    /// Flips a `processing` batch to `completed` and closes its aggregation claim.
    ///
    /// Returns false if the batch was not `processing`.
    async fn complete_batch(
        &self,
        batch_id: &str,
        response_count: u32,
    ) -> Result<bool, RatelaneError>;

    /// Records the outcome and time of a webhook call.
    async fn record_webhook(
        &self,
        batch_id: &str,
        status: WebhookStatus,
        called_at: &str,
    ) -> Result<(), RatelaneError>;
}
