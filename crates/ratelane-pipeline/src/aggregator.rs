// SPDX-FileCopyrightText: 2026 Ratelane Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Batch aggregator: turns completion signals into stored result sets.
//!
//! Signals arrive at least once and in any order. A batch is aggregated at
//! most once: the aggregation claim keeps concurrent consumers apart, and
//! the `processing -> completed` flip decides which run fires the webhook.

use std::sync::Arc;
use std::time::Duration;

use ratelane_config::model::AggregatorConfig;
use ratelane_core::types::{
    BATCH_COMPLETE_EVENT, Batch, BatchResults, BatchStatus, CompletionSignal, ResultRecord,
    WebhookStatus,
};
use ratelane_core::{RatelaneError, RecordStore, now_timestamp};
use tracing::{debug, error, info, warn};

use crate::recording;
use crate::results::ResultCache;
use crate::webhook::WebhookNotifier;

/// How a completion signal was handled. Every variant means "acknowledge".
#[derive(Debug, Clone, PartialEq)]
pub enum SignalDisposition {
    /// This run aggregated the batch. Carries the webhook outcome, if one was sent.
    Aggregated { webhook: Option<WebhookStatus> },
    /// The batch was already completed.
    Duplicate,
    /// Another consumer holds a live claim on the batch.
    ClaimHeld,
    /// The signal was malformed or referred to nothing usable.
    Dropped(String),
}

impl SignalDisposition {
    fn label(&self) -> &'static str {
        match self {
            SignalDisposition::Aggregated { .. } => "aggregated",
            SignalDisposition::Duplicate => "duplicate",
            SignalDisposition::ClaimHeld => "claim_held",
            SignalDisposition::Dropped(_) => "dropped",
        }
    }
}

pub struct BatchAggregator {
    records: Arc<dyn RecordStore>,
    results: ResultCache,
    notifier: WebhookNotifier,
    config: AggregatorConfig,
    results_ttl: Duration,
}

impl BatchAggregator {
    pub fn new(
        records: Arc<dyn RecordStore>,
        results: ResultCache,
        notifier: WebhookNotifier,
        config: AggregatorConfig,
        results_ttl: Duration,
    ) -> Self {
        Self {
            records,
            results,
            notifier,
            config,
            results_ttl,
        }
    }

    /// Handle one raw completion signal.
    ///
    /// `Err` means a storage failure; the signal should be redelivered.
    pub async fn handle_signal(&self, payload: &str) -> Result<SignalDisposition, RatelaneError> {
        let disposition = match serde_json::from_str::<CompletionSignal>(payload) {
            Ok(signal) if signal.event == BATCH_COMPLETE_EVENT => {
                self.handle_batch_complete(&signal.batch_id).await
            }
            Ok(signal) => {
                warn!(batch_id = %signal.batch_id, event = %signal.event, "unknown signal event, dropping");
                Ok(SignalDisposition::Dropped(format!(
                    "unknown event {}",
                    signal.event
                )))
            }
            Err(e) => {
                warn!(error = %e, "malformed completion signal, dropping");
                Ok(SignalDisposition::Dropped(format!("malformed signal: {e}")))
            }
        };
        match &disposition {
            Ok(d) => recording::record_completion_signal(d.label()),
            Err(_) => recording::record_completion_signal("error"),
        }
        disposition
    }

    async fn handle_batch_complete(
        &self,
        batch_id: &str,
    ) -> Result<SignalDisposition, RatelaneError> {
        let Some(batch) = self.records.get_batch(batch_id).await? else {
            let err = RatelaneError::Aggregation(format!("Batch {batch_id} not found"));
            warn!(batch_id, error = %err, "dropping completion signal");
            return Ok(SignalDisposition::Dropped(err.to_string()));
        };
        if batch.status == BatchStatus::Completed {
            debug!(batch_id, "batch already completed, discarding signal");
            return Ok(SignalDisposition::Duplicate);
        }

        if !self
            .records
            .claim_aggregation(batch_id, self.config.claim_lease())
            .await?
        {
            debug!(batch_id, "aggregation claimed elsewhere");
            return Ok(SignalDisposition::ClaimHeld);
        }

        match self.aggregate(&batch).await {
            Ok(disposition) => Ok(disposition),
            Err(e) => {
                if let Err(release_err) = self.records.release_aggregation(batch_id).await {
                    error!(batch_id, error = %release_err, "failed to release aggregation claim");
                }
                Err(e)
            }
        }
    }

    async fn aggregate(&self, batch: &Batch) -> Result<SignalDisposition, RatelaneError> {
        let batch_id = batch.batch_id.as_str();
        let messages = self.records.messages_for_batch(batch_id).await?;
        if messages.is_empty() {
            let err = RatelaneError::Aggregation(format!("Batch {batch_id} has no messages"));
            warn!(batch_id, error = %err, "dropping completion signal");
            self.records.release_aggregation(batch_id).await?;
            return Ok(SignalDisposition::Dropped(err.to_string()));
        }
        // A count repeated after a crash can signal before the last message lands.
        if let Some(open) = messages.iter().find(|m| !m.status.is_terminal()) {
            debug!(batch_id, message_id = %open.message_id, "batch has open messages, dropping early signal");
            self.records.release_aggregation(batch_id).await?;
            return Ok(SignalDisposition::Dropped(format!(
                "Batch {batch_id} still has open messages"
            )));
        }

        let results: Vec<ResultRecord> = messages.iter().map(ResultRecord::from).collect();
        let terminal = messages.iter().filter(|m| m.status.is_terminal()).count();
        let response_count = u32::try_from(terminal)
            .unwrap_or(u32::MAX)
            .min(batch.request_count);

        let aggregated = BatchResults {
            batch_id: batch_id.to_string(),
            status: BatchStatus::Completed,
            request_count: batch.request_count,
            response_count,
            results,
            completed_at: now_timestamp(),
        };
        let aggregated = self
            .results
            .store_batch_results(aggregated, self.results_ttl)
            .await?;

        if !self.records.complete_batch(batch_id, response_count).await? {
            debug!(batch_id, "batch completed by another consumer");
            return Ok(SignalDisposition::Duplicate);
        }
        recording::record_batch_aggregated();
        info!(
            batch_id,
            request_count = batch.request_count,
            response_count,
            "batch aggregated"
        );

        let Some(url) = batch.webhook_url.as_deref() else {
            return Ok(SignalDisposition::Aggregated { webhook: None });
        };
        let status = self.notifier.deliver(url, &aggregated).await;
        if let Err(e) = self
            .records
            .record_webhook(batch_id, status, &now_timestamp())
            .await
        {
            error!(batch_id, error = %e, "failed to record webhook status");
        }
        Ok(SignalDisposition::Aggregated {
            webhook: Some(status),
        })
    }
}
