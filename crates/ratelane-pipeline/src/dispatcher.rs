// SPDX-FileCopyrightText: 2026 Ratelane Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Accepts prompts, persists the batch, and schedules processing.

use std::sync::Arc;
use std::time::Duration;

use ratelane_config::model::DispatchConfig;
use ratelane_core::types::{NewBatch, NewMessage};
use ratelane_core::{RatelaneError, RecordStore};
use tracing::{debug, info};

use crate::queues::TaskScheduler;
use crate::recording;
use crate::results::ResultCache;

/// Webhook event stored when the caller does not name one.
pub const DEFAULT_WEBHOOK_EVENT: &str = "on_complete";

/// A validated submission.
#[derive(Debug, Clone)]
pub struct Submission {
    pub queue_id: String,
    pub messages: Vec<NewMessage>,
    pub webhook_url: Option<String>,
    pub webhook_event: Option<String>,
}

impl Submission {
    /// A single-prompt submission (a batch of one).
    pub fn single(queue_id: impl Into<String>, message: NewMessage) -> Self {
        Self {
            queue_id: queue_id.into(),
            messages: vec![message],
            webhook_url: None,
            webhook_event: None,
        }
    }
}

/// Identifiers returned to the caller once a submission is accepted.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchReceipt {
    pub batch_id: String,
    pub message_ids: Vec<String>,
}

pub struct Dispatcher {
    records: Arc<dyn RecordStore>,
    results: ResultCache,
    scheduler: TaskScheduler,
    config: DispatchConfig,
}

impl Dispatcher {
    pub fn new(
        records: Arc<dyn RecordStore>,
        results: ResultCache,
        scheduler: TaskScheduler,
        config: DispatchConfig,
    ) -> Self {
        Self {
            records,
            results,
            scheduler,
            config,
        }
    }

    /// Persist a batch, initialize its counters, then schedule one task per message.
    ///
    /// Counters are written before the first task is scheduled so a fast
    /// worker never increments a counter that does not exist yet.
    pub async fn dispatch(&self, submission: Submission) -> Result<DispatchReceipt, RatelaneError> {
        self.validate(&submission)?;

        if self.records.get_queue(&submission.queue_id).await?.is_none() {
            return Err(RatelaneError::QueueNotFound(format!(
                "Queue {} not found",
                submission.queue_id
            )));
        }

        let batch_id = uuid::Uuid::new_v4().to_string();
        let messages: Vec<(String, NewMessage)> = submission
            .messages
            .into_iter()
            .map(|m| (uuid::Uuid::new_v4().to_string(), m))
            .collect();
        let message_ids: Vec<String> = messages.iter().map(|(id, _)| id.clone()).collect();

        let webhook_event = submission
            .webhook_event
            .unwrap_or_else(|| DEFAULT_WEBHOOK_EVENT.to_string());
        let batch = self
            .records
            .create_batch(&NewBatch {
                batch_id: batch_id.clone(),
                queue_id: submission.queue_id.clone(),
                webhook_url: submission.webhook_url,
                webhook_event: Some(webhook_event),
                messages,
            })
            .await?;

        self.results
            .init_batch_counters(&batch_id, i64::from(batch.request_count))
            .await?;

        for message_id in &message_ids {
            self.scheduler.schedule(message_id, Duration::ZERO).await?;
        }

        recording::record_batch_dispatched();
        info!(
            batch_id = %batch_id,
            queue_id = %submission.queue_id,
            request_count = batch.request_count,
            "batch dispatched"
        );
        Ok(DispatchReceipt {
            batch_id,
            message_ids,
        })
    }

    fn validate(&self, submission: &Submission) -> Result<(), RatelaneError> {
        if submission.queue_id.trim().is_empty() {
            return Err(RatelaneError::Validation("queue_id is required".into()));
        }
        if submission.messages.is_empty() {
            return Err(RatelaneError::Validation(
                "at least one message is required".into(),
            ));
        }
        if submission.messages.len() > self.config.max_batch_size {
            return Err(RatelaneError::Validation(format!(
                "batch of {} messages exceeds the maximum of {}",
                submission.messages.len(),
                self.config.max_batch_size
            )));
        }
        if let Some(pos) = submission
            .messages
            .iter()
            .position(|m| m.prompt.trim().is_empty())
        {
            return Err(RatelaneError::Validation(format!(
                "message {pos} has an empty prompt"
            )));
        }
        if let Some(url) = &submission.webhook_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(RatelaneError::Validation(
                    "webhook_url must be an http(s) URL".into(),
                ));
            }
        }
        debug!(
            queue_id = %submission.queue_id,
            count = submission.messages.len(),
            "submission validated"
        );
        Ok(())
    }
}
