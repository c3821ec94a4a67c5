// SPDX-FileCopyrightText: 2026 Ratelane Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message processing task.
//!
//! One attempt moves a message `pending|retrying -> processing`, calls the
//! gateway, and lands in one of four [`ProcessingOutcome`]s. Only outcomes
//! that end the message for good count towards the batch's responses. The
//! terminal write records the response as owed and the increment settles it,
//! so a redelivered task finishes a count an earlier delivery left undone
//! and never repeats one that landed.

use std::sync::Arc;
use std::time::{Duration, Instant};

use ratelane_config::model::WorkerConfig;
use ratelane_core::types::{
    BatchStatus, ChatRequest, GatewayResponse, Message, MessageClaim, MessageStatus,
    ResponseTally,
};
use ratelane_core::{GatewayClient, RatelaneError, RecordStore};
use tracing::{debug, info, warn};

use crate::queues::{CompletionChannel, TaskScheduler};
use crate::recording;
use crate::results::ResultCache;

/// What one processing attempt decided.
#[derive(Debug)]
pub enum ProcessingOutcome {
    /// The gateway answered.
    Completed(GatewayResponse),
    /// A retryable failure below the attempt cap; try again after `delay`.
    Retry {
        error: RatelaneError,
        delay: Duration,
    },
    /// The message failed for good and counts as a response.
    FailedTerminal(RatelaneError),
    /// The message could not be processed at all and does not count.
    FailedPreflight(RatelaneError),
}

impl ProcessingOutcome {
    /// Whether this outcome adds one to the batch's response counter.
    pub fn increments_counter(&self) -> bool {
        matches!(
            self,
            ProcessingOutcome::Completed(_) | ProcessingOutcome::FailedTerminal(_)
        )
    }

    pub fn status(&self) -> MessageStatus {
        match self {
            ProcessingOutcome::Completed(_) => MessageStatus::Completed,
            ProcessingOutcome::Retry { .. } => MessageStatus::Retrying,
            ProcessingOutcome::FailedTerminal(_) | ProcessingOutcome::FailedPreflight(_) => {
                MessageStatus::Failed
            }
        }
    }
}

/// What happened to one processing task.
#[derive(Debug)]
pub struct ProcessingReport {
    pub message_id: String,
    /// `None` when the message was already terminal and nothing was done.
    pub outcome: Option<ProcessingOutcome>,
    /// This task incremented the batch's response counter.
    pub counted: bool,
    /// This task published a completion signal.
    pub signaled: bool,
}

impl ProcessingReport {
    fn skipped(message_id: &str) -> Self {
        Self {
            message_id: message_id.to_string(),
            outcome: None,
            counted: false,
            signaled: false,
        }
    }
}

/// Delay before retry number `attempt` (1-based): base doubled per attempt, capped.
pub fn retry_delay(config: &WorkerConfig, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(31);
    let millis = config
        .retry_backoff_base_ms
        .saturating_mul(1u64 << exponent)
        .min(config.retry_backoff_max_ms);
    Duration::from_millis(millis)
}

pub struct MessageProcessor {
    records: Arc<dyn RecordStore>,
    gateway: Arc<dyn GatewayClient>,
    results: ResultCache,
    scheduler: TaskScheduler,
    completion: CompletionChannel,
    config: WorkerConfig,
    message_result_ttl: Duration,
}

impl MessageProcessor {
    pub fn new(
        records: Arc<dyn RecordStore>,
        gateway: Arc<dyn GatewayClient>,
        results: ResultCache,
        scheduler: TaskScheduler,
        completion: CompletionChannel,
        config: WorkerConfig,
        message_result_ttl: Duration,
    ) -> Self {
        Self {
            records,
            gateway,
            results,
            scheduler,
            completion,
            config,
            message_result_ttl,
        }
    }

    /// Run one processing attempt for `message_id` and apply its outcome.
    ///
    /// Errors are storage failures; the caller should let the task be redelivered.
    pub async fn process(&self, message_id: &str) -> Result<ProcessingReport, RatelaneError> {
        let message = match self.records.begin_processing(message_id).await? {
            MessageClaim::Claimed(message) => message,
            MessageClaim::AlreadyTerminal {
                status,
                batch_id,
                tally,
            } => {
                debug!(message_id, %status, %tally, "message already terminal");
                return self
                    .settle_terminal(message_id, batch_id.as_deref(), tally)
                    .await;
            }
            MessageClaim::NotFound => {
                warn!(message_id, "message not found, dropping task");
                recording::record_message("failed");
                return Ok(ProcessingReport {
                    outcome: Some(ProcessingOutcome::FailedPreflight(
                        RatelaneError::MessageNotFound(format!("Message {message_id} not found")),
                    )),
                    ..ProcessingReport::skipped(message_id)
                });
            }
        };
        debug!(
            message_id,
            batch_id = message.batch_id.as_deref().unwrap_or_default(),
            attempt = message.attempts,
            "processing message"
        );

        let limit = self.config.task_time_limit();
        let (outcome, provider_id) = match tokio::time::timeout(limit, self.attempt(&message)).await
        {
            Ok(result) => result?,
            Err(_) => (
                self.classify_failure(&message, RatelaneError::Timeout { duration: limit }),
                None,
            ),
        };

        self.apply(message, outcome, provider_id).await
    }

    /// Resolve the provider and call the gateway. Storage errors propagate.
    async fn attempt(
        &self,
        message: &Message,
    ) -> Result<(ProcessingOutcome, Option<String>), RatelaneError> {
        if self.records.get_queue(&message.queue_id).await?.is_none() {
            return Ok((
                ProcessingOutcome::FailedPreflight(RatelaneError::QueueNotFound(format!(
                    "Queue {} not found",
                    message.queue_id
                ))),
                None,
            ));
        }

        let Some(provider) = self.records.provider_for_queue(&message.queue_id).await? else {
            return Ok((
                ProcessingOutcome::FailedTerminal(RatelaneError::ProviderNotFound(format!(
                    "No provider found for queue {}",
                    message.queue_id
                ))),
                None,
            ));
        };

        let request = ChatRequest::from_prompts(
            provider.config.model.clone(),
            message.system_prompt.as_deref(),
            &message.prompt,
        );
        let started = Instant::now();
        let result = self.gateway.send_request(&provider, &request).await;
        recording::record_gateway_latency(started.elapsed().as_secs_f64());

        let outcome = match result {
            Ok(response) => ProcessingOutcome::Completed(response),
            Err(error) => self.classify_failure(message, error),
        };
        Ok((outcome, Some(provider.provider_id)))
    }

    fn classify_failure(&self, message: &Message, error: RatelaneError) -> ProcessingOutcome {
        if error.is_retryable() && message.attempts < self.config.max_attempts {
            ProcessingOutcome::Retry {
                delay: retry_delay(&self.config, message.attempts),
                error,
            }
        } else {
            ProcessingOutcome::FailedTerminal(error)
        }
    }

    async fn apply(
        &self,
        message: Message,
        outcome: ProcessingOutcome,
        provider_id: Option<String>,
    ) -> Result<ProcessingReport, RatelaneError> {
        let message_id = message.message_id.as_str();
        let transitioned = match &outcome {
            ProcessingOutcome::Completed(response) => {
                let provider_id = provider_id.unwrap_or_default();
                let done = self
                    .records
                    .complete_message(message_id, &response.content, &provider_id)
                    .await?;
                if done {
                    if let Err(e) = self
                        .results
                        .cache_message_result(message_id, response, self.message_result_ttl)
                        .await
                    {
                        warn!(message_id, error = %e, "failed to cache message result");
                    }
                }
                done
            }
            ProcessingOutcome::Retry { error, delay } => {
                let moved = self
                    .records
                    .mark_retrying(message_id, &error.to_string())
                    .await?;
                if moved {
                    self.scheduler.schedule(message_id, *delay).await?;
                    info!(
                        message_id,
                        attempt = message.attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "message scheduled for retry"
                    );
                }
                moved
            }
            ProcessingOutcome::FailedTerminal(error) | ProcessingOutcome::FailedPreflight(error) => {
                warn!(message_id, attempt = message.attempts, error = %error, "message failed");
                self.records
                    .fail_message(
                        message_id,
                        &error.to_string(),
                        outcome.increments_counter(),
                    )
                    .await?
            }
        };

        if !transitioned {
            debug!(message_id, "message reached a terminal state elsewhere");
            return Ok(ProcessingReport {
                outcome: Some(outcome),
                ..ProcessingReport::skipped(message_id)
            });
        }
        recording::record_message(&outcome.status().to_string());

        let mut report = ProcessingReport {
            message_id: message.message_id.clone(),
            outcome: None,
            counted: false,
            signaled: false,
        };
        if outcome.increments_counter() {
            if let Some(batch_id) = message.batch_id.as_deref() {
                report.counted = true;
                report.signaled = self.count_response(message_id, batch_id).await?;
            }
        }
        report.outcome = Some(outcome);
        Ok(report)
    }

    /// Finish the bookkeeping an earlier delivery of a terminal message left undone.
    async fn settle_terminal(
        &self,
        message_id: &str,
        batch_id: Option<&str>,
        tally: ResponseTally,
    ) -> Result<ProcessingReport, RatelaneError> {
        let mut report = ProcessingReport::skipped(message_id);
        let Some(batch_id) = batch_id else {
            return Ok(report);
        };
        match tally {
            ResponseTally::NotOwed => {}
            ResponseTally::Owed => {
                info!(message_id, batch_id, "counting response left owed by an earlier delivery");
                report.counted = true;
                report.signaled = self.count_response(message_id, batch_id).await?;
            }
            // The signal may have been lost after the count landed.
            ResponseTally::Counted => {
                report.signaled = self.signal_if_exhausted(batch_id, None).await?;
            }
        }
        Ok(report)
    }

    /// Count one response, settle it on the message, and signal completion
    /// when the batch is exhausted.
    async fn count_response(&self, message_id: &str, batch_id: &str) -> Result<bool, RatelaneError> {
        let responses = self.results.increment_responses(batch_id).await?;
        self.records.mark_response_counted(message_id).await?;
        self.signal_if_exhausted(batch_id, Some(responses)).await
    }

    /// Publish a completion signal if the batch is still open and every
    /// response is in. `responses` is read from the counters when `None`.
    async fn signal_if_exhausted(
        &self,
        batch_id: &str,
        responses: Option<i64>,
    ) -> Result<bool, RatelaneError> {
        let Some(batch) = self.records.get_batch(batch_id).await? else {
            warn!(batch_id, "batch vanished while counting responses");
            return Ok(false);
        };
        if batch.status == BatchStatus::Completed {
            return Ok(false);
        }
        let responses = match responses {
            Some(n) => n,
            None => match self.results.batch_counters(batch_id).await? {
                Some(counters) => counters.response_count,
                None => return Ok(false),
            },
        };
        debug!(
            batch_id,
            responses,
            request_count = batch.request_count,
            "response counted"
        );
        if responses >= i64::from(batch.request_count) {
            self.completion.publish(batch_id).await?;
            return Ok(true);
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> WorkerConfig {
        WorkerConfig {
            retry_backoff_base_ms: 1000,
            retry_backoff_max_ms: 60_000,
            ..WorkerConfig::default()
        }
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let config = config();
        assert_eq!(retry_delay(&config, 1), Duration::from_millis(1000));
        assert_eq!(retry_delay(&config, 2), Duration::from_millis(2000));
        assert_eq!(retry_delay(&config, 3), Duration::from_millis(4000));
        assert_eq!(retry_delay(&config, 7), Duration::from_millis(60_000));
        assert_eq!(retry_delay(&config, 200), Duration::from_millis(60_000));
    }

    #[test]
    fn only_final_outcomes_increment() {
        let completed = ProcessingOutcome::Completed(GatewayResponse {
            content: "ok".into(),
            usage: serde_json::Value::Null,
            model: String::new(),
            provider: "openai".into(),
        });
        assert!(completed.increments_counter());
        assert!(
            ProcessingOutcome::FailedTerminal(RatelaneError::ProviderNotFound("x".into()))
                .increments_counter()
        );
        assert!(
            !ProcessingOutcome::FailedPreflight(RatelaneError::QueueNotFound("x".into()))
                .increments_counter()
        );
        let retry = ProcessingOutcome::Retry {
            error: RatelaneError::Timeout {
                duration: Duration::from_secs(1),
            },
            delay: Duration::from_secs(1),
        };
        assert!(!retry.increments_counter());
        assert_eq!(retry.status(), MessageStatus::Retrying);
    }
}
