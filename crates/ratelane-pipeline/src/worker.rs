// SPDX-FileCopyrightText: 2026 Ratelane Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Queue consumers: the processing worker pool and the aggregator loop.

use std::sync::Arc;
use std::time::Duration;

use ratelane_config::model::{AggregatorConfig, WorkerConfig};
use ratelane_core::types::{ProcessTask, QueueEntry};
use ratelane_core::{DurableQueue, RatelaneError};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::aggregator::BatchAggregator;
use crate::processing::MessageProcessor;
use crate::queues::{BATCH_AGGREGATOR_QUEUE, PROCESS_MESSAGE_QUEUE};

/// Pulls entries from both pipeline queues and hands them to their consumer.
pub struct WorkerPool {
    queue: Arc<dyn DurableQueue>,
    processor: Arc<MessageProcessor>,
    aggregator: Arc<BatchAggregator>,
    worker: WorkerConfig,
    aggregator_config: AggregatorConfig,
}

impl WorkerPool {
    pub fn new(
        queue: Arc<dyn DurableQueue>,
        processor: Arc<MessageProcessor>,
        aggregator: Arc<BatchAggregator>,
        worker: WorkerConfig,
        aggregator_config: AggregatorConfig,
    ) -> Self {
        Self {
            queue,
            processor,
            aggregator,
            worker,
            aggregator_config,
        }
    }

    /// Visibility of a dequeued signal; outlives the claim lease so a crashed
    /// run is redelivered only once its claim can be re-taken.
    fn signal_visibility(&self) -> Duration {
        self.aggregator_config.claim_lease() * 2
    }

    /// Take and handle one processing task. Returns false if none was due.
    pub async fn process_next(&self) -> Result<bool, RatelaneError> {
        let Some(entry) = self
            .queue
            .dequeue(PROCESS_MESSAGE_QUEUE, self.worker.visibility_timeout())
            .await?
        else {
            return Ok(false);
        };
        self.handle_task(entry).await?;
        Ok(true)
    }

    /// Take and handle one completion signal. Returns false if none was due.
    pub async fn aggregate_next(&self) -> Result<bool, RatelaneError> {
        let Some(entry) = self
            .queue
            .dequeue(BATCH_AGGREGATOR_QUEUE, self.signal_visibility())
            .await?
        else {
            return Ok(false);
        };
        match self.aggregator.handle_signal(&entry.payload).await {
            Ok(disposition) => {
                debug!(entry_id = entry.id, ?disposition, "completion signal handled");
                self.queue.ack(entry.id).await?;
            }
            Err(e) => {
                error!(entry_id = entry.id, error = %e, "aggregation failed, signal will be redelivered");
                self.queue.nack(entry.id).await?;
            }
        }
        Ok(true)
    }

    async fn handle_task(&self, entry: QueueEntry) -> Result<(), RatelaneError> {
        let task: ProcessTask = match serde_json::from_str(&entry.payload) {
            Ok(task) => task,
            Err(e) => {
                warn!(entry_id = entry.id, error = %e, "malformed processing task, dropping");
                return self.queue.ack(entry.id).await;
            }
        };
        match self.processor.process(&task.message_id).await {
            Ok(report) => {
                debug!(
                    message_id = %report.message_id,
                    counted = report.counted,
                    signaled = report.signaled,
                    "processing task finished"
                );
                self.queue.ack(entry.id).await
            }
            Err(e) => {
                error!(
                    entry_id = entry.id,
                    message_id = %task.message_id,
                    error = %e,
                    "processing task failed, will be redelivered"
                );
                self.queue.nack(entry.id).await
            }
        }
    }

    /// Spawn `worker.concurrency` processing loops plus one aggregator loop.
    ///
    /// Loops stop taking work once `cancel` fires; in-flight tasks finish first.
    pub fn spawn(self: Arc<Self>, cancel: CancellationToken) -> JoinSet<()> {
        let mut set = JoinSet::new();
        for worker_id in 0..self.worker.concurrency {
            let pool = self.clone();
            let cancel = cancel.clone();
            set.spawn(async move { pool.run_processing_loop(worker_id, cancel).await });
        }
        let pool = self.clone();
        set.spawn(async move { pool.run_aggregator_loop(cancel).await });
        info!(
            concurrency = self.worker.concurrency,
            "worker pool started"
        );
        set
    }

    async fn run_processing_loop(&self, worker_id: usize, cancel: CancellationToken) {
        let idle = self.worker.poll_interval();
        loop {
            if cancel.is_cancelled() {
                break;
            }
            let wait = match self.process_next().await {
                Ok(true) => continue,
                Ok(false) => idle,
                Err(e) => {
                    error!(worker_id, error = %e, "processing worker error");
                    idle
                }
            };
            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = cancel.cancelled() => break,
            }
        }
        info!(worker_id, "processing worker shutting down");
    }

    async fn run_aggregator_loop(&self, cancel: CancellationToken) {
        let idle = self.aggregator_config.poll_interval();
        loop {
            if cancel.is_cancelled() {
                break;
            }
            let wait = match self.aggregate_next().await {
                Ok(true) => continue,
                Ok(false) => idle,
                Err(e) => {
                    error!(error = %e, "aggregator error");
                    idle
                }
            };
            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = cancel.cancelled() => break,
            }
        }
        info!("aggregator shutting down");
    }
}
