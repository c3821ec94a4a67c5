// SPDX-FileCopyrightText: 2026 Ratelane Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Dispatch and aggregation pipeline for Ratelane.
//!
//! The [`Dispatcher`] persists submissions and schedules one processing task
//! per message. [`MessageProcessor`] runs those tasks against the gateway and
//! counts responses; the task that brings a batch's count up to its request
//! count publishes a completion signal. [`BatchAggregator`] consumes those
//! signals, stores the result set and fires the webhook exactly once.
//! [`WorkerPool`] drives both queues.

pub mod aggregator;
pub mod dispatcher;
pub mod processing;
pub mod queues;
pub mod recording;
pub mod results;
pub mod sweeper;
pub mod webhook;
pub mod worker;

use std::sync::Arc;

use ratelane_config::RatelaneConfig;
use ratelane_core::{CounterStore, DurableQueue, GatewayClient, RatelaneError, RecordStore};

pub use aggregator::{BatchAggregator, SignalDisposition};
pub use dispatcher::{DispatchReceipt, Dispatcher, Submission};
pub use processing::{MessageProcessor, ProcessingOutcome, ProcessingReport};
pub use queues::{CompletionChannel, TaskScheduler};
pub use results::ResultCache;
pub use webhook::WebhookNotifier;
pub use worker::WorkerPool;

/// Every pipeline component, wired to the same injected handles.
pub struct Pipeline {
    pub dispatcher: Arc<Dispatcher>,
    pub results: ResultCache,
    pub workers: Arc<WorkerPool>,
}

impl Pipeline {
    /// Wire the pipeline from its collaborators.
    pub fn build(
        config: &RatelaneConfig,
        records: Arc<dyn RecordStore>,
        queue: Arc<dyn DurableQueue>,
        counters: Arc<dyn CounterStore>,
        gateway: Arc<dyn GatewayClient>,
    ) -> Result<Self, RatelaneError> {
        let results = ResultCache::new(counters);
        let scheduler = TaskScheduler::new(queue.clone());
        let completion = CompletionChannel::new(queue.clone());

        let dispatcher = Dispatcher::new(
            records.clone(),
            results.clone(),
            scheduler.clone(),
            config.dispatch.clone(),
        );
        let processor = MessageProcessor::new(
            records.clone(),
            gateway,
            results.clone(),
            scheduler,
            completion,
            config.worker.clone(),
            config.cache.message_result_ttl(),
        );
        let aggregator = BatchAggregator::new(
            records,
            results.clone(),
            WebhookNotifier::new(config.webhook.timeout())?,
            config.aggregator.clone(),
            config.cache.batch_results_ttl(),
        );
        let workers = WorkerPool::new(
            queue,
            Arc::new(processor),
            Arc::new(aggregator),
            config.worker.clone(),
            config.aggregator.clone(),
        );

        Ok(Self {
            dispatcher: Arc::new(dispatcher),
            results,
            workers: Arc::new(workers),
        })
    }
}
