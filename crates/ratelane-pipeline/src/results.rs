// SPDX-FileCopyrightText: 2026 Ratelane Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Counter-store key schema and typed access to cached results.
//!
//! Keys:
//! - `batch:{batch_id}`: hash with `req.count` and `res.count`
//! - `message:{message_id}`: normalized gateway response (JSON)
//! - `batch_results:{batch_id}`: aggregated [`BatchResults`] (JSON)

use std::sync::Arc;
use std::time::Duration;

use ratelane_core::types::{BatchCounters, BatchResults, GatewayResponse};
use ratelane_core::{CounterStore, RatelaneError};

pub const REQUEST_COUNT_FIELD: &str = "req.count";
pub const RESPONSE_COUNT_FIELD: &str = "res.count";

pub fn batch_counter_key(batch_id: &str) -> String {
    format!("batch:{batch_id}")
}

pub fn message_result_key(message_id: &str) -> String {
    format!("message:{message_id}")
}

pub fn batch_results_key(batch_id: &str) -> String {
    format!("batch_results:{batch_id}")
}

/// Typed view over a [`CounterStore`] using the key schema above.
#[derive(Clone)]
pub struct ResultCache {
    store: Arc<dyn CounterStore>,
}

impl ResultCache {
    pub fn new(store: Arc<dyn CounterStore>) -> Self {
        Self { store }
    }

    /// Set a batch's counters to `(request_count, 0)`.
    pub async fn init_batch_counters(
        &self,
        batch_id: &str,
        request_count: i64,
    ) -> Result<(), RatelaneError> {
        self.store
            .hash_set(
                &batch_counter_key(batch_id),
                &[(REQUEST_COUNT_FIELD, request_count), (RESPONSE_COUNT_FIELD, 0)],
            )
            .await
    }

    /// Atomically count one response; returns the new response count.
    pub async fn increment_responses(&self, batch_id: &str) -> Result<i64, RatelaneError> {
        self.store
            .hash_increment(&batch_counter_key(batch_id), RESPONSE_COUNT_FIELD, 1)
            .await
    }

    /// Live counters for a batch, `None` if they were never initialized.
    pub async fn batch_counters(
        &self,
        batch_id: &str,
    ) -> Result<Option<BatchCounters>, RatelaneError> {
        let fields = self.store.hash_get_all(&batch_counter_key(batch_id)).await?;
        if fields.is_empty() {
            return Ok(None);
        }
        Ok(Some(BatchCounters {
            request_count: fields.get(REQUEST_COUNT_FIELD).copied().unwrap_or(0),
            response_count: fields.get(RESPONSE_COUNT_FIELD).copied().unwrap_or(0),
        }))
    }

    pub async fn cache_message_result(
        &self,
        message_id: &str,
        response: &GatewayResponse,
        ttl: Duration,
    ) -> Result<(), RatelaneError> {
        let json = serde_json::to_string(response)
            .map_err(|e| RatelaneError::Internal(format!("failed to encode response: {e}")))?;
        self.store
            .set_with_ttl(&message_result_key(message_id), &json, ttl)
            .await
    }

    pub async fn message_result(
        &self,
        message_id: &str,
    ) -> Result<Option<GatewayResponse>, RatelaneError> {
        self.get_json(&message_result_key(message_id)).await
    }

    /// Stores aggregated results unless an unexpired set is already cached.
    ///
    /// Returns the results the cache now holds: `results` itself, or the set
    /// an earlier aggregation run wrote first.
    pub async fn store_batch_results(
        &self,
        results: BatchResults,
        ttl: Duration,
    ) -> Result<BatchResults, RatelaneError> {
        let key = batch_results_key(&results.batch_id);
        let json = serde_json::to_string(&results)
            .map_err(|e| RatelaneError::Internal(format!("failed to encode results: {e}")))?;
        if self.store.set_if_absent_with_ttl(&key, &json, ttl).await? {
            return Ok(results);
        }
        match self.batch_results(&results.batch_id).await? {
            Some(existing) => Ok(existing),
            // Expired between the two calls.
            None => {
                self.store.set_with_ttl(&key, &json, ttl).await?;
                Ok(results)
            }
        }
    }

    /// Aggregated results, `None` until aggregation completes or after expiry.
    pub async fn batch_results(
        &self,
        batch_id: &str,
    ) -> Result<Option<BatchResults>, RatelaneError> {
        self.get_json(&batch_results_key(batch_id)).await
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<Option<T>, RatelaneError> {
        match self.store.get(key).await? {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|e| RatelaneError::Internal(format!("corrupt cache entry {key}: {e}"))),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use ratelane_core::types::{BatchStatus, MessageStatus, ResultRecord};
    use ratelane_test_utils::MemoryCounterStore;

    use super::*;

    fn cache() -> ResultCache {
        ResultCache::new(Arc::new(MemoryCounterStore::new()))
    }

    #[test]
    fn key_schema() {
        assert_eq!(batch_counter_key("b1"), "batch:b1");
        assert_eq!(message_result_key("m1"), "message:m1");
        assert_eq!(batch_results_key("b1"), "batch_results:b1");
    }

    #[tokio::test]
    async fn counters_start_at_zero_and_increment() {
        let cache = cache();
        assert!(cache.batch_counters("b1").await.unwrap().is_none());

        cache.init_batch_counters("b1", 3).await.unwrap();
        assert_eq!(cache.increment_responses("b1").await.unwrap(), 1);
        assert_eq!(cache.increment_responses("b1").await.unwrap(), 2);

        let counters = cache.batch_counters("b1").await.unwrap().unwrap();
        assert_eq!(
            counters,
            BatchCounters {
                request_count: 3,
                response_count: 2
            }
        );
    }

    #[tokio::test]
    async fn batch_results_are_read_back_unchanged() {
        let cache = cache();
        let results = BatchResults {
            batch_id: "b1".into(),
            status: BatchStatus::Completed,
            request_count: 1,
            response_count: 1,
            results: vec![ResultRecord {
                message_id: "m1".into(),
                status: MessageStatus::Completed,
                prompt: "hi".into(),
                result: Some("hello".into()),
                error_message: None,
            }],
            completed_at: "2026-01-01T00:00:00.000Z".into(),
        };
        let stored = cache
            .store_batch_results(results.clone(), Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(stored, results);

        let first = cache.batch_results("b1").await.unwrap().unwrap();
        let second = cache.batch_results("b1").await.unwrap().unwrap();
        assert_eq!(first, results);
        assert_eq!(first, second);
        assert!(cache.batch_results("other").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn later_aggregation_does_not_replace_stored_results() {
        let cache = cache();
        let first = BatchResults {
            batch_id: "b1".into(),
            status: BatchStatus::Completed,
            request_count: 1,
            response_count: 1,
            results: Vec::new(),
            completed_at: "2026-01-01T00:00:00.000Z".into(),
        };
        let later = BatchResults {
            completed_at: "2026-01-01T00:05:00.000Z".into(),
            ..first.clone()
        };
        let ttl = Duration::from_secs(60);

        cache.store_batch_results(first.clone(), ttl).await.unwrap();
        let kept = cache.store_batch_results(later, ttl).await.unwrap();
        assert_eq!(kept, first);
        assert_eq!(cache.batch_results("b1").await.unwrap().unwrap(), first);
    }
}
