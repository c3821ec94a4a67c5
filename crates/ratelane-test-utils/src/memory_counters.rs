// SPDX-FileCopyrightText: 2026 Ratelane Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory counter store.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::Instant;

use ratelane_core::{Adapter, AdapterType, CounterStore, HealthStatus, RatelaneError};

/// A `CounterStore` held in process memory.
///
/// Increments take the shard lock for the key, so concurrent callers never
/// lose updates. Expiry uses tokio's clock and therefore honours
/// `tokio::time::pause`.
#[derive(Clone, Default)]
pub struct MemoryCounterStore {
    hashes: Arc<DashMap<String, HashMap<String, i64>>>,
    values: Arc<DashMap<String, (String, Instant)>>,
    failing_increments: Arc<AtomicUsize>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored values, expired or not.
    pub fn value_count(&self) -> usize {
        self.values.len()
    }

    /// Makes the next `n` calls to `hash_increment` fail without applying.
    pub fn fail_next_increments(&self, n: usize) {
        self.failing_increments.store(n, Ordering::SeqCst);
    }
}

#[async_trait]
impl Adapter for MemoryCounterStore {
    fn name(&self) -> &str {
        "memory-counters"
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::CounterStore
    }

    async fn health_check(&self) -> Result<HealthStatus, RatelaneError> {
        Ok(HealthStatus::Healthy)
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn hash_set(&self, key: &str, fields: &[(&str, i64)]) -> Result<(), RatelaneError> {
        let mut hash = self.hashes.entry(key.to_string()).or_default();
        for (field, value) in fields {
            hash.insert((*field).to_string(), *value);
        }
        Ok(())
    }

    async fn hash_increment(
        &self,
        key: &str,
        field: &str,
        delta: i64,
    ) -> Result<i64, RatelaneError> {
        let injected = self
            .failing_increments
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(RatelaneError::storage("injected counter failure"));
        }
        let mut hash = self.hashes.entry(key.to_string()).or_default();
        let value = hash.entry(field.to_string()).or_insert(0);
        *value += delta;
        Ok(*value)
    }

    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, i64>, RatelaneError> {
        Ok(self
            .hashes
            .get(key)
            .map(|h| h.value().clone())
            .unwrap_or_default())
    }

    async fn set_with_ttl(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), RatelaneError> {
        self.values
            .insert(key.to_string(), (value.to_string(), Instant::now() + ttl));
        Ok(())
    }

    async fn set_if_absent_with_ttl(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, RatelaneError> {
        let now = Instant::now();
        let mut entry = self
            .values
            .entry(key.to_string())
            .or_insert_with(|| (String::new(), now));
        if entry.1 > now {
            return Ok(false);
        }
        *entry = (value.to_string(), now + ttl);
        Ok(true)
    }

    async fn get(&self, key: &str) -> Result<Option<String>, RatelaneError> {
        let now = Instant::now();
        Ok(self
            .values
            .get(key)
            .filter(|entry| entry.value().1 > now)
            .map(|entry| entry.value().0.clone()))
    }

    async fn purge_expired(&self) -> Result<u64, RatelaneError> {
        let now = Instant::now();
        let before = self.values.len();
        self.values.retain(|_, (_, expires_at)| *expires_at > now);
        Ok((before - self.values.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn concurrent_increments_are_exact() {
        let store = MemoryCounterStore::new();
        store
            .hash_set("batch:b1", &[("req.count", 50), ("res.count", 0)])
            .await
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..50 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.hash_increment("batch:b1", "res.count", 1).await.unwrap()
            }));
        }
        let mut seen = Vec::new();
        for h in handles {
            seen.push(h.await.unwrap());
        }
        seen.sort_unstable();
        assert_eq!(seen, (1..=50).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn injected_increment_failures_do_not_apply() {
        let store = MemoryCounterStore::new();
        store.fail_next_increments(1);
        assert!(store.hash_increment("batch:b1", "res.count", 1).await.is_err());
        assert_eq!(store.hash_increment("batch:b1", "res.count", 1).await.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn values_expire() {
        let store = MemoryCounterStore::new();
        store
            .set_with_ttl("message:m1", "{}", Duration::from_secs(3600))
            .await
            .unwrap();
        assert!(store.get("message:m1").await.unwrap().is_some());

        tokio::time::advance(Duration::from_secs(3601)).await;
        assert!(store.get("message:m1").await.unwrap().is_none());
        assert_eq!(store.purge_expired().await.unwrap(), 1);
        assert_eq!(store.value_count(), 0);
    }
}
