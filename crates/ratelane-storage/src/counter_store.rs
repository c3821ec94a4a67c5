// SPDX-FileCopyrightText: 2026 Ratelane Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the `CounterStore` trait.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use ratelane_core::{Adapter, AdapterType, CounterStore, HealthStatus, RatelaneError};

use crate::database::Database;
use crate::queries::counters;

/// Counter store backed by the `counter_fields` and `cache_entries` tables.
///
/// Shares the record store's [`Database`]; increments run as a single
/// `UPSERT ... RETURNING` on the writer thread and are therefore atomic.
#[derive(Clone)]
pub struct SqliteCounterStore {
    db: Database,
}

impl SqliteCounterStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl Adapter for SqliteCounterStore {
    fn name(&self) -> &str {
        "sqlite-counters"
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::CounterStore
    }

    async fn health_check(&self) -> Result<HealthStatus, RatelaneError> {
        Ok(match counters::get(&self.db, "__health__").await {
            Ok(_) => HealthStatus::Healthy,
            Err(e) => HealthStatus::Unhealthy(e.to_string()),
        })
    }
}

#[async_trait]
impl CounterStore for SqliteCounterStore {
    async fn hash_set(&self, key: &str, fields: &[(&str, i64)]) -> Result<(), RatelaneError> {
        counters::hash_set(&self.db, key, fields).await
    }

    async fn hash_increment(
        &self,
        key: &str,
        field: &str,
        delta: i64,
    ) -> Result<i64, RatelaneError> {
        counters::hash_increment(&self.db, key, field, delta).await
    }

    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, i64>, RatelaneError> {
        counters::hash_get_all(&self.db, key).await
    }

    async fn set_with_ttl(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), RatelaneError> {
        counters::set_with_ttl(&self.db, key, value, ttl).await
    }

    async fn set_if_absent_with_ttl(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, RatelaneError> {
        counters::set_if_absent_with_ttl(&self.db, key, value, ttl).await
    }

    async fn get(&self, key: &str) -> Result<Option<String>, RatelaneError> {
        counters::get(&self.db, key).await
    }

    async fn purge_expired(&self) -> Result<u64, RatelaneError> {
        counters::purge_expired(&self.db).await
    }
}
