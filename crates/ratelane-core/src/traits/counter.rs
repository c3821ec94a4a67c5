// SPDX-FileCopyrightText: 2026 Ratelane Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Counter store trait: atomic integer hashes plus expiring string entries.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::RatelaneError;
use crate::traits::adapter::Adapter;

/// Ephemeral key-value store used for response counting and result caching.
///
/// Never authoritative: callers must tolerate missing keys.
#[async_trait]
pub trait CounterStore: Adapter {
    /// Sets integer fields on a hash, creating it if needed.
    async fn hash_set(&self, key: &str, fields: &[(&str, i64)]) -> Result<(), RatelaneError>;

    /// Atomically adds `delta` to a hash field and returns the new value.
    ///
    /// A missing field counts as zero.
    async fn hash_increment(&self, key: &str, field: &str, delta: i64)
    -> Result<i64, RatelaneError>;

    /// Returns every field of a hash; empty if the key does not exist.
    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, i64>, RatelaneError>;

    /// Stores a string value that expires after `ttl`.
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration)
    -> Result<(), RatelaneError>;

    /// Stores a value only if the key holds nothing unexpired.
    ///
    /// Returns false, leaving the existing value untouched, otherwise.
    async fn set_if_absent_with_ttl(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, RatelaneError>;

    /// Returns a value if present and not yet expired.
    async fn get(&self, key: &str) -> Result<Option<String>, RatelaneError>;

    /// Removes expired entries; returns how many were removed.
    async fn purge_expired(&self) -> Result<u64, RatelaneError>;
}
