// SPDX-FileCopyrightText: 2026 Ratelane Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Temp-directory SQLite fixtures.
//!
//! `TestStorage` opens a real database in a temp directory and offers
//! helpers to register queues the way the API would.

use std::sync::Arc;

use ratelane_config::model::StorageConfig;
use ratelane_core::types::{NewProvider, Provider, ProviderConfig};
use ratelane_core::{RatelaneError, RecordStore};
use ratelane_storage::{Database, SqliteCounterStore, SqliteStorage};

/// SQLite storage living in a temp directory that is removed on drop.
pub struct TestStorage {
    pub storage: Arc<SqliteStorage>,
    pub counters: Arc<SqliteCounterStore>,
    // Held so the directory outlives the database.
    _temp_dir: tempfile::TempDir,
}

impl TestStorage {
    pub async fn new() -> Result<Self, RatelaneError> {
        let temp_dir = tempfile::TempDir::new().map_err(RatelaneError::storage)?;
        let db_path = temp_dir.path().join("test.db");
        let storage = SqliteStorage::new(StorageConfig {
            database_path: db_path.to_string_lossy().into_owned(),
            wal_mode: true,
        });
        storage.initialize().await?;
        let counters = SqliteCounterStore::new(storage.database()?.clone());
        Ok(Self {
            storage: Arc::new(storage),
            counters: Arc::new(counters),
            _temp_dir: temp_dir,
        })
    }

    /// The shared database handle, for direct query-module access.
    pub fn database(&self) -> Result<&Database, RatelaneError> {
        self.storage.database()
    }

    /// Register a queue with a single provider of the given type.
    pub async fn register_queue(
        &self,
        queue_id: &str,
        provider_type: &str,
    ) -> Result<Provider, RatelaneError> {
        let (_, mut providers) = self
            .storage
            .create_queue(queue_id, &[provider(provider_type)])
            .await?;
        providers
            .pop()
            .ok_or_else(|| RatelaneError::Internal("queue created without provider".into()))
    }

    /// Register a queue with no providers.
    pub async fn register_bare_queue(&self, queue_id: &str) -> Result<(), RatelaneError> {
        self.storage.create_queue(queue_id, &[]).await.map(|_| ())
    }

    /// Remove a queue and its providers, leaving its messages behind.
    pub async fn remove_queue(&self, queue_id: &str) -> Result<bool, RatelaneError> {
        ratelane_storage::queries::queues::delete_queue(self.database()?, queue_id).await
    }
}

/// A provider registration with test credentials.
pub fn provider(provider_type: &str) -> NewProvider {
    NewProvider {
        provider_name: format!("{provider_type}-test"),
        provider_type: provider_type.to_string(),
        api_key: format!("sk-{}", uuid::Uuid::new_v4()),
        limit: 1000,
        time_window: 3600,
        config: ProviderConfig {
            model: Some("gpt-4o-mini".to_string()),
            ..ProviderConfig::default()
        },
    }
}
