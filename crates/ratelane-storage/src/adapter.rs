// SPDX-FileCopyrightText: 2026 Ratelane Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the `RecordStore` and `DurableQueue` traits.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use ratelane_config::model::StorageConfig;
use ratelane_core::types::{
    Batch, Message, MessageClaim, NewBatch, NewProvider, Provider, Queue, QueueEntry,
    WebhookStatus,
};
use ratelane_core::{Adapter, AdapterType, DurableQueue, HealthStatus, RatelaneError, RecordStore};

use crate::database::Database;
use crate::queries;

const DEFAULT_QUEUE_MAX_ATTEMPTS: u32 = 3;

/// SQLite-backed record store and durable queue.
///
/// Wraps a [`Database`] handle and delegates to the typed query modules.
/// The database is opened on the first call to [`SqliteStorage::initialize`].
pub struct SqliteStorage {
    config: StorageConfig,
    db: OnceCell<Database>,
    queue_max_attempts: u32,
}

impl SqliteStorage {
    /// Create a new SqliteStorage; the database is not opened until `initialize`.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
            queue_max_attempts: DEFAULT_QUEUE_MAX_ATTEMPTS,
        }
    }

    /// Wrap an already open database.
    pub fn from_database(db: Database) -> Self {
        Self {
            config: StorageConfig {
                database_path: String::new(),
                wal_mode: true,
            },
            db: OnceCell::new_with(Some(db)),
            queue_max_attempts: DEFAULT_QUEUE_MAX_ATTEMPTS,
        }
    }

    /// Delivery attempts allowed for newly enqueued entries.
    pub fn with_queue_max_attempts(mut self, max_attempts: u32) -> Self {
        self.queue_max_attempts = max_attempts.max(1);
        self
    }

    /// Open the database and run migrations.
    pub async fn initialize(&self) -> Result<(), RatelaneError> {
        let db = Database::open_with(&self.config.database_path, self.config.wal_mode).await?;
        self.db.set(db).map_err(|_| RatelaneError::Storage {
            source: "storage already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite storage initialized");
        Ok(())
    }

    /// Returns the underlying Database, or an error if not initialized.
    pub fn database(&self) -> Result<&Database, RatelaneError> {
        self.db.get().ok_or_else(|| RatelaneError::Storage {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }

    /// Checkpoint the WAL before shutdown.
    pub async fn close(&self) -> Result<(), RatelaneError> {
        let db = self.database()?;
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(crate::database::map_tr_err)?;
        debug!("WAL checkpoint complete");
        Ok(())
    }
}

#[async_trait]
impl Adapter for SqliteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::RecordStore
    }

    async fn health_check(&self) -> Result<HealthStatus, RatelaneError> {
        let db = match self.database() {
            Ok(db) => db,
            Err(e) => return Ok(HealthStatus::Unhealthy(e.to_string())),
        };
        let ping = db
            .connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await;
        Ok(match ping {
            Ok(()) => HealthStatus::Healthy,
            Err(e) => HealthStatus::Unhealthy(e.to_string()),
        })
    }
}

#[async_trait]
impl RecordStore for SqliteStorage {
    // --- Queues and providers ---

    async fn create_queue(
        &self,
        queue_id: &str,
        providers: &[NewProvider],
    ) -> Result<(Queue, Vec<Provider>), RatelaneError> {
        queries::queues::create_queue(self.database()?, queue_id, providers).await
    }

    async fn get_queue(&self, queue_id: &str) -> Result<Option<Queue>, RatelaneError> {
        queries::queues::get_queue(self.database()?, queue_id).await
    }

    async fn list_providers(&self, queue_id: &str) -> Result<Vec<Provider>, RatelaneError> {
        queries::queues::list_providers(self.database()?, queue_id).await
    }

    async fn provider_for_queue(&self, queue_id: &str) -> Result<Option<Provider>, RatelaneError> {
        queries::queues::provider_for_queue(self.database()?, queue_id).await
    }

    // --- Batches and messages ---

    async fn create_batch(&self, batch: &NewBatch) -> Result<Batch, RatelaneError> {
        queries::batches::create_batch(self.database()?, batch).await
    }

    async fn get_batch(&self, batch_id: &str) -> Result<Option<Batch>, RatelaneError> {
        queries::batches::get_batch(self.database()?, batch_id).await
    }

    async fn get_message(&self, message_id: &str) -> Result<Option<Message>, RatelaneError> {
        queries::messages::get_message(self.database()?, message_id).await
    }

    async fn messages_for_batch(&self, batch_id: &str) -> Result<Vec<Message>, RatelaneError> {
        queries::messages::messages_for_batch(self.database()?, batch_id).await
    }

    async fn begin_processing(&self, message_id: &str) -> Result<MessageClaim, RatelaneError> {
        queries::messages::begin_processing(self.database()?, message_id).await
    }

    async fn complete_message(
        &self,
        message_id: &str,
        result: &str,
        provider_id: &str,
    ) -> Result<bool, RatelaneError> {
        queries::messages::complete_message(self.database()?, message_id, result, provider_id)
            .await
    }

    async fn fail_message(
        &self,
        message_id: &str,
        error: &str,
        counts: bool,
    ) -> Result<bool, RatelaneError> {
        queries::messages::fail_message(self.database()?, message_id, error, counts).await
    }

    async fn mark_response_counted(&self, message_id: &str) -> Result<bool, RatelaneError> {
        queries::messages::mark_response_counted(self.database()?, message_id).await
    }

    async fn mark_retrying(&self, message_id: &str, error: &str) -> Result<bool, RatelaneError> {
        queries::messages::mark_retrying(self.database()?, message_id, error).await
    }

    // --- Aggregation ---

    async fn claim_aggregation(
        &self,
        batch_id: &str,
        lease: Duration,
    ) -> Result<bool, RatelaneError> {
        queries::aggregations::claim_aggregation(self.database()?, batch_id, lease).await
    }

    async fn release_aggregation(&self, batch_id: &str) -> Result<(), RatelaneError> {
        queries::aggregations::release_aggregation(self.database()?, batch_id).await
    }

    async fn complete_batch(
        &self,
        batch_id: &str,
        response_count: u32,
    ) -> Result<bool, RatelaneError> {
        queries::batches::complete_batch(self.database()?, batch_id, response_count).await
    }

    async fn record_webhook(
        &self,
        batch_id: &str,
        status: WebhookStatus,
        called_at: &str,
    ) -> Result<(), RatelaneError> {
        queries::batches::record_webhook(self.database()?, batch_id, status, called_at).await
    }
}

#[async_trait]
impl DurableQueue for SqliteStorage {
    async fn enqueue(
        &self,
        queue_name: &str,
        payload: &str,
        delay: Duration,
    ) -> Result<i64, RatelaneError> {
        queries::queue::enqueue(
            self.database()?,
            queue_name,
            payload,
            delay,
            self.queue_max_attempts,
        )
        .await
    }

    async fn dequeue(
        &self,
        queue_name: &str,
        visibility_timeout: Duration,
    ) -> Result<Option<QueueEntry>, RatelaneError> {
        queries::queue::dequeue(self.database()?, queue_name, visibility_timeout).await
    }

    async fn ack(&self, id: i64) -> Result<(), RatelaneError> {
        queries::queue::ack(self.database()?, id).await
    }

    async fn nack(&self, id: i64) -> Result<(), RatelaneError> {
        queries::queue::nack(self.database()?, id).await
    }
}
