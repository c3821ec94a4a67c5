// SPDX-FileCopyrightText: 2026 Ratelane Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Queue and provider registration.

use ratelane_core::RatelaneError;
use ratelane_core::types::{NewProvider, Provider, ProviderConfig, Queue};
use rusqlite::{OptionalExtension, Row, params};

use crate::database::Database;
use crate::queries::parse_json_column;

const PROVIDER_COLUMNS: &str = "provider_id, queue_id, provider_name, provider_type, api_key,
     rate_limit, time_window, config, created_at";

fn provider_from_row(row: &Row<'_>) -> rusqlite::Result<Provider> {
    let config: ProviderConfig = parse_json_column(7, row.get(7)?)?;
    Ok(Provider {
        provider_id: row.get(0)?,
        queue_id: row.get(1)?,
        provider_name: row.get(2)?,
        provider_type: row.get(3)?,
        api_key: row.get(4)?,
        limit: row.get(5)?,
        time_window: row.get(6)?,
        config,
        created_at: row.get(8)?,
    })
}

/// Register a queue together with its providers in one transaction.
///
/// Fails with [`RatelaneError::QueueAlreadyExists`] if the ID is taken.
pub async fn create_queue(
    db: &Database,
    queue_id: &str,
    providers: &[NewProvider],
) -> Result<(Queue, Vec<Provider>), RatelaneError> {
    // Serialize configs up front; the closure can only fail with rusqlite errors.
    let mut rows = Vec::with_capacity(providers.len());
    for p in providers {
        let config = serde_json::to_string(&p.config).map_err(RatelaneError::storage)?;
        rows.push((
            uuid::Uuid::new_v4().to_string(),
            p.provider_name.clone(),
            p.provider_type.clone(),
            p.api_key.clone(),
            p.limit,
            p.time_window,
            config,
        ));
    }
    let queue_id_owned = queue_id.to_string();

    let created = db
        .connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let exists: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM queues WHERE queue_id = ?1)",
                params![queue_id_owned],
                |row| row.get(0),
            )?;
            if exists {
                return Ok(None);
            }

            tx.execute(
                "INSERT INTO queues (queue_id) VALUES (?1)",
                params![queue_id_owned],
            )?;
            for (id, name, kind, key, limit, window, config) in &rows {
                tx.execute(
                    "INSERT INTO providers (provider_id, queue_id, provider_name, provider_type,
                                            api_key, rate_limit, time_window, config)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    params![id, queue_id_owned, name, kind, key, limit, window, config],
                )?;
            }

            let queue = tx.query_row(
                "SELECT queue_id, created_at FROM queues WHERE queue_id = ?1",
                params![queue_id_owned],
                |row| {
                    Ok(Queue {
                        queue_id: row.get(0)?,
                        created_at: row.get(1)?,
                    })
                },
            )?;
            let providers = {
                let mut stmt = tx.prepare(&format!(
                    "SELECT {PROVIDER_COLUMNS} FROM providers
                     WHERE queue_id = ?1 ORDER BY created_at ASC, rowid ASC"
                ))?;
                let rows = stmt.query_map(params![queue_id_owned], provider_from_row)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            };
            tx.commit()?;
            Ok(Some((queue, providers)))
        })
        .await
        .map_err(crate::database::map_tr_err)?;

    created.ok_or_else(|| RatelaneError::QueueAlreadyExists(format!("Queue {queue_id} already exists")))
}

/// Get a queue by ID.
pub async fn get_queue(db: &Database, queue_id: &str) -> Result<Option<Queue>, RatelaneError> {
    let queue_id = queue_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT queue_id, created_at FROM queues WHERE queue_id = ?1",
                params![queue_id],
                |row| {
                    Ok(Queue {
                        queue_id: row.get(0)?,
                        created_at: row.get(1)?,
                    })
                },
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Remove a queue and (by cascade) its providers. Messages are kept.
///
/// Queue removal belongs to the admin surface; the pipeline only ever sees
/// its effects, so this is compiled for tests and fixtures alone.
#[cfg(any(test, feature = "test-support"))]
pub async fn delete_queue(db: &Database, queue_id: &str) -> Result<bool, RatelaneError> {
    let queue_id = queue_id.to_string();
    db.connection()
        .call(move |conn| {
            let n = conn.execute("DELETE FROM queues WHERE queue_id = ?1", params![queue_id])?;
            Ok(n > 0)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// All providers of a queue, oldest first.
pub async fn list_providers(db: &Database, queue_id: &str) -> Result<Vec<Provider>, RatelaneError> {
    let queue_id = queue_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {PROVIDER_COLUMNS} FROM providers
                 WHERE queue_id = ?1 ORDER BY created_at ASC, rowid ASC"
            ))?;
            let rows = stmt.query_map(params![queue_id], provider_from_row)?;
            rows.collect()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// The provider that serves a queue: the first one registered.
pub async fn provider_for_queue(
    db: &Database,
    queue_id: &str,
) -> Result<Option<Provider>, RatelaneError> {
    let queue_id = queue_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!(
                    "SELECT {PROVIDER_COLUMNS} FROM providers
                     WHERE queue_id = ?1 ORDER BY created_at ASC, rowid ASC LIMIT 1"
                ),
                params![queue_id],
                provider_from_row,
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}
