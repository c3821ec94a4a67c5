// SPDX-FileCopyrightText: 2026 Ratelane Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable named queues with delayed visibility and lock-based redelivery.
//!
//! An entry is delivered when it is `pending` and due, or when it is
//! `processing` but its lock has expired (the consumer died). Expired-lock
//! redeliveries count as failed attempts.

use std::time::Duration;

use ratelane_core::RatelaneError;
use ratelane_core::types::QueueEntry;
use rusqlite::{OptionalExtension, params};

use crate::database::Database;
use crate::queries::offset_modifier;

/// Enqueue a payload visible after `delay`. Returns the entry ID.
pub async fn enqueue(
    db: &Database,
    queue_name: &str,
    payload: &str,
    delay: Duration,
    max_attempts: u32,
) -> Result<i64, RatelaneError> {
    let queue_name = queue_name.to_string();
    let payload = payload.to_string();
    let delay = offset_modifier(delay);
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO queue_entries (queue_name, payload, max_attempts, available_at)
                 VALUES (?1, ?2, ?3, strftime('%Y-%m-%dT%H:%M:%fZ', 'now', ?4))",
                params![queue_name, payload, max_attempts, delay],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Take the next deliverable entry and lock it for `visibility_timeout`.
pub async fn dequeue(
    db: &Database,
    queue_name: &str,
    visibility_timeout: Duration,
) -> Result<Option<QueueEntry>, RatelaneError> {
    let queue_name = queue_name.to_string();
    let visibility = offset_modifier(visibility_timeout);
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;

            // Abandoned entries that have used up their attempts are retired first.
            tx.execute(
                "UPDATE queue_entries SET status = 'failed', attempts = attempts + 1,
                 locked_until = NULL,
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE queue_name = ?1 AND status = 'processing'
                   AND locked_until <= strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                   AND attempts + 1 >= max_attempts",
                params![queue_name],
            )?;

            let next: Option<(i64, bool)> = tx
                .query_row(
                    "SELECT id, status = 'processing' FROM queue_entries
                     WHERE queue_name = ?1 AND (
                         (status = 'pending'
                          AND available_at <= strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
                         OR (status = 'processing'
                          AND locked_until <= strftime('%Y-%m-%dT%H:%M:%fZ', 'now')))
                     ORDER BY available_at ASC, id ASC
                     LIMIT 1",
                    params![queue_name],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;

            let Some((id, redelivery)) = next else {
                tx.commit()?;
                return Ok(None);
            };

            let entry = tx.query_row(
                "UPDATE queue_entries SET status = 'processing',
                 attempts = attempts + ?2,
                 locked_until = strftime('%Y-%m-%dT%H:%M:%fZ', 'now', ?3),
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1
                 RETURNING id, queue_name, payload, status, attempts, max_attempts,
                           available_at, created_at, updated_at, locked_until",
                params![id, i32::from(redelivery), visibility],
                |row| {
                    Ok(QueueEntry {
                        id: row.get(0)?,
                        queue_name: row.get(1)?,
                        payload: row.get(2)?,
                        status: row.get(3)?,
                        attempts: row.get(4)?,
                        max_attempts: row.get(5)?,
                        available_at: row.get(6)?,
                        created_at: row.get(7)?,
                        updated_at: row.get(8)?,
                        locked_until: row.get(9)?,
                    })
                },
            )?;
            tx.commit()?;
            Ok(Some(entry))
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Acknowledge successful handling of an entry.
pub async fn ack(db: &Database, id: i64) -> Result<(), RatelaneError> {
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE queue_entries SET status = 'completed', locked_until = NULL,
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1",
                params![id],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Record a failed delivery.
///
/// Increments attempts. At `max_attempts` the entry is marked `failed`;
/// otherwise it returns to `pending` and is immediately deliverable again.
pub async fn nack(db: &Database, id: i64) -> Result<(), RatelaneError> {
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE queue_entries SET
                     attempts = attempts + 1,
                     status = CASE WHEN attempts + 1 >= max_attempts
                                   THEN 'failed' ELSE 'pending' END,
                     locked_until = NULL,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1",
                params![id],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Count entries of a queue in a given status.
pub async fn count_by_status(
    db: &Database,
    queue_name: &str,
    status: &str,
) -> Result<i64, RatelaneError> {
    let queue_name = queue_name.to_string();
    let status = status.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM queue_entries WHERE queue_name = ?1 AND status = ?2",
                params![queue_name, status],
                |row| row.get(0),
            )
        })
        .await
        .map_err(crate::database::map_tr_err)
}
