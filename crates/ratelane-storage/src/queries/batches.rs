// SPDX-FileCopyrightText: 2026 Ratelane Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Batch creation, completion and webhook bookkeeping.

use ratelane_core::RatelaneError;
use ratelane_core::types::{Batch, NewBatch, WebhookStatus};
use rusqlite::{OptionalExtension, Row, Transaction, params};

use crate::database::Database;
use crate::queries::parse_column;

const BATCH_COLUMNS: &str = "batch_id, request_count, response_count, webhook_url, webhook_event,
     webhook_status, webhook_last_called_at, status, created_at, updated_at";

fn batch_from_row(row: &Row<'_>) -> rusqlite::Result<Batch> {
    Ok(Batch {
        batch_id: row.get(0)?,
        request_count: row.get(1)?,
        response_count: row.get(2)?,
        webhook_url: row.get(3)?,
        webhook_event: row.get(4)?,
        webhook_status: parse_column(5, row.get(5)?)?,
        webhook_last_called_at: row.get(6)?,
        status: parse_column(7, row.get(7)?)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

fn select_batch(tx: &Transaction<'_>, batch_id: &str) -> rusqlite::Result<Batch> {
    tx.query_row(
        &format!("SELECT {BATCH_COLUMNS} FROM batches WHERE batch_id = ?1"),
        params![batch_id],
        batch_from_row,
    )
}

/// Insert a batch and all of its `pending` messages atomically.
pub async fn create_batch(db: &Database, batch: &NewBatch) -> Result<Batch, RatelaneError> {
    if batch.messages.is_empty() {
        return Err(RatelaneError::Validation(
            "a batch needs at least one message".to_string(),
        ));
    }

    let mut messages = Vec::with_capacity(batch.messages.len());
    for (id, input) in &batch.messages {
        let vars = input
            .supportive_variable
            .clone()
            .unwrap_or_else(|| serde_json::Value::Object(Default::default()));
        let vars = serde_json::to_string(&vars).map_err(RatelaneError::storage)?;
        messages.push((id.clone(), input.prompt.clone(), input.system_prompt.clone(), vars));
    }
    let batch_id = batch.batch_id.clone();
    let queue_id = batch.queue_id.clone();
    let webhook_url = batch.webhook_url.clone();
    let webhook_event = batch.webhook_event.clone();
    let request_count = messages.len() as i64;

    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO batches (batch_id, request_count, webhook_url, webhook_event)
                 VALUES (?1, ?2, ?3, ?4)",
                params![batch_id, request_count, webhook_url, webhook_event],
            )?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO messages (message_id, batch_id, queue_id, prompt,
                                           system_prompt, supportive_variable)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                )?;
                for (id, prompt, system_prompt, vars) in &messages {
                    stmt.execute(params![id, batch_id, queue_id, prompt, system_prompt, vars])?;
                }
            }
            let created = select_batch(&tx, &batch_id)?;
            tx.commit()?;
            Ok(created)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Get a batch by ID.
pub async fn get_batch(db: &Database, batch_id: &str) -> Result<Option<Batch>, RatelaneError> {
    let batch_id = batch_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {BATCH_COLUMNS} FROM batches WHERE batch_id = ?1"),
                params![batch_id],
                batch_from_row,
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Flip a `processing` batch to `completed` and close its aggregation claim.
///
/// Both writes share one transaction. Returns false when the batch was not
/// `processing`, in which case nothing is written.
pub async fn complete_batch(
    db: &Database,
    batch_id: &str,
    response_count: u32,
) -> Result<bool, RatelaneError> {
    let batch_id = batch_id.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            // MIN() keeps the stored count within request_count.
            let flipped = tx.execute(
                "UPDATE batches SET status = 'completed',
                 response_count = MAX(response_count, MIN(?2, request_count)),
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE batch_id = ?1 AND status = 'processing'",
                params![batch_id, response_count],
            )?;
            if flipped == 0 {
                return Ok(false);
            }
            tx.execute(
                "INSERT INTO batch_aggregations (batch_id, claimed_at, completed_at, attempts)
                 VALUES (?1, strftime('%Y-%m-%dT%H:%M:%fZ', 'now'),
                         strftime('%Y-%m-%dT%H:%M:%fZ', 'now'), 1)
                 ON CONFLICT(batch_id) DO UPDATE SET
                     completed_at = excluded.completed_at",
                params![batch_id],
            )?;
            tx.commit()?;
            Ok(true)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Record the outcome and time of a webhook call.
pub async fn record_webhook(
    db: &Database,
    batch_id: &str,
    status: WebhookStatus,
    called_at: &str,
) -> Result<(), RatelaneError> {
    let batch_id = batch_id.to_string();
    let status = status.to_string();
    let called_at = called_at.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE batches SET webhook_status = ?2, webhook_last_called_at = ?3,
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE batch_id = ?1",
                params![batch_id, status, called_at],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}
