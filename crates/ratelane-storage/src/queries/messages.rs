// SPDX-FileCopyrightText: 2026 Ratelane Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message reads and conditional status transitions.
//!
//! Every transition is a single `UPDATE ... WHERE status IN (...)` so a
//! message can never leave `completed` or `failed`, however many times its
//! processing task is delivered.

use ratelane_core::RatelaneError;
use ratelane_core::types::{Message, MessageClaim, MessageStatus, ResponseTally};
use rusqlite::{OptionalExtension, Row, params};

use crate::database::Database;
use crate::queries::{parse_column, parse_json_column};

pub(crate) const MESSAGE_COLUMNS: &str = "message_id, batch_id, queue_id, provider_id, status,
     prompt, system_prompt, supportive_variable, result, error_message, attempts,
     created_at, updated_at";

/// Statuses a message may be moved out of.
const OPEN_STATUSES: &str = "('pending', 'processing', 'retrying')";

pub(crate) fn message_from_row(row: &Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        message_id: row.get(0)?,
        batch_id: row.get(1)?,
        queue_id: row.get(2)?,
        provider_id: row.get(3)?,
        status: parse_column(4, row.get(4)?)?,
        prompt: row.get(5)?,
        system_prompt: row.get(6)?,
        supportive_variable: parse_json_column(7, row.get(7)?)?,
        result: row.get(8)?,
        error_message: row.get(9)?,
        attempts: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

/// Get a message by ID.
pub async fn get_message(db: &Database, message_id: &str) -> Result<Option<Message>, RatelaneError> {
    let message_id = message_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE message_id = ?1"),
                params![message_id],
                message_from_row,
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Messages of a batch in submission order.
pub async fn messages_for_batch(
    db: &Database,
    batch_id: &str,
) -> Result<Vec<Message>, RatelaneError> {
    let batch_id = batch_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages WHERE batch_id = ?1 ORDER BY rowid ASC"
            ))?;
            let rows = stmt.query_map(params![batch_id], message_from_row)?;
            rows.collect()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Move a non-terminal message to `processing` and count the attempt.
pub async fn begin_processing(
    db: &Database,
    message_id: &str,
) -> Result<MessageClaim, RatelaneError> {
    let message_id = message_id.to_string();
    db.connection()
        .call(move |conn| {
            let claimed = conn
                .query_row(
                    &format!(
                        "UPDATE messages SET status = 'processing', attempts = attempts + 1,
                         updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                         WHERE message_id = ?1 AND status IN {OPEN_STATUSES}
                         RETURNING {MESSAGE_COLUMNS}"
                    ),
                    params![message_id],
                    message_from_row,
                )
                .optional()?;
            if let Some(message) = claimed {
                return Ok(MessageClaim::Claimed(message));
            }

            let terminal = conn
                .query_row(
                    "SELECT status, batch_id, response_tally FROM messages WHERE message_id = ?1",
                    params![message_id],
                    |row| {
                        Ok(MessageClaim::AlreadyTerminal {
                            status: parse_column::<MessageStatus>(0, row.get(0)?)?,
                            batch_id: row.get(1)?,
                            tally: parse_column::<ResponseTally>(2, row.get(2)?)?,
                        })
                    },
                )
                .optional()?;
            Ok(terminal.unwrap_or(MessageClaim::NotFound))
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Record a successful result. Returns false if the message was already terminal.
pub async fn complete_message(
    db: &Database,
    message_id: &str,
    result: &str,
    provider_id: &str,
) -> Result<bool, RatelaneError> {
    let message_id = message_id.to_string();
    let result = result.to_string();
    let provider_id = provider_id.to_string();
    db.connection()
        .call(move |conn| {
            let n = conn.execute(
                &format!(
                    "UPDATE messages SET status = 'completed', result = ?2, provider_id = ?3,
                     error_message = NULL, response_tally = 'owed',
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                     WHERE message_id = ?1 AND status IN {OPEN_STATUSES}"
                ),
                params![message_id, result, provider_id],
            )?;
            Ok(n == 1)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Record a terminal failure. Returns false if the message was already terminal.
///
/// A failure that `counts` owes its batch one response.
pub async fn fail_message(
    db: &Database,
    message_id: &str,
    error: &str,
    counts: bool,
) -> Result<bool, RatelaneError> {
    let tally = if counts {
        ResponseTally::Owed
    } else {
        ResponseTally::NotOwed
    };
    set_open_message_error(db, message_id, error, MessageStatus::Failed, tally).await
}

/// Record a retryable failure; the message stays open.
pub async fn mark_retrying(
    db: &Database,
    message_id: &str,
    error: &str,
) -> Result<bool, RatelaneError> {
    set_open_message_error(
        db,
        message_id,
        error,
        MessageStatus::Retrying,
        ResponseTally::NotOwed,
    )
    .await
}

async fn set_open_message_error(
    db: &Database,
    message_id: &str,
    error: &str,
    status: MessageStatus,
    tally: ResponseTally,
) -> Result<bool, RatelaneError> {
    let message_id = message_id.to_string();
    let error = error.to_string();
    let status = status.to_string();
    let tally = tally.to_string();
    db.connection()
        .call(move |conn| {
            let n = conn.execute(
                &format!(
                    "UPDATE messages SET status = ?2, error_message = ?3, response_tally = ?4,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                     WHERE message_id = ?1 AND status IN {OPEN_STATUSES}"
                ),
                params![message_id, status, error, tally],
            )?;
            Ok(n == 1)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Settle an owed response. Returns false if the message owed nothing.
pub async fn mark_response_counted(db: &Database, message_id: &str) -> Result<bool, RatelaneError> {
    let message_id = message_id.to_string();
    db.connection()
        .call(move |conn| {
            let n = conn.execute(
                "UPDATE messages SET response_tally = 'counted'
                 WHERE message_id = ?1 AND response_tally = 'owed'",
                params![message_id],
            )?;
            Ok(n == 1)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use ratelane_core::types::{NewBatch, NewMessage};

    use super::*;
    use crate::queries::batches::create_batch;
    use crate::queries::test_support::setup_db;

    async fn seed(db: &Database, ids: &[&str]) {
        let batch = NewBatch {
            batch_id: "b1".to_string(),
            queue_id: "q1".to_string(),
            webhook_url: None,
            webhook_event: None,
            messages: ids
                .iter()
                .map(|id| {
                    (
                        id.to_string(),
                        NewMessage {
                            prompt: format!("prompt {id}"),
                            system_prompt: None,
                            supportive_variable: None,
                        },
                    )
                })
                .collect(),
        };
        create_batch(db, &batch).await.unwrap();
    }

    #[tokio::test]
    async fn begin_processing_counts_attempts() {
        let (db, _dir) = setup_db().await;
        seed(&db, &["m1"]).await;

        let MessageClaim::Claimed(msg) = begin_processing(&db, "m1").await.unwrap() else {
            panic!("expected claim");
        };
        assert_eq!(msg.status, MessageStatus::Processing);
        assert_eq!(msg.attempts, 1);

        // A redelivered task may reclaim a message still marked processing.
        let MessageClaim::Claimed(msg) = begin_processing(&db, "m1").await.unwrap() else {
            panic!("expected reclaim");
        };
        assert_eq!(msg.attempts, 2);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn terminal_messages_cannot_be_reclaimed() {
        let (db, _dir) = setup_db().await;
        seed(&db, &["m1"]).await;
        begin_processing(&db, "m1").await.unwrap();
        assert!(complete_message(&db, "m1", "hi", "p1").await.unwrap());

        assert_eq!(
            begin_processing(&db, "m1").await.unwrap(),
            MessageClaim::AlreadyTerminal {
                status: MessageStatus::Completed,
                batch_id: Some("b1".to_string()),
                tally: ResponseTally::Owed,
            }
        );
        assert!(!complete_message(&db, "m1", "again", "p1").await.unwrap());
        assert!(!fail_message(&db, "m1", "late", true).await.unwrap());

        let msg = get_message(&db, "m1").await.unwrap().unwrap();
        assert_eq!(msg.result.as_deref(), Some("hi"));
        assert_eq!(msg.provider_id.as_deref(), Some("p1"));
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn retrying_keeps_message_open() {
        let (db, _dir) = setup_db().await;
        seed(&db, &["m1"]).await;
        begin_processing(&db, "m1").await.unwrap();
        assert!(mark_retrying(&db, "m1", "gateway error: 503").await.unwrap());

        let msg = get_message(&db, "m1").await.unwrap().unwrap();
        assert_eq!(msg.status, MessageStatus::Retrying);
        assert_eq!(msg.error_message.as_deref(), Some("gateway error: 503"));

        assert!(matches!(
            begin_processing(&db, "m1").await.unwrap(),
            MessageClaim::Claimed(_)
        ));
        assert!(fail_message(&db, "m1", "gave up", true).await.unwrap());
        assert_eq!(
            get_message(&db, "m1").await.unwrap().unwrap().status,
            MessageStatus::Failed
        );
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn owed_response_is_settled_once() {
        let (db, _dir) = setup_db().await;
        seed(&db, &["m1", "m2"]).await;
        begin_processing(&db, "m1").await.unwrap();
        assert!(fail_message(&db, "m1", "bad request", true).await.unwrap());
        begin_processing(&db, "m2").await.unwrap();
        assert!(fail_message(&db, "m2", "queue removed", false).await.unwrap());

        assert!(mark_response_counted(&db, "m1").await.unwrap());
        assert!(!mark_response_counted(&db, "m1").await.unwrap());
        assert!(!mark_response_counted(&db, "m2").await.unwrap());

        let tally = |claim: MessageClaim| match claim {
            MessageClaim::AlreadyTerminal { tally, .. } => tally,
            other => panic!("unexpected claim {other:?}"),
        };
        assert_eq!(
            tally(begin_processing(&db, "m1").await.unwrap()),
            ResponseTally::Counted
        );
        assert_eq!(
            tally(begin_processing(&db, "m2").await.unwrap()),
            ResponseTally::NotOwed
        );
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn unknown_message_is_not_found() {
        let (db, _dir) = setup_db().await;
        assert_eq!(
            begin_processing(&db, "ghost").await.unwrap(),
            MessageClaim::NotFound
        );
        assert!(get_message(&db, "ghost").await.unwrap().is_none());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn batch_messages_keep_submission_order() {
        let (db, _dir) = setup_db().await;
        seed(&db, &["z", "a", "m"]).await;
        let ids: Vec<String> = messages_for_batch(&db, "b1")
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.message_id)
            .collect();
        assert_eq!(ids, vec!["z", "a", "m"]);
        db.close().await.unwrap();
    }
}
