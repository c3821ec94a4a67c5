// SPDX-FileCopyrightText: 2026 Ratelane Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Aggregation claim markers.
//!
//! A batch has at most one row in `batch_aggregations`. Claiming it is a single
//! upsert that only succeeds when no aggregation has completed and any previous
//! claim is older than the lease, so concurrent aggregators for the same batch
//! cannot both proceed.

use std::time::Duration;

use ratelane_core::RatelaneError;
use rusqlite::params;

use crate::database::Database;
use crate::queries::lookback_modifier;

/// Try to take the aggregation claim for a batch.
pub async fn claim_aggregation(
    db: &Database,
    batch_id: &str,
    lease: Duration,
) -> Result<bool, RatelaneError> {
    let batch_id = batch_id.to_string();
    let lease = lookback_modifier(lease);
    db.connection()
        .call(move |conn| {
            let n = conn.execute(
                "INSERT INTO batch_aggregations (batch_id, claimed_at, attempts)
                 VALUES (?1, strftime('%Y-%m-%dT%H:%M:%fZ', 'now'), 1)
                 ON CONFLICT(batch_id) DO UPDATE SET
                     claimed_at = excluded.claimed_at,
                     attempts = batch_aggregations.attempts + 1
                 WHERE batch_aggregations.completed_at IS NULL
                   AND (batch_aggregations.claimed_at IS NULL
                        OR batch_aggregations.claimed_at
                           <= strftime('%Y-%m-%dT%H:%M:%fZ', 'now', ?2))",
                params![batch_id, lease],
            )?;
            Ok(n == 1)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Give up an unfinished claim so a redelivered signal can take it at once.
pub async fn release_aggregation(db: &Database, batch_id: &str) -> Result<(), RatelaneError> {
    let batch_id = batch_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE batch_aggregations SET claimed_at = NULL
                 WHERE batch_id = ?1 AND completed_at IS NULL",
                params![batch_id],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use ratelane_core::types::{NewBatch, NewMessage};

    use super::*;
    use crate::queries::batches::{complete_batch, create_batch};
    use crate::queries::test_support::setup_db;

    async fn seed(db: &Database) {
        create_batch(
            db,
            &NewBatch {
                batch_id: "b1".to_string(),
                queue_id: "q1".to_string(),
                webhook_url: None,
                webhook_event: None,
                messages: vec![(
                    "m1".to_string(),
                    NewMessage {
                        prompt: "hi".to_string(),
                        system_prompt: None,
                        supportive_variable: None,
                    },
                )],
            },
        )
        .await
        .unwrap();
    }

    const LEASE: Duration = Duration::from_secs(300);

    #[tokio::test]
    async fn only_one_live_claim() {
        let (db, _dir) = setup_db().await;
        seed(&db).await;
        assert!(claim_aggregation(&db, "b1", LEASE).await.unwrap());
        assert!(!claim_aggregation(&db, "b1", LEASE).await.unwrap());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn expired_claim_can_be_retaken() {
        let (db, _dir) = setup_db().await;
        seed(&db).await;
        assert!(claim_aggregation(&db, "b1", LEASE).await.unwrap());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(claim_aggregation(&db, "b1", Duration::from_millis(5)).await.unwrap());

        let attempts: i64 = db
            .connection()
            .call(|conn| -> Result<i64, rusqlite::Error> {
                conn.query_row(
                    "SELECT attempts FROM batch_aggregations WHERE batch_id = 'b1'",
                    [],
                    |row| row.get(0),
                )
            })
            .await
            .unwrap();
        assert_eq!(attempts, 2);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn released_claim_is_immediately_available() {
        let (db, _dir) = setup_db().await;
        seed(&db).await;
        assert!(claim_aggregation(&db, "b1", LEASE).await.unwrap());
        release_aggregation(&db, "b1").await.unwrap();
        assert!(claim_aggregation(&db, "b1", LEASE).await.unwrap());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn completed_aggregation_is_never_reclaimed() {
        let (db, _dir) = setup_db().await;
        seed(&db).await;
        assert!(claim_aggregation(&db, "b1", LEASE).await.unwrap());
        assert!(complete_batch(&db, "b1", 1).await.unwrap());
        release_aggregation(&db, "b1").await.unwrap();
        assert!(!claim_aggregation(&db, "b1", Duration::ZERO).await.unwrap());
        db.close().await.unwrap();
    }
}
