// SPDX-FileCopyrightText: 2026 Ratelane Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Counter hashes and expiring cache entries.

use std::collections::HashMap;
use std::time::Duration;

use ratelane_core::RatelaneError;
use rusqlite::{OptionalExtension, params};

use crate::database::Database;
use crate::queries::offset_modifier;

/// Set integer fields on a hash, overwriting existing values.
pub async fn hash_set(
    db: &Database,
    key: &str,
    fields: &[(&str, i64)],
) -> Result<(), RatelaneError> {
    let key = key.to_string();
    let fields: Vec<(String, i64)> = fields.iter().map(|(f, v)| (f.to_string(), *v)).collect();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO counter_fields (key, field, value) VALUES (?1, ?2, ?3)
                     ON CONFLICT(key, field) DO UPDATE SET value = excluded.value",
                )?;
                for (field, value) in &fields {
                    stmt.execute(params![key, field, value])?;
                }
            }
            tx.commit()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Atomically add `delta` to a field and return the new value.
pub async fn hash_increment(
    db: &Database,
    key: &str,
    field: &str,
    delta: i64,
) -> Result<i64, RatelaneError> {
    let key = key.to_string();
    let field = field.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "INSERT INTO counter_fields (key, field, value) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key, field) DO UPDATE SET value = value + excluded.value
                 RETURNING value",
                params![key, field, delta],
                |row| row.get(0),
            )
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// All fields of a hash.
pub async fn hash_get_all(
    db: &Database,
    key: &str,
) -> Result<HashMap<String, i64>, RatelaneError> {
    let key = key.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare("SELECT field, value FROM counter_fields WHERE key = ?1")?;
            let rows = stmt.query_map(params![key], |row| Ok((row.get(0)?, row.get(1)?)))?;
            rows.collect()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Store a value that expires after `ttl`, replacing any previous value.
pub async fn set_with_ttl(
    db: &Database,
    key: &str,
    value: &str,
    ttl: Duration,
) -> Result<(), RatelaneError> {
    let key = key.to_string();
    let value = value.to_string();
    let ttl = offset_modifier(ttl);
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO cache_entries (key, value, expires_at)
                 VALUES (?1, ?2, strftime('%Y-%m-%dT%H:%M:%fZ', 'now', ?3))
                 ON CONFLICT(key) DO UPDATE SET
                     value = excluded.value, expires_at = excluded.expires_at",
                params![key, value, ttl],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Store a value unless an unexpired one exists. Returns whether it was written.
pub async fn set_if_absent_with_ttl(
    db: &Database,
    key: &str,
    value: &str,
    ttl: Duration,
) -> Result<bool, RatelaneError> {
    let key = key.to_string();
    let value = value.to_string();
    let ttl = offset_modifier(ttl);
    db.connection()
        .call(move |conn| {
            let n = conn.execute(
                "INSERT INTO cache_entries (key, value, expires_at)
                 VALUES (?1, ?2, strftime('%Y-%m-%dT%H:%M:%fZ', 'now', ?3))
                 ON CONFLICT(key) DO UPDATE SET
                     value = excluded.value, expires_at = excluded.expires_at
                 WHERE cache_entries.expires_at <= strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
                params![key, value, ttl],
            )?;
            Ok(n == 1)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Get a value if it has not expired.
pub async fn get(db: &Database, key: &str) -> Result<Option<String>, RatelaneError> {
    let key = key.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT value FROM cache_entries
                 WHERE key = ?1 AND expires_at > strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
                params![key],
                |row| row.get(0),
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Delete expired cache entries. Returns the number removed.
pub async fn purge_expired(db: &Database) -> Result<u64, RatelaneError> {
    db.connection()
        .call(|conn| {
            let n = conn.execute(
                "DELETE FROM cache_entries
                 WHERE expires_at <= strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
                [],
            )?;
            Ok(n as u64)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::test_support::setup_db;

    #[tokio::test]
    async fn increment_returns_running_total() {
        let (db, _dir) = setup_db().await;
        hash_set(&db, "batch:b1", &[("req.count", 3), ("res.count", 0)])
            .await
            .unwrap();
        assert_eq!(hash_increment(&db, "batch:b1", "res.count", 1).await.unwrap(), 1);
        assert_eq!(hash_increment(&db, "batch:b1", "res.count", 1).await.unwrap(), 2);

        let all = hash_get_all(&db, "batch:b1").await.unwrap();
        assert_eq!(all.get("req.count"), Some(&3));
        assert_eq!(all.get("res.count"), Some(&2));
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn increment_of_missing_field_starts_at_zero() {
        let (db, _dir) = setup_db().await;
        assert_eq!(hash_increment(&db, "batch:x", "res.count", 1).await.unwrap(), 1);
        assert!(hash_get_all(&db, "batch:none").await.unwrap().is_empty());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn concurrent_increments_are_not_lost() {
        let (db, _dir) = setup_db().await;
        let mut handles = Vec::new();
        for _ in 0..20 {
            let db = db.clone();
            handles.push(tokio::spawn(async move {
                hash_increment(&db, "batch:b1", "res.count", 1).await.unwrap()
            }));
        }
        let mut seen = Vec::new();
        for h in handles {
            seen.push(h.await.unwrap());
        }
        seen.sort_unstable();
        assert_eq!(seen, (1..=20).collect::<Vec<i64>>());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn expired_values_are_hidden_then_purged() {
        let (db, _dir) = setup_db().await;
        set_with_ttl(&db, "message:m1", "{}", Duration::from_millis(30))
            .await
            .unwrap();
        set_with_ttl(&db, "batch_results:b1", "[]", Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(get(&db, "message:m1").await.unwrap().as_deref(), Some("{}"));

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(get(&db, "message:m1").await.unwrap().is_none());
        assert_eq!(purge_expired(&db).await.unwrap(), 1);
        assert_eq!(
            get(&db, "batch_results:b1").await.unwrap().as_deref(),
            Some("[]")
        );
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn set_if_absent_keeps_first_value_until_expiry() {
        let (db, _dir) = setup_db().await;
        let ttl = Duration::from_millis(40);
        assert!(set_if_absent_with_ttl(&db, "batch_results:b1", "first", ttl).await.unwrap());
        assert!(!set_if_absent_with_ttl(&db, "batch_results:b1", "second", ttl).await.unwrap());
        assert_eq!(
            get(&db, "batch_results:b1").await.unwrap().as_deref(),
            Some("first")
        );

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(set_if_absent_with_ttl(&db, "batch_results:b1", "third", ttl).await.unwrap());
        assert_eq!(
            get(&db, "batch_results:b1").await.unwrap().as_deref(),
            Some("third")
        );
        db.close().await.unwrap();
    }
}
