// SPDX-FileCopyrightText: 2026 Ratelane Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query modules for the storage entities, plus shared row conversions.

pub mod aggregations;
pub mod batches;
pub mod counters;
pub mod messages;
pub mod queue;
pub mod queues;

use std::str::FromStr;
use std::time::Duration;

use rusqlite::types::Type;

/// Parses a TEXT column into a strum-backed enum.
pub(crate) fn parse_column<T>(idx: usize, value: String) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    T::from_str(&value)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Parses a TEXT column holding JSON.
pub(crate) fn parse_json_column<T: serde::de::DeserializeOwned>(
    idx: usize,
    value: String,
) -> rusqlite::Result<T> {
    serde_json::from_str(&value)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// SQLite date modifier for "now plus `d`", e.g. `+1.500 seconds`.
pub(crate) fn offset_modifier(d: Duration) -> String {
    format!("+{:.3} seconds", d.as_secs_f64())
}

/// SQLite date modifier for "now minus `d`".
pub(crate) fn lookback_modifier(d: Duration) -> String {
    format!("-{:.3} seconds", d.as_secs_f64())
}

#[cfg(test)]
pub(crate) mod test_support {
    use tempfile::{TempDir, tempdir};

    use crate::database::Database;

    pub async fn setup_db() -> (Database, TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }
}
