// SPDX-FileCopyrightText: 2026 Ratelane Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Schema migrations, embedded from `migrations/` at compile time.

use ratelane_core::RatelaneError;

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("migrations");
}

/// Brings the schema up to date. Already-applied versions are skipped.
pub fn run_migrations(conn: &mut rusqlite::Connection) -> Result<(), RatelaneError> {
    let report = embedded::migrations::runner()
        .run(conn)
        .map_err(RatelaneError::storage)?;
    for migration in report.applied_migrations() {
        tracing::debug!(version = migration.version(), name = migration.name(), "applied migration");
    }
    Ok(())
}
