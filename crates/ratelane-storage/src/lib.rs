// SPDX-FileCopyrightText: 2026 Ratelane Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the Ratelane dispatch pipeline.
//!
//! Provides WAL-mode SQLite storage with embedded migrations and a
//! single-writer concurrency model via `tokio-rusqlite`. On top of it sit the
//! record store (queues, providers, batches, messages, aggregation markers),
//! the durable named queues used for processing tasks and completion
//! signals, and the counter store.

pub mod adapter;
pub mod counter_store;
pub mod database;
pub mod migrations;
pub mod queries;

pub use adapter::SqliteStorage;
pub use counter_store::SqliteCounterStore;
pub use database::Database;
