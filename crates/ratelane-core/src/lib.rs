// SPDX-FileCopyrightText: 2026 Ratelane Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Ratelane dispatch pipeline.
//!
//! This crate provides the error type, domain records and adapter traits used
//! throughout the workspace. Storage, gateway and queue backends implement
//! the traits defined here and are injected into the pipeline as handles.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::RatelaneError;
pub use types::{AdapterType, HealthStatus};

// Re-export all adapter traits at crate root.
pub use traits::{Adapter, CounterStore, DurableQueue, GatewayClient, RecordStore};

/// Current UTC time in the millisecond RFC 3339 form used for every stored timestamp.
pub fn now_timestamp() -> String {
    chrono::Utc::now()
        .format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string()
}
