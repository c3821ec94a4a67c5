// SPDX-FileCopyrightText: 2026 Ratelane Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Ratelane integration tests.
//!
//! Provides fake collaborators and temp-database fixtures for fast,
//! deterministic tests without a real gateway.
//!
//! # Components
//!
//! - [`MockGateway`] - scripted gateway client that records every call
//! - [`MemoryCounterStore`] - in-memory counter store with TTL support
//! - [`TestStorage`] - SQLite storage in a temp directory with seeding helpers

pub mod fixtures;
pub mod memory_counters;
pub mod mock_gateway;

pub use fixtures::TestStorage;
pub use memory_counters::MemoryCounterStore;
pub use mock_gateway::{MockGateway, MockReply};
