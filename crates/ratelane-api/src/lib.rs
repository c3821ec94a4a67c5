// SPDX-FileCopyrightText: 2026 Ratelane Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! REST API for Ratelane.
//!
//! Submits prompts to the dispatcher, exposes message and batch state, serves
//! aggregated results as JSON or CSV, and registers queues. `/health` and
//! `/metrics` are public; every other route honours the optional bearer token.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod server;

pub use auth::AuthConfig;
pub use error::ApiError;
pub use server::{AppState, HealthState, build_router, start_server};
