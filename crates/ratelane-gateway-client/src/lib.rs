// SPDX-FileCopyrightText: 2026 Ratelane Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway client for the Ratelane dispatch pipeline.
//!
//! Sends normalized chat requests to the rate-limiting gateway's
//! OpenAI-compatible `/v1/chat/completions` endpoint and normalizes the
//! response into [`ratelane_core::types::GatewayResponse`].

pub mod client;
pub mod types;

pub use client::HttpGatewayClient;
