// SPDX-FileCopyrightText: 2026 Ratelane Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions for the pipeline's external collaborators.
//!
//! Every collaborator extends the [`Adapter`] base trait and uses
//! `#[async_trait]` so handles can be passed around as `Arc<dyn ...>`.

pub mod adapter;
pub mod counter;
pub mod gateway;
pub mod queue;
pub mod store;

pub use adapter::Adapter;
pub use counter::CounterStore;
pub use gateway::GatewayClient;
pub use queue::DurableQueue;
pub use store::RecordStore;
