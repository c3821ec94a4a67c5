// SPDX-FileCopyrightText: 2026 Ratelane Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Identity and health reporting shared by every injected backend.

use async_trait::async_trait;

use crate::error::RatelaneError;
use crate::types::{AdapterType, HealthStatus};

/// Supertrait of the storage, queue, counter and gateway handles.
///
/// `/health` walks the registered adapters and reports each one.
#[async_trait]
pub trait Adapter: Send + Sync + 'static {
    /// Short label used in logs and the health report, e.g. `sqlite`.
    fn name(&self) -> &str;

    fn adapter_type(&self) -> AdapterType;

    /// Checks the backend. An `Err` is reported as unhealthy.
    async fn health_check(&self) -> Result<HealthStatus, RatelaneError>;
}
