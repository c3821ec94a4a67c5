// SPDX-FileCopyrightText: 2026 Ratelane Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway client trait for calling the upstream provider through the rate-limiting gateway.

use async_trait::async_trait;

use crate::error::RatelaneError;
use crate::traits::adapter::Adapter;
use crate::types::{ChatRequest, GatewayResponse, Provider};

/// Sends prepared chat requests upstream on behalf of a provider.
///
/// Implementations return [`RatelaneError::Gateway`] for upstream failures so
/// callers can classify them with [`RatelaneError::is_retryable`].
#[async_trait]
pub trait GatewayClient: Adapter {
    async fn send_request(
        &self,
        provider: &Provider,
        request: &ChatRequest,
    ) -> Result<GatewayResponse, RatelaneError>;
}
