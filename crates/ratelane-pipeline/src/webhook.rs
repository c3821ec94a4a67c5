// SPDX-FileCopyrightText: 2026 Ratelane Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Best-effort webhook delivery of aggregated batch results.

use std::time::Duration;

use ratelane_core::RatelaneError;
use ratelane_core::types::{BatchResults, BatchStatus, ResultRecord, WebhookStatus};
use serde::Serialize;
use tracing::{info, warn};

use crate::recording;

/// Body POSTed to a batch's webhook URL.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookPayload<'a> {
    pub batch_id: &'a str,
    pub status: BatchStatus,
    pub request_count: u32,
    pub response_count: u32,
    pub results: &'a [ResultRecord],
}

impl<'a> From<&'a BatchResults> for WebhookPayload<'a> {
    fn from(results: &'a BatchResults) -> Self {
        Self {
            batch_id: &results.batch_id,
            status: results.status,
            request_count: results.request_count,
            response_count: results.response_count,
            results: &results.results,
        }
    }
}

/// Sends one POST per call; never retries.
#[derive(Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(timeout: Duration) -> Result<Self, RatelaneError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RatelaneError::Webhook(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// POST the results and report the delivery status. Any 2xx is success.
    ///
    /// Failures are logged and returned as [`WebhookStatus::Failed`], never as errors.
    pub async fn deliver(&self, url: &str, results: &BatchResults) -> WebhookStatus {
        let status = match self.send(url, results).await {
            Ok(()) => {
                info!(batch_id = %results.batch_id, "webhook delivered");
                WebhookStatus::Success
            }
            Err(e) => {
                warn!(batch_id = %results.batch_id, error = %e, "webhook delivery failed");
                WebhookStatus::Failed
            }
        };
        recording::record_webhook(if status == WebhookStatus::Success {
            "success"
        } else {
            "failed"
        });
        status
    }

    async fn send(&self, url: &str, results: &BatchResults) -> Result<(), RatelaneError> {
        let response = self
            .client
            .post(url)
            .json(&WebhookPayload::from(results))
            .send()
            .await
            .map_err(|e| RatelaneError::Webhook(format!("request failed: {e}")))?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(RatelaneError::Webhook(format!(
                "receiver returned {}",
                status.as_u16()
            )))
        }
    }
}
