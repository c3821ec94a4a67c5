// SPDX-FileCopyrightText: 2026 Ratelane Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the gateway's chat completions endpoint.
//!
//! Each request authenticates with the provider's own API key. Retries are
//! not done here; callers classify failures with
//! [`RatelaneError::is_retryable`] and schedule them.

use std::time::Instant;

use async_trait::async_trait;
use ratelane_config::model::GatewayConfig;
use ratelane_core::types::{ChatRequest, GatewayResponse, Provider};
use ratelane_core::{Adapter, AdapterType, GatewayClient, HealthStatus, RatelaneError};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use tracing::{debug, warn};

use crate::types::{ApiErrorResponse, ChatCompletionRequest, ChatCompletionResponse};

const COMPLETIONS_PATH: &str = "/v1/chat/completions";

/// Gateway client speaking the OpenAI-compatible chat completions format.
#[derive(Debug, Clone)]
pub struct HttpGatewayClient {
    client: reqwest::Client,
    endpoint: String,
    default_azure_api_version: String,
}

impl HttpGatewayClient {
    /// Builds a client with the configured base URL and request timeout.
    pub fn new(config: &GatewayConfig) -> Result<Self, RatelaneError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| RatelaneError::Gateway {
                message: format!("failed to build HTTP client: {e}"),
                status: None,
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            endpoint: format!(
                "{}{COMPLETIONS_PATH}",
                config.base_url.trim_end_matches('/')
            ),
            default_azure_api_version: config.default_azure_api_version.clone(),
        })
    }

    /// The full URL requests are posted to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn headers_for(&self, provider: &Provider) -> Result<HeaderMap, RatelaneError> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", provider.api_key))
            .map_err(|e| RatelaneError::Config(format!("invalid API key header value: {e}")))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if provider.is_azure() {
            let version = provider
                .config
                .api_version
                .as_deref()
                .unwrap_or(&self.default_azure_api_version);
            headers.insert(
                "api-version",
                HeaderValue::from_str(version).map_err(|e| {
                    RatelaneError::Config(format!("invalid api-version header value: {e}"))
                })?,
            );
        }
        Ok(headers)
    }
}

#[async_trait]
impl Adapter for HttpGatewayClient {
    fn name(&self) -> &str {
        "http-gateway"
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Gateway
    }

    async fn health_check(&self) -> Result<HealthStatus, RatelaneError> {
        Ok(HealthStatus::Healthy)
    }
}

#[async_trait]
impl GatewayClient for HttpGatewayClient {
    async fn send_request(
        &self,
        provider: &Provider,
        request: &ChatRequest,
    ) -> Result<GatewayResponse, RatelaneError> {
        let started = Instant::now();
        let response = self
            .client
            .post(&self.endpoint)
            .headers(self.headers_for(provider)?)
            .json(&ChatCompletionRequest::from(request))
            .send()
            .await
            .map_err(|e| {
                let message = if e.is_timeout() {
                    format!("request to gateway timed out: {e}")
                } else {
                    format!("request to gateway failed: {e}")
                };
                RatelaneError::Gateway {
                    message,
                    status: None,
                    source: Some(Box::new(e)),
                }
            })?;

        let status = response.status();
        debug!(
            status = %status,
            provider_type = %provider.provider_type,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "gateway response received"
        );

        if status == reqwest::StatusCode::OK {
            let body = response.text().await.map_err(|e| RatelaneError::Gateway {
                message: format!("failed to read gateway response body: {e}"),
                status: None,
                source: Some(Box::new(e)),
            })?;
            let parsed: ChatCompletionResponse =
                serde_json::from_str(&body).map_err(|e| RatelaneError::Gateway {
                    message: format!("failed to parse gateway response: {e}"),
                    status: Some(status.as_u16()),
                    source: Some(Box::new(e)),
                })?;
            return Ok(GatewayResponse {
                content: parsed.first_content().to_string(),
                usage: parsed.usage,
                model: parsed.model,
                provider: provider.provider_type.clone(),
            });
        }

        let body = response.text().await.unwrap_or_default();
        warn!(status = %status, provider_type = %provider.provider_type, "gateway request rejected");
        let message = match serde_json::from_str::<ApiErrorResponse>(&body) {
            Ok(api_err) => match api_err.error.type_ {
                Some(kind) => format!(
                    "gateway request failed: {} ({kind}): {}",
                    status.as_u16(),
                    api_err.error.message
                ),
                None => format!(
                    "gateway request failed: {} - {}",
                    status.as_u16(),
                    api_err.error.message
                ),
            },
            Err(_) => format!("gateway request failed: {} - {body}", status.as_u16()),
        };
        Err(RatelaneError::Gateway {
            message,
            status: Some(status.as_u16()),
            source: None,
        })
    }
}
