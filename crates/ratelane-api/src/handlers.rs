// SPDX-FileCopyrightText: 2026 Ratelane Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the REST API.

use std::collections::BTreeMap;

use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use ratelane_core::types::{
    Batch, BatchCounters, BatchResults, Message, NewMessage, NewProvider, Provider,
    ProviderConfig,
};
use ratelane_core::{HealthStatus, RatelaneError};
use ratelane_pipeline::Submission;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::server::AppState;

/// Success envelope: `{success: true, data}`.
#[derive(Debug, Serialize)]
pub struct DataResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> DataResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data,
        })
    }
}

// --- Messages ---

/// Body of `POST /message/create`: a single prompt or a `messages` list.
#[derive(Debug, Deserialize)]
pub struct CreateMessageRequest {
    #[serde(default)]
    pub queue_id: Option<String>,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub supportive_variable: Option<serde_json::Value>,
    #[serde(default)]
    pub messages: Option<Vec<NewMessage>>,
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default)]
    pub webhook_event: Option<String>,
}

impl CreateMessageRequest {
    /// Turn the body into a submission; `true` when it was a batch request.
    fn into_submission(self) -> Result<(Submission, bool), ApiError> {
        let queue_id = self
            .queue_id
            .filter(|q| !q.trim().is_empty())
            .ok_or_else(|| ApiError::bad_request("queue_id is required"))?;

        if let Some(messages) = self.messages {
            if messages.is_empty() {
                return Err(ApiError::bad_request("messages must not be empty"));
            }
            return Ok((
                Submission {
                    queue_id,
                    messages,
                    webhook_url: self.webhook_url,
                    webhook_event: self.webhook_event,
                },
                true,
            ));
        }

        let prompt = self
            .prompt
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| ApiError::bad_request("prompt is required"))?;
        let mut submission = Submission::single(
            queue_id,
            NewMessage {
                prompt,
                system_prompt: self.system_prompt,
                supportive_variable: self.supportive_variable,
            },
        );
        submission.webhook_url = self.webhook_url;
        submission.webhook_event = self.webhook_event;
        Ok((submission, false))
    }
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum CreateMessageResponse {
    Single {
        success: bool,
        message: String,
        batch_id: String,
        message_id: String,
    },
    Batch {
        success: bool,
        message: String,
        batch_id: String,
        message_count: usize,
        message_ids: Vec<String>,
    },
}

/// POST /message/create
pub async fn create_message(
    State(state): State<AppState>,
    body: Result<Json<CreateMessageRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreateMessageResponse>), ApiError> {
    let Json(body) = body?;
    let (submission, is_batch) = body.into_submission()?;
    let receipt = state.dispatcher.dispatch(submission).await?;

    let response = if is_batch {
        CreateMessageResponse::Batch {
            success: true,
            message: "Batch created successfully".to_string(),
            batch_id: receipt.batch_id,
            message_count: receipt.message_ids.len(),
            message_ids: receipt.message_ids,
        }
    } else {
        let message_id = receipt
            .message_ids
            .into_iter()
            .next()
            .ok_or_else(|| RatelaneError::Internal("dispatch returned no message id".into()))?;
        CreateMessageResponse::Single {
            success: true,
            message: "Message created successfully".to_string(),
            batch_id: receipt.batch_id,
            message_id,
        }
    };
    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /message/read/{message_id}
pub async fn read_message(
    State(state): State<AppState>,
    Path(message_id): Path<String>,
) -> Result<Json<DataResponse<Message>>, ApiError> {
    let message = state
        .records
        .get_message(&message_id)
        .await?
        .ok_or_else(|| RatelaneError::MessageNotFound(format!("Message {message_id} not found")))?;
    Ok(DataResponse::ok(message))
}

// --- Batches ---

/// A batch with its live counters.
#[derive(Debug, Serialize)]
pub struct BatchView {
    #[serde(flatten)]
    pub batch: Batch,
    pub counters: Option<BatchCounters>,
    pub completion_percentage: f64,
}

async fn load_batch(state: &AppState, batch_id: &str) -> Result<Batch, ApiError> {
    Ok(state
        .records
        .get_batch(batch_id)
        .await?
        .ok_or_else(|| RatelaneError::BatchNotFound(format!("Batch {batch_id} not found")))?)
}

/// GET /batch/{batch_id}
pub async fn get_batch(
    State(state): State<AppState>,
    Path(batch_id): Path<String>,
) -> Result<Json<DataResponse<BatchView>>, ApiError> {
    let batch = load_batch(&state, &batch_id).await?;
    let counters = state.results.batch_counters(&batch_id).await?;

    // Live counters run ahead of the stored count until aggregation.
    let completion_percentage = match counters {
        Some(c) if c.request_count > 0 => {
            (c.response_count.min(c.request_count) as f64 / c.request_count as f64) * 100.0
        }
        _ => batch.completion_percentage(),
    };
    Ok(DataResponse::ok(BatchView {
        batch,
        counters,
        completion_percentage,
    }))
}

/// GET /batch/{batch_id}/messages
pub async fn batch_messages(
    State(state): State<AppState>,
    Path(batch_id): Path<String>,
) -> Result<Json<DataResponse<Vec<Message>>>, ApiError> {
    load_batch(&state, &batch_id).await?;
    let messages = state.records.messages_for_batch(&batch_id).await?;
    Ok(DataResponse::ok(messages))
}

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ResultFormat {
    #[default]
    Json,
    Csv,
}

#[derive(Debug, Deserialize)]
pub struct ResultsQuery {
    #[serde(default)]
    pub format: ResultFormat,
}

/// Column order of the CSV export.
pub const CSV_HEADER: [&str; 5] = ["message_id", "status", "prompt", "result", "error_message"];

/// Render aggregated results as CSV, one row per message.
pub fn results_to_csv(results: &BatchResults) -> Result<Vec<u8>, RatelaneError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    let csv_err = |e: csv::Error| RatelaneError::Internal(format!("failed to write CSV: {e}"));
    writer.write_record(CSV_HEADER).map_err(csv_err)?;
    for record in &results.results {
        let status = record.status.to_string();
        writer
            .write_record([
                record.message_id.as_str(),
                status.as_str(),
                record.prompt.as_str(),
                record.result.as_deref().unwrap_or_default(),
                record.error_message.as_deref().unwrap_or_default(),
            ])
            .map_err(csv_err)?;
    }
    writer
        .into_inner()
        .map_err(|e| RatelaneError::Internal(format!("failed to flush CSV: {e}")))
}

/// GET /batch/{batch_id}/results?format=json|csv
pub async fn batch_results(
    State(state): State<AppState>,
    Path(batch_id): Path<String>,
    query: Result<Query<ResultsQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(query) = query?;
    let results = state.results.batch_results(&batch_id).await?.ok_or_else(|| {
        ApiError::not_found(format!(
            "Results for batch {batch_id} are not available; aggregation has not completed"
        ))
    })?;

    match query.format {
        ResultFormat::Json => Ok(DataResponse::ok(results).into_response()),
        ResultFormat::Csv => {
            let body = results_to_csv(&results)?;
            Ok((
                [
                    (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
                    (
                        header::CONTENT_DISPOSITION,
                        format!("attachment; filename=batch_{batch_id}.csv"),
                    ),
                ],
                body,
            )
                .into_response())
        }
    }
}

// --- Queues ---

/// Body of `POST /queue/create`.
#[derive(Deserialize)]
pub struct CreateQueueRequest {
    #[serde(default)]
    pub queue_id: Option<String>,
    #[serde(default)]
    pub providers: Vec<NewProvider>,
}

/// A provider as shown to callers; the API key never leaves the server.
#[derive(Debug, Serialize)]
pub struct ProviderView {
    pub provider_id: String,
    pub provider_name: String,
    pub provider_type: String,
    pub api_key: &'static str,
    pub limit: u32,
    pub time_window: u64,
    pub config: ProviderConfig,
    pub created_at: String,
}

impl From<Provider> for ProviderView {
    fn from(provider: Provider) -> Self {
        Self {
            provider_id: provider.provider_id,
            provider_name: provider.provider_name,
            provider_type: provider.provider_type,
            api_key: "[redacted]",
            limit: provider.limit,
            time_window: provider.time_window,
            config: provider.config,
            created_at: provider.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct QueueView {
    pub queue_id: String,
    pub created_at: String,
    pub providers: Vec<ProviderView>,
}

fn validate_provider(index: usize, provider: &NewProvider) -> Result<(), ApiError> {
    for (field, value) in [
        ("provider_name", &provider.provider_name),
        ("provider_type", &provider.provider_type),
        ("api_key", &provider.api_key),
    ] {
        if value.trim().is_empty() {
            return Err(ApiError::bad_request(format!(
                "providers[{index}].{field} is required"
            )));
        }
    }
    if provider.limit == 0 || provider.time_window == 0 {
        return Err(ApiError::bad_request(format!(
            "providers[{index}] limit and time_window must be positive"
        )));
    }
    provider.config.validate()?;
    Ok(())
}

/// POST /queue/create
pub async fn create_queue(
    State(state): State<AppState>,
    body: Result<Json<CreateQueueRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<DataResponse<QueueView>>), ApiError> {
    let Json(body) = body?;
    let queue_id = body
        .queue_id
        .filter(|q| !q.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("queue_id is required"))?;
    if body.providers.is_empty() {
        return Err(ApiError::bad_request("at least one provider is required"));
    }
    for (index, provider) in body.providers.iter().enumerate() {
        validate_provider(index, provider)?;
    }

    let (queue, providers) = state.records.create_queue(&queue_id, &body.providers).await?;
    tracing::info!(queue_id = %queue.queue_id, providers = providers.len(), "queue registered");
    Ok((
        StatusCode::CREATED,
        DataResponse::ok(QueueView {
            queue_id: queue.queue_id,
            created_at: queue.created_at,
            providers: providers.into_iter().map(ProviderView::from).collect(),
        }),
    ))
}

/// GET /queue/{queue_id}
pub async fn get_queue(
    State(state): State<AppState>,
    Path(queue_id): Path<String>,
) -> Result<Json<DataResponse<QueueView>>, ApiError> {
    let queue = state
        .records
        .get_queue(&queue_id)
        .await?
        .ok_or_else(|| RatelaneError::QueueNotFound(format!("Queue {queue_id} not found")))?;
    let providers = state.records.list_providers(&queue_id).await?;
    Ok(DataResponse::ok(QueueView {
        queue_id: queue.queue_id,
        created_at: queue.created_at,
        providers: providers.into_iter().map(ProviderView::from).collect(),
    }))
}

// --- Public ---

/// Response body for GET /health.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
    pub components: BTreeMap<String, String>,
}

/// GET /health
///
/// Reports each component's health; 503 if any component is unhealthy.
pub async fn get_health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let mut components = BTreeMap::new();
    let mut degraded = false;
    let mut unhealthy = false;
    for adapter in &state.health.components {
        let status = match adapter.health_check().await {
            Ok(HealthStatus::Healthy) => "healthy".to_string(),
            Ok(HealthStatus::Degraded(reason)) => {
                degraded = true;
                format!("degraded: {reason}")
            }
            Ok(HealthStatus::Unhealthy(reason)) => {
                unhealthy = true;
                format!("unhealthy: {reason}")
            }
            Err(e) => {
                unhealthy = true;
                format!("unhealthy: {e}")
            }
        };
        components.insert(format!("{}:{}", adapter.adapter_type(), adapter.name()), status);
    }

    let (code, status) = if unhealthy {
        (StatusCode::SERVICE_UNAVAILABLE, "unhealthy")
    } else if degraded {
        (StatusCode::OK, "degraded")
    } else {
        (StatusCode::OK, "healthy")
    };
    (
        code,
        Json(HealthResponse {
            status,
            version: env!("CARGO_PKG_VERSION"),
            uptime_secs: state.health.start_time.elapsed().as_secs(),
            components,
        }),
    )
}

/// GET /metrics
pub async fn get_metrics(State(state): State<AppState>) -> Response {
    match &state.health.prometheus_render {
        Some(render) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            render(),
        )
            .into_response(),
        None => ApiError::not_found("metrics are disabled").into_response(),
    }
}

#[cfg(test)]
mod tests {
    use ratelane_core::types::{BatchStatus, MessageStatus, ResultRecord};

    use super::*;

    #[test]
    fn single_request_becomes_batch_of_one() {
        let body: CreateMessageRequest = serde_json::from_value(serde_json::json!({
            "queue_id": "q1",
            "prompt": "hello",
            "system_prompt": "be nice",
            "supportive_variable": {"row": 7}
        }))
        .unwrap();
        let (submission, is_batch) = body.into_submission().unwrap();
        assert!(!is_batch);
        assert_eq!(submission.messages.len(), 1);
        assert_eq!(submission.messages[0].system_prompt.as_deref(), Some("be nice"));
    }

    #[test]
    fn missing_fields_are_rejected() {
        let no_queue: CreateMessageRequest =
            serde_json::from_value(serde_json::json!({"prompt": "x"})).unwrap();
        assert!(no_queue.into_submission().is_err());

        let no_prompt: CreateMessageRequest =
            serde_json::from_value(serde_json::json!({"queue_id": "q"})).unwrap();
        assert!(no_prompt.into_submission().is_err());

        let empty_batch: CreateMessageRequest =
            serde_json::from_value(serde_json::json!({"queue_id": "q", "messages": []}))
                .unwrap();
        assert!(empty_batch.into_submission().is_err());
    }

    #[test]
    fn csv_export_quotes_and_orders_columns() {
        let results = BatchResults {
            batch_id: "b1".into(),
            status: BatchStatus::Completed,
            request_count: 2,
            response_count: 2,
            results: vec![
                ResultRecord {
                    message_id: "m1".into(),
                    status: MessageStatus::Completed,
                    prompt: "say \"hi\", please".into(),
                    result: Some("hi".into()),
                    error_message: None,
                },
                ResultRecord {
                    message_id: "m2".into(),
                    status: MessageStatus::Failed,
                    prompt: "p".into(),
                    result: None,
                    error_message: Some("No provider found for queue q".into()),
                },
            ],
            completed_at: String::new(),
        };
        let csv = String::from_utf8(results_to_csv(&results).unwrap()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "message_id,status,prompt,result,error_message");
        assert_eq!(lines[1], "m1,completed,\"say \"\"hi\"\", please\",hi,");
        assert_eq!(lines[2], "m2,failed,p,,No provider found for queue q");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn provider_view_redacts_key() {
        let view = ProviderView::from(Provider {
            provider_id: "p".into(),
            queue_id: "q".into(),
            provider_name: "n".into(),
            provider_type: "openai".into(),
            api_key: "sk-live".into(),
            limit: 1,
            time_window: 1,
            config: ProviderConfig::default(),
            created_at: String::new(),
        });
        let json = serde_json::to_string(&view).unwrap();
        assert!(!json.contains("sk-live"));
    }
}
