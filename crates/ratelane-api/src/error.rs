// SPDX-FileCopyrightText: 2026 Ratelane Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mapping of pipeline errors onto HTTP responses.

use axum::{
    Json,
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use ratelane_core::RatelaneError;
use serde::Serialize;

/// Error body: `{message, success: false}`.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
    /// Set when the caller must register the queue first.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registration_required: Option<bool>,
}

/// A handler error carrying its HTTP status.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorResponse,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorResponse {
                success: false,
                message: message.into(),
                registration_required: None,
            },
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<RatelaneError> for ApiError {
    fn from(err: RatelaneError) -> Self {
        match err {
            RatelaneError::QueueNotFound(message) => {
                let mut api = ApiError::not_found(message);
                api.body.registration_required = Some(true);
                api
            }
            e if e.is_not_found() => ApiError::not_found(e.to_string()),
            RatelaneError::Validation(message) | RatelaneError::QueueAlreadyExists(message) => {
                ApiError::bad_request(message)
            }
            e => {
                tracing::error!(error = %e, "request failed");
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::bad_request(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
