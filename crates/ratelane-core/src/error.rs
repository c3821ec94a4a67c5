// SPDX-FileCopyrightText: 2026 Ratelane Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Ratelane dispatch pipeline.

use thiserror::Error;

/// The primary error type used across all Ratelane adapter traits and pipeline operations.
#[derive(Debug, Error)]
pub enum RatelaneError {
    /// Configuration errors (invalid values, unusable combinations).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The referenced queue has not been registered.
    #[error("{0}")]
    QueueNotFound(String),

    /// A queue with this identifier is already registered.
    #[error("{0}")]
    QueueAlreadyExists(String),

    /// The referenced message does not exist.
    #[error("{0}")]
    MessageNotFound(String),

    /// The referenced batch does not exist.
    #[error("{0}")]
    BatchNotFound(String),

    /// The message's queue has no provider configured.
    #[error("{0}")]
    ProviderNotFound(String),

    /// The upstream gateway call failed or returned a non-success status.
    #[error("gateway error: {message}")]
    Gateway {
        message: String,
        /// HTTP status returned by the gateway, `None` for transport failures.
        status: Option<u16>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A batch or its messages were missing while aggregating results.
    #[error("aggregation error: {0}")]
    Aggregation(String),

    /// Webhook delivery failed.
    #[error("webhook error: {0}")]
    Webhook(String),

    /// Caller input failed validation.
    #[error("{0}")]
    Validation(String),

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl RatelaneError {
    /// Wraps any error as a storage error.
    pub fn storage(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        RatelaneError::Storage {
            source: source.into(),
        }
    }

    /// Returns true if retrying the operation may succeed.
    ///
    /// Only gateway failures and timeouts are retryable: transport errors
    /// (no status), 408, 429 and any 5xx.
    pub fn is_retryable(&self) -> bool {
        match self {
            RatelaneError::Gateway { status: None, .. } => true,
            RatelaneError::Gateway {
                status: Some(code), ..
            } => matches!(code, 408 | 429) || (500..600).contains(code),
            RatelaneError::Timeout { .. } => true,
            _ => false,
        }
    }

    /// Returns true for errors that map to a "not found" response.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            RatelaneError::QueueNotFound(_)
                | RatelaneError::MessageNotFound(_)
                | RatelaneError::BatchNotFound(_)
                | RatelaneError::ProviderNotFound(_)
        )
    }
}
