// SPDX-FileCopyrightText: 2026 Ratelane Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Optional shared-secret protection for the non-public routes.

use axum::{
    extract::{Request, State},
    http::{StatusCode, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};

/// Bearer token the API expects, if any. With no token the API is open.
#[derive(Clone, Default)]
pub struct AuthConfig {
    pub bearer_token: Option<String>,
}

impl AuthConfig {
    /// Whether `header` (the raw `Authorization` value) grants access.
    fn permits(&self, header: Option<&str>) -> bool {
        match &self.bearer_token {
            None => true,
            Some(expected) => header
                .and_then(|value| value.strip_prefix("Bearer "))
                .is_some_and(|token| token == expected),
        }
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let shown = self.bearer_token.as_ref().map(|_| "[redacted]");
        f.debug_struct("AuthConfig")
            .field("bearer_token", &shown)
            .finish()
    }
}

/// Rejects requests with 401 unless they carry the configured bearer token.
pub async fn auth_middleware(
    State(auth): State<AuthConfig>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    if auth.permits(header) {
        return Ok(next.run(request).await);
    }

    tracing::debug!(path = %request.uri().path(), "rejected unauthenticated request");
    Err(StatusCode::UNAUTHORIZED)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_token(token: &str) -> AuthConfig {
        AuthConfig {
            bearer_token: Some(token.to_string()),
        }
    }

    #[test]
    fn debug_hides_token() {
        let rendered = format!("{:?}", with_token("secret-token"));
        assert!(!rendered.contains("secret-token"));
        assert!(rendered.contains("[redacted]"));
    }

    #[test]
    fn open_when_unconfigured() {
        assert!(AuthConfig::default().permits(None));
    }

    #[test]
    fn requires_exact_bearer_token() {
        let auth = with_token("s3cret");
        assert!(auth.permits(Some("Bearer s3cret")));
        assert!(!auth.permits(Some("Bearer other")));
        assert!(!auth.permits(Some("s3cret")));
        assert!(!auth.permits(None));
    }
}
