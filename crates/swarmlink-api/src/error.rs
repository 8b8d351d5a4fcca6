// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! The REST error taxonomy and its JSON rendering.
//!
//! Every error leaves the process as `{error, details?}` with one of the
//! contract statuses: 400 validation, 404 not found, 409 conflict, 429
//! rate, 500 transient, 503 fatal. Auth failures only exist on the WS
//! side (`error{code}` frames); the REST surface is unauthenticated.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::error;

use swarmlink_store::StoreError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("validation failed")]
    Validation { details: Value },

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    #[error("rate limit exceeded")]
    RateLimited,

    #[error("database error")]
    Database(sqlx::Error),

    #[error("service unavailable: {0}")]
    Unavailable(String),
}

impl ApiError {
    /// Single-field validation failure.
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        ApiError::Validation {
            details: json!({ field: message.into() }),
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation { .. } => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { entity } => ApiError::NotFound(entity),
            StoreError::Conflict(message) => ApiError::Conflict(message),
            StoreError::InvalidReference(message) => ApiError::Validation {
                details: json!({ "reference": message }),
            },
            StoreError::Sqlx(e) => ApiError::Database(e),
            StoreError::Migrate(e) => ApiError::Unavailable(e.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            ApiError::Validation { details } => json!({
                "error": "validation failed",
                "details": details,
            }),
            ApiError::Database(e) => {
                error!("database error: {e}");
                json!({
                    "error": "database error",
                    "details": { "retry": "transient failure, retry with backoff" },
                })
            }
            other => json!({ "error": other.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

/// Accumulates per-field validation problems; empty means valid.
#[derive(Debug, Default)]
pub struct FieldErrors {
    fields: serde_json::Map<String, Value>,
}

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: &str, message: impl Into<String>) {
        self.fields
            .insert(field.to_string(), Value::String(message.into()));
    }

    pub fn require(&mut self, field: &str, present: bool) {
        if !present {
            self.push(field, "required");
        }
    }

    /// Return `Err` if anything was recorded.
    pub fn check(self) -> Result<(), ApiError> {
        if self.fields.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation {
                details: Value::Object(self.fields),
            })
        }
    }
}

// ── Unit tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_map_to_contract_statuses() {
        let api: ApiError = StoreError::not_found("subtask").into();
        assert_eq!(api.status(), StatusCode::NOT_FOUND);

        let api: ApiError = StoreError::Conflict("dup".into()).into();
        assert_eq!(api.status(), StatusCode::CONFLICT);

        let api: ApiError = StoreError::InvalidReference("bad ref".into()).into();
        assert_eq!(api.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn not_found_names_the_entity() {
        let api: ApiError = StoreError::not_found("session").into();
        assert_eq!(api.to_string(), "session not found");
    }

    #[test]
    fn field_errors_collect_and_fail() {
        let mut errors = FieldErrors::new();
        errors.require("tool_name", false);
        errors.push("priority", "must be between 0 and 10");
        let err = errors.check().unwrap_err();
        match err {
            ApiError::Validation { details } => {
                assert_eq!(details["tool_name"], "required");
                assert_eq!(details["priority"], "must be between 0 and 10");
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn empty_field_errors_pass() {
        assert!(FieldErrors::new().check().is_ok());
    }
}
