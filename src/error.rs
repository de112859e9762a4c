//! Uniform error reporting.
//!
//! Every failure leaving a handler or middleware is an [`AppError`]. It renders
//! as `{ "error": { "code", "message", "details"? } }` with the matching HTTP
//! status. Anything that is not one of the client-facing variants collapses to
//! `INTERNAL_ERROR` and the cause only reaches the logs.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::error;
use validator::ValidationErrors;

use crate::db::StoreError;

pub type Result<T> = std::result::Result<T, AppError>;

const INVALID_REQUEST: &str = "invalid request";
const INTERNAL_MESSAGE: &str = "internal server error";

/// Stable machine codes of the wire contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ValidationError,
    Unauthorized,
    NotFound,
    Conflict,
    RateLimit,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::ValidationError => "VALIDATION_ERROR",
            ErrorCode::Unauthorized => "UNAUTHORIZED",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::Conflict => "CONFLICT",
            ErrorCode::RateLimit => "RATE_LIMIT",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{message}")]
    Validation {
        message: String,
        details: Option<Value>,
    },

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("too many requests")]
    RateLimited { retry_after_secs: u64 },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{0}")]
    Internal(String),
}

impl AppError {
    /// Semantic validation failure raised by a service.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            details: None,
        }
    }

    /// Decoding or declarative validation failure, `details` carries the complaint.
    pub fn invalid_request(details: impl Into<Value>) -> Self {
        Self::Validation {
            message: INVALID_REQUEST.to_owned(),
            details: Some(details.into()),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn internal(details: impl Into<String>) -> Self {
        Self::Internal(details.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::Store(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::Unauthorized(_) => ErrorCode::Unauthorized,
            AppError::NotFound(_) => ErrorCode::NotFound,
            AppError::Conflict(_) => ErrorCode::Conflict,
            AppError::RateLimited { .. } => ErrorCode::RateLimit,
            AppError::Store(_) | AppError::Internal(_) => ErrorCode::InternalError,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    code: ErrorCode,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<&'a Value>,
}

#[derive(Serialize)]
struct ErrorEnvelope<'a> {
    error: ErrorBody<'a>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();

        let (message, details) = match &self {
            AppError::Store(err) => {
                error!(error = %err, "storage failure");
                (INTERNAL_MESSAGE.to_owned(), None)
            }
            AppError::Internal(details) => {
                error!(%details, "internal failure");
                (INTERNAL_MESSAGE.to_owned(), None)
            }
            AppError::Validation { message, details } => (message.clone(), details.as_ref()),
            other => (other.to_string(), None),
        };

        let body = ErrorEnvelope {
            error: ErrorBody {
                code,
                message: &message,
                details,
            },
        };
        let mut response = (status, Json(body)).into_response();

        if let AppError::RateLimited { retry_after_secs } = self {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
        }
        response
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::invalid_request(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::invalid_request(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::invalid_request(rejection.body_text())
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        let fields: Vec<Value> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, issues)| {
                issues.iter().map(move |issue| {
                    let message = issue
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| issue.code.to_string());
                    json!({ "field": field.to_string(), "message": message })
                })
            })
            .collect();
        AppError::invalid_request(Value::Array(fields))
    }
}

/// Router fallback for unknown paths.
pub async fn route_not_found() -> AppError {
    AppError::not_found("route not found")
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(response: Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn codes_map_to_wire_tokens() {
        assert_eq!(
            serde_json::to_value(ErrorCode::ValidationError).unwrap(),
            json!("VALIDATION_ERROR")
        );
        assert_eq!(
            serde_json::to_value(ErrorCode::RateLimit).unwrap(),
            json!(ErrorCode::RateLimit.as_str())
        );
        assert_eq!(
            serde_json::to_value(ErrorCode::InternalError).unwrap(),
            json!("INTERNAL_ERROR")
        );
    }

    #[tokio::test]
    async fn structured_error_keeps_message() {
        let response = AppError::unauthorized("invalid credentials").into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "UNAUTHORIZED");
        assert_eq!(body["error"]["message"], "invalid credentials");
        assert!(body["error"].get("details").is_none());
    }

    #[tokio::test]
    async fn internal_error_hides_cause() {
        let response = AppError::internal("jwt signing exploded").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "INTERNAL_ERROR");
        assert_eq!(body["error"]["message"], INTERNAL_MESSAGE);
    }

    #[tokio::test]
    async fn store_timeout_is_internal() {
        let err: AppError = StoreError::Timeout(std::time::Duration::from_secs(5)).into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["error"]["message"], INTERNAL_MESSAGE);
    }

    #[tokio::test]
    async fn rate_limited_sets_retry_after() {
        let response = AppError::RateLimited {
            retry_after_secs: 42,
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "42");

        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "RATE_LIMIT");
    }

    #[tokio::test]
    async fn invalid_request_carries_details() {
        let response = AppError::invalid_request("missing field `username`").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(body["error"]["message"], INVALID_REQUEST);
        assert_eq!(body["error"]["details"], "missing field `username`");
    }
}
