//! Structured error taxonomy for the rates service.
//!
//! Every failure that crosses the service boundary is a [`RateError`]: a
//! message, a machine-readable [`RateErrorCode`], an HTTP-status equivalent
//! for API layers, and optional operation context. Secondary concerns
//! (metrics emission, activity tracking) never surface errors at all; see the
//! individual modules.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Machine-readable error codes for client-side branching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RateErrorCode {
    Unknown,
    ValidationFailed,
    NotFound,
    PermissionDenied,
    AlreadyExists,
    TemplateInvalid,
    CalculationFailed,
    InvalidStatusTransition,
    RateExpired,
    DatabaseError,
    FairworkServiceError,
    RateLimitExceeded,
}

impl RateErrorCode {
    /// Default HTTP status for this code. Callers may override per error.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::NotFound => 404,
            Self::PermissionDenied => 403,
            Self::ValidationFailed | Self::TemplateInvalid => 400,
            Self::AlreadyExists => 409,
            Self::RateLimitExceeded => 429,
            Self::FairworkServiceError => 502,
            _ => 500,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "UNKNOWN",
            Self::ValidationFailed => "VALIDATION_FAILED",
            Self::NotFound => "NOT_FOUND",
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::AlreadyExists => "ALREADY_EXISTS",
            Self::TemplateInvalid => "TEMPLATE_INVALID",
            Self::CalculationFailed => "CALCULATION_FAILED",
            Self::InvalidStatusTransition => "INVALID_STATUS_TRANSITION",
            Self::RateExpired => "RATE_EXPIRED",
            Self::DatabaseError => "DATABASE_ERROR",
            Self::FairworkServiceError => "FAIRWORK_SERVICE_ERROR",
            Self::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
        }
    }
}

impl std::fmt::Display for RateErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured, serializable service error.
#[derive(Debug, thiserror::Error)]
#[error("{code}: {message}")]
pub struct RateError {
    pub message: String,
    pub code: RateErrorCode,
    pub http_status: u16,
    pub context: Map<String, Value>,
    pub timestamp: DateTime<Utc>,
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

pub type RateResult<T> = Result<T, RateError>;

impl RateError {
    pub fn new(message: impl Into<String>, code: RateErrorCode) -> Self {
        Self {
            message: message.into(),
            code,
            http_status: code.http_status(),
            context: Map::new(),
            timestamp: Utc::now(),
            source: None,
        }
    }

    /// Error with the default `UNKNOWN` code.
    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(message, RateErrorCode::Unknown)
    }

    pub fn not_found(entity: &str, id: &str) -> Self {
        Self::new(format!("{entity} not found: {id}"), RateErrorCode::NotFound)
            .with_context("entity", json!(entity))
            .with_context("id", json!(id))
    }

    pub fn validation_failed(message: impl Into<String>) -> Self {
        Self::new(message, RateErrorCode::ValidationFailed)
    }

    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(message, RateErrorCode::PermissionDenied)
    }

    pub fn already_exists(entity: &str, id: &str) -> Self {
        Self::new(
            format!("{entity} already exists: {id}"),
            RateErrorCode::AlreadyExists,
        )
        .with_context("entity", json!(entity))
        .with_context("id", json!(id))
    }

    pub fn database_error(message: impl Into<String>) -> Self {
        Self::new(message, RateErrorCode::DatabaseError)
    }

    /// Override the HTTP status derived from the code.
    pub fn with_http_status(mut self, status: u16) -> Self {
        self.http_status = status;
        self
    }

    /// Attach one operation-context entry (template id, org id, params).
    pub fn with_context(mut self, key: impl Into<String>, value: Value) -> Self {
        self.context.insert(key.into(), value);
        self
    }

    /// Attach the underlying cause.
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Wrap a foreign error with a code and message. Never applied to values
    /// that are already `RateError`; typed `RateResult` chains propagate those
    /// unchanged.
    pub fn from_source(
        code: RateErrorCode,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::new(message, code).with_source(source)
    }

    /// Serializable representation suitable for API responses and logs.
    /// The cause is normalized to its display message; internals stay out of
    /// user-facing payloads.
    pub fn to_json(&self) -> Value {
        let mut body = json!({
            "code": self.code.as_str(),
            "message": self.message,
            "httpStatus": self.http_status,
            "context": Value::Object(self.context.clone()),
            "timestamp": self.timestamp.to_rfc3339(),
        });
        if let Some(source) = &self.source {
            body["cause"] = json!({ "message": source.to_string() });
        }
        body
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_status_mapping() {
        assert_eq!(RateErrorCode::NotFound.http_status(), 404);
        assert_eq!(RateErrorCode::PermissionDenied.http_status(), 403);
        assert_eq!(RateErrorCode::ValidationFailed.http_status(), 400);
        assert_eq!(RateErrorCode::TemplateInvalid.http_status(), 400);
        assert_eq!(RateErrorCode::AlreadyExists.http_status(), 409);
        assert_eq!(RateErrorCode::RateLimitExceeded.http_status(), 429);
        assert_eq!(RateErrorCode::FairworkServiceError.http_status(), 502);
        assert_eq!(RateErrorCode::Unknown.http_status(), 500);
        assert_eq!(RateErrorCode::CalculationFailed.http_status(), 500);
    }

    #[test]
    fn not_found_carries_context() {
        let err = RateError::not_found("rate template", "tpl-1");
        assert_eq!(err.code, RateErrorCode::NotFound);
        assert_eq!(err.http_status, 404);
        assert_eq!(err.context["id"], json!("tpl-1"));
    }

    #[test]
    fn explicit_status_override() {
        let err = RateError::validation_failed("bad input").with_http_status(422);
        assert_eq!(err.http_status, 422);
    }

    #[test]
    fn to_json_includes_normalized_cause() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "socket closed");
        let err = RateError::from_source(RateErrorCode::DatabaseError, "read failed", io)
            .with_context("template_id", json!("tpl-9"));
        let body = err.to_json();
        assert_eq!(body["code"], "DATABASE_ERROR");
        assert_eq!(body["cause"]["message"], "socket closed");
        assert_eq!(body["context"]["template_id"], "tpl-9");
    }
}
