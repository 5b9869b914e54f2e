use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::error::{DbErr, RuntimeErr, SqlErr};
use sea_orm::sqlx;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::error;
use utoipa::ToSchema;

use crate::services::completeness::RequirementReport;

fn current_request_id() -> Option<String> {
    crate::telemetry::current_request_id().map(|rid| rid.as_str().to_string())
}

/// Error body returned by every endpoint
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "error": "Conflict",
    "message": "Transition to APPROVED blocked: missing documents [PROOF_OF_PAYMENT, QUOTE]",
    "details": {
        "target_status": "APPROVED",
        "missing_docs": ["PROOF_OF_PAYMENT", "QUOTE"],
        "missing_fields": []
    },
    "request_id": "req-abc123xyz",
    "timestamp": "2024-12-09T10:30:00.000Z"
}))]
pub struct ErrorResponse {
    /// HTTP status category (e.g., "Not Found", "Conflict")
    pub error: String,
    /// Human-readable error description
    pub message: String,
    /// Structured detail for caller-actionable outcomes (blocked transitions, stock shortfalls)
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Object)]
    pub details: Option<serde_json::Value>,
    /// Unique request identifier for support and debugging
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// ISO 8601 timestamp when error occurred
    pub timestamp: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DbErr),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Transition to {} blocked: {}", .0.target_status, .0.summary())]
    Blocked(Box<RequirementReport>),

    #[error("Insufficient stock: current quantity {current}, requested delta {requested_delta}")]
    InsufficientStock { current: i32, requested_delta: i32 },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

// SQLite primary result codes for a lock held by another connection.
const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

fn is_lock_contention(err: &DbErr) -> bool {
    match err {
        DbErr::Exec(RuntimeErr::SqlxError(sqlx::Error::Database(e)))
        | DbErr::Query(RuntimeErr::SqlxError(sqlx::Error::Database(e))) => {
            e.try_downcast_ref::<sqlx::sqlite::SqliteError>().is_some()
                && e.code()
                    .and_then(|code| code.parse::<i32>().ok())
                    .is_some_and(|code| matches!(code & 0xff, SQLITE_BUSY | SQLITE_LOCKED))
        }
        _ => false,
    }
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl ServiceError {
    /// Classifies a database error. Unique-key violations and SQLite lock
    /// contention become `Conflict` so callers can retry them; everything
    /// else stays a database error.
    pub fn db_error(err: DbErr) -> Self {
        if is_lock_contention(&err) {
            return ServiceError::Conflict(format!("Database is busy: {}", err));
        }
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(detail)) => ServiceError::Conflict(detail),
            _ => ServiceError::DatabaseError(err),
        }
    }

    pub fn blocked(report: RequirementReport) -> Self {
        ServiceError::Blocked(Box::new(report))
    }

    /// Whether the same request may be reissued unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ValidationError(_) => StatusCode::BAD_REQUEST,
            Self::Blocked(_) | Self::Conflict(_) => StatusCode::CONFLICT,
            Self::InsufficientStock { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::DatabaseError(_) | Self::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the error message suitable for HTTP responses.
    /// Internal errors return generic messages to avoid leaking implementation details.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Database error".to_string(),
            Self::InternalError(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }

    /// Structured payload for outcomes the caller is expected to act on.
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::Blocked(report) => serde_json::to_value(report.as_ref()).ok(),
            Self::InsufficientStock {
                current,
                requested_delta,
            } => Some(json!({
                "current_quantity": current,
                "requested_delta": requested_delta,
            })),
            _ => None,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, "Request failed with internal error");
        }

        let err = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message: self.response_message(),
            details: self.details(),
            request_id: current_request_id(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(err)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::order::OrderStatus;
    use crate::entities::order_media::DocumentKind;
    use axum::body::to_bytes;

    fn blocked_report() -> RequirementReport {
        RequirementReport {
            order_id: uuid::Uuid::nil(),
            target_status: OrderStatus::Approved,
            missing_docs: vec![DocumentKind::ProofOfPayment, DocumentKind::Quote],
            missing_fields: vec![],
            satisfied_docs: vec![],
            satisfied_fields: vec![],
        }
    }

    #[tokio::test]
    async fn service_error_response_includes_request_id() {
        let response = crate::telemetry::scope_request_id(
            crate::telemetry::RequestId::new("req-123"),
            async { ServiceError::NotFound("missing".into()).into_response() },
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let payload: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(payload.request_id.as_deref(), Some("req-123"));
        assert!(payload.details.is_none());
    }

    #[tokio::test]
    async fn blocked_response_carries_missing_requirements() {
        let response = ServiceError::blocked(blocked_report()).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let payload: ErrorResponse = serde_json::from_slice(&body).unwrap();
        let details = payload.details.expect("blocked payload");
        assert_eq!(details["target_status"], "APPROVED");
        assert_eq!(details["missing_docs"], json!(["PROOF_OF_PAYMENT", "QUOTE"]));
        assert_eq!(details["missing_fields"], json!([]));
    }

    #[tokio::test]
    async fn insufficient_stock_response_reports_quantities() {
        let response = ServiceError::InsufficientStock {
            current: 2,
            requested_delta: -5,
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let payload: ErrorResponse = serde_json::from_slice(&body).unwrap();
        let details = payload.details.expect("stock payload");
        assert_eq!(details["current_quantity"], 2);
        assert_eq!(details["requested_delta"], -5);
    }

    #[test]
    fn service_error_status_code_mapping() {
        assert_eq!(
            ServiceError::NotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServiceError::ValidationError("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::blocked(blocked_report()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ServiceError::Conflict("x".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ServiceError::InsufficientStock {
                current: 0,
                requested_delta: -1
            }
            .status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ServiceError::InternalError("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn internal_errors_hide_details() {
        let err = ServiceError::DatabaseError(DbErr::Custom("password=hunter2".into()));
        assert_eq!(err.response_message(), "Database error");
        assert!(!ServiceError::InternalError("boom".into()).is_retryable());
        assert!(ServiceError::Conflict("dup".into()).is_retryable());
    }

    #[test]
    fn blocked_message_lists_gaps() {
        let msg = ServiceError::blocked(blocked_report()).to_string();
        assert!(msg.contains("APPROVED"));
        assert!(msg.contains("PROOF_OF_PAYMENT"));
    }
}
