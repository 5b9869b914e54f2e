pub mod health;
pub mod orders;
pub mod stock;

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;
use crate::ApiResponse;

/// Standard success response
pub fn success_response<T: Serialize>(data: T) -> impl IntoResponse {
    (StatusCode::OK, Json(ApiResponse::success(data)))
}

/// Standard created response
pub fn created_response<T: Serialize>(data: T) -> impl IntoResponse {
    (StatusCode::CREATED, Json(ApiResponse::success(data)))
}
