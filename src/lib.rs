//! Order Desk
//!
//! Backend for dealer production orders: a requirement-gated order lifecycle
//! with an immutable status history, and append-only stock ledgers for
//! finished goods and raw materials.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod migrator;
pub mod openapi;
pub mod services;
pub mod telemetry;

use std::{sync::Arc, time::Duration};

use axum::{response::Json, Router};
use chrono::Utc;
use http::HeaderValue;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer};
use tracing::info;
use utoipa::ToSchema;

use services::{
    finished_goods::{FinishedGoodsBook, FinishedGoodsLedger},
    order_status::OrderStatusService,
    orders::OrderService,
    raw_materials::{MaterialBook, MaterialLedger},
};

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: events::EventSender,
    pub orders: Arc<OrderService>,
    pub order_status: Arc<OrderStatusService>,
    pub finished_goods: FinishedGoodsLedger,
    pub materials: MaterialLedger,
}

impl AppState {
    /// Wires every service onto one connection pool and event channel.
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: config::AppConfig,
        event_sender: events::EventSender,
    ) -> Self {
        Self {
            orders: Arc::new(OrderService::new(db.clone(), event_sender.clone())),
            order_status: Arc::new(OrderStatusService::new(db.clone(), event_sender.clone())),
            finished_goods: FinishedGoodsLedger::new(
                db.clone(),
                event_sender.clone(),
                FinishedGoodsBook,
            ),
            materials: MaterialLedger::new(db.clone(), event_sender.clone(), MaterialBook),
            db,
            config,
            event_sender,
        }
    }
}

// Common response wrappers
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Serialize, ToSchema)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: telemetry::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            meta: Some(ResponseMeta::capture()),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
}

impl<T> PaginatedResponse<T> {
    pub fn new(items: Vec<T>, total: u64, page: u64, limit: u64) -> Self {
        let total_pages = if limit == 0 { 0 } else { total.div_ceil(limit) };
        Self {
            items,
            total,
            page,
            limit,
            total_pages,
        }
    }
}

/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

pub fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .nest("/orders", handlers::orders::orders_routes())
        .nest(
            "/stock/finished-goods",
            handlers::stock::finished_goods_routes(),
        )
        .nest("/stock/materials", handlers::stock::materials_routes())
}

fn cors_layer(cfg: &config::AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = cfg
        .cors_origins()
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    if !origins.is_empty() {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(tower_http::cors::Any)
            .allow_headers(tower_http::cors::Any)
    } else if cfg.should_allow_permissive_cors() {
        info!("Using permissive CORS because explicit origins were not configured");
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
    }
}

/// Full HTTP application: health, OpenAPI document and the v1 API, wrapped
/// in request-id, tracing, CORS and timeout layers.
pub fn app(state: AppState) -> Router {
    let timeout = Duration::from_secs(state.config.request_timeout_secs);
    let cors = cors_layer(&state.config);

    Router::new()
        .nest("/health", handlers::health::health_routes())
        .merge(openapi::openapi_routes())
        .nest("/api/v1", api_v1_routes())
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn(telemetry::request_id_middleware))
                .layer(telemetry::configure_http_tracing())
                .layer(cors)
                .layer(TimeoutLayer::new(timeout)),
        )
        .with_state(state)
}

#[cfg(test)]
mod response_tests {
    use super::*;
    use chrono::DateTime;

    #[tokio::test]
    async fn success_response_includes_request_metadata() {
        let response = telemetry::scope_request_id(telemetry::RequestId::new("meta-123"), async {
            ApiResponse::success("ok")
        })
        .await;

        let meta = response.meta.expect("metadata expected");
        assert_eq!(meta.request_id.as_deref(), Some("meta-123"));
        DateTime::parse_from_rfc3339(&meta.timestamp).expect("timestamp should parse");
    }

    #[test]
    fn pagination_rounds_pages_up() {
        let page = PaginatedResponse::new(vec![1, 2], 41, 1, 20);
        assert_eq!(page.total_pages, 3);
        assert_eq!(PaginatedResponse::<u8>::new(vec![], 0, 1, 20).total_pages, 0);
    }
}
