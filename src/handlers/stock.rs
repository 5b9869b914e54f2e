use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Json},
    routing::{get, post, put},
    Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{created_response, success_response};
use crate::{
    auth::Actor,
    entities::{finished_goods_stock, finished_goods_txn, material_stock, material_txn},
    errors::ServiceError,
    services::{
        finished_goods::FinishedGoodsKey,
        raw_materials::MaterialKey,
        stock_ledger::{PostingRequest, Reconciliation, TxnQuery},
    },
    ApiResponse, ApiResult, AppState,
};

/// Finished-goods key and posting in one body.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FinishedGoodsPosting {
    #[serde(flatten)]
    pub key: FinishedGoodsKey,
    #[serde(flatten)]
    pub posting: PostingRequest,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MaterialPosting {
    #[serde(flatten)]
    pub key: MaterialKey,
    #[serde(flatten)]
    pub posting: PostingRequest,
}

/// ETA and notes for a stock row; quantity is never set this way.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct StockDetails {
    pub eta: Option<NaiveDate>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FinishedGoodsDetails {
    #[serde(flatten)]
    pub key: FinishedGoodsKey,
    #[serde(flatten)]
    pub details: StockDetails,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MaterialDetails {
    #[serde(flatten)]
    pub key: MaterialKey,
    #[serde(flatten)]
    pub details: StockDetails,
}

pub fn finished_goods_routes() -> Router<AppState> {
    Router::new()
        .route("/postings", post(post_finished_goods))
        .route("/transactions", get(finished_goods_transactions))
        .route("/details", put(finished_goods_details))
        .route("/:row_id", get(get_finished_goods_row))
        .route("/:row_id/reconciliation", get(reconcile_finished_goods))
}

pub fn materials_routes() -> Router<AppState> {
    Router::new()
        .route("/postings", post(post_materials))
        .route("/transactions", get(materials_transactions))
        .route("/details", put(materials_details))
        .route("/:row_id", get(get_material_row))
        .route("/:row_id/reconciliation", get(reconcile_materials))
}

/// Post a finished-goods stock movement
#[utoipa::path(
    post,
    path = "/api/v1/stock/finished-goods/postings",
    request_body = FinishedGoodsPosting,
    responses(
        (status = 201, description = "Posting applied; returns row, txn and delta"),
        (status = 400, description = "Bad kind or quantity", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown factory, model or color", body = crate::errors::ErrorResponse),
        (status = 422, description = "Insufficient stock", body = crate::errors::ErrorResponse),
    ),
    tag = "stock"
)]
pub async fn post_finished_goods(
    State(state): State<AppState>,
    actor: Actor,
    Json(body): Json<FinishedGoodsPosting>,
) -> Result<impl IntoResponse, ServiceError> {
    actor.require_privileged()?;
    let posting = state
        .finished_goods
        .post(body.key, body.posting, &actor)
        .await?;
    Ok(created_response(posting))
}

#[utoipa::path(
    get,
    path = "/api/v1/stock/finished-goods/transactions",
    params(TxnQuery),
    responses((status = 200, description = "Transactions, newest first")),
    tag = "stock"
)]
pub async fn finished_goods_transactions(
    State(state): State<AppState>,
    _actor: Actor,
    Query(query): Query<TxnQuery>,
) -> ApiResult<Vec<finished_goods_txn::Model>> {
    let txns = state.finished_goods.transactions(query).await?;
    Ok(Json(ApiResponse::success(txns)))
}

/// Set ETA and notes on a finished-goods row, creating it at zero if needed
#[utoipa::path(
    put,
    path = "/api/v1/stock/finished-goods/details",
    request_body = FinishedGoodsDetails,
    responses(
        (status = 200, description = "Row after the update", body = finished_goods_stock::Model),
        (status = 404, description = "Unknown factory, model or color", body = crate::errors::ErrorResponse),
    ),
    tag = "stock"
)]
pub async fn finished_goods_details(
    State(state): State<AppState>,
    actor: Actor,
    Json(body): Json<FinishedGoodsDetails>,
) -> ApiResult<finished_goods_stock::Model> {
    actor.require_privileged()?;
    let row = state
        .finished_goods
        .set_details(body.key, body.details.eta, body.details.notes)
        .await?;
    Ok(Json(ApiResponse::success(row)))
}

#[utoipa::path(
    get,
    path = "/api/v1/stock/finished-goods/{row_id}",
    params(("row_id" = Uuid, Path, description = "Stock row id")),
    responses(
        (status = 200, description = "Stock row", body = finished_goods_stock::Model),
        (status = 404, description = "Row not found", body = crate::errors::ErrorResponse),
    ),
    tag = "stock"
)]
pub async fn get_finished_goods_row(
    State(state): State<AppState>,
    _actor: Actor,
    Path(row_id): Path<Uuid>,
) -> ApiResult<finished_goods_stock::Model> {
    let row = state.finished_goods.row(row_id).await?;
    Ok(Json(ApiResponse::success(row)))
}

#[utoipa::path(
    get,
    path = "/api/v1/stock/finished-goods/{row_id}/reconciliation",
    params(("row_id" = Uuid, Path, description = "Stock row id")),
    responses(
        (status = 200, description = "Quantity against ledger sum", body = Reconciliation),
        (status = 404, description = "Row not found", body = crate::errors::ErrorResponse),
    ),
    tag = "stock"
)]
pub async fn reconcile_finished_goods(
    State(state): State<AppState>,
    _actor: Actor,
    Path(row_id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let report = state.finished_goods.reconcile(row_id).await?;
    Ok(success_response(report))
}

/// Post a raw-material stock movement
#[utoipa::path(
    post,
    path = "/api/v1/stock/materials/postings",
    request_body = MaterialPosting,
    responses(
        (status = 201, description = "Posting applied; returns row, txn and delta"),
        (status = 400, description = "Bad kind or quantity", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown item or location", body = crate::errors::ErrorResponse),
        (status = 422, description = "Insufficient stock", body = crate::errors::ErrorResponse),
    ),
    tag = "stock"
)]
pub async fn post_materials(
    State(state): State<AppState>,
    actor: Actor,
    Json(body): Json<MaterialPosting>,
) -> Result<impl IntoResponse, ServiceError> {
    actor.require_privileged()?;
    let posting = state.materials.post(body.key, body.posting, &actor).await?;
    Ok(created_response(posting))
}

#[utoipa::path(
    get,
    path = "/api/v1/stock/materials/transactions",
    params(TxnQuery),
    responses((status = 200, description = "Transactions, newest first")),
    tag = "stock"
)]
pub async fn materials_transactions(
    State(state): State<AppState>,
    _actor: Actor,
    Query(query): Query<TxnQuery>,
) -> ApiResult<Vec<material_txn::Model>> {
    let txns = state.materials.transactions(query).await?;
    Ok(Json(ApiResponse::success(txns)))
}

/// Set ETA and notes on a raw-material row, creating it at zero if needed
#[utoipa::path(
    put,
    path = "/api/v1/stock/materials/details",
    request_body = MaterialDetails,
    responses(
        (status = 200, description = "Row after the update", body = material_stock::Model),
        (status = 404, description = "Unknown item or location", body = crate::errors::ErrorResponse),
    ),
    tag = "stock"
)]
pub async fn materials_details(
    State(state): State<AppState>,
    actor: Actor,
    Json(body): Json<MaterialDetails>,
) -> ApiResult<material_stock::Model> {
    actor.require_privileged()?;
    let row = state
        .materials
        .set_details(body.key, body.details.eta, body.details.notes)
        .await?;
    Ok(Json(ApiResponse::success(row)))
}

#[utoipa::path(
    get,
    path = "/api/v1/stock/materials/{row_id}",
    params(("row_id" = Uuid, Path, description = "Stock row id")),
    responses(
        (status = 200, description = "Stock row", body = material_stock::Model),
        (status = 404, description = "Row not found", body = crate::errors::ErrorResponse),
    ),
    tag = "stock"
)]
pub async fn get_material_row(
    State(state): State<AppState>,
    _actor: Actor,
    Path(row_id): Path<Uuid>,
) -> ApiResult<material_stock::Model> {
    let row = state.materials.row(row_id).await?;
    Ok(Json(ApiResponse::success(row)))
}

#[utoipa::path(
    get,
    path = "/api/v1/stock/materials/{row_id}/reconciliation",
    params(("row_id" = Uuid, Path, description = "Stock row id")),
    responses(
        (status = 200, description = "Quantity against ledger sum", body = Reconciliation),
        (status = 404, description = "Row not found", body = crate::errors::ErrorResponse),
    ),
    tag = "stock"
)]
pub async fn reconcile_materials(
    State(state): State<AppState>,
    _actor: Actor,
    Path(row_id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let report = state.materials.reconcile(row_id).await?;
    Ok(success_response(report))
}
