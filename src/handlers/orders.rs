use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{created_response, success_response};
use crate::{
    auth::{Actor, Role},
    entities::{order, order_history, order_media},
    errors::ServiceError,
    services::{
        completeness::RequirementReport,
        order_status::TransitionOption,
        orders::{NewDocument, NewOrder, OrderDetailsUpdate, OrderFilter},
    },
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};

/// Body of a status change request.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TransitionRequest {
    pub target_status: String,
    pub comment: Option<String>,
}

pub fn orders_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_orders).post(create_order))
        .route("/:id", get(get_order).patch(update_order))
        .route("/:id/transitions", get(list_transitions).post(transition_order))
        .route("/:id/requirements/:status", get(get_requirements))
        .route("/:id/history", get(get_history))
        .route("/:id/documents", get(list_documents).post(attach_document))
}

/// Submit a new dealer order
#[utoipa::path(
    post,
    path = "/api/v1/orders",
    request_body = NewOrder,
    responses(
        (status = 201, description = "Order created in SUBMITTED"),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 403, description = "Role may not create orders", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown dealer, model, color or factory", body = crate::errors::ErrorResponse),
    ),
    tag = "orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    actor: Actor,
    Json(payload): Json<NewOrder>,
) -> Result<impl IntoResponse, ServiceError> {
    actor.require_privileged()?;
    let order = state.orders.create_order(payload, &actor).await?;
    Ok(created_response(order))
}

/// List orders, newest first
#[utoipa::path(
    get,
    path = "/api/v1/orders",
    params(OrderFilter),
    responses(
        (status = 200, description = "Page of orders"),
        (status = 400, description = "Invalid paging", body = crate::errors::ErrorResponse),
    ),
    tag = "orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    _actor: Actor,
    Query(mut filter): Query<OrderFilter>,
) -> ApiResult<PaginatedResponse<order::Model>> {
    let page = *filter.page.get_or_insert(1);
    let limit = *filter.limit.get_or_insert(state.config.api_default_page_size);
    let (items, total) = state
        .orders
        .list_orders(filter, state.config.api_max_page_size)
        .await?;
    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        items, total, page, limit,
    ))))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order found"),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    tag = "orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    _actor: Actor,
    Path(id): Path<Uuid>,
) -> ApiResult<order::Model> {
    let order = state.orders.get_order(id).await?;
    Ok(Json(ApiResponse::success(order)))
}

/// Update the non-status details of an order
#[utoipa::path(
    patch,
    path = "/api/v1/orders/{id}",
    params(("id" = Uuid, Path, description = "Order id")),
    request_body = OrderDetailsUpdate,
    responses(
        (status = 200, description = "Order updated"),
        (status = 409, description = "Order modified concurrently", body = crate::errors::ErrorResponse),
    ),
    tag = "orders"
)]
pub async fn update_order(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(payload): Json<OrderDetailsUpdate>,
) -> ApiResult<order::Model> {
    actor.require_privileged()?;
    let order = state.orders.update_details(id, payload, &actor).await?;
    Ok(Json(ApiResponse::success(order)))
}

/// Move an order to another status
///
/// Forward moves are refused with 409 and the missing documents and fields
/// until every requirement of the target status is met.
#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/transitions",
    params(("id" = Uuid, Path, description = "Order id")),
    request_body = TransitionRequest,
    responses(
        (status = 200, description = "Transition committed"),
        (status = 400, description = "Unknown status, same status or terminal order", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Blocked by missing requirements or concurrent change", body = crate::errors::ErrorResponse),
    ),
    tag = "orders"
)]
pub async fn transition_order(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(payload): Json<TransitionRequest>,
) -> ApiResult<order::Model> {
    actor.require_privileged()?;
    let outcome = state
        .order_status
        .request_transition(id, &payload.target_status, payload.comment, &actor)
        .await?;
    Ok(Json(ApiResponse::success(outcome.order)))
}

/// Statuses the order may move to next, with what each one requires
#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}/transitions",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Reachable statuses with direction and requirements", body = [TransitionOption]),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    tag = "orders"
)]
pub async fn list_transitions(
    State(state): State<AppState>,
    _actor: Actor,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<TransitionOption>> {
    let options = state.order_status.allowed_targets(id).await?;
    Ok(Json(ApiResponse::success(options)))
}

/// Check an order against a status without changing it
#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}/requirements/{status}",
    params(
        ("id" = Uuid, Path, description = "Order id"),
        ("status" = String, Path, description = "Target status"),
    ),
    responses(
        (status = 200, description = "Requirement report", body = RequirementReport),
        (status = 400, description = "Unknown or unreachable status", body = crate::errors::ErrorResponse),
    ),
    tag = "orders"
)]
pub async fn get_requirements(
    State(state): State<AppState>,
    _actor: Actor,
    Path((id, status)): Path<(Uuid, String)>,
) -> ApiResult<RequirementReport> {
    let report = state.order_status.preview_transition(id, &status).await?;
    Ok(Json(ApiResponse::success(report)))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}/history",
    params(("id" = Uuid, Path, description = "Order id")),
    responses((status = 200, description = "Status history, oldest first")),
    tag = "orders"
)]
pub async fn get_history(
    State(state): State<AppState>,
    _actor: Actor,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<order_history::Model>> {
    let history = state.order_status.history(id).await?;
    Ok(Json(ApiResponse::success(history)))
}

#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/documents",
    params(("id" = Uuid, Path, description = "Order id")),
    request_body = NewDocument,
    responses((status = 201, description = "Document attached")),
    tag = "orders"
)]
pub async fn attach_document(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(payload): Json<NewDocument>,
) -> Result<impl IntoResponse, ServiceError> {
    actor.require_privileged()?;
    let document = state.orders.attach_document(id, payload, &actor).await?;
    Ok(created_response(document))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}/documents",
    params(("id" = Uuid, Path, description = "Order id")),
    responses((status = 200, description = "Documents, oldest first")),
    tag = "orders"
)]
pub async fn list_documents(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let documents: Vec<order_media::Model> = state
        .orders
        .list_documents(id, actor.role == Role::Dealer)
        .await?;
    Ok(success_response(documents))
}
