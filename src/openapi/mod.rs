use axum::{routing::get, Json, Router};
use utoipa::OpenApi;

use crate::AppState;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Order Desk API",
        version = "0.1.0",
        description = r#"
Dealer production orders and stock ledgers.

## Authentication

Requests arrive through a gateway that has already authenticated the caller
and forwards the identity in two headers:

```
X-Actor-Id: <uuid>
X-Actor-Role: ADMIN | STAFF | DEALER
```

Dealers may read; creating orders, changing status, attaching documents and
posting stock require ADMIN or STAFF.

## Errors

Every error body carries `error`, `message`, `request_id` and `timestamp`.
A blocked transition (409) and an insufficient-stock posting (422) also carry
a structured `details` object.
        "#
    ),
    tags(
        (name = "orders", description = "Order intake, lifecycle and documents"),
        (name = "stock", description = "Finished-goods and raw-material ledgers")
    ),
    paths(
        crate::handlers::orders::create_order,
        crate::handlers::orders::list_orders,
        crate::handlers::orders::get_order,
        crate::handlers::orders::update_order,
        crate::handlers::orders::transition_order,
        crate::handlers::orders::list_transitions,
        crate::handlers::orders::get_requirements,
        crate::handlers::orders::get_history,
        crate::handlers::orders::attach_document,
        crate::handlers::orders::list_documents,
        crate::handlers::stock::post_finished_goods,
        crate::handlers::stock::finished_goods_transactions,
        crate::handlers::stock::finished_goods_details,
        crate::handlers::stock::get_finished_goods_row,
        crate::handlers::stock::reconcile_finished_goods,
        crate::handlers::stock::post_materials,
        crate::handlers::stock::materials_transactions,
        crate::handlers::stock::materials_details,
        crate::handlers::stock::get_material_row,
        crate::handlers::stock::reconcile_materials,
    ),
    components(
        schemas(
            crate::errors::ErrorResponse,
            crate::entities::order::Model,
            crate::entities::order::OrderStatus,
            crate::entities::order_history::Model,
            crate::entities::order_media::Model,
            crate::entities::order_media::DocumentKind,
            crate::entities::finished_goods_stock::Model,
            crate::entities::finished_goods_stock::StockCondition,
            crate::entities::finished_goods_txn::Model,
            crate::entities::material_stock::Model,
            crate::entities::material_txn::Model,
            crate::entities::stock_txn_kind::TxnKind,
            crate::services::completeness::RequirementReport,
            crate::services::requirements::OrderField,
            crate::services::orders::NewOrder,
            crate::services::orders::OrderDetailsUpdate,
            crate::services::orders::NewDocument,
            crate::services::stock_ledger::PostingRequest,
            crate::services::stock_ledger::Reconciliation,
            crate::handlers::orders::TransitionRequest,
            crate::handlers::stock::FinishedGoodsPosting,
            crate::handlers::stock::MaterialPosting,
            crate::handlers::stock::StockDetails,
            crate::handlers::stock::FinishedGoodsDetails,
            crate::handlers::stock::MaterialDetails,
            crate::services::order_status::TransitionOption,
            crate::services::order_status::TransitionDirection,
            crate::services::requirements::StatusRequirements,
        )
    )
)]
pub struct ApiDocV1;

/// Serves the generated document at `/api-docs/openapi.json`.
pub fn openapi_routes() -> Router<AppState> {
    Router::new().route(
        "/api-docs/openapi.json",
        get(|| async { Json(ApiDocV1::openapi()) }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_lifecycle_and_ledger_paths() {
        let json = serde_json::to_string(&ApiDocV1::openapi()).unwrap();
        assert!(json.contains("Order Desk API"));
        assert!(json.contains("/api/v1/orders/{id}/transitions"));
        assert!(json.contains("/api/v1/stock/materials/postings"));
        assert!(json.contains("RequirementReport"));
    }

    #[test]
    fn every_routed_stock_and_transition_path_is_documented() {
        let doc = ApiDocV1::openapi();
        for path in [
            "/api/v1/orders/{id}/transitions",
            "/api/v1/stock/finished-goods/details",
            "/api/v1/stock/finished-goods/{row_id}",
            "/api/v1/stock/materials/details",
            "/api/v1/stock/materials/{row_id}",
        ] {
            assert!(doc.paths.paths.contains_key(path), "{} missing from document", path);
        }

        let transitions = &doc.paths.paths["/api/v1/orders/{id}/transitions"];
        assert!(transitions.get.is_some());
        assert!(transitions.post.is_some());
    }
}
