mod common;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use common::TestContext;
use order_desk::auth::{ACTOR_ID_HEADER, ACTOR_ROLE_HEADER};
use order_desk::telemetry::REQUEST_ID_HEADER;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

struct Harness {
    ctx: TestContext,
    router: Router,
}

impl Harness {
    async fn new() -> Self {
        let ctx = TestContext::new().await;
        let router = order_desk::app(ctx.state.clone());
        Self { ctx, router }
    }

    async fn call(
        &self,
        method: Method,
        uri: &str,
        role: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(role) = role {
            builder = builder
                .header(ACTOR_ID_HEADER, Uuid::new_v4().to_string())
                .header(ACTOR_ROLE_HEADER, role);
        }
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    fn order_body(&self, number: &str) -> Value {
        let c = &self.ctx.catalog;
        json!({
            "order_number": number,
            "dealer_id": c.dealer_id,
            "model_id": c.model_id,
            "color_id": c.color_id,
            "factory_id": c.factory_id,
            "delivery_address": "9 Dock St",
        })
    }
}

#[tokio::test]
async fn missing_identity_headers_are_unauthorized() {
    let h = Harness::new().await;
    let (status, body) = h.call(Method::GET, "/api/v1/orders", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Unauthorized");
}

#[tokio::test]
async fn dealers_may_read_but_not_mutate() {
    let h = Harness::new().await;
    let (status, _) = h
        .call(Method::POST, "/api/v1/orders", Some("DEALER"), Some(h.order_body("ORD-H1")))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = h.call(Method::GET, "/api/v1/orders", Some("DEALER"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 0);
}

#[tokio::test]
async fn blocked_transition_returns_structured_conflict() {
    let h = Harness::new().await;
    let (status, created) = h
        .call(Method::POST, "/api/v1/orders", Some("STAFF"), Some(h.order_body("ORD-H2")))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = h
        .call(
            Method::POST,
            &format!("/api/v1/orders/{}/transitions", id),
            Some("STAFF"),
            Some(json!({ "target_status": "APPROVED" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["details"]["target_status"], "APPROVED");
    assert_eq!(
        body["details"]["missing_docs"],
        json!(["PROOF_OF_PAYMENT", "QUOTE"])
    );
    assert_eq!(body["details"]["missing_fields"], json!([]));

    let (status, report) = h
        .call(
            Method::GET,
            &format!("/api/v1/orders/{}/requirements/APPROVED", id),
            Some("DEALER"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["data"]["missing_docs"], json!(["PROOF_OF_PAYMENT", "QUOTE"]));
}

#[tokio::test]
async fn satisfied_transition_returns_updated_order() {
    let h = Harness::new().await;
    let (_, created) = h
        .call(Method::POST, "/api/v1/orders", Some("ADMIN"), Some(h.order_body("ORD-H3")))
        .await;
    let id = created["data"]["id"].as_str().unwrap().to_string();

    for doc in ["PROOF_OF_PAYMENT", "QUOTE"] {
        let (status, _) = h
            .call(
                Method::POST,
                &format!("/api/v1/orders/{}/documents", id),
                Some("STAFF"),
                Some(json!({ "doc_type": doc, "url": "https://files.example.com/x.pdf" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = h
        .call(
            Method::POST,
            &format!("/api/v1/orders/{}/transitions", id),
            Some("STAFF"),
            Some(json!({ "target_status": "APPROVED", "comment": "Paid in full" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "APPROVED");

    let (_, history) = h
        .call(
            Method::GET,
            &format!("/api/v1/orders/{}/history", id),
            Some("DEALER"),
            None,
        )
        .await;
    let entries = history["data"].as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[1]["comment"], "Paid in full");
}

#[tokio::test]
async fn unknown_order_is_not_found_with_request_id() {
    let h = Harness::new().await;
    let request = Request::builder()
        .uri(format!("/api/v1/orders/{}", Uuid::new_v4()))
        .header(ACTOR_ID_HEADER, Uuid::new_v4().to_string())
        .header(ACTOR_ROLE_HEADER, "STAFF")
        .header(REQUEST_ID_HEADER, "req-test-1")
        .body(Body::empty())
        .unwrap();
    let response = h.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        response.headers().get(REQUEST_ID_HEADER).unwrap(),
        "req-test-1"
    );
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["request_id"], "req-test-1");
}

#[tokio::test]
async fn stock_posting_and_shortfall_over_http() {
    let h = Harness::new().await;
    let c = h.ctx.catalog;
    let key = json!({
        "factory_id": c.factory_id,
        "model_id": c.model_id,
        "color_id": c.color_id,
        "condition": "NEW",
    });
    let with = |extra: Value| {
        let mut body = key.clone();
        body.as_object_mut()
            .unwrap()
            .extend(extra.as_object().unwrap().clone());
        body
    };

    let (status, posted) = h
        .call(
            Method::POST,
            "/api/v1/stock/finished-goods/postings",
            Some("STAFF"),
            Some(with(json!({ "kind": "ADD", "quantity": 5 }))),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(posted["data"]["row"]["quantity"], 5);
    let row_id = posted["data"]["row"]["id"].as_str().unwrap().to_string();

    let (status, body) = h
        .call(
            Method::POST,
            "/api/v1/stock/finished-goods/postings",
            Some("STAFF"),
            Some(with(json!({ "kind": "SHIP", "quantity": 9 }))),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["details"]["current_quantity"], 5);
    assert_eq!(body["details"]["requested_delta"], -9);

    let (status, report) = h
        .call(
            Method::GET,
            &format!("/api/v1/stock/finished-goods/{}/reconciliation", row_id),
            Some("DEALER"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["data"]["balanced"], true);

    let (status, txns) = h
        .call(
            Method::GET,
            "/api/v1/stock/finished-goods/transactions?kind=ADD",
            Some("STAFF"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(txns["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn openapi_document_is_served() {
    let h = Harness::new().await;
    let (status, doc) = h.call(Method::GET, "/api-docs/openapi.json", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(doc["paths"]["/api/v1/orders/{id}/transitions"].is_object());
}

#[tokio::test]
async fn health_reports_database_up() {
    let h = Harness::new().await;
    let (status, body) = h.call(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["database"]["status"], "up");
}
