mod common;

use assert_matches::assert_matches;
use chrono::NaiveDate;
use common::{staff, TestContext};
use order_desk::{
    entities::{
        order::OrderStatus,
        order_history,
        order_media::DocumentKind,
    },
    errors::ServiceError,
    events::Event,
    services::{
        order_status::{record_transition, TransitionDirection},
        orders::{NewDocument, OrderDetailsUpdate, OrderFilter},
        requirements::OrderField,
    },
};
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use uuid::Uuid;

fn document(kind: DocumentKind) -> NewDocument {
    NewDocument {
        doc_type: kind,
        url: format!("https://files.example.com/{}.pdf", kind),
        file_name: None,
        visible_to_dealer: true,
    }
}

async fn history_count(ctx: &TestContext, order_id: Uuid) -> u64 {
    order_history::Entity::find()
        .filter(order_history::Column::OrderId.eq(order_id))
        .count(&*ctx.db)
        .await
        .unwrap()
}

#[tokio::test]
async fn create_order_writes_intake_history() {
    let mut ctx = TestContext::new().await;
    let actor = staff();

    let order = ctx
        .state
        .orders
        .create_order(ctx.new_order("ORD-1001"), &actor)
        .await
        .unwrap();

    assert_eq!(order.status, OrderStatus::Submitted);
    assert_eq!(order.version, 1);
    let history = ctx.state.order_status.history(order.id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, OrderStatus::Submitted);
    assert_eq!(history[0].actor_id, actor.id);
    assert_eq!(history[0].actor_role, "STAFF");

    assert_matches!(
        ctx.drain_events().as_slice(),
        [Event::OrderCreated { order_number, .. }] if order_number == "ORD-1001"
    );
}

#[tokio::test]
async fn create_order_rejects_unknown_catalog_entries_and_duplicates() {
    let ctx = TestContext::new().await;
    let actor = staff();

    let mut request = ctx.new_order("ORD-1002");
    request.color_id = Uuid::new_v4();
    assert_matches!(
        ctx.state.orders.create_order(request, &actor).await,
        Err(ServiceError::NotFound(msg)) if msg.contains("Color")
    );

    ctx.state
        .orders
        .create_order(ctx.new_order("ORD-1002"), &actor)
        .await
        .unwrap();
    assert_matches!(
        ctx.state
            .orders
            .create_order(ctx.new_order("ORD-1002"), &actor)
            .await,
        Err(ServiceError::Conflict(_))
    );

    let mut blank = ctx.new_order("ORD-1003");
    blank.delivery_address = String::new();
    assert_matches!(
        ctx.state.orders.create_order(blank, &actor).await,
        Err(ServiceError::ValidationError(_))
    );
}

#[tokio::test]
async fn approval_blocked_until_payment_and_quote_present() {
    let mut ctx = TestContext::new().await;
    let actor = staff();
    let order = ctx
        .state
        .orders
        .create_order(ctx.new_order("ORD-2001"), &actor)
        .await
        .unwrap();
    ctx.drain_events();

    let err = ctx
        .state
        .order_status
        .request_transition(order.id, "APPROVED", None, &actor)
        .await
        .unwrap_err();
    let report = match err {
        ServiceError::Blocked(report) => report,
        other => panic!("expected Blocked, got {:?}", other),
    };
    assert_eq!(report.target_status, OrderStatus::Approved);
    assert_eq!(
        report.missing_docs,
        vec![DocumentKind::ProofOfPayment, DocumentKind::Quote]
    );
    assert!(report.missing_fields.is_empty());

    let unchanged = ctx.state.orders.get_order(order.id).await.unwrap();
    assert_eq!(unchanged.status, OrderStatus::Submitted);
    assert_eq!(unchanged.version, order.version);
    assert_eq!(history_count(&ctx, order.id).await, 1);
    assert!(ctx.drain_events().is_empty());

    // Legacy payment reference on the order stands in for the document.
    ctx.state
        .orders
        .update_details(
            order.id,
            OrderDetailsUpdate {
                payment_proof_url: Some("https://pay.example.com/r/77".into()),
                ..Default::default()
            },
            &actor,
        )
        .await
        .unwrap();
    ctx.state
        .orders
        .attach_document(order.id, document(DocumentKind::Quote), &actor)
        .await
        .unwrap();
    ctx.drain_events();

    let outcome = ctx
        .state
        .order_status
        .request_transition(order.id, "approved", Some("Deposit received".into()), &actor)
        .await
        .unwrap();
    assert_eq!(outcome.order.status, OrderStatus::Approved);
    assert_eq!(outcome.previous_status, OrderStatus::Submitted);
    assert_eq!(outcome.direction, TransitionDirection::Forward);
    assert_eq!(outcome.history.comment, "Deposit received");
    assert_eq!(outcome.history.actor_id, actor.id);
    assert_eq!(history_count(&ctx, order.id).await, 2);

    assert_matches!(
        ctx.drain_events().as_slice(),
        [Event::OrderStatusChanged { old_status: OrderStatus::Submitted, new_status: OrderStatus::Approved, .. }]
    );
}

#[tokio::test]
async fn field_requirements_reported_alongside_documents() {
    let ctx = TestContext::new().await;
    let actor = staff();
    let order = ctx
        .state
        .orders
        .create_order(ctx.new_order("ORD-2002"), &actor)
        .await
        .unwrap();

    let report = ctx
        .state
        .order_status
        .preview_transition(order.id, "SCHEDULED")
        .await
        .unwrap();
    assert_eq!(report.missing_docs, vec![DocumentKind::SignedOrderForm]);
    assert_eq!(
        report.missing_fields,
        vec![OrderField::RequestedShipDate, OrderField::PriorityRank]
    );

    ctx.state
        .orders
        .update_details(
            order.id,
            OrderDetailsUpdate {
                requested_ship_date: NaiveDate::from_ymd_opt(2026, 3, 1),
                priority_rank: Some(3),
                ..Default::default()
            },
            &actor,
        )
        .await
        .unwrap();
    ctx.state
        .orders
        .attach_document(order.id, document(DocumentKind::SignedOrderForm), &actor)
        .await
        .unwrap();

    let report = ctx
        .state
        .order_status
        .preview_transition(order.id, "SCHEDULED")
        .await
        .unwrap();
    assert!(report.is_satisfied());
    // Preview never writes.
    assert_eq!(history_count(&ctx, order.id).await, 1);

    let outcome = ctx
        .state
        .order_status
        .request_transition(order.id, "SCHEDULED", None, &actor)
        .await
        .unwrap();
    assert_eq!(outcome.order.status, OrderStatus::Scheduled);
    assert_eq!(
        outcome.history.comment,
        "Status changed from SUBMITTED to SCHEDULED"
    );
}

#[tokio::test]
async fn backward_and_cancel_moves_skip_the_gate() {
    let ctx = TestContext::new().await;
    let actor = staff();
    let order = ctx
        .state
        .orders
        .create_order(ctx.new_order("ORD-3001"), &actor)
        .await
        .unwrap();
    ctx.state
        .orders
        .attach_document(order.id, document(DocumentKind::ProofOfPayment), &actor)
        .await
        .unwrap();
    ctx.state
        .orders
        .attach_document(order.id, document(DocumentKind::Quote), &actor)
        .await
        .unwrap();
    ctx.state
        .order_status
        .request_transition(order.id, "APPROVED", None, &actor)
        .await
        .unwrap();

    let back = ctx
        .state
        .order_status
        .request_transition(order.id, "SUBMITTED", Some("Quote revised".into()), &actor)
        .await
        .unwrap();
    assert_eq!(back.direction, TransitionDirection::Backward);
    assert_eq!(back.order.status, OrderStatus::Submitted);

    let canceled = ctx
        .state
        .order_status
        .request_transition(order.id, "CANCELED", None, &actor)
        .await
        .unwrap();
    assert_eq!(canceled.direction, TransitionDirection::Cancel);

    // Terminal: nothing further is accepted, not even a backward move.
    assert_matches!(
        ctx.state
            .order_status
            .request_transition(order.id, "SUBMITTED", None, &actor)
            .await,
        Err(ServiceError::ValidationError(_))
    );

    let history = ctx.state.order_status.history(order.id).await.unwrap();
    let statuses: Vec<_> = history.iter().map(|h| h.status).collect();
    assert_eq!(
        statuses,
        vec![
            OrderStatus::Submitted,
            OrderStatus::Approved,
            OrderStatus::Submitted,
            OrderStatus::Canceled
        ]
    );
    assert!(history
        .windows(2)
        .all(|pair| pair[0].created_at <= pair[1].created_at));
}

#[tokio::test]
async fn rejects_unknown_status_same_status_and_missing_order() {
    let ctx = TestContext::new().await;
    let actor = staff();
    let order = ctx
        .state
        .orders
        .create_order(ctx.new_order("ORD-4001"), &actor)
        .await
        .unwrap();

    assert_matches!(
        ctx.state
            .order_status
            .request_transition(order.id, "LAUNCHED", None, &actor)
            .await,
        Err(ServiceError::ValidationError(_))
    );
    // Reissuing a committed transition lands here: target equals current.
    assert_matches!(
        ctx.state
            .order_status
            .request_transition(order.id, "SUBMITTED", None, &actor)
            .await,
        Err(ServiceError::ValidationError(_))
    );
    assert_matches!(
        ctx.state
            .order_status
            .request_transition(Uuid::new_v4(), "APPROVED", None, &actor)
            .await,
        Err(ServiceError::NotFound(_))
    );
    assert_eq!(history_count(&ctx, order.id).await, 1);
}

#[tokio::test]
async fn closed_event_channel_does_not_fail_transitions() {
    let ctx = TestContext::new().await;
    let actor = staff();
    let order = ctx
        .state
        .orders
        .create_order(ctx.new_order("ORD-5001"), &actor)
        .await
        .unwrap();
    let TestContext { state, events, .. } = ctx;
    drop(events);

    let outcome = state
        .order_status
        .request_transition(order.id, "CANCELED", None, &actor)
        .await
        .unwrap();
    assert_eq!(outcome.order.status, OrderStatus::Canceled);
}

#[tokio::test]
async fn detail_updates_bump_version_and_clear_blank_fields() {
    let ctx = TestContext::new().await;
    let actor = staff();
    let mut request = ctx.new_order("ORD-6001");
    request.serial_number = Some("HULL-42".into());
    let order = ctx.state.orders.create_order(request, &actor).await.unwrap();

    let updated = ctx
        .state
        .orders
        .update_details(
            order.id,
            OrderDetailsUpdate {
                serial_number: Some("   ".into()),
                priority_rank: Some(9),
                ..Default::default()
            },
            &actor,
        )
        .await
        .unwrap();
    assert_eq!(updated.serial_number, None);
    assert_eq!(updated.priority_rank, Some(9));
    assert_eq!(updated.status, OrderStatus::Submitted);
    assert_eq!(updated.version, order.version + 1);

    assert_matches!(
        ctx.state
            .orders
            .update_details(
                order.id,
                OrderDetailsUpdate {
                    priority_rank: Some(0),
                    ..Default::default()
                },
                &actor,
            )
            .await,
        Err(ServiceError::ValidationError(_))
    );
}

#[tokio::test]
async fn dealer_view_hides_internal_documents() {
    let ctx = TestContext::new().await;
    let actor = staff();
    let order = ctx
        .state
        .orders
        .create_order(ctx.new_order("ORD-7001"), &actor)
        .await
        .unwrap();
    ctx.state
        .orders
        .attach_document(order.id, document(DocumentKind::Quote), &actor)
        .await
        .unwrap();
    ctx.state
        .orders
        .attach_document(
            order.id,
            NewDocument {
                visible_to_dealer: false,
                ..document(DocumentKind::BuildSheet)
            },
            &actor,
        )
        .await
        .unwrap();

    let internal = ctx
        .state
        .orders
        .list_documents(order.id, false)
        .await
        .unwrap();
    let dealer = ctx
        .state
        .orders
        .list_documents(order.id, true)
        .await
        .unwrap();
    assert_eq!(internal.len(), 2);
    assert_eq!(dealer.len(), 1);
    assert_eq!(dealer[0].doc_type, DocumentKind::Quote);
}

#[tokio::test]
async fn list_orders_filters_and_pages() {
    let ctx = TestContext::new().await;
    let actor = staff();
    for n in 0..3 {
        ctx.state
            .orders
            .create_order(ctx.new_order(&format!("ORD-80{:02}", n)), &actor)
            .await
            .unwrap();
    }

    let (page, total) = ctx
        .state
        .orders
        .list_orders(
            OrderFilter {
                dealer_id: Some(ctx.catalog.dealer_id),
                status: Some(OrderStatus::Submitted),
                page: Some(1),
                limit: Some(2),
            },
            100,
        )
        .await
        .unwrap();
    assert_eq!(total, 3);
    assert_eq!(page.len(), 2);

    assert_matches!(
        ctx.state
            .orders
            .list_orders(
                OrderFilter {
                    limit: Some(500),
                    ..Default::default()
                },
                100
            )
            .await,
        Err(ServiceError::ValidationError(_))
    );
}

#[tokio::test]
async fn allowed_targets_list_every_reachable_status() {
    let ctx = TestContext::new().await;
    let actor = staff();
    let order = ctx
        .state
        .orders
        .create_order(ctx.new_order("ORD-9001"), &actor)
        .await
        .unwrap();

    let options = ctx.state.order_status.allowed_targets(order.id).await.unwrap();
    let statuses: Vec<_> = options.iter().map(|o| o.status).collect();
    assert!(!statuses.contains(&OrderStatus::Submitted));
    assert_eq!(statuses.first(), Some(&OrderStatus::Approved));
    assert_eq!(statuses.last(), Some(&OrderStatus::Canceled));
}

#[tokio::test]
async fn stale_version_write_conflicts_and_leaves_history_alone() {
    let ctx = TestContext::new().await;
    let actor = staff();
    let order = ctx
        .state
        .orders
        .create_order(ctx.new_order("BT-2101"), &actor)
        .await
        .unwrap();

    // Snapshot as the gate would have read it, then change the order underneath.
    let stale = ctx.state.orders.get_order(order.id).await.unwrap();
    ctx.state
        .orders
        .update_details(
            order.id,
            OrderDetailsUpdate {
                serial_number: Some("HIN-STALE-01".into()),
                ..Default::default()
            },
            &actor,
        )
        .await
        .unwrap();

    let result = record_transition(&*ctx.db, &stale, OrderStatus::Canceled, None, &actor).await;
    assert_matches!(result, Err(ServiceError::Conflict(_)));
    assert!(result.unwrap_err().is_retryable());

    let current = ctx.state.orders.get_order(order.id).await.unwrap();
    assert_eq!(current.status, OrderStatus::Submitted);
    assert_eq!(current.version, stale.version + 1);
    assert_eq!(history_count(&ctx, order.id).await, 1);

    // Reissued against fresh state, the same move goes through.
    let outcome = ctx
        .state
        .order_status
        .request_transition(order.id, "CANCELED", None, &actor)
        .await
        .unwrap();
    assert_eq!(outcome.order.status, OrderStatus::Canceled);
    assert_eq!(history_count(&ctx, order.id).await, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_cancels_on_file_pool_apply_once() {
    let ctx = TestContext::file_backed().await;
    let actor = staff();
    let order = ctx
        .state
        .orders
        .create_order(ctx.new_order("BT-2102"), &actor)
        .await
        .unwrap();

    let mut tasks = vec![];
    for _ in 0..6 {
        let service = ctx.state.order_status.clone();
        let order_id = order.id;
        tasks.push(tokio::spawn(async move {
            service
                .request_transition(order_id, "CANCELED", None, &actor)
                .await
        }));
    }

    let mut applied = 0;
    for t in tasks {
        match t.await.unwrap() {
            Ok(_) => applied += 1,
            Err(ServiceError::ValidationError(_)) | Err(ServiceError::Conflict(_)) => {}
            Err(other) => panic!("unexpected error: {:?}", other),
        }
    }
    assert_eq!(applied, 1);
    assert_eq!(history_count(&ctx, order.id).await, 2);

    let current = ctx.state.orders.get_order(order.id).await.unwrap();
    assert_eq!(current.status, OrderStatus::Canceled);
    assert_eq!(current.version, order.version + 1);
}
