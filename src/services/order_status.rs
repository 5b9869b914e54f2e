use std::str::FromStr;
use std::sync::Arc;

use metrics::counter;
use sea_orm::{
    sea_query::Expr, ActiveEnum, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    QueryFilter, QueryOrder, Set,
};
use serde::Serialize;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use super::audit::{append_entry, monotonic_timestamp};
use super::completeness::{check_requirements, RequirementReport};
use super::requirements::{requirements_for, StatusRequirements};
use crate::{
    auth::Actor,
    db::{acquire_write_lock, with_transaction},
    entities::{
        order::{self, Entity as OrderEntity, Model as OrderModel, OrderStatus},
        order_history,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};

/// Canonical forward sequence. `CANCELED` is deliberately absent.
pub const LIFECYCLE: [OrderStatus; 7] = [
    OrderStatus::Submitted,
    OrderStatus::Approved,
    OrderStatus::Scheduled,
    OrderStatus::InProduction,
    OrderStatus::ReadyToShip,
    OrderStatus::Shipped,
    OrderStatus::Delivered,
];

pub fn lifecycle_position(status: OrderStatus) -> Option<usize> {
    LIFECYCLE.iter().position(|s| *s == status)
}

/// True when `to` lies later in the lifecycle than `from`.
pub fn is_forward(from: OrderStatus, to: OrderStatus) -> bool {
    match (lifecycle_position(from), lifecycle_position(to)) {
        (Some(a), Some(b)) => b > a,
        _ => false,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TransitionDirection {
    Forward,
    Backward,
    Cancel,
}

/// Classifies a requested move, rejecting those the state machine never allows.
pub fn classify(from: OrderStatus, to: OrderStatus) -> Result<TransitionDirection, ServiceError> {
    if from.is_terminal() {
        return Err(ServiceError::ValidationError(format!(
            "Order is {} and accepts no further transitions",
            from
        )));
    }
    if from == to {
        return Err(ServiceError::ValidationError(format!(
            "Order is already {}",
            from
        )));
    }
    Ok(if to == OrderStatus::Canceled {
        TransitionDirection::Cancel
    } else if is_forward(from, to) {
        TransitionDirection::Forward
    } else {
        TransitionDirection::Backward
    })
}

pub fn parse_status(raw: &str) -> Result<OrderStatus, ServiceError> {
    OrderStatus::from_str(raw.trim())
        .map_err(|_| ServiceError::ValidationError(format!("Unknown order status: {}", raw)))
}

fn default_comment(from: OrderStatus, to: OrderStatus) -> String {
    format!("Status changed from {} to {}", from, to)
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TransitionOutcome {
    pub order: OrderModel,
    pub history: order_history::Model,
    pub previous_status: OrderStatus,
    pub direction: TransitionDirection,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TransitionOption {
    pub status: OrderStatus,
    pub direction: TransitionDirection,
    pub requirements: StatusRequirements,
}

#[derive(Clone)]
pub struct OrderStatusService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl OrderStatusService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    /// Moves an order to `target_status`, gating forward moves on requirements.
    ///
    /// The gate, the status write and the history row share one transaction.
    /// The status write is conditioned on the order version read inside that
    /// transaction, so a concurrent change surfaces as `Conflict`.
    #[instrument(skip(self, comment, actor), fields(order_id = %order_id, target = %target_status, actor_id = %actor.id))]
    pub async fn request_transition(
        &self,
        order_id: Uuid,
        target_status: &str,
        comment: Option<String>,
        actor: &Actor,
    ) -> Result<TransitionOutcome, ServiceError> {
        let target = parse_status(target_status)?;
        let actor = *actor;

        let result = with_transaction(&self.db, move |txn| {
            Box::pin(async move {
                acquire_write_lock::<OrderEntity, _>(txn).await?;
                let current = load_order(txn, order_id).await?;
                let previous_status = current.status;
                let direction = classify(previous_status, target)?;

                if direction == TransitionDirection::Forward {
                    let report = check_requirements(txn, &current, target).await?;
                    if !report.is_satisfied() {
                        return Err(ServiceError::blocked(report));
                    }
                }

                let (order, history) =
                    record_transition(txn, &current, target, comment, &actor).await?;
                Ok(TransitionOutcome {
                    order,
                    history,
                    previous_status,
                    direction,
                })
            })
        })
        .await;

        match &result {
            Ok(outcome) => {
                counter!("order_desk.orders.transitions", 1, "to" => target.to_string());
                info!(
                    from = %outcome.previous_status,
                    to = %target,
                    version = outcome.order.version,
                    "Order status updated"
                );
                self.event_sender.notify(Event::OrderStatusChanged {
                    order_id,
                    old_status: outcome.previous_status,
                    new_status: target,
                    actor_id: actor.id,
                    comment: outcome.history.comment.clone(),
                    changed_at: outcome.history.created_at,
                });
            }
            Err(ServiceError::Blocked(report)) => {
                counter!("order_desk.orders.transitions_blocked", 1, "to" => target.to_string());
                warn!(gaps = %report.summary(), "Transition blocked by missing requirements");
            }
            Err(e) => warn!(error = %e, "Transition rejected"),
        }

        result
    }

    /// Evaluates the gate for `target_status` without writing anything.
    ///
    /// Moves that are never gated report an empty, satisfied checklist.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn preview_transition(
        &self,
        order_id: Uuid,
        target_status: &str,
    ) -> Result<RequirementReport, ServiceError> {
        let target = parse_status(target_status)?;
        let db = &*self.db;
        let order = load_order(db, order_id).await?;

        match classify(order.status, target)? {
            TransitionDirection::Forward => check_requirements(db, &order, target).await,
            _ => Ok(RequirementReport {
                order_id,
                target_status: target,
                missing_docs: vec![],
                missing_fields: vec![],
                satisfied_docs: vec![],
                satisfied_fields: vec![],
            }),
        }
    }

    /// History rows for an order, oldest first.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn history(&self, order_id: Uuid) -> Result<Vec<order_history::Model>, ServiceError> {
        let db = &*self.db;
        load_order(db, order_id).await?;
        order_history::Entity::find()
            .filter(order_history::Column::OrderId.eq(order_id))
            .order_by_asc(order_history::Column::CreatedAt)
            .all(db)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Statuses reachable from the order's current status.
    pub async fn allowed_targets(&self, order_id: Uuid) -> Result<Vec<TransitionOption>, ServiceError> {
        let order = load_order(&*self.db, order_id).await?;
        Ok(transition_options(order.status))
    }
}

/// Writes an accepted transition: the status change and its history row.
///
/// The update only matches while the order still has the version `current`
/// was read at; otherwise nothing is written and the result is `Conflict`.
/// Callers run this inside the transaction that evaluated the gate.
pub async fn record_transition<C: ConnectionTrait>(
    conn: &C,
    current: &OrderModel,
    target: OrderStatus,
    comment: Option<String>,
    actor: &Actor,
) -> Result<(OrderModel, order_history::Model), ServiceError> {
    let order_id = current.id;
    let last_entry = order_history::Entity::find()
        .filter(order_history::Column::OrderId.eq(order_id))
        .order_by_desc(order_history::Column::CreatedAt)
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?;
    let changed_at = monotonic_timestamp(last_entry.map(|h| h.created_at));

    let updated = OrderEntity::update_many()
        .col_expr(order::Column::Status, Expr::value(target.into_value()))
        .col_expr(
            order::Column::Version,
            Expr::col(order::Column::Version).add(1),
        )
        .col_expr(order::Column::UpdatedAt, Expr::value(changed_at))
        .filter(order::Column::Id.eq(order_id))
        .filter(order::Column::Version.eq(current.version))
        .exec(conn)
        .await
        .map_err(ServiceError::db_error)?;
    if updated.rows_affected == 0 {
        return Err(ServiceError::Conflict(format!(
            "Order {} was modified concurrently; retry the transition",
            order_id
        )));
    }

    let comment = comment
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| default_comment(current.status, target));
    let history = append_entry(
        conn,
        order_history::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order_id),
            status: Set(target),
            comment: Set(comment),
            actor_id: Set(actor.id),
            actor_role: Set(actor.role.to_string()),
            created_at: Set(changed_at),
        },
    )
    .await?;

    let order = load_order(conn, order_id).await?;
    Ok((order, history))
}

/// Every status reachable from `from`, in lifecycle order with CANCELED last.
pub fn transition_options(from: OrderStatus) -> Vec<TransitionOption> {
    LIFECYCLE
        .iter()
        .copied()
        .chain(std::iter::once(OrderStatus::Canceled))
        .filter_map(|to| {
            let direction = classify(from, to).ok()?;
            let requirements = match direction {
                TransitionDirection::Forward => requirements_for(to),
                _ => StatusRequirements::NONE,
            };
            Some(TransitionOption {
                status: to,
                direction,
                requirements,
            })
        })
        .collect()
}

async fn load_order<C: ConnectionTrait>(conn: &C, order_id: Uuid) -> Result<OrderModel, ServiceError> {
    OrderEntity::find_by_id(order_id)
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))
}
