use crate::{
    auth::Actor,
    db::{acquire_write_lock, with_transaction, DbPool},
    entities::{
        color, dealer, factory,
        order::{self, ActiveModel as OrderActiveModel, Entity as OrderEntity, Model as OrderModel, OrderStatus},
        order_history,
        order_media::{self, DocumentKind},
        product_model,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::{NaiveDate, Utc};
use metrics::counter;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use super::audit::append_entry;
use super::catalog::ensure_exists;

const INTAKE_COMMENT: &str = "Order submitted";

/// Dealer order intake payload
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct NewOrder {
    #[validate(length(min = 1, max = 64, message = "Order number is required"))]
    pub order_number: String,
    pub dealer_id: Uuid,
    pub model_id: Uuid,
    pub color_id: Uuid,
    pub factory_id: Uuid,
    #[validate(length(min = 1, message = "Delivery address is required"))]
    pub delivery_address: String,
    #[validate(url)]
    pub payment_proof_url: Option<String>,
    pub serial_number: Option<String>,
    pub requested_ship_date: Option<NaiveDate>,
    #[validate(range(min = 1, max = 10000))]
    pub priority_rank: Option<i32>,
    #[serde(default)]
    pub hardware_options: Vec<String>,
}

/// Scalar details staff fill in as an order progresses.
///
/// Absent fields are left untouched; an empty string clears an optional text
/// field. Status is never changed here.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct OrderDetailsUpdate {
    #[validate(length(min = 1, message = "Delivery address cannot be empty"))]
    pub delivery_address: Option<String>,
    pub payment_proof_url: Option<String>,
    pub serial_number: Option<String>,
    pub requested_ship_date: Option<NaiveDate>,
    #[validate(range(min = 1, max = 10000))]
    pub priority_rank: Option<i32>,
    pub hardware_options: Option<Vec<String>>,
}

/// Attachment metadata; the file itself lives in the blob store.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct NewDocument {
    pub doc_type: DocumentKind,
    #[validate(length(min = 1, max = 2048))]
    pub url: String,
    pub file_name: Option<String>,
    #[serde(default = "default_visible")]
    pub visible_to_dealer: bool,
}

fn default_visible() -> bool {
    true
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct OrderFilter {
    pub dealer_id: Option<Uuid>,
    pub status: Option<OrderStatus>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

fn clear_if_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Order intake, details and documents.
#[derive(Clone)]
pub struct OrderService {
    db_pool: Arc<DbPool>,
    event_sender: EventSender,
}

impl OrderService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: EventSender) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Creates an order in SUBMITTED together with its intake history row.
    #[instrument(skip(self, request, actor), fields(order_number = %request.order_number, dealer_id = %request.dealer_id))]
    pub async fn create_order(&self, request: NewOrder, actor: &Actor) -> Result<OrderModel, ServiceError> {
        request.validate()?;
        let actor = *actor;

        let order = with_transaction(&self.db_pool, move |txn| {
            Box::pin(async move {
                acquire_write_lock::<OrderEntity, _>(txn).await?;
                ensure_exists::<dealer::Entity, _>(txn, request.dealer_id, "Dealer").await?;
                ensure_exists::<product_model::Entity, _>(txn, request.model_id, "Model").await?;
                ensure_exists::<color::Entity, _>(txn, request.color_id, "Color").await?;
                ensure_exists::<factory::Entity, _>(txn, request.factory_id, "Factory").await?;

                let order = OrderActiveModel {
                    order_number: Set(request.order_number.trim().to_string()),
                    dealer_id: Set(request.dealer_id),
                    model_id: Set(request.model_id),
                    color_id: Set(request.color_id),
                    factory_id: Set(request.factory_id),
                    status: Set(OrderStatus::Submitted),
                    delivery_address: Set(request.delivery_address),
                    payment_proof_url: Set(request.payment_proof_url.and_then(clear_if_blank)),
                    serial_number: Set(request.serial_number.and_then(clear_if_blank)),
                    requested_ship_date: Set(request.requested_ship_date),
                    priority_rank: Set(request.priority_rank),
                    hardware_options: Set(serde_json::json!(request.hardware_options)),
                    ..Default::default()
                }
                .insert(txn)
                .await
                .map_err(ServiceError::db_error)?;

                append_entry(
                    txn,
                    order_history::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        order_id: Set(order.id),
                        status: Set(OrderStatus::Submitted),
                        comment: Set(INTAKE_COMMENT.to_string()),
                        actor_id: Set(actor.id),
                        actor_role: Set(actor.role.to_string()),
                        created_at: Set(order.created_at),
                    },
                )
                .await?;

                Ok(order)
            })
        })
        .await?;

        counter!("order_desk.orders.created", 1);
        info!(order_id = %order.id, "Order created");
        self.event_sender.notify(Event::OrderCreated {
            order_id: order.id,
            dealer_id: order.dealer_id,
            order_number: order.order_number.clone(),
        });

        Ok(order)
    }

    #[instrument(skip(self))]
    pub async fn get_order(&self, order_id: Uuid) -> Result<OrderModel, ServiceError> {
        find_order(&*self.db_pool, order_id).await
    }

    /// Lists orders newest first, returning the page and the total count.
    #[instrument(skip(self))]
    pub async fn list_orders(
        &self,
        filter: OrderFilter,
        max_page_size: u64,
    ) -> Result<(Vec<OrderModel>, u64), ServiceError> {
        let page = filter.page.unwrap_or(1);
        let limit = filter.limit.unwrap_or(20);
        if page == 0 {
            return Err(ServiceError::ValidationError("page must be at least 1".to_string()));
        }
        if limit == 0 || limit > max_page_size {
            return Err(ServiceError::ValidationError(format!(
                "limit must be between 1 and {}",
                max_page_size
            )));
        }

        let mut query = OrderEntity::find();
        if let Some(dealer_id) = filter.dealer_id {
            query = query.filter(order::Column::DealerId.eq(dealer_id));
        }
        if let Some(status) = filter.status {
            query = query.filter(order::Column::Status.eq(status));
        }

        let paginator = query
            .order_by_desc(order::Column::CreatedAt)
            .paginate(&*self.db_pool, limit);
        let total = paginator.num_items().await.map_err(ServiceError::db_error)?;
        let orders = paginator
            .fetch_page(page - 1)
            .await
            .map_err(ServiceError::db_error)?;

        Ok((orders, total))
    }

    /// Updates the gate-relevant scalar fields of an order.
    ///
    /// Bumps `version`, so a transition that evaluated the old values fails
    /// with `Conflict` instead of committing on stale data.
    #[instrument(skip(self, update, actor), fields(actor_id = %actor.id))]
    pub async fn update_details(
        &self,
        order_id: Uuid,
        update: OrderDetailsUpdate,
        actor: &Actor,
    ) -> Result<OrderModel, ServiceError> {
        update.validate()?;

        let order = with_transaction(&self.db_pool, move |txn| {
            Box::pin(async move {
                acquire_write_lock::<OrderEntity, _>(txn).await?;
                let current = find_order(txn, order_id).await?;
                let mut active: OrderActiveModel = current.clone().into();

                if let Some(address) = update.delivery_address {
                    active.delivery_address = Set(address.trim().to_string());
                }
                if let Some(url) = update.payment_proof_url {
                    active.payment_proof_url = Set(clear_if_blank(url));
                }
                if let Some(serial) = update.serial_number {
                    active.serial_number = Set(clear_if_blank(serial));
                }
                if let Some(date) = update.requested_ship_date {
                    active.requested_ship_date = Set(Some(date));
                }
                if let Some(rank) = update.priority_rank {
                    active.priority_rank = Set(Some(rank));
                }
                if let Some(options) = update.hardware_options {
                    active.hardware_options = Set(serde_json::json!(options));
                }
                active.version = Set(current.version + 1);
                active.updated_at = Set(Utc::now());

                let result = OrderEntity::update_many()
                    .set(active)
                    .filter(order::Column::Id.eq(order_id))
                    .filter(order::Column::Version.eq(current.version))
                    .exec(txn)
                    .await
                    .map_err(ServiceError::db_error)?;
                if result.rows_affected == 0 {
                    return Err(ServiceError::Conflict(format!(
                        "Order {} was modified concurrently",
                        order_id
                    )));
                }

                find_order(txn, order_id).await
            })
        })
        .await?;

        info!(order_id = %order_id, version = order.version, "Order details updated");
        Ok(order)
    }

    /// Records an uploaded document against an order.
    #[instrument(skip(self, document, actor), fields(order_id = %order_id, doc_type = %document.doc_type))]
    pub async fn attach_document(
        &self,
        order_id: Uuid,
        document: NewDocument,
        actor: &Actor,
    ) -> Result<order_media::Model, ServiceError> {
        document.validate()?;
        let db = &*self.db_pool;
        find_order(db, order_id).await?;

        let media = order_media::ActiveModel {
            order_id: Set(order_id),
            doc_type: Set(document.doc_type),
            url: Set(document.url),
            file_name: Set(document.file_name),
            visible_to_dealer: Set(document.visible_to_dealer),
            uploaded_by: Set(actor.id),
            ..Default::default()
        }
        .insert(db)
        .await
        .map_err(ServiceError::db_error)?;

        info!(document_id = %media.id, "Document attached");
        self.event_sender.notify(Event::DocumentAttached {
            order_id,
            document_id: media.id,
            doc_type: media.doc_type,
        });
        Ok(media)
    }

    /// Documents on an order, oldest first. The dealer view omits internal ones.
    #[instrument(skip(self))]
    pub async fn list_documents(
        &self,
        order_id: Uuid,
        dealer_view: bool,
    ) -> Result<Vec<order_media::Model>, ServiceError> {
        let db = &*self.db_pool;
        find_order(db, order_id).await?;

        let mut query = order_media::Entity::find().filter(order_media::Column::OrderId.eq(order_id));
        if dealer_view {
            query = query.filter(order_media::Column::VisibleToDealer.eq(true));
        }
        query
            .order_by_asc(order_media::Column::CreatedAt)
            .all(db)
            .await
            .map_err(ServiceError::db_error)
    }
}

async fn find_order<C: ConnectionTrait>(conn: &C, order_id: Uuid) -> Result<OrderModel, ServiceError> {
    OrderEntity::find_by_id(order_id)
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))
}
