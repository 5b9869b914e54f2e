use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Lifecycle status of a production order.
///
/// The variant order here carries no meaning; the canonical sequence lives in
/// [`crate::services::order_status::LIFECYCLE`].
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum OrderStatus {
    #[sea_orm(string_value = "SUBMITTED")]
    Submitted,
    #[sea_orm(string_value = "APPROVED")]
    Approved,
    #[sea_orm(string_value = "SCHEDULED")]
    Scheduled,
    #[sea_orm(string_value = "IN_PRODUCTION")]
    InProduction,
    #[sea_orm(string_value = "READY_TO_SHIP")]
    ReadyToShip,
    #[sea_orm(string_value = "SHIPPED")]
    Shipped,
    #[sea_orm(string_value = "DELIVERED")]
    Delivered,
    #[sea_orm(string_value = "CANCELED")]
    Canceled,
}

impl OrderStatus {
    /// Terminal statuses accept no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Canceled)
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "orders")]
#[schema(as = Order)]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub order_number: String,
    pub dealer_id: Uuid,
    pub model_id: Uuid,
    pub color_id: Uuid,
    pub factory_id: Uuid,
    pub status: OrderStatus,
    pub delivery_address: String,
    /// Legacy payment-proof reference recorded directly on the order
    pub payment_proof_url: Option<String>,
    pub serial_number: Option<String>,
    pub requested_ship_date: Option<NaiveDate>,
    pub priority_rank: Option<i32>,
    /// Array of hardware option codes
    #[schema(value_type = Vec<String>)]
    pub hardware_options: Json,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order_history::Entity")]
    History,
    #[sea_orm(has_many = "super::order_media::Entity")]
    Media,
    #[sea_orm(
        belongs_to = "super::dealer::Entity",
        from = "Column::DealerId",
        to = "super::dealer::Column::Id"
    )]
    Dealer,
}

impl Related<super::order_history::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::History.def()
    }
}

impl Related<super::order_media::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Media.def()
    }
}

impl Related<super::dealer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Dealer.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C: ConnectionTrait>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        let now = Utc::now();

        if insert {
            if let ActiveValue::NotSet = active_model.id {
                active_model.id = Set(Uuid::new_v4());
            }
            if let ActiveValue::NotSet = active_model.created_at {
                active_model.created_at = Set(now);
            }
            if let ActiveValue::NotSet = active_model.version {
                active_model.version = Set(1);
            }
        }
        active_model.updated_at = Set(now);

        Ok(active_model)
    }
}
