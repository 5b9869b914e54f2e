use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Condition bucket of a finished unit.
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
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum StockCondition {
    #[sea_orm(string_value = "NEW")]
    New,
    #[sea_orm(string_value = "DEMO")]
    Demo,
    #[sea_orm(string_value = "USED")]
    Used,
    #[sea_orm(string_value = "DAMAGED")]
    Damaged,
}

/// Finished-goods quantity for one factory/model/color/condition bucket.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "finished_goods_stock")]
#[schema(as = FinishedGoodsStock)]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub factory_id: Uuid,
    pub model_id: Uuid,
    pub color_id: Uuid,
    pub condition: StockCondition,
    pub quantity: i32,
    pub eta: Option<NaiveDate>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::finished_goods_txn::Entity")]
    Transactions,
}

impl Related<super::finished_goods_txn::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C: ConnectionTrait>(self, _db: &C, _insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        active_model.updated_at = Set(Utc::now());
        Ok(active_model)
    }
}
