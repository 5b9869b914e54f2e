use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::stock_txn_kind::TxnKind;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "finished_goods_txns")]
#[schema(as = FinishedGoodsTxn)]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub stock_id: Uuid,
    pub kind: TxnKind,
    pub quantity: i32,
    pub linked_order_id: Option<Uuid>,
    pub notes: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::finished_goods_stock::Entity",
        from = "Column::StockId",
        to = "super::finished_goods_stock::Column::Id"
    )]
    Stock,
}

impl Related<super::finished_goods_stock::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Stock.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C: ConnectionTrait>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        if !insert {
            return Err(DbErr::Custom("finished_goods_txns is append-only".to_string()));
        }
        Ok(self)
    }

    async fn before_delete<C: ConnectionTrait>(self, _db: &C) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        Err(DbErr::Custom("finished_goods_txns is append-only".to_string()))
    }
}

impl crate::services::audit::AuditEntry for ActiveModel {
    const TRAIL: &'static str = "finished_goods_txns";
}
