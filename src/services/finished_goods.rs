//! Finished-goods stock, keyed by factory, model, color and condition.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{
    sea_query::{Expr, OnConflict, Query},
    ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::audit::append_entry;
use super::catalog::ensure_exists;
use super::stock_ledger::{LedgerBook, NewTxn, StockLedger, TxnQuery};
use crate::entities::{
    color, factory,
    finished_goods_stock::{self, StockCondition},
    finished_goods_txn, product_model,
    stock_txn_kind::TxnKind,
};
use crate::errors::ServiceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct FinishedGoodsKey {
    pub factory_id: Uuid,
    pub model_id: Uuid,
    pub color_id: Uuid,
    pub condition: StockCondition,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct FinishedGoodsBook;

pub type FinishedGoodsLedger = StockLedger<FinishedGoodsBook>;

#[async_trait]
impl LedgerBook for FinishedGoodsBook {
    type Key = FinishedGoodsKey;
    type Row = finished_goods_stock::Model;
    type Txn = finished_goods_txn::Model;
    type Stock = finished_goods_stock::Entity;

    const NAME: &'static str = "finished_goods";
    const KINDS: &'static [TxnKind] = &[
        TxnKind::Add,
        TxnKind::Reserve,
        TxnKind::Release,
        TxnKind::Ship,
        TxnKind::Adjust,
    ];

    fn row_id(row: &Self::Row) -> Uuid {
        row.id
    }

    fn row_quantity(row: &Self::Row) -> i32 {
        row.quantity
    }

    fn txn_delta(txn: &Self::Txn) -> i32 {
        txn.kind.signed_delta(txn.quantity)
    }

    async fn ensure_key<C: ConnectionTrait>(&self, conn: &C, key: &Self::Key) -> Result<(), ServiceError> {
        ensure_exists::<factory::Entity, _>(conn, key.factory_id, "Factory").await?;
        ensure_exists::<product_model::Entity, _>(conn, key.model_id, "Model").await?;
        ensure_exists::<color::Entity, _>(conn, key.color_id, "Color").await
    }

    async fn insert_if_absent<C: ConnectionTrait>(&self, conn: &C, key: &Self::Key) -> Result<(), ServiceError> {
        let now = Utc::now();
        let row = finished_goods_stock::ActiveModel {
            id: Set(Uuid::new_v4()),
            factory_id: Set(key.factory_id),
            model_id: Set(key.model_id),
            color_id: Set(key.color_id),
            condition: Set(key.condition),
            quantity: Set(0),
            eta: Set(None),
            notes: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };
        finished_goods_stock::Entity::insert(row)
            .on_conflict(
                OnConflict::columns([
                    finished_goods_stock::Column::FactoryId,
                    finished_goods_stock::Column::ModelId,
                    finished_goods_stock::Column::ColorId,
                    finished_goods_stock::Column::Condition,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(conn)
            .await
            .map_err(ServiceError::db_error)?;
        Ok(())
    }

    async fn find_by_key<C: ConnectionTrait>(
        &self,
        conn: &C,
        key: &Self::Key,
    ) -> Result<Option<Self::Row>, ServiceError> {
        finished_goods_stock::Entity::find()
            .filter(finished_goods_stock::Column::FactoryId.eq(key.factory_id))
            .filter(finished_goods_stock::Column::ModelId.eq(key.model_id))
            .filter(finished_goods_stock::Column::ColorId.eq(key.color_id))
            .filter(finished_goods_stock::Column::Condition.eq(key.condition))
            .one(conn)
            .await
            .map_err(ServiceError::db_error)
    }

    async fn find_by_id<C: ConnectionTrait>(
        &self,
        conn: &C,
        row_id: Uuid,
    ) -> Result<Option<Self::Row>, ServiceError> {
        finished_goods_stock::Entity::find_by_id(row_id)
            .one(conn)
            .await
            .map_err(ServiceError::db_error)
    }

    async fn apply_delta<C: ConnectionTrait>(
        &self,
        conn: &C,
        row_id: Uuid,
        delta: i32,
    ) -> Result<bool, ServiceError> {
        let result = finished_goods_stock::Entity::update_many()
            .col_expr(
                finished_goods_stock::Column::Quantity,
                Expr::col(finished_goods_stock::Column::Quantity).add(delta),
            )
            .col_expr(finished_goods_stock::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(finished_goods_stock::Column::Id.eq(row_id))
            .filter(finished_goods_stock::Column::Quantity.gte(-delta))
            .exec(conn)
            .await
            .map_err(ServiceError::db_error)?;
        Ok(result.rows_affected == 1)
    }

    async fn update_details<C: ConnectionTrait>(
        &self,
        conn: &C,
        row_id: Uuid,
        eta: Option<NaiveDate>,
        notes: Option<String>,
    ) -> Result<(), ServiceError> {
        finished_goods_stock::Entity::update_many()
            .col_expr(finished_goods_stock::Column::Eta, Expr::value(eta))
            .col_expr(finished_goods_stock::Column::Notes, Expr::value(notes))
            .col_expr(finished_goods_stock::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(finished_goods_stock::Column::Id.eq(row_id))
            .exec(conn)
            .await
            .map_err(ServiceError::db_error)?;
        Ok(())
    }

    async fn latest_txn_at<C: ConnectionTrait>(
        &self,
        conn: &C,
        row_id: Uuid,
    ) -> Result<Option<DateTime<Utc>>, ServiceError> {
        let latest = finished_goods_txn::Entity::find()
            .filter(finished_goods_txn::Column::StockId.eq(row_id))
            .order_by_desc(finished_goods_txn::Column::CreatedAt)
            .one(conn)
            .await
            .map_err(ServiceError::db_error)?;
        Ok(latest.map(|t| t.created_at))
    }

    async fn append_txn<C: ConnectionTrait>(&self, conn: &C, txn: NewTxn) -> Result<Self::Txn, ServiceError> {
        append_entry(
            conn,
            finished_goods_txn::ActiveModel {
                id: Set(Uuid::new_v4()),
                stock_id: Set(txn.stock_id),
                kind: Set(txn.kind),
                quantity: Set(txn.quantity),
                linked_order_id: Set(txn.linked_order_id),
                notes: Set(txn.notes),
                created_by: Set(txn.created_by),
                created_at: Set(txn.created_at),
            },
        )
        .await
    }

    async fn list_txns<C: ConnectionTrait>(
        &self,
        conn: &C,
        query: &TxnQuery,
        limit: u64,
    ) -> Result<Vec<Self::Txn>, ServiceError> {
        let mut select = finished_goods_txn::Entity::find();
        if let Some(row_id) = query.row_id {
            select = select.filter(finished_goods_txn::Column::StockId.eq(row_id));
        }
        if let Some(kind) = query.kind {
            select = select.filter(finished_goods_txn::Column::Kind.eq(kind));
        }
        if let Some(order_id) = query.linked_order_id {
            select = select.filter(finished_goods_txn::Column::LinkedOrderId.eq(order_id));
        }
        if let Some(factory_id) = query.site_id {
            select = select.filter(
                finished_goods_txn::Column::StockId.in_subquery(
                    Query::select()
                        .column(finished_goods_stock::Column::Id)
                        .from(finished_goods_stock::Entity)
                        .and_where(finished_goods_stock::Column::FactoryId.eq(factory_id))
                        .to_owned(),
                ),
            );
        }
        select
            .order_by_desc(finished_goods_txn::Column::CreatedAt)
            .limit(limit)
            .all(conn)
            .await
            .map_err(ServiceError::db_error)
    }

    async fn row_txns<C: ConnectionTrait>(&self, conn: &C, row_id: Uuid) -> Result<Vec<Self::Txn>, ServiceError> {
        finished_goods_txn::Entity::find()
            .filter(finished_goods_txn::Column::StockId.eq(row_id))
            .all(conn)
            .await
            .map_err(ServiceError::db_error)
    }
}
