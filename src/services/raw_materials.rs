//! Raw-material stock, keyed by item and location.

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
use crate::entities::{material_item, material_stock, material_txn, stock_location, stock_txn_kind::TxnKind};
use crate::errors::ServiceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct MaterialKey {
    pub item_id: Uuid,
    pub location_id: Uuid,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct MaterialBook;

pub type MaterialLedger = StockLedger<MaterialBook>;

#[async_trait]
impl LedgerBook for MaterialBook {
    type Key = MaterialKey;
    type Row = material_stock::Model;
    type Txn = material_txn::Model;
    type Stock = material_stock::Entity;

    const NAME: &'static str = "raw_materials";
    const KINDS: &'static [TxnKind] = &[TxnKind::In, TxnKind::Out, TxnKind::Adjust];

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
        ensure_exists::<material_item::Entity, _>(conn, key.item_id, "Material item").await?;
        ensure_exists::<stock_location::Entity, _>(conn, key.location_id, "Location").await
    }

    async fn insert_if_absent<C: ConnectionTrait>(&self, conn: &C, key: &Self::Key) -> Result<(), ServiceError> {
        let now = Utc::now();
        let row = material_stock::ActiveModel {
            id: Set(Uuid::new_v4()),
            item_id: Set(key.item_id),
            location_id: Set(key.location_id),
            quantity: Set(0),
            eta: Set(None),
            notes: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };
        material_stock::Entity::insert(row)
            .on_conflict(
                OnConflict::columns([
                    material_stock::Column::ItemId,
                    material_stock::Column::LocationId,
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
        material_stock::Entity::find()
            .filter(material_stock::Column::ItemId.eq(key.item_id))
            .filter(material_stock::Column::LocationId.eq(key.location_id))
            .one(conn)
            .await
            .map_err(ServiceError::db_error)
    }

    async fn find_by_id<C: ConnectionTrait>(
        &self,
        conn: &C,
        row_id: Uuid,
    ) -> Result<Option<Self::Row>, ServiceError> {
        material_stock::Entity::find_by_id(row_id)
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
        let result = material_stock::Entity::update_many()
            .col_expr(
                material_stock::Column::Quantity,
                Expr::col(material_stock::Column::Quantity).add(delta),
            )
            .col_expr(material_stock::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(material_stock::Column::Id.eq(row_id))
            .filter(material_stock::Column::Quantity.gte(-delta))
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
        material_stock::Entity::update_many()
            .col_expr(material_stock::Column::Eta, Expr::value(eta))
            .col_expr(material_stock::Column::Notes, Expr::value(notes))
            .col_expr(material_stock::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(material_stock::Column::Id.eq(row_id))
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
        let latest = material_txn::Entity::find()
            .filter(material_txn::Column::StockId.eq(row_id))
            .order_by_desc(material_txn::Column::CreatedAt)
            .one(conn)
            .await
            .map_err(ServiceError::db_error)?;
        Ok(latest.map(|t| t.created_at))
    }

    async fn append_txn<C: ConnectionTrait>(&self, conn: &C, txn: NewTxn) -> Result<Self::Txn, ServiceError> {
        append_entry(
            conn,
            material_txn::ActiveModel {
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
        let mut select = material_txn::Entity::find();
        if let Some(row_id) = query.row_id {
            select = select.filter(material_txn::Column::StockId.eq(row_id));
        }
        if let Some(kind) = query.kind {
            select = select.filter(material_txn::Column::Kind.eq(kind));
        }
        if let Some(order_id) = query.linked_order_id {
            select = select.filter(material_txn::Column::LinkedOrderId.eq(order_id));
        }
        if let Some(location_id) = query.site_id {
            select = select.filter(
                material_txn::Column::StockId.in_subquery(
                    Query::select()
                        .column(material_stock::Column::Id)
                        .from(material_stock::Entity)
                        .and_where(material_stock::Column::LocationId.eq(location_id))
                        .to_owned(),
                ),
            );
        }
        select
            .order_by_desc(material_txn::Column::CreatedAt)
            .limit(limit)
            .all(conn)
            .await
            .map_err(ServiceError::db_error)
    }

    async fn row_txns<C: ConnectionTrait>(&self, conn: &C, row_id: Uuid) -> Result<Vec<Self::Txn>, ServiceError> {
        material_txn::Entity::find()
            .filter(material_txn::Column::StockId.eq(row_id))
            .all(conn)
            .await
            .map_err(ServiceError::db_error)
    }
}
