//! Generic stock ledger.
//!
//! A ledger keeps one non-negative quantity per key together with an
//! append-only trail of the postings that produced it. [`StockLedger`] holds
//! the posting algorithm; a [`LedgerBook`] supplies the table-specific
//! queries for one instantiation (finished goods, raw materials).
//!
//! Posting runs in a single transaction:
//! 1. take the write lock (SQLite only, see [`acquire_write_lock`]),
//! 2. verify the key's catalog components exist,
//! 3. `INSERT .. ON CONFLICT DO NOTHING` the row at zero, then select it,
//! 4. `UPDATE .. SET quantity = quantity + delta WHERE quantity >= -delta`,
//! 5. append one txn.
//!
//! Zero rows affected in step 4 is the insufficient-stock outcome, and the
//! whole transaction rolls back.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use metrics::counter;
use sea_orm::{ConnectionTrait, DatabaseConnection, EntityTrait};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::audit::monotonic_timestamp;
use crate::{
    auth::Actor,
    db::{acquire_write_lock, with_transaction},
    entities::stock_txn_kind::TxnKind,
    errors::ServiceError,
    events::{Event, EventSender},
};

/// Upper bound on a single posting's magnitude.
pub const MAX_POSTING_QUANTITY: i32 = 1_000_000;

const DEFAULT_TXN_LIMIT: u64 = 50;
const MAX_TXN_LIMIT: u64 = 500;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PostingRequest {
    pub kind: TxnKind,
    /// Positive amount; for ADJUST, the signed non-zero delta.
    pub quantity: i32,
    pub linked_order_id: Option<Uuid>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct TxnQuery {
    pub row_id: Option<Uuid>,
    pub kind: Option<TxnKind>,
    pub linked_order_id: Option<Uuid>,
    /// Factory for finished goods, location for raw materials.
    pub site_id: Option<Uuid>,
    pub limit: Option<u64>,
}

/// Txn row to append, independent of the backing table.
#[derive(Debug, Clone)]
pub struct NewTxn {
    pub stock_id: Uuid,
    pub kind: TxnKind,
    pub quantity: i32,
    pub linked_order_id: Option<Uuid>,
    pub notes: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Posting<R, T> {
    pub row: R,
    pub txn: T,
    pub delta: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Reconciliation {
    pub row_id: Uuid,
    pub quantity: i32,
    pub ledger_sum: i64,
    pub txn_count: u64,
    pub balanced: bool,
}

/// Signed delta for a posting, or the reason it is invalid for a book.
pub fn requested_delta(supported: &[TxnKind], kind: TxnKind, quantity: i32) -> Result<i32, ServiceError> {
    if !supported.contains(&kind) {
        return Err(ServiceError::ValidationError(format!(
            "Transaction kind {} is not valid for this ledger",
            kind
        )));
    }
    if quantity == i32::MIN || quantity.abs() > MAX_POSTING_QUANTITY {
        return Err(ServiceError::ValidationError(format!(
            "Quantity must not exceed {} in magnitude",
            MAX_POSTING_QUANTITY
        )));
    }
    if kind.is_adjustment() {
        if quantity == 0 {
            return Err(ServiceError::ValidationError(
                "ADJUST requires a non-zero quantity".to_string(),
            ));
        }
    } else if quantity <= 0 {
        return Err(ServiceError::ValidationError(format!(
            "{} requires a positive quantity",
            kind
        )));
    }
    Ok(kind.signed_delta(quantity))
}

/// Table-specific storage behind one ledger instantiation.
///
/// Every method runs on the connection it is given, which during a posting is
/// the posting's transaction.
#[async_trait]
pub trait LedgerBook: Send + Sync + 'static {
    type Key: fmt::Debug + Clone + Send + Sync + 'static;
    type Row: fmt::Debug + Clone + Send + Sync + Serialize + 'static;
    type Txn: fmt::Debug + Clone + Send + Sync + Serialize + 'static;
    /// Table holding the rows; posting transactions lock it first.
    type Stock: EntityTrait;

    /// Ledger name for logs, metrics and events.
    const NAME: &'static str;
    /// Transaction kinds this ledger accepts.
    const KINDS: &'static [TxnKind];

    fn row_id(row: &Self::Row) -> Uuid;
    fn row_quantity(row: &Self::Row) -> i32;
    fn txn_delta(txn: &Self::Txn) -> i32;

    /// `NotFound` unless every catalog component of `key` exists.
    async fn ensure_key<C: ConnectionTrait>(&self, conn: &C, key: &Self::Key) -> Result<(), ServiceError>;

    /// Creates the zero-quantity row for `key` unless it already exists.
    async fn insert_if_absent<C: ConnectionTrait>(&self, conn: &C, key: &Self::Key) -> Result<(), ServiceError>;

    async fn find_by_key<C: ConnectionTrait>(
        &self,
        conn: &C,
        key: &Self::Key,
    ) -> Result<Option<Self::Row>, ServiceError>;

    async fn find_by_id<C: ConnectionTrait>(
        &self,
        conn: &C,
        row_id: Uuid,
    ) -> Result<Option<Self::Row>, ServiceError>;

    /// Adds `delta` unless the result would be negative. Returns whether the row changed.
    async fn apply_delta<C: ConnectionTrait>(
        &self,
        conn: &C,
        row_id: Uuid,
        delta: i32,
    ) -> Result<bool, ServiceError>;

    async fn update_details<C: ConnectionTrait>(
        &self,
        conn: &C,
        row_id: Uuid,
        eta: Option<NaiveDate>,
        notes: Option<String>,
    ) -> Result<(), ServiceError>;

    async fn latest_txn_at<C: ConnectionTrait>(
        &self,
        conn: &C,
        row_id: Uuid,
    ) -> Result<Option<DateTime<Utc>>, ServiceError>;

    async fn append_txn<C: ConnectionTrait>(&self, conn: &C, txn: NewTxn) -> Result<Self::Txn, ServiceError>;

    /// Txns matching `query`, newest first, at most `limit`.
    async fn list_txns<C: ConnectionTrait>(
        &self,
        conn: &C,
        query: &TxnQuery,
        limit: u64,
    ) -> Result<Vec<Self::Txn>, ServiceError>;

    /// Every txn of one row, in any order.
    async fn row_txns<C: ConnectionTrait>(&self, conn: &C, row_id: Uuid) -> Result<Vec<Self::Txn>, ServiceError>;
}

/// Posting and query operations shared by every ledger.
pub struct StockLedger<B: LedgerBook> {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
    book: Arc<B>,
}

impl<B: LedgerBook> Clone for StockLedger<B> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            event_sender: self.event_sender.clone(),
            book: self.book.clone(),
        }
    }
}

impl<B: LedgerBook> StockLedger<B> {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender, book: B) -> Self {
        Self {
            db,
            event_sender,
            book: Arc::new(book),
        }
    }

    /// Applies one posting to the row for `key`, creating the row on first use.
    #[instrument(skip(self, request, actor), fields(ledger = B::NAME, key = ?key, kind = %request.kind, quantity = request.quantity))]
    pub async fn post(
        &self,
        key: B::Key,
        request: PostingRequest,
        actor: &Actor,
    ) -> Result<Posting<B::Row, B::Txn>, ServiceError> {
        let delta = requested_delta(B::KINDS, request.kind, request.quantity)?;
        let book = self.book.clone();
        let actor_id = actor.id;
        let kind = request.kind;
        let linked_order_id = request.linked_order_id;

        let result = with_transaction(&self.db, move |txn| {
            Box::pin(async move {
                acquire_write_lock::<B::Stock, _>(txn).await?;
                book.ensure_key(txn, &key).await?;
                book.insert_if_absent(txn, &key).await?;
                let row = book.find_by_key(txn, &key).await?.ok_or_else(|| {
                    ServiceError::InternalError(format!("{} row missing after upsert", B::NAME))
                })?;
                let row_id = B::row_id(&row);

                if !book.apply_delta(txn, row_id, delta).await? {
                    let current = book
                        .find_by_id(txn, row_id)
                        .await?
                        .map(|r| B::row_quantity(&r))
                        .unwrap_or_default();
                    return Err(ServiceError::InsufficientStock {
                        current,
                        requested_delta: delta,
                    });
                }

                let created_at = monotonic_timestamp(book.latest_txn_at(txn, row_id).await?);
                let entry = book
                    .append_txn(
                        txn,
                        NewTxn {
                            stock_id: row_id,
                            kind,
                            quantity: request.quantity,
                            linked_order_id,
                            notes: request.notes.and_then(|n| {
                                let n = n.trim().to_string();
                                (!n.is_empty()).then_some(n)
                            }),
                            created_by: actor_id,
                            created_at,
                        },
                    )
                    .await?;

                let row = book.find_by_id(txn, row_id).await?.ok_or_else(|| {
                    ServiceError::InternalError(format!("{} row {} vanished", B::NAME, row_id))
                })?;
                Ok(Posting {
                    row,
                    txn: entry,
                    delta,
                })
            })
        })
        .await;

        match &result {
            Ok(posting) => {
                let quantity_after = B::row_quantity(&posting.row);
                counter!("order_desk.stock.postings", 1, "ledger" => B::NAME, "kind" => kind.to_string());
                info!(
                    row_id = %B::row_id(&posting.row),
                    delta,
                    quantity_after,
                    "Stock posted"
                );
                self.event_sender.notify(Event::StockPosted {
                    ledger: B::NAME.to_string(),
                    stock_id: B::row_id(&posting.row),
                    kind,
                    delta,
                    quantity_after,
                    linked_order_id,
                });
            }
            Err(ServiceError::InsufficientStock { current, .. }) => {
                counter!("order_desk.stock.insufficient", 1, "ledger" => B::NAME);
                warn!(current, delta, "Posting rejected for insufficient stock");
            }
            Err(e) => warn!(error = %e, "Posting rejected"),
        }

        result
    }

    /// Row for `key`, if one has been created.
    pub async fn get(&self, key: &B::Key) -> Result<Option<B::Row>, ServiceError> {
        self.book.find_by_key(&*self.db, key).await
    }

    pub async fn row(&self, row_id: Uuid) -> Result<B::Row, ServiceError> {
        self.book
            .find_by_id(&*self.db, row_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("{} row {} not found", B::NAME, row_id)))
    }

    /// Recent txns, newest first. Read-only.
    #[instrument(skip(self), fields(ledger = B::NAME))]
    pub async fn transactions(&self, query: TxnQuery) -> Result<Vec<B::Txn>, ServiceError> {
        let limit = match query.limit {
            None => DEFAULT_TXN_LIMIT,
            Some(0) => {
                return Err(ServiceError::ValidationError(
                    "limit must be at least 1".to_string(),
                ))
            }
            Some(n) => n.min(MAX_TXN_LIMIT),
        };
        self.book.list_txns(&*self.db, &query, limit).await
    }

    /// Sets ETA and notes on the row for `key` without touching its quantity.
    #[instrument(skip(self, notes), fields(ledger = B::NAME, key = ?key))]
    pub async fn set_details(
        &self,
        key: B::Key,
        eta: Option<NaiveDate>,
        notes: Option<String>,
    ) -> Result<B::Row, ServiceError> {
        let book = self.book.clone();
        with_transaction(&self.db, move |txn| {
            Box::pin(async move {
                acquire_write_lock::<B::Stock, _>(txn).await?;
                book.ensure_key(txn, &key).await?;
                book.insert_if_absent(txn, &key).await?;
                let row = book.find_by_key(txn, &key).await?.ok_or_else(|| {
                    ServiceError::InternalError(format!("{} row missing after upsert", B::NAME))
                })?;
                let row_id = B::row_id(&row);
                book.update_details(txn, row_id, eta, notes).await?;
                book.find_by_id(txn, row_id).await?.ok_or_else(|| {
                    ServiceError::InternalError(format!("{} row {} vanished", B::NAME, row_id))
                })
            })
        })
        .await
    }

    /// Compares a row's quantity with the signed sum of its txns.
    #[instrument(skip(self), fields(ledger = B::NAME))]
    pub async fn reconcile(&self, row_id: Uuid) -> Result<Reconciliation, ServiceError> {
        let row = self.row(row_id).await?;
        let txns = self.book.row_txns(&*self.db, row_id).await?;
        let ledger_sum: i64 = txns.iter().map(|t| i64::from(B::txn_delta(t))).sum();
        let quantity = B::row_quantity(&row);
        let balanced = ledger_sum == i64::from(quantity);
        if !balanced {
            warn!(row_id = %row_id, quantity, ledger_sum, "Ledger out of balance");
        }
        Ok(Reconciliation {
            row_id,
            quantity,
            ledger_sum,
            txn_count: txns.len() as u64,
            balanced,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rstest::rstest;

    const FINISHED: &[TxnKind] = &[
        TxnKind::Add,
        TxnKind::Reserve,
        TxnKind::Release,
        TxnKind::Ship,
        TxnKind::Adjust,
    ];

    #[rstest]
    #[case(TxnKind::Add, 5, 5)]
    #[case(TxnKind::Reserve, 2, -2)]
    #[case(TxnKind::Release, 2, 2)]
    #[case(TxnKind::Ship, 3, -3)]
    #[case(TxnKind::Adjust, -4, -4)]
    #[case(TxnKind::Adjust, 7, 7)]
    fn deltas(#[case] kind: TxnKind, #[case] quantity: i32, #[case] expected: i32) {
        assert_eq!(requested_delta(FINISHED, kind, quantity).unwrap(), expected);
    }

    #[rstest]
    #[case(TxnKind::Add, 0)]
    #[case(TxnKind::Ship, -1)]
    #[case(TxnKind::Adjust, 0)]
    #[case(TxnKind::In, 5)]
    #[case(TxnKind::Add, MAX_POSTING_QUANTITY + 1)]
    #[case(TxnKind::Adjust, i32::MIN)]
    fn invalid_postings(#[case] kind: TxnKind, #[case] quantity: i32) {
        assert_matches!(
            requested_delta(FINISHED, kind, quantity),
            Err(ServiceError::ValidationError(_))
        );
    }
}
