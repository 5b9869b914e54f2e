//! Transaction helper preserving the caller's `ServiceError`.

use futures::future::BoxFuture;
use sea_orm::{
    ConnectionTrait, DatabaseConnection, DatabaseTransaction, DbBackend, EntityTrait,
    TransactionError, TransactionTrait,
};

use crate::errors::ServiceError;

/// Runs `f` inside one database transaction.
///
/// Commits when `f` returns `Ok`, rolls back otherwise. Errors raised by `f`
/// come back unchanged, so a `Blocked` or `InsufficientStock` from inside the
/// transaction reaches the caller intact.
///
/// ```rust,ignore
/// let order = with_transaction(&db, move |txn| {
///     Box::pin(async move {
///         let order = new_order.insert(txn).await.map_err(ServiceError::db_error)?;
///         append_entry(txn, intake_row).await?;
///         Ok(order)
///     })
/// })
/// .await?;
/// ```
pub async fn with_transaction<F, T>(db: &DatabaseConnection, f: F) -> Result<T, ServiceError>
where
    F: for<'c> FnOnce(&'c DatabaseTransaction) -> BoxFuture<'c, Result<T, ServiceError>> + Send,
    T: Send,
{
    db.transaction::<F, T, ServiceError>(f)
        .await
        .map_err(|e| match e {
            TransactionError::Connection(db_err) => ServiceError::db_error(db_err),
            TransactionError::Transaction(err) => err,
        })
}

/// Takes the SQLite write lock as the first statement of a transaction.
///
/// A deferred SQLite transaction that reads before it writes cannot wait for
/// a lock held by another writer; the upgrade fails with `SQLITE_BUSY`
/// immediately. Claiming the lock before any read makes concurrent writers
/// queue on the busy timeout instead. The statement touches no rows. Other
/// backends need nothing here.
pub async fn acquire_write_lock<E, C>(conn: &C) -> Result<(), ServiceError>
where
    E: EntityTrait,
    C: ConnectionTrait,
{
    if conn.get_database_backend() != DbBackend::Sqlite {
        return Ok(());
    }
    let sql = format!(r#"DELETE FROM "{}" WHERE 0"#, E::default().table_name());
    conn.execute_unprepared(&sql)
        .await
        .map_err(ServiceError::db_error)?;
    Ok(())
}
