//! Append-only audit trail shared by order history and both stock ledgers.
//!
//! Every accepted change to an aggregate (an order's status, a stock row's
//! quantity) writes exactly one immutable record through [`append_entry`],
//! inside the same transaction as the change itself. The record types refuse
//! updates and deletes in their `ActiveModelBehavior`.

use chrono::{DateTime, Duration, Utc};
use sea_orm::{ActiveModelBehavior, ActiveModelTrait, ConnectionTrait, EntityTrait, IntoActiveModel};
use tracing::{debug, error};

use crate::errors::ServiceError;

/// Active model of an append-only audit table.
pub trait AuditEntry: ActiveModelTrait + ActiveModelBehavior + Send + 'static {
    /// Table name used in logs and errors.
    const TRAIL: &'static str;
}

/// Inserts one audit record using the caller's connection or transaction.
pub async fn append_entry<C, A>(
    conn: &C,
    entry: A,
) -> Result<<A::Entity as EntityTrait>::Model, ServiceError>
where
    C: ConnectionTrait,
    A: AuditEntry,
    <A::Entity as EntityTrait>::Model: IntoActiveModel<A>,
{
    let record = entry.insert(conn).await.map_err(|e| {
        error!(trail = A::TRAIL, error = %e, "Failed to append audit record");
        ServiceError::db_error(e)
    })?;
    debug!(trail = A::TRAIL, "Appended audit record");
    Ok(record)
}

/// Timestamp for the next record of a trail, strictly after the previous one.
///
/// Steps one microsecond past `previous` when the clock has not moved on, so
/// ordering by `created_at` matches insertion order on every backend.
pub fn monotonic_timestamp(previous: Option<DateTime<Utc>>) -> DateTime<Utc> {
    let now = Utc::now();
    match previous {
        Some(prev) if prev >= now => prev + Duration::microseconds(1),
        _ => now,
    }
}
