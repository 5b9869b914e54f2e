//! Reference-data lookups used to validate keys before writes.

use sea_orm::{ConnectionTrait, EntityTrait, PrimaryKeyTrait};
use uuid::Uuid;

use crate::errors::ServiceError;

/// Fails with `NotFound` unless a row of `E` with primary key `id` exists.
pub async fn ensure_exists<E, C>(conn: &C, id: Uuid, label: &str) -> Result<(), ServiceError>
where
    E: EntityTrait,
    <E::PrimaryKey as PrimaryKeyTrait>::ValueType: From<Uuid>,
    C: ConnectionTrait,
{
    let found = E::find_by_id(id)
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?;
    match found {
        Some(_) => Ok(()),
        None => Err(ServiceError::NotFound(format!("{} {} not found", label, id))),
    }
}
