pub mod auth;
pub mod conversions;
pub mod customers;
pub mod interactions;
pub mod products;
pub mod teams;
pub mod users;

use chrono::Utc;
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::{ConnectionTrait, DeleteResult, EntityTrait, PrimaryKeyTrait};
use serde::Serialize;

use crate::error::{AppError, AppResult};

#[derive(Debug, Serialize)]
pub struct Deleted {
    pub deleted: bool,
}

pub(crate) fn now() -> DateTimeWithTimeZone {
    Utc::now().into()
}

/// Loads a row by id or fails with a 404 naming `resource`.
pub(crate) async fn find_or_404<E, C>(db: &C, resource: &'static str, id: i32) -> AppResult<E::Model>
where
    E: EntityTrait,
    <E::PrimaryKey as PrimaryKeyTrait>::ValueType: From<i32>,
    C: ConnectionTrait,
{
    E::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::not_found(resource, id))
}

pub(crate) fn deleted_or_404(res: DeleteResult, resource: &'static str, id: i32) -> AppResult<Deleted> {
    if res.rows_affected == 0 {
        return Err(AppError::not_found(resource, id));
    }
    Ok(Deleted { deleted: true })
}

/// Checks a referenced row exists when the schema cannot enforce it on every backend.
pub(crate) async fn ensure_exists<E, C>(db: &C, field: &str, id: i32) -> AppResult<()>
where
    E: EntityTrait,
    <E::PrimaryKey as PrimaryKeyTrait>::ValueType: From<i32>,
    C: ConnectionTrait,
{
    if E::find_by_id(id).one(db).await?.is_none() {
        return Err(AppError::ForeignKey(format!("{field} references a missing record")));
    }
    Ok(())
}
