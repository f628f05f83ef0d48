//! Replay cache for retried `POST` requests carrying an `Idempotency-Key` header.
//!
//! Only responses produced through [`ApiResponse`](crate::response::ApiResponse) with a
//! 200 or 201 status are recorded. Cache failures never fail the request: a read error
//! is treated as a miss and a write error only costs the replay.

use axum::{
    body::Bytes,
    extract::{Request, State},
    http::{HeaderName, HeaderValue, Method, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use crm_db::entities::idempotency_keys;
use sea_orm::sea_query::OnConflict;
use sea_orm::{ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, Set};

use crate::error::AppError;
use crate::response::CapturedBody;
use crate::state::AppState;

pub const IDEMPOTENCY_HEADER: &str = "idempotency-key";
pub const REPLAYED_HEADER: &str = "idempotent-replayed";

const MIN_KEY_LEN: usize = 10;
const MAX_KEY_LEN: usize = 255;

/// Returns the key if it is printable ASCII of an acceptable length.
pub fn validate_key(raw: &HeaderValue) -> Result<String, AppError> {
    let key = raw
        .to_str()
        .map_err(|_| AppError::validation("Idempotency-Key must be printable ASCII"))?
        .trim();
    if key.len() < MIN_KEY_LEN {
        return Err(AppError::validation(format!(
            "Idempotency-Key must be at least {MIN_KEY_LEN} characters"
        )));
    }
    if key.len() > MAX_KEY_LEN {
        return Err(AppError::validation(format!(
            "Idempotency-Key must be at most {MAX_KEY_LEN} characters"
        )));
    }
    Ok(key.to_string())
}

pub async fn idempotency(State(state): State<AppState>, req: Request, next: Next) -> Response {
    if req.method() != Method::POST {
        return next.run(req).await;
    }
    let Some(raw) = req.headers().get(IDEMPOTENCY_HEADER) else {
        return next.run(req).await;
    };
    let key = match validate_key(raw) {
        Ok(key) => key,
        Err(err) => return err.into_response(),
    };

    let db = &*state.db;
    match lookup(db, &key).await {
        Ok(Some(record)) => {
            tracing::info!(%key, status = record.status_code, "replaying idempotent response");
            return replay(record);
        }
        Ok(None) => {}
        Err(err) => tracing::error!(%key, error = %err, "idempotency lookup failed; treating as miss"),
    }

    let response = next.run(req).await;
    let status = response.status();
    if !matches!(status, StatusCode::OK | StatusCode::CREATED) {
        return response;
    }
    let Some(CapturedBody(body)) = response.extensions().get::<CapturedBody>().cloned() else {
        return response;
    };

    match store(db, &key, status, &body).await {
        Ok(0) => tracing::debug!(%key, "idempotency key already recorded"),
        Ok(_) => tracing::debug!(%key, status = status.as_u16(), "idempotent response recorded"),
        Err(err) => tracing::error!(%key, error = %err, "failed to record idempotent response"),
    }
    response
}

async fn lookup<C: ConnectionTrait>(
    db: &C,
    key: &str,
) -> Result<Option<idempotency_keys::Model>, DbErr> {
    idempotency_keys::Entity::find_by_id(key.to_string())
        .one(db)
        .await
}

fn replay(record: idempotency_keys::Model) -> Response {
    let status = u16::try_from(record.status_code)
        .ok()
        .and_then(|code| StatusCode::from_u16(code).ok())
        .unwrap_or(StatusCode::OK);
    let mut res = (
        status,
        [(header::CONTENT_TYPE, "application/json")],
        record.response_body,
    )
        .into_response();
    res.headers_mut().insert(
        HeaderName::from_static(REPLAYED_HEADER),
        HeaderValue::from_static("true"),
    );
    res
}

/// First writer wins; a concurrent duplicate is ignored and reported as 0 rows.
async fn store<C: ConnectionTrait>(
    db: &C,
    key: &str,
    status: StatusCode,
    body: &Bytes,
) -> Result<u64, DbErr> {
    let body = String::from_utf8(body.to_vec())
        .map_err(|e| DbErr::Custom(format!("response body is not UTF-8: {e}")))?;
    let record = idempotency_keys::ActiveModel {
        key: Set(key.to_string()),
        response_body: Set(body),
        status_code: Set(i32::from(status.as_u16())),
        created_at: Set(Utc::now().into()),
    };
    idempotency_keys::Entity::insert(record)
        .on_conflict(
            OnConflict::column(idempotency_keys::Column::Key)
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(db)
        .await
}

pub async fn purge_older_than<C: ConnectionTrait>(
    db: &C,
    cutoff: DateTime<Utc>,
) -> Result<u64, DbErr> {
    let res = idempotency_keys::Entity::delete_many()
        .filter(idempotency_keys::Column::CreatedAt.lt(cutoff))
        .exec(db)
        .await?;
    Ok(res.rows_affected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;

    #[test]
    fn key_length_is_bounded() {
        let err = validate_key(&HeaderValue::from_static("short")).unwrap_err();
        assert_eq!(err.to_string(), "Idempotency-Key must be at least 10 characters");
        assert!(validate_key(&HeaderValue::from_static("exactly-10")).is_ok());
        let long = "k".repeat(MAX_KEY_LEN + 1);
        assert!(validate_key(&HeaderValue::from_str(&long).unwrap()).is_err());
        let max = "k".repeat(MAX_KEY_LEN);
        assert_eq!(validate_key(&HeaderValue::from_str(&max).unwrap()).unwrap(), max);
    }

    #[tokio::test]
    async fn first_store_wins() {
        let db = test_support::memory_db().await;
        let first = Bytes::from_static(br#"{"success":true,"data":{"id":1}}"#);
        let second = Bytes::from_static(br#"{"success":true,"data":{"id":2}}"#);

        assert_eq!(store(&db, "key-0000001", StatusCode::CREATED, &first).await.unwrap(), 1);
        assert_eq!(store(&db, "key-0000001", StatusCode::CREATED, &second).await.unwrap(), 0);

        let record = lookup(&db, "key-0000001").await.unwrap().unwrap();
        assert_eq!(record.response_body.as_bytes(), &first[..]);
        assert_eq!(record.status_code, 201);
    }

    #[tokio::test]
    async fn purge_keeps_recent_records() {
        let db = test_support::memory_db().await;
        let body = Bytes::from_static(b"{}");
        store(&db, "key-0000001", StatusCode::OK, &body).await.unwrap();

        let past = Utc::now() - chrono::Duration::hours(1);
        assert_eq!(purge_older_than(&db, past).await.unwrap(), 0);

        let future = Utc::now() + chrono::Duration::seconds(1);
        assert_eq!(purge_older_than(&db, future).await.unwrap(), 1);
        assert!(lookup(&db, "key-0000001").await.unwrap().is_none());
    }
}
