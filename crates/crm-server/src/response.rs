use axum::{
    body::Bytes,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::pagination::{Page, PageMeta};

/// The exact bytes a handler sent, exposed to the idempotency cache through the
/// response extensions.
#[derive(Debug, Clone)]
pub struct CapturedBody(pub Bytes);

#[derive(Serialize)]
struct Envelope<'a, T> {
    success: bool,
    data: &'a T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pagination: Option<&'a PageMeta>,
}

/// Success envelope `{ "success": true, "data": ... }`.
///
/// Going through this type is what makes a response eligible for idempotent replay.
#[derive(Debug)]
pub struct ApiResponse {
    status: StatusCode,
    body: Bytes,
}

impl ApiResponse {
    fn encode<T: Serialize>(
        status: StatusCode,
        data: &T,
        pagination: Option<&PageMeta>,
    ) -> AppResult<Self> {
        let body = serde_json::to_vec(&Envelope {
            success: true,
            data,
            pagination,
        })
        .map_err(|e| AppError::Internal(anyhow::anyhow!("serialize response: {e}")))?;
        Ok(Self {
            status,
            body: Bytes::from(body),
        })
    }

    pub fn ok<T: Serialize>(data: T) -> AppResult<Self> {
        Self::encode(StatusCode::OK, &data, None)
    }

    pub fn created<T: Serialize>(data: T) -> AppResult<Self> {
        Self::encode(StatusCode::CREATED, &data, None)
    }

    pub fn page<T: Serialize>(page: Page<T>) -> AppResult<Self> {
        Self::encode(StatusCode::OK, &page.items, Some(&page.meta))
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        let mut res = (
            self.status,
            [(header::CONTENT_TYPE, "application/json")],
            self.body.clone(),
        )
            .into_response();
        res.extensions_mut().insert(CapturedBody(self.body));
        res
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_shape() {
        let res = ApiResponse::created(serde_json::json!({ "id": 7 })).unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
        let v: serde_json::Value = serde_json::from_slice(&res.body).unwrap();
        assert_eq!(v, serde_json::json!({ "success": true, "data": { "id": 7 } }));
    }

    #[test]
    fn captured_body_matches_sent_body() {
        let res = ApiResponse::ok(vec![1, 2, 3]).unwrap().into_response();
        let captured = res.extensions().get::<CapturedBody>().cloned().unwrap();
        assert_eq!(&captured.0[..], br#"{"success":true,"data":[1,2,3]}"#);
    }
}
