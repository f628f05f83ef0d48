use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use crm_db::entities::sea_orm_active_enums::Role;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// The caller, as established by [`require_auth`] from a verified access token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: i32,
    pub role: Role,
    pub team_id: Option<i32>,
}

impl AuthUser {
    pub fn require_role(&self, allowed: &[Role]) -> AppResult<()> {
        if allowed.contains(&self.role) {
            return Ok(());
        }
        tracing::warn!(user_id = self.user_id, role = ?self.role, "role not permitted");
        Err(AppError::forbidden())
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

pub const ADMIN: &[Role] = &[Role::Admin];
pub const ADMIN_OR_MANAGER: &[Role] = &[Role::Admin, Role::Manager];

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or_else(|| AppError::Unauthorized("authentication required".to_string()))
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then(|| token.to_string())
}

// Middleware: Bearer access-token guard. Apply to every route that needs a caller.
pub async fn require_auth(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let Some(token) = bearer_token(req.headers()) else {
        tracing::warn!(path = %req.uri().path(), "missing bearer token");
        return AppError::Unauthorized("access token is missing or invalid".to_string())
            .into_response();
    };

    let claims = match state.tokens.verify_access_token(&token) {
        Ok(claims) => claims,
        Err(AppError::ExpiredToken) => {
            tracing::warn!("access token expired");
            return AppError::Unauthorized("access token has expired".to_string()).into_response();
        }
        Err(_) => {
            tracing::warn!("access token rejected");
            return AppError::Unauthorized("access token is invalid".to_string()).into_response();
        }
    };
    let user_id = match claims.user_id() {
        Ok(id) => id,
        Err(err) => return err.into_response(),
    };

    req.extensions_mut().insert(AuthUser {
        user_id,
        role: claims.role,
        team_id: claims.team_id,
    });
    next.run(req).await
}
