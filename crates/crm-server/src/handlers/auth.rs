use axum::{body::Bytes, extract::State, response::IntoResponse};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use crm_db::entities::sea_orm_active_enums::Role;
use crm_db::entities::{teams, users};
use sea_orm::{ActiveModelTrait, Set};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::users::{UserDto, validate_password, validate_username};
use super::{ensure_exists, find_or_404, now};
use crate::error::{AppError, AppResult};
use crate::extract::ValidatedJson;
use crate::password::hash_password;
use crate::response::ApiResponse;
use crate::security::AuthUser;
use crate::state::AppState;
use crate::tokens::TokenPair;

pub const REFRESH_COOKIE_NAME: &str = "refresh_token";
// Sent to /auth/refresh and /auth/logout only.
const REFRESH_COOKIE_PATH: &str = "/auth";

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 256, message = "full name is required"))]
    pub full_name: String,
    #[validate(
        length(min = 3, max = 50, message = "must be between 3 and 50 characters"),
        custom(function = "validate_username")
    )]
    pub username: String,
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(
        length(min = 8, max = 128, message = "must be at least 8 characters"),
        custom(function = "validate_password")
    )]
    pub password: String,
    #[validate(range(min = 1))]
    pub team_id: Option<i32>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "username cannot be empty"))]
    pub username: String,
    #[validate(length(min = 1, message = "password cannot be empty"))]
    pub password: String,
}

/// Body fallback for clients that cannot hold the refresh cookie.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RefreshTokenBody {
    refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user: UserDto,
    #[serde(flatten)]
    pub tokens: TokenPair,
}

#[derive(Debug, Serialize)]
pub struct LogoutResponse {
    pub revoked: bool,
}

fn build_refresh_cookie(state: &AppState, token: String) -> Cookie<'static> {
    let mut c = Cookie::new(REFRESH_COOKIE_NAME, token);
    c.set_http_only(true);
    c.set_same_site(SameSite::Strict);
    c.set_path(REFRESH_COOKIE_PATH);
    c.set_secure(state.config.production);
    c.set_max_age(time::Duration::seconds(state.tokens.refresh_ttl_secs()));
    c
}

fn clear_refresh_cookie() -> Cookie<'static> {
    let mut c = Cookie::new(REFRESH_COOKIE_NAME, "");
    c.set_path(REFRESH_COOKIE_PATH);
    c.make_removal();
    c
}

/// Cookie first, then a `{ "refresh_token": ... }` body.
fn presented_refresh_token(jar: &CookieJar, body: &Bytes) -> Option<String> {
    if let Some(cookie) = jar.get(REFRESH_COOKIE_NAME) {
        let value = cookie.value().trim();
        if !value.is_empty() {
            return Some(value.to_string());
        }
    }
    if body.is_empty() {
        return None;
    }
    serde_json::from_slice::<RefreshTokenBody>(body)
        .ok()
        .map(|b| b.refresh_token.trim().to_string())
        .filter(|t| !t.is_empty())
}

pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(input): ValidatedJson<RegisterRequest>,
) -> AppResult<ApiResponse> {
    let db = &*state.db;
    if let Some(team_id) = input.team_id {
        ensure_exists::<teams::Entity, _>(db, "teamId", team_id).await?;
    }

    let now = now();
    let user = users::ActiveModel {
        full_name: Set(Some(input.full_name.trim().to_string())),
        username: Set(input.username.trim().to_lowercase()),
        email: Set(input.email.trim().to_string()),
        password_hash: Set(hash_password(input.password).await?),
        // Self-service accounts never pick their own role.
        role: Set(Role::Sales),
        team_id: Set(input.team_id),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(|e| match AppError::from(e) {
        AppError::Conflict(_) => AppError::Conflict("username or email already in use".to_string()),
        other => other,
    })?;

    tracing::info!(user_id = user.id, username = %user.username, "user registered");
    ApiResponse::created(UserDto::from(user))
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    ValidatedJson(input): ValidatedJson<LoginRequest>,
) -> AppResult<impl IntoResponse> {
    let user = state
        .tokens
        .authenticate(&input.username, &input.password)
        .await?;
    let tokens = state.tokens.issue_token_pair(&user).await?;
    tracing::info!(user_id = user.id, "login succeeded");

    let jar = jar.add(build_refresh_cookie(&state, tokens.refresh_token.clone()));
    let body = ApiResponse::ok(SessionResponse {
        user: UserDto::from(user),
        tokens,
    })?;
    Ok((jar, body))
}

pub async fn refresh(
    State(state): State<AppState>,
    jar: CookieJar,
    body: Bytes,
) -> AppResult<impl IntoResponse> {
    let Some(presented) = presented_refresh_token(&jar, &body) else {
        tracing::warn!("refresh rejected: no token presented");
        return Err(AppError::Unauthorized("refresh token is missing".to_string()));
    };

    let (tokens, user) = state.tokens.rotate_refresh_token(&presented).await?;
    let jar = jar.add(build_refresh_cookie(&state, tokens.refresh_token.clone()));
    let body = ApiResponse::ok(SessionResponse {
        user: UserDto::from(user),
        tokens,
    })?;
    Ok((jar, body))
}

pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
    body: Bytes,
) -> AppResult<impl IntoResponse> {
    let Some(presented) = presented_refresh_token(&jar, &body) else {
        return Err(AppError::field("refresh_token", "refresh token is required"));
    };

    let revoked = state.tokens.revoke(&presented).await?;
    tracing::info!(revoked, "logout");
    // `add`, not `remove`: the clearing cookie must go out even when the token came in the body.
    let jar = jar.add(clear_refresh_cookie());
    Ok((jar, ApiResponse::ok(LogoutResponse { revoked })?))
}

pub async fn me(State(state): State<AppState>, user: AuthUser) -> AppResult<ApiResponse> {
    let found = find_or_404::<users::Entity, _>(&*state.db, "user", user.user_id).await?;
    ApiResponse::ok(UserDto::from(found))
}
