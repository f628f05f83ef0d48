use axum::{
    Router,
    extract::State,
    routing::get,
};
use crm_db::entities::sea_orm_active_enums::Role;
use crm_db::entities::{interactions, teams, users};
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Select, Set};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use super::{deleted_or_404, ensure_exists, find_or_404, now};
use crate::error::AppResult;
use crate::extract::{IdPath, ValidatedJson, double_option};
use crate::pagination::{ListParams, fetch_page, ordered, search};
use crate::password::hash_password;
use crate::response::ApiResponse;
use crate::security::{ADMIN, AuthUser};
use crate::state::AppState;

/// A user as exposed over the API. Never carries the password hash.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDto {
    pub user_id: i32,
    pub full_name: Option<String>,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub team_id: Option<i32>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

impl From<users::Model> for UserDto {
    fn from(m: users::Model) -> Self {
        Self {
            user_id: m.id,
            full_name: m.full_name,
            username: m.username,
            email: m.email,
            role: m.role,
            team_id: m.team_id,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

pub(crate) fn validate_username(value: &str) -> Result<(), ValidationError> {
    if value.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(ValidationError::new("username")
            .with_message("may only contain letters, digits and underscores".into()))
    }
}

pub(crate) fn validate_password(value: &str) -> Result<(), ValidationError> {
    let letter = value.chars().any(|c| c.is_alphabetic());
    let digit = value.chars().any(|c| c.is_ascii_digit());
    if letter && digit {
        Ok(())
    } else {
        Err(ValidationError::new("password")
            .with_message("must contain at least one letter and one digit".into()))
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateUser {
    #[validate(length(min = 1, max = 256))]
    pub full_name: Option<String>,
    #[validate(length(min = 3, max = 100))]
    pub username: String,
    #[validate(email, length(max = 256))]
    pub email: String,
    #[validate(length(min = 6, max = 128))]
    pub password: String,
    pub role: Role,
    #[validate(range(min = 1))]
    pub team_id: Option<i32>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateUser {
    #[serde(default, deserialize_with = "double_option")]
    #[validate(length(min = 1, max = 256))]
    pub full_name: Option<Option<String>>,
    #[validate(length(min = 3, max = 100))]
    pub username: Option<String>,
    #[validate(email, length(max = 256))]
    pub email: Option<String>,
    #[validate(length(min = 6, max = 128))]
    pub password: Option<String>,
    pub role: Option<Role>,
    #[serde(default, deserialize_with = "double_option")]
    #[validate(range(min = 1))]
    pub team_id: Option<Option<i32>>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/:id", get(show).patch(update).delete(remove))
        .route("/:id/interactions", get(user_interactions))
}

pub(crate) fn sorted(select: Select<users::Entity>, params: &ListParams) -> Select<users::Entity> {
    let sort = params.sort_by(
        &[
            ("createdAt", users::Column::CreatedAt),
            ("username", users::Column::Username),
            ("email", users::Column::Email),
            ("userId", users::Column::Id),
        ],
        users::Column::CreatedAt,
    );
    ordered(select, sort, users::Column::Id)
}

async fn list(State(state): State<AppState>, params: ListParams) -> AppResult<ApiResponse> {
    let mut select = users::Entity::find();
    if let Some(role) = params.filter_enum::<Role>("role")? {
        select = select.filter(users::Column::Role.eq(role));
    }
    if let Some(team_id) = params.filter::<i32>("teamId")? {
        select = select.filter(users::Column::TeamId.eq(team_id));
    }
    let select = search(
        select,
        params.q(),
        &[users::Column::Username, users::Column::Email, users::Column::FullName],
    );
    let page = fetch_page(sorted(select, &params), &params, &*state.db).await?;
    ApiResponse::page(page.map(UserDto::from))
}

async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedJson(input): ValidatedJson<CreateUser>,
) -> AppResult<ApiResponse> {
    user.require_role(ADMIN)?;
    let db = &*state.db;
    if let Some(team_id) = input.team_id {
        ensure_exists::<teams::Entity, _>(db, "teamId", team_id).await?;
    }

    let now = now();
    let created = users::ActiveModel {
        full_name: Set(input.full_name),
        username: Set(input.username.trim().to_lowercase()),
        email: Set(input.email),
        password_hash: Set(hash_password(input.password).await?),
        role: Set(input.role),
        team_id: Set(input.team_id),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    tracing::info!(user_id = created.id, by = user.user_id, "user created");
    ApiResponse::created(UserDto::from(created))
}

async fn show(State(state): State<AppState>, IdPath(id): IdPath) -> AppResult<ApiResponse> {
    let found = find_or_404::<users::Entity, _>(&*state.db, "user", id).await?;
    ApiResponse::ok(UserDto::from(found))
}

async fn update(
    State(state): State<AppState>,
    user: AuthUser,
    IdPath(id): IdPath,
    ValidatedJson(input): ValidatedJson<UpdateUser>,
) -> AppResult<ApiResponse> {
    user.require_role(ADMIN)?;
    let db = &*state.db;
    let existing = find_or_404::<users::Entity, _>(db, "user", id).await?;
    if let Some(Some(team_id)) = input.team_id {
        ensure_exists::<teams::Entity, _>(db, "teamId", team_id).await?;
    }

    let mut active: users::ActiveModel = existing.into();
    if let Some(full_name) = input.full_name {
        active.full_name = Set(full_name);
    }
    if let Some(username) = input.username {
        active.username = Set(username.trim().to_lowercase());
    }
    if let Some(email) = input.email {
        active.email = Set(email);
    }
    if let Some(password) = input.password {
        active.password_hash = Set(hash_password(password).await?);
    }
    if let Some(role) = input.role {
        active.role = Set(role);
    }
    if let Some(team_id) = input.team_id {
        active.team_id = Set(team_id);
    }
    active.updated_at = Set(now());

    let updated = active.update(db).await?;
    tracing::info!(user_id = id, by = user.user_id, "user updated");
    ApiResponse::ok(UserDto::from(updated))
}

async fn remove(
    State(state): State<AppState>,
    user: AuthUser,
    IdPath(id): IdPath,
) -> AppResult<ApiResponse> {
    user.require_role(ADMIN)?;
    let res = users::Entity::delete_by_id(id).exec(&*state.db).await?;
    let deleted = deleted_or_404(res, "user", id)?;
    tracing::info!(user_id = id, by = user.user_id, "user deleted");
    ApiResponse::ok(deleted)
}

async fn user_interactions(
    State(state): State<AppState>,
    IdPath(id): IdPath,
    params: ListParams,
) -> AppResult<ApiResponse> {
    let db = &*state.db;
    find_or_404::<users::Entity, _>(db, "user", id).await?;
    let select = interactions::Entity::find().filter(interactions::Column::UserId.eq(id));
    let page = fetch_page(super::interactions::sorted(select, &params), &params, db).await?;
    ApiResponse::page(page.map(super::interactions::InteractionDto::from))
}
