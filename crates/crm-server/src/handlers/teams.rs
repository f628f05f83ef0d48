use axum::{Router, extract::State, routing::get};
use crm_db::entities::{customers, teams, users};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, JoinType, QueryFilter, QuerySelect, RelationTrait,
    Select, Set,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::users::UserDto;
use super::{deleted_or_404, ensure_exists, find_or_404};
use crate::error::AppResult;
use crate::extract::{IdPath, ValidatedJson, double_option};
use crate::pagination::{ListParams, fetch_page, ordered, search};
use crate::response::ApiResponse;
use crate::security::{ADMIN, AuthUser};
use crate::state::AppState;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamDto {
    pub team_id: i32,
    pub team_name: String,
    pub manager_id: Option<i32>,
}

impl From<teams::Model> for TeamDto {
    fn from(m: teams::Model) -> Self {
        Self {
            team_id: m.id,
            team_name: m.team_name,
            manager_id: m.manager_id,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateTeam {
    #[validate(length(min = 1, max = 256, message = "must be between 1 and 256 characters"))]
    pub team_name: String,
    #[validate(range(min = 1))]
    pub manager_id: Option<i32>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateTeam {
    #[validate(length(min = 1, max = 256, message = "must be between 1 and 256 characters"))]
    pub team_name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    #[validate(range(min = 1))]
    pub manager_id: Option<Option<i32>>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/:id", get(show).patch(update).delete(remove))
        .route("/:id/users", get(team_users))
        .route("/:id/customers", get(team_customers))
}

async fn list(State(state): State<AppState>, params: ListParams) -> AppResult<ApiResponse> {
    let mut select = teams::Entity::find();
    if let Some(manager_id) = params.filter::<i32>("managerId")? {
        select = select.filter(teams::Column::ManagerId.eq(manager_id));
    }
    let select = search(select, params.q(), &[teams::Column::TeamName]);
    let sort = params.sort_by(
        &[("teamName", teams::Column::TeamName), ("teamId", teams::Column::Id)],
        teams::Column::Id,
    );
    let page = fetch_page(ordered(select, sort, teams::Column::Id), &params, &*state.db).await?;
    ApiResponse::page(page.map(TeamDto::from))
}

async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedJson(input): ValidatedJson<CreateTeam>,
) -> AppResult<ApiResponse> {
    user.require_role(ADMIN)?;
    let db = &*state.db;
    // The manager reference is not a foreign key on every backend.
    if let Some(manager_id) = input.manager_id {
        ensure_exists::<users::Entity, _>(db, "managerId", manager_id).await?;
    }
    let created = teams::ActiveModel {
        team_name: Set(input.team_name),
        manager_id: Set(input.manager_id),
        ..Default::default()
    }
    .insert(db)
    .await?;
    tracing::info!(team_id = created.id, by = user.user_id, "team created");
    ApiResponse::created(TeamDto::from(created))
}

async fn show(State(state): State<AppState>, IdPath(id): IdPath) -> AppResult<ApiResponse> {
    let team = find_or_404::<teams::Entity, _>(&*state.db, "team", id).await?;
    ApiResponse::ok(TeamDto::from(team))
}

async fn update(
    State(state): State<AppState>,
    user: AuthUser,
    IdPath(id): IdPath,
    ValidatedJson(input): ValidatedJson<UpdateTeam>,
) -> AppResult<ApiResponse> {
    user.require_role(ADMIN)?;
    let db = &*state.db;
    let existing = find_or_404::<teams::Entity, _>(db, "team", id).await?;
    if let Some(Some(manager_id)) = input.manager_id {
        ensure_exists::<users::Entity, _>(db, "managerId", manager_id).await?;
    }

    let mut active: teams::ActiveModel = existing.into();
    if let Some(team_name) = input.team_name {
        active.team_name = Set(team_name);
    }
    if let Some(manager_id) = input.manager_id {
        active.manager_id = Set(manager_id);
    }
    let updated = active.update(db).await?;
    ApiResponse::ok(TeamDto::from(updated))
}

async fn remove(
    State(state): State<AppState>,
    user: AuthUser,
    IdPath(id): IdPath,
) -> AppResult<ApiResponse> {
    user.require_role(ADMIN)?;
    let res = teams::Entity::delete_by_id(id).exec(&*state.db).await?;
    let deleted = deleted_or_404(res, "team", id)?;
    tracing::info!(team_id = id, by = user.user_id, "team deleted");
    ApiResponse::ok(deleted)
}

async fn team_users(
    State(state): State<AppState>,
    IdPath(id): IdPath,
    params: ListParams,
) -> AppResult<ApiResponse> {
    let db = &*state.db;
    find_or_404::<teams::Entity, _>(db, "team", id).await?;
    let select = users::Entity::find().filter(users::Column::TeamId.eq(id));
    let page = fetch_page(super::users::sorted(select, &params), &params, db).await?;
    ApiResponse::page(page.map(UserDto::from))
}

fn customers_of_team(team_id: i32) -> Select<customers::Entity> {
    customers::Entity::find()
        .join(JoinType::InnerJoin, customers::Relation::AssignedUser.def())
        .filter(users::Column::TeamId.eq(team_id))
}

/// Customers assigned to any member of the team.
async fn team_customers(
    State(state): State<AppState>,
    IdPath(id): IdPath,
    params: ListParams,
) -> AppResult<ApiResponse> {
    let db = &*state.db;
    find_or_404::<teams::Entity, _>(db, "team", id).await?;
    let select = super::customers::sorted(customers_of_team(id), &params);
    let page = fetch_page(select, &params, db).await?;
    ApiResponse::page(page.map(super::customers::CustomerDto::from))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DbBackend, QueryTrait};

    #[test]
    fn team_customers_join_through_assignee() {
        let sql = customers_of_team(3).build(DbBackend::Postgres).to_string();
        assert!(sql.contains(r#"INNER JOIN "users""#));
        assert!(sql.contains(r#""users"."team_id" = 3"#));
    }
}
