use axum::{Router, extract::State, routing::get};
use crm_db::entities::interactions;
use crm_db::entities::sea_orm_active_enums::{ContactMethod, InteractionOutcome};
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Select, Set};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{deleted_or_404, find_or_404, now};
use crate::error::AppResult;
use crate::extract::{IdPath, ValidatedJson, double_option};
use crate::pagination::{ListParams, fetch_page, ordered, search};
use crate::response::ApiResponse;
use crate::security::{ADMIN_OR_MANAGER, AuthUser};
use crate::state::AppState;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionDto {
    pub interaction_id: i32,
    pub customer_id: i32,
    pub user_id: i32,
    pub contact_method: Option<ContactMethod>,
    pub duration_seconds: Option<i32>,
    pub campaign_contact: Option<i32>,
    pub previous_outcome: Option<String>,
    pub outcome: Option<InteractionOutcome>,
    pub notes: Option<String>,
    pub interaction_date: DateTimeWithTimeZone,
}

impl From<interactions::Model> for InteractionDto {
    fn from(m: interactions::Model) -> Self {
        Self {
            interaction_id: m.id,
            customer_id: m.customer_id,
            user_id: m.user_id,
            contact_method: m.contact_method,
            duration_seconds: m.duration_seconds,
            campaign_contact: m.campaign_contact,
            previous_outcome: m.previous_outcome,
            outcome: m.outcome,
            notes: m.notes,
            interaction_date: m.interaction_date,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateInteraction {
    #[validate(range(min = 1))]
    pub customer_id: i32,
    /// Defaults to the caller.
    #[validate(range(min = 1))]
    pub user_id: Option<i32>,
    pub contact_method: Option<ContactMethod>,
    #[validate(range(min = 0))]
    pub duration_seconds: Option<i32>,
    #[validate(range(min = 0))]
    pub campaign_contact: Option<i32>,
    #[validate(length(max = 50))]
    pub previous_outcome: Option<String>,
    pub outcome: Option<InteractionOutcome>,
    #[validate(length(max = 5000))]
    pub notes: Option<String>,
    pub interaction_date: Option<DateTimeWithTimeZone>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateInteraction {
    #[validate(range(min = 1))]
    pub customer_id: Option<i32>,
    #[validate(range(min = 1))]
    pub user_id: Option<i32>,
    #[serde(default, deserialize_with = "double_option")]
    pub contact_method: Option<Option<ContactMethod>>,
    #[serde(default, deserialize_with = "double_option")]
    #[validate(range(min = 0))]
    pub duration_seconds: Option<Option<i32>>,
    #[serde(default, deserialize_with = "double_option")]
    #[validate(range(min = 0))]
    pub campaign_contact: Option<Option<i32>>,
    #[serde(default, deserialize_with = "double_option")]
    #[validate(length(max = 50))]
    pub previous_outcome: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub outcome: Option<Option<InteractionOutcome>>,
    #[serde(default, deserialize_with = "double_option")]
    #[validate(length(max = 5000))]
    pub notes: Option<Option<String>>,
    pub interaction_date: Option<DateTimeWithTimeZone>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/:id", get(show).patch(update).delete(remove))
}

pub(crate) fn sorted(
    select: Select<interactions::Entity>,
    params: &ListParams,
) -> Select<interactions::Entity> {
    let sort = params.sort_by(
        &[
            ("interactionDate", interactions::Column::InteractionDate),
            ("interactionId", interactions::Column::Id),
        ],
        interactions::Column::InteractionDate,
    );
    ordered(select, sort, interactions::Column::Id)
}

async fn list(State(state): State<AppState>, params: ListParams) -> AppResult<ApiResponse> {
    let mut select = interactions::Entity::find();
    if let Some(customer_id) = params.filter::<i32>("customerId")? {
        select = select.filter(interactions::Column::CustomerId.eq(customer_id));
    }
    if let Some(user_id) = params.filter::<i32>("userId")? {
        select = select.filter(interactions::Column::UserId.eq(user_id));
    }
    if let Some(outcome) = params.filter_enum::<InteractionOutcome>("outcome")? {
        select = select.filter(interactions::Column::Outcome.eq(outcome));
    }
    if let Some(method) = params.filter_enum::<ContactMethod>("contactMethod")? {
        select = select.filter(interactions::Column::ContactMethod.eq(method));
    }
    let select = search(select, params.q(), &[interactions::Column::Notes]);
    let page = fetch_page(sorted(select, &params), &params, &*state.db).await?;
    ApiResponse::page(page.map(InteractionDto::from))
}

async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedJson(input): ValidatedJson<CreateInteraction>,
) -> AppResult<ApiResponse> {
    let created = interactions::ActiveModel {
        customer_id: Set(input.customer_id),
        user_id: Set(input.user_id.unwrap_or(user.user_id)),
        contact_method: Set(input.contact_method),
        duration_seconds: Set(input.duration_seconds),
        campaign_contact: Set(input.campaign_contact),
        previous_outcome: Set(input.previous_outcome),
        outcome: Set(input.outcome),
        notes: Set(input.notes),
        interaction_date: Set(input.interaction_date.unwrap_or_else(now)),
        ..Default::default()
    }
    .insert(&*state.db)
    .await?;
    tracing::info!(
        interaction_id = created.id,
        customer_id = created.customer_id,
        "interaction recorded"
    );
    ApiResponse::created(InteractionDto::from(created))
}

async fn show(State(state): State<AppState>, IdPath(id): IdPath) -> AppResult<ApiResponse> {
    let found = find_or_404::<interactions::Entity, _>(&*state.db, "interaction", id).await?;
    ApiResponse::ok(InteractionDto::from(found))
}

async fn update(
    State(state): State<AppState>,
    IdPath(id): IdPath,
    ValidatedJson(input): ValidatedJson<UpdateInteraction>,
) -> AppResult<ApiResponse> {
    let db = &*state.db;
    let mut active: interactions::ActiveModel =
        find_or_404::<interactions::Entity, _>(db, "interaction", id).await?.into();

    if let Some(v) = input.customer_id {
        active.customer_id = Set(v);
    }
    if let Some(v) = input.user_id {
        active.user_id = Set(v);
    }
    if let Some(v) = input.contact_method {
        active.contact_method = Set(v);
    }
    if let Some(v) = input.duration_seconds {
        active.duration_seconds = Set(v);
    }
    if let Some(v) = input.campaign_contact {
        active.campaign_contact = Set(v);
    }
    if let Some(v) = input.previous_outcome {
        active.previous_outcome = Set(v);
    }
    if let Some(v) = input.outcome {
        active.outcome = Set(v);
    }
    if let Some(v) = input.notes {
        active.notes = Set(v);
    }
    if let Some(v) = input.interaction_date {
        active.interaction_date = Set(v);
    }

    let updated = active.update(db).await?;
    ApiResponse::ok(InteractionDto::from(updated))
}

async fn remove(
    State(state): State<AppState>,
    user: AuthUser,
    IdPath(id): IdPath,
) -> AppResult<ApiResponse> {
    user.require_role(ADMIN_OR_MANAGER)?;
    let res = interactions::Entity::delete_by_id(id).exec(&*state.db).await?;
    ApiResponse::ok(deleted_or_404(res, "interaction", id)?)
}
