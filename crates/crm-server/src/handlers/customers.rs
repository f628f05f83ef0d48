use axum::{Router, extract::State, routing::get};
use crm_db::entities::sea_orm_active_enums::LeadStatus;
use crm_db::entities::{conversions, customers, interactions};
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
pub struct CustomerDto {
    pub customer_id: i32,
    pub age: Option<i32>,
    pub job: Option<String>,
    pub marital_status: Option<String>,
    pub education: Option<String>,
    pub has_credit_default: bool,
    pub balance: f64,
    pub housing_loan: bool,
    pub personal_loan: bool,
    pub assigned_user_id: Option<i32>,
    pub prediction_score: Option<f64>,
    pub customer_segment: Option<String>,
    pub lead_status: Option<LeadStatus>,
    pub last_engaged_at: Option<DateTimeWithTimeZone>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

impl From<customers::Model> for CustomerDto {
    fn from(m: customers::Model) -> Self {
        Self {
            customer_id: m.id,
            age: m.age,
            job: m.job,
            marital_status: m.marital_status,
            education: m.education,
            has_credit_default: m.has_credit_default,
            balance: m.balance,
            housing_loan: m.housing_loan,
            personal_loan: m.personal_loan,
            assigned_user_id: m.assigned_user_id,
            prediction_score: m.prediction_score,
            customer_segment: m.customer_segment,
            lead_status: m.lead_status,
            last_engaged_at: m.last_engaged_at,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateCustomer {
    #[validate(range(min = 0, max = 150))]
    pub age: Option<i32>,
    #[validate(length(max = 100))]
    pub job: Option<String>,
    #[validate(length(max = 50))]
    pub marital_status: Option<String>,
    #[validate(length(max = 100))]
    pub education: Option<String>,
    #[serde(default)]
    pub has_credit_default: bool,
    #[serde(default)]
    pub balance: f64,
    #[serde(default)]
    pub housing_loan: bool,
    #[serde(default)]
    pub personal_loan: bool,
    #[validate(range(min = 1))]
    pub assigned_user_id: Option<i32>,
    pub prediction_score: Option<f64>,
    #[validate(length(max = 100))]
    pub customer_segment: Option<String>,
    pub lead_status: Option<LeadStatus>,
    pub last_engaged_at: Option<DateTimeWithTimeZone>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateCustomer {
    #[serde(default, deserialize_with = "double_option")]
    #[validate(range(min = 0, max = 150))]
    pub age: Option<Option<i32>>,
    #[serde(default, deserialize_with = "double_option")]
    #[validate(length(max = 100))]
    pub job: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    #[validate(length(max = 50))]
    pub marital_status: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    #[validate(length(max = 100))]
    pub education: Option<Option<String>>,
    pub has_credit_default: Option<bool>,
    pub balance: Option<f64>,
    pub housing_loan: Option<bool>,
    pub personal_loan: Option<bool>,
    #[serde(default, deserialize_with = "double_option")]
    #[validate(range(min = 1))]
    pub assigned_user_id: Option<Option<i32>>,
    #[serde(default, deserialize_with = "double_option")]
    pub prediction_score: Option<Option<f64>>,
    #[serde(default, deserialize_with = "double_option")]
    #[validate(length(max = 100))]
    pub customer_segment: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub lead_status: Option<Option<LeadStatus>>,
    #[serde(default, deserialize_with = "double_option")]
    pub last_engaged_at: Option<Option<DateTimeWithTimeZone>>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/:id", get(show).patch(update).delete(remove))
        .route("/:id/interactions", get(customer_interactions))
        .route("/:id/conversions", get(customer_conversions))
}

pub(crate) fn sorted(
    select: Select<customers::Entity>,
    params: &ListParams,
) -> Select<customers::Entity> {
    let sort = params.sort_by(
        &[
            ("createdAt", customers::Column::CreatedAt),
            ("updatedAt", customers::Column::UpdatedAt),
            ("age", customers::Column::Age),
            ("balance", customers::Column::Balance),
            ("predictionScore", customers::Column::PredictionScore),
            ("customerId", customers::Column::Id),
        ],
        customers::Column::CreatedAt,
    );
    ordered(select, sort, customers::Column::Id)
}

async fn list(State(state): State<AppState>, params: ListParams) -> AppResult<ApiResponse> {
    let mut select = customers::Entity::find();
    if let Some(status) = params.filter_enum::<LeadStatus>("leadStatus")? {
        select = select.filter(customers::Column::LeadStatus.eq(status));
    }
    if let Some(user_id) = params.filter::<i32>("assignedUserId")? {
        select = select.filter(customers::Column::AssignedUserId.eq(user_id));
    }
    if let Some(segment) = params.filter::<String>("customerSegment")? {
        select = select.filter(customers::Column::CustomerSegment.eq(segment));
    }
    let select = search(
        select,
        params.q(),
        &[
            customers::Column::Job,
            customers::Column::Education,
            customers::Column::CustomerSegment,
        ],
    );
    let page = fetch_page(sorted(select, &params), &params, &*state.db).await?;
    ApiResponse::page(page.map(CustomerDto::from))
}

async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedJson(input): ValidatedJson<CreateCustomer>,
) -> AppResult<ApiResponse> {
    let now = now();
    let created = customers::ActiveModel {
        age: Set(input.age),
        job: Set(input.job),
        marital_status: Set(input.marital_status),
        education: Set(input.education),
        has_credit_default: Set(input.has_credit_default),
        balance: Set(input.balance),
        housing_loan: Set(input.housing_loan),
        personal_loan: Set(input.personal_loan),
        assigned_user_id: Set(input.assigned_user_id),
        prediction_score: Set(input.prediction_score),
        customer_segment: Set(input.customer_segment),
        lead_status: Set(input.lead_status),
        last_engaged_at: Set(input.last_engaged_at),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&*state.db)
    .await?;
    tracing::info!(customer_id = created.id, by = user.user_id, "customer created");
    ApiResponse::created(CustomerDto::from(created))
}

async fn show(State(state): State<AppState>, IdPath(id): IdPath) -> AppResult<ApiResponse> {
    let found = find_or_404::<customers::Entity, _>(&*state.db, "customer", id).await?;
    ApiResponse::ok(CustomerDto::from(found))
}

async fn update(
    State(state): State<AppState>,
    IdPath(id): IdPath,
    ValidatedJson(input): ValidatedJson<UpdateCustomer>,
) -> AppResult<ApiResponse> {
    let db = &*state.db;
    let mut active: customers::ActiveModel =
        find_or_404::<customers::Entity, _>(db, "customer", id).await?.into();

    if let Some(v) = input.age {
        active.age = Set(v);
    }
    if let Some(v) = input.job {
        active.job = Set(v);
    }
    if let Some(v) = input.marital_status {
        active.marital_status = Set(v);
    }
    if let Some(v) = input.education {
        active.education = Set(v);
    }
    if let Some(v) = input.has_credit_default {
        active.has_credit_default = Set(v);
    }
    if let Some(v) = input.balance {
        active.balance = Set(v);
    }
    if let Some(v) = input.housing_loan {
        active.housing_loan = Set(v);
    }
    if let Some(v) = input.personal_loan {
        active.personal_loan = Set(v);
    }
    if let Some(v) = input.assigned_user_id {
        active.assigned_user_id = Set(v);
    }
    if let Some(v) = input.prediction_score {
        active.prediction_score = Set(v);
    }
    if let Some(v) = input.customer_segment {
        active.customer_segment = Set(v);
    }
    if let Some(v) = input.lead_status {
        active.lead_status = Set(v);
    }
    if let Some(v) = input.last_engaged_at {
        active.last_engaged_at = Set(v);
    }
    active.updated_at = Set(now());

    let updated = active.update(db).await?;
    ApiResponse::ok(CustomerDto::from(updated))
}

async fn remove(
    State(state): State<AppState>,
    user: AuthUser,
    IdPath(id): IdPath,
) -> AppResult<ApiResponse> {
    user.require_role(ADMIN_OR_MANAGER)?;
    let res = customers::Entity::delete_by_id(id).exec(&*state.db).await?;
    let deleted = deleted_or_404(res, "customer", id)?;
    tracing::info!(customer_id = id, by = user.user_id, "customer deleted");
    ApiResponse::ok(deleted)
}

async fn customer_interactions(
    State(state): State<AppState>,
    IdPath(id): IdPath,
    params: ListParams,
) -> AppResult<ApiResponse> {
    let db = &*state.db;
    find_or_404::<customers::Entity, _>(db, "customer", id).await?;
    let select = interactions::Entity::find().filter(interactions::Column::CustomerId.eq(id));
    let page = fetch_page(super::interactions::sorted(select, &params), &params, db).await?;
    ApiResponse::page(page.map(super::interactions::InteractionDto::from))
}

async fn customer_conversions(
    State(state): State<AppState>,
    IdPath(id): IdPath,
    params: ListParams,
) -> AppResult<ApiResponse> {
    let db = &*state.db;
    find_or_404::<customers::Entity, _>(db, "customer", id).await?;
    let select = conversions::Entity::find().filter(conversions::Column::CustomerId.eq(id));
    let page = fetch_page(super::conversions::sorted(select, &params), &params, db).await?;
    ApiResponse::page(page.map(super::conversions::ConversionDto::from))
}
