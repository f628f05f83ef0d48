use axum::{Router, extract::State, routing::get};
use crm_db::entities::conversions;
use crm_db::entities::sea_orm_active_enums::ConversionStatus;
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Select, Set};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{deleted_or_404, find_or_404, now};
use crate::error::AppResult;
use crate::extract::{IdPath, ValidatedJson, double_option};
use crate::pagination::{ListParams, fetch_page, ordered};
use crate::response::ApiResponse;
use crate::security::{ADMIN_OR_MANAGER, AuthUser};
use crate::state::AppState;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionDto {
    pub conversion_id: i32,
    pub customer_id: i32,
    pub product_id: i32,
    pub conversion_date: DateTimeWithTimeZone,
    pub status: Option<ConversionStatus>,
}

impl From<conversions::Model> for ConversionDto {
    fn from(m: conversions::Model) -> Self {
        Self {
            conversion_id: m.id,
            customer_id: m.customer_id,
            product_id: m.product_id,
            conversion_date: m.conversion_date,
            status: m.status,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateConversion {
    #[validate(range(min = 1))]
    pub customer_id: i32,
    #[validate(range(min = 1))]
    pub product_id: i32,
    pub conversion_date: Option<DateTimeWithTimeZone>,
    pub status: Option<ConversionStatus>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateConversion {
    #[validate(range(min = 1))]
    pub customer_id: Option<i32>,
    #[validate(range(min = 1))]
    pub product_id: Option<i32>,
    pub conversion_date: Option<DateTimeWithTimeZone>,
    #[serde(default, deserialize_with = "double_option")]
    pub status: Option<Option<ConversionStatus>>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/:id", get(show).patch(update).delete(remove))
}

pub(crate) fn sorted(
    select: Select<conversions::Entity>,
    params: &ListParams,
) -> Select<conversions::Entity> {
    let sort = params.sort_by(
        &[
            ("conversionDate", conversions::Column::ConversionDate),
            ("conversionId", conversions::Column::Id),
        ],
        conversions::Column::ConversionDate,
    );
    ordered(select, sort, conversions::Column::Id)
}

async fn list(State(state): State<AppState>, params: ListParams) -> AppResult<ApiResponse> {
    let mut select = conversions::Entity::find();
    if let Some(customer_id) = params.filter::<i32>("customerId")? {
        select = select.filter(conversions::Column::CustomerId.eq(customer_id));
    }
    if let Some(product_id) = params.filter::<i32>("productId")? {
        select = select.filter(conversions::Column::ProductId.eq(product_id));
    }
    if let Some(status) = params.filter_enum::<ConversionStatus>("status")? {
        select = select.filter(conversions::Column::Status.eq(status));
    }
    let page = fetch_page(sorted(select, &params), &params, &*state.db).await?;
    ApiResponse::page(page.map(ConversionDto::from))
}

async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedJson(input): ValidatedJson<CreateConversion>,
) -> AppResult<ApiResponse> {
    let created = conversions::ActiveModel {
        customer_id: Set(input.customer_id),
        product_id: Set(input.product_id),
        conversion_date: Set(input.conversion_date.unwrap_or_else(now)),
        status: Set(input.status),
        ..Default::default()
    }
    .insert(&*state.db)
    .await?;
    tracing::info!(
        conversion_id = created.id,
        customer_id = created.customer_id,
        by = user.user_id,
        "conversion recorded"
    );
    ApiResponse::created(ConversionDto::from(created))
}

async fn show(State(state): State<AppState>, IdPath(id): IdPath) -> AppResult<ApiResponse> {
    let found = find_or_404::<conversions::Entity, _>(&*state.db, "conversion", id).await?;
    ApiResponse::ok(ConversionDto::from(found))
}

async fn update(
    State(state): State<AppState>,
    IdPath(id): IdPath,
    ValidatedJson(input): ValidatedJson<UpdateConversion>,
) -> AppResult<ApiResponse> {
    let db = &*state.db;
    let mut active: conversions::ActiveModel =
        find_or_404::<conversions::Entity, _>(db, "conversion", id).await?.into();
    if let Some(v) = input.customer_id {
        active.customer_id = Set(v);
    }
    if let Some(v) = input.product_id {
        active.product_id = Set(v);
    }
    if let Some(v) = input.conversion_date {
        active.conversion_date = Set(v);
    }
    if let Some(v) = input.status {
        active.status = Set(v);
    }
    let updated = active.update(db).await?;
    ApiResponse::ok(ConversionDto::from(updated))
}

async fn remove(
    State(state): State<AppState>,
    user: AuthUser,
    IdPath(id): IdPath,
) -> AppResult<ApiResponse> {
    user.require_role(ADMIN_OR_MANAGER)?;
    let res = conversions::Entity::delete_by_id(id).exec(&*state.db).await?;
    ApiResponse::ok(deleted_or_404(res, "conversion", id)?)
}
