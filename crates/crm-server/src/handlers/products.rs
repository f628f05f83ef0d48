use axum::{Router, extract::State, routing::get};
use crm_db::entities::{conversions, products};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{deleted_or_404, find_or_404};
use crate::error::AppResult;
use crate::extract::{IdPath, ValidatedJson, double_option};
use crate::pagination::{ListParams, fetch_page, ordered, search};
use crate::response::ApiResponse;
use crate::security::{ADMIN_OR_MANAGER, AuthUser};
use crate::state::AppState;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDto {
    pub product_id: i32,
    pub product_name: String,
    pub description: Option<String>,
}

impl From<products::Model> for ProductDto {
    fn from(m: products::Model) -> Self {
        Self {
            product_id: m.id,
            product_name: m.product_name,
            description: m.description,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateProduct {
    #[validate(length(min = 1, max = 256))]
    pub product_name: String,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateProduct {
    #[validate(length(min = 1, max = 256))]
    pub product_name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    #[validate(length(max = 5000))]
    pub description: Option<Option<String>>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/:id", get(show).patch(update).delete(remove))
        .route("/:id/conversions", get(product_conversions))
}

async fn list(State(state): State<AppState>, params: ListParams) -> AppResult<ApiResponse> {
    let select = search(
        products::Entity::find(),
        params.q(),
        &[products::Column::ProductName, products::Column::Description],
    );
    let sort = params.sort_by(
        &[
            ("productName", products::Column::ProductName),
            ("productId", products::Column::Id),
        ],
        products::Column::Id,
    );
    let page = fetch_page(ordered(select, sort, products::Column::Id), &params, &*state.db).await?;
    ApiResponse::page(page.map(ProductDto::from))
}

async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedJson(input): ValidatedJson<CreateProduct>,
) -> AppResult<ApiResponse> {
    user.require_role(ADMIN_OR_MANAGER)?;
    let created = products::ActiveModel {
        product_name: Set(input.product_name),
        description: Set(input.description),
        ..Default::default()
    }
    .insert(&*state.db)
    .await?;
    tracing::info!(product_id = created.id, by = user.user_id, "product created");
    ApiResponse::created(ProductDto::from(created))
}

async fn show(State(state): State<AppState>, IdPath(id): IdPath) -> AppResult<ApiResponse> {
    let found = find_or_404::<products::Entity, _>(&*state.db, "product", id).await?;
    ApiResponse::ok(ProductDto::from(found))
}

async fn update(
    State(state): State<AppState>,
    user: AuthUser,
    IdPath(id): IdPath,
    ValidatedJson(input): ValidatedJson<UpdateProduct>,
) -> AppResult<ApiResponse> {
    user.require_role(ADMIN_OR_MANAGER)?;
    let db = &*state.db;
    let mut active: products::ActiveModel =
        find_or_404::<products::Entity, _>(db, "product", id).await?.into();
    if let Some(name) = input.product_name {
        active.product_name = Set(name);
    }
    if let Some(description) = input.description {
        active.description = Set(description);
    }
    let updated = active.update(db).await?;
    ApiResponse::ok(ProductDto::from(updated))
}

async fn remove(
    State(state): State<AppState>,
    user: AuthUser,
    IdPath(id): IdPath,
) -> AppResult<ApiResponse> {
    user.require_role(ADMIN_OR_MANAGER)?;
    let res = products::Entity::delete_by_id(id).exec(&*state.db).await?;
    let deleted = deleted_or_404(res, "product", id)?;
    tracing::info!(product_id = id, by = user.user_id, "product deleted");
    ApiResponse::ok(deleted)
}

async fn product_conversions(
    State(state): State<AppState>,
    IdPath(id): IdPath,
    params: ListParams,
) -> AppResult<ApiResponse> {
    let db = &*state.db;
    find_or_404::<products::Entity, _>(db, "product", id).await?;
    let select = conversions::Entity::find().filter(conversions::Column::ProductId.eq(id));
    let page = fetch_page(super::conversions::sorted(select, &params), &params, db).await?;
    ApiResponse::page(page.map(super::conversions::ConversionDto::from))
}
