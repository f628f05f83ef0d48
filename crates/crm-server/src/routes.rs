use axum::{
    Json, Router,
    extract::State,
    middleware,
    routing::{get, post},
};
use serde::Serialize;

use crate::error::AppError;
use crate::handlers::{auth, conversions, customers, interactions, products, teams, users};
use crate::state::AppState;
use crate::{idempotency, request_meta, security};

#[derive(Debug, Serialize)]
struct HealthzResponse {
    status: &'static str,
    version: &'static str,
    database: bool,
}

async fn healthz(State(state): State<AppState>) -> Json<HealthzResponse> {
    let database = match state.db.ping().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "database ping failed");
            false
        }
    };
    Json(HealthzResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        database,
    })
}

async fn not_found() -> AppError {
    AppError::NotFound {
        resource: "route",
        id: None,
    }
}

pub fn app(state: AppState) -> Router {
    let guard = middleware::from_fn_with_state(state.clone(), security::require_auth);

    // Refresh and logout authenticate with the refresh token itself.
    let auth_router = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/refresh", post(auth::refresh))
        .route("/logout", post(auth::logout))
        .merge(
            Router::new()
                .route("/me", get(auth::me))
                .route_layer(guard.clone()),
        );

    // The guard wraps the cache so a replay is never served to an anonymous caller.
    let resources = Router::new()
        .nest("/users", users::routes())
        .nest("/teams", teams::routes())
        .nest("/customers", customers::routes())
        .nest("/interactions", interactions::routes())
        .nest("/products", products::routes())
        .nest("/conversions", conversions::routes())
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            idempotency::idempotency,
        ))
        .route_layer(guard);

    Router::new()
        .route("/healthz", get(healthz))
        .nest("/auth", auth_router)
        .merge(resources)
        .fallback(not_found)
        .layer(middleware::from_fn(request_meta::request_id))
        .with_state(state)
}
