mod common;

use axum::http::{Method, StatusCode};
use common::TestApp;
use crm_db::entities::customers;
use crm_db::entities::sea_orm_active_enums::Role;
use sea_orm::{EntityTrait, PaginatorTrait};
use serde_json::json;

const KEY: &str = "create-customer-0001";

async fn customer_count(app: &TestApp) -> u64 {
    customers::Entity::find().count(&*app.state.db).await.unwrap()
}

async fn post_customer(
    app: &TestApp,
    token: &str,
    body: serde_json::Value,
    key: Option<&str>,
) -> common::TestResponse {
    let headers: Vec<(&str, &str)> = key.map(|k| ("idempotency-key", k)).into_iter().collect();
    app.request(Method::POST, "/customers", Some(token), Some(body), &headers)
        .await
}

#[tokio::test]
async fn repeated_key_replays_the_first_response() {
    let app = TestApp::new().await;
    let token = app.login_as("alice", Role::Sales).await;

    let first = post_customer(&app, &token, json!({ "job": "technician" }), Some(KEY)).await;
    assert_eq!(first.status, StatusCode::CREATED);
    assert!(first.header("idempotent-replayed").is_none());

    // A different body under the same key still gets the original answer.
    let second = post_customer(&app, &token, json!({ "job": "retired" }), Some(KEY)).await;
    assert_eq!(second.status, StatusCode::CREATED);
    assert_eq!(second.body, first.body);
    assert_eq!(second.header("idempotent-replayed"), Some("true"));

    assert_eq!(customer_count(&app).await, 1);
}

#[tokio::test]
async fn short_key_is_rejected_before_the_handler() {
    let app = TestApp::new().await;
    let token = app.login_as("alice", Role::Sales).await;

    let res = post_customer(&app, &token, json!({}), Some("short")).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.error_code(), "VALIDATION_ERROR");
    assert_eq!(customer_count(&app).await, 0);
}

#[tokio::test]
async fn posts_without_a_key_always_execute() {
    let app = TestApp::new().await;
    let token = app.login_as("alice", Role::Sales).await;

    for _ in 0..3 {
        let res = post_customer(&app, &token, json!({ "job": "admin." }), None).await;
        assert_eq!(res.status, StatusCode::CREATED);
    }
    assert_eq!(customer_count(&app).await, 3);
}

#[tokio::test]
async fn failed_requests_are_not_cached() {
    let app = TestApp::new().await;
    let token = app.login_as("alice", Role::Sales).await;

    let bad = post_customer(&app, &token, json!({ "age": -4 }), Some(KEY)).await;
    assert_eq!(bad.status, StatusCode::BAD_REQUEST);

    let good = post_customer(&app, &token, json!({ "age": 41 }), Some(KEY)).await;
    assert_eq!(good.status, StatusCode::CREATED);
    assert!(good.header("idempotent-replayed").is_none());
    assert_eq!(customer_count(&app).await, 1);
}

#[tokio::test]
async fn replay_still_requires_authentication() {
    let app = TestApp::new().await;
    let token = app.login_as("alice", Role::Sales).await;
    post_customer(&app, &token, json!({}), Some(KEY)).await;

    let anonymous = app
        .request(
            Method::POST,
            "/customers",
            None,
            Some(json!({})),
            &[("idempotency-key", KEY)],
        )
        .await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn key_is_ignored_on_non_post_requests() {
    let app = TestApp::new().await;
    let token = app.login_as("alice", Role::Sales).await;

    let res = app
        .request(
            Method::GET,
            "/customers",
            Some(&token),
            None,
            &[("idempotency-key", "x")],
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
}
