mod common;

use axum::http::{Method, StatusCode};
use common::{PASSWORD, TestApp};
use crm_db::entities::sea_orm_active_enums::Role;
use serde_json::json;

fn refresh_cookie(res: &common::TestResponse) -> String {
    let set_cookie = res.header("set-cookie").expect("set-cookie header");
    let pair = set_cookie.split(';').next().unwrap();
    pair.strip_prefix("refresh_token=")
        .expect("refresh_token cookie")
        .to_string()
}

async fn login(app: &TestApp, username: &str, password: &str) -> common::TestResponse {
    app.request(
        Method::POST,
        "/auth/login",
        None,
        Some(json!({ "username": username, "password": password })),
        &[],
    )
    .await
}

#[tokio::test]
async fn register_login_and_me() {
    let app = TestApp::new().await;

    let res = app
        .request(
            Method::POST,
            "/auth/register",
            None,
            Some(json!({
                "fullName": "Alice Doe",
                "username": "Alice_1",
                "email": "alice@example.com",
                "password": "secret123"
            })),
            &[],
        )
        .await;
    assert_eq!(res.status, StatusCode::CREATED);
    let user = &res.json()["data"];
    assert_eq!(user["username"], "alice_1");
    assert_eq!(user["role"], "sales");
    assert!(user.get("passwordHash").is_none());

    let res = login(&app, "ALICE_1", "secret123").await;
    assert_eq!(res.status, StatusCode::OK);
    let body = res.json();
    assert_eq!(body["data"]["tokenType"], "Bearer");
    assert_eq!(body["data"]["expiresIn"], 3600);
    assert_eq!(body["data"]["user"]["username"], "alice_1");

    let cookie = res.header("set-cookie").unwrap();
    assert!(cookie.starts_with("refresh_token="));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=Strict"));
    assert!(cookie.contains("Path=/auth"));
    assert!(cookie.contains("Max-Age=604800"));
    assert!(!cookie.contains("Secure"));

    let token = body["data"]["accessToken"].as_str().unwrap();
    let me = app.get("/auth/me", token).await;
    assert_eq!(me.status, StatusCode::OK);
    assert_eq!(me.json()["data"]["email"], "alice@example.com");
}

#[tokio::test]
async fn register_cannot_choose_role_or_reuse_username() {
    let app = TestApp::new().await;
    let body = json!({
        "fullName": "Mallory",
        "username": "mallory",
        "email": "m@example.com",
        "password": "secret123",
        "role": "admin"
    });
    let res = app
        .request(Method::POST, "/auth/register", None, Some(body), &[])
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    app.seed_user("bob", Role::Sales).await;
    let res = app
        .request(
            Method::POST,
            "/auth/register",
            None,
            Some(json!({
                "fullName": "Bob",
                "username": "BOB",
                "email": "other@example.com",
                "password": "secret123"
            })),
            &[],
        )
        .await;
    assert_eq!(res.status, StatusCode::CONFLICT);
    assert_eq!(res.error_code(), "CONFLICT");
}

#[tokio::test]
async fn wrong_password_and_unknown_user_look_the_same() {
    let app = TestApp::new().await;
    app.seed_user("alice", Role::Sales).await;

    let wrong = login(&app, "alice", "wrongpass").await;
    let ghost = login(&app, "ghost", "wrongpass").await;

    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);
    assert_eq!(ghost.status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong.body, ghost.body);
    assert_eq!(wrong.json()["error"]["message"], "invalid credentials");
}

#[tokio::test]
async fn empty_login_fields_are_rejected() {
    let app = TestApp::new().await;
    let res = login(&app, "", "").await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.error_code(), "VALIDATION_ERROR");
}

#[tokio::test]
async fn refresh_with_cookie_rotates_once() {
    let app = TestApp::new().await;
    app.seed_user("alice", Role::Sales).await;
    let res = login(&app, "alice", PASSWORD).await;
    let first = refresh_cookie(&res);

    let cookie = format!("refresh_token={first}");
    let res = app
        .request(Method::POST, "/auth/refresh", None, None, &[("cookie", &cookie)])
        .await;
    assert_eq!(res.status, StatusCode::OK);
    let second = refresh_cookie(&res);
    assert_ne!(first, second);
    assert_eq!(res.json()["data"]["refreshToken"], second.as_str());

    let replay = app
        .request(Method::POST, "/auth/refresh", None, None, &[("cookie", &cookie)])
        .await;
    assert_eq!(replay.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn refresh_accepts_body_and_requires_a_token() {
    let app = TestApp::new().await;
    app.seed_user("alice", Role::Sales).await;
    let token = login(&app, "alice", PASSWORD).await.json()["data"]["refreshToken"]
        .as_str()
        .unwrap()
        .to_string();

    let res = app
        .request(
            Method::POST,
            "/auth/refresh",
            None,
            Some(json!({ "refresh_token": token })),
            &[],
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);

    let missing = app
        .request(Method::POST, "/auth/refresh", None, None, &[])
        .await;
    assert_eq!(missing.status, StatusCode::UNAUTHORIZED);

    let garbage = app
        .request(
            Method::POST,
            "/auth/refresh",
            None,
            Some(json!({ "refresh_token": "not-a-jwt" })),
            &[],
        )
        .await;
    assert_eq!(garbage.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn access_token_is_not_a_refresh_token() {
    let app = TestApp::new().await;
    let access = app.login_as("alice", Role::Sales).await;
    let res = app
        .request(
            Method::POST,
            "/auth/refresh",
            None,
            Some(json!({ "refresh_token": access })),
            &[],
        )
        .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logout_revokes_once_and_clears_cookie() {
    let app = TestApp::new().await;
    app.seed_user("alice", Role::Sales).await;
    let token = login(&app, "alice", PASSWORD).await.json()["data"]["refreshToken"]
        .as_str()
        .unwrap()
        .to_string();

    let body = json!({ "refresh_token": token });
    let first = app
        .request(Method::POST, "/auth/logout", None, Some(body.clone()), &[])
        .await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.json()["data"]["revoked"], true);
    assert!(first.header("set-cookie").unwrap().contains("Max-Age=0"));

    let second = app
        .request(Method::POST, "/auth/logout", None, Some(body.clone()), &[])
        .await;
    assert_eq!(second.json()["data"]["revoked"], false);

    let refresh = app
        .request(Method::POST, "/auth/refresh", None, Some(body), &[])
        .await;
    assert_eq!(refresh.status, StatusCode::UNAUTHORIZED);

    let missing = app
        .request(Method::POST, "/auth/logout", None, None, &[])
        .await;
    assert_eq!(missing.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn guarded_routes_require_a_bearer_token() {
    let app = TestApp::new().await;

    let res = app
        .request(Method::GET, "/customers", None, None, &[])
        .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.json()["error"]["message"], "access token is missing or invalid");

    let res = app.get("/customers", "not.a.token").await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.json()["error"]["message"], "access token is invalid");

    let res = app.get("/auth/me", "not.a.token").await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn request_id_is_echoed() {
    let app = TestApp::new().await;
    let res = app
        .request(Method::GET, "/healthz", None, None, &[("x-request-id", "req-123")])
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.header("x-request-id"), Some("req-123"));
    assert_eq!(res.json()["database"], true);

    let res = app.request(Method::GET, "/healthz", None, None, &[]).await;
    assert!(res.header("x-request-id").is_some());
}
