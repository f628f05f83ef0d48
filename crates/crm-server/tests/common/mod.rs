#![allow(dead_code)]

use std::time::Duration;

use axum::Router;
use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, Method, Request, StatusCode, header};
use crm_db::entities::sea_orm_active_enums::Role;
use crm_db::entities::users;
use crm_server::config::Config;
use crm_server::password::hash_password;
use crm_server::state::AppState;
use http_body_util::BodyExt;
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, Set};
use sea_orm_migration::MigratorTrait;
use serde_json::Value;
use tower::ServiceExt;

pub const PASSWORD: &str = "correct-horse-1";

pub fn test_config() -> Config {
    Config {
        database_url: "sqlite::memory:".to_string(),
        bind_addr: ([127, 0, 0, 1], 0).into(),
        jwt_secret: "integration-access-secret".to_string(),
        refresh_token_secret: "integration-refresh-secret".to_string(),
        access_token_ttl: Duration::from_secs(3600),
        refresh_token_ttl: Duration::from_secs(7 * 86_400),
        idempotency_ttl: Duration::from_secs(86_400),
        sweep_interval: Duration::from_secs(600),
        production: false,
        run_migrations: true,
    }
}

pub struct TestApp {
    pub state: AppState,
    router: Router,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("response body is JSON")
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn error_code(&self) -> String {
        self.json()["error"]["code"].as_str().unwrap_or_default().to_string()
    }
}

impl TestApp {
    pub async fn new() -> Self {
        // Single connection: each pooled connection would get its own empty in-memory database.
        let mut opts = ConnectOptions::new("sqlite::memory:");
        opts.max_connections(1)
            .min_connections(1)
            .idle_timeout(Duration::from_secs(3600))
            .sqlx_logging(false);
        let db = Database::connect(opts).await.expect("sqlite connect");
        crm_migration::Migrator::up(&db, None).await.expect("migrations");

        let state = AppState::new(db, test_config());
        let router = crm_server::app(state.clone());
        Self { state, router }
    }

    pub async fn seed_user(&self, username: &str, role: Role) -> users::Model {
        let now = chrono::Utc::now();
        users::ActiveModel {
            full_name: Set(Some(format!("{username} test"))),
            username: Set(username.to_string()),
            email: Set(format!("{username}@example.com")),
            password_hash: Set(hash_password(PASSWORD.to_string()).await.unwrap()),
            role: Set(role),
            team_id: Set(None),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        }
        .insert(&*self.state.db)
        .await
        .expect("seed user")
    }

    /// Seeds a user with `role` and returns an access token for it.
    pub async fn login_as(&self, username: &str, role: Role) -> String {
        self.seed_user(username, role).await;
        let res = self
            .request(
                Method::POST,
                "/auth/login",
                None,
                Some(serde_json::json!({ "username": username, "password": PASSWORD })),
                &[],
            )
            .await;
        assert_eq!(res.status, StatusCode::OK, "login failed: {:?}", res.body);
        res.json()["data"]["accessToken"]
            .as_str()
            .expect("access token")
            .to_string()
    }

    pub async fn send(&self, req: Request<Body>) -> TestResponse {
        let res = self.router.clone().oneshot(req).await.expect("router");
        let status = res.status();
        let headers = res.headers().clone();
        let body = res.into_body().collect().await.expect("body").to_bytes();
        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
        headers: &[(&str, &str)],
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let req = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(req).await
    }

    pub async fn get(&self, uri: &str, token: &str) -> TestResponse {
        self.request(Method::GET, uri, Some(token), None, &[]).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> TestResponse {
        self.request(Method::POST, uri, Some(token), Some(body), &[]).await
    }
}
