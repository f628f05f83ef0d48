//! Shared fixtures for unit tests: an in-memory SQLite database with the real schema.

use std::time::Duration;

use crm_db::entities::sea_orm_active_enums::Role;
use crm_db::entities::users;
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, DatabaseConnection, Set};
use sea_orm_migration::MigratorTrait;

use crate::config::Config;
use crate::password::hash_password;

pub fn config() -> Config {
    Config {
        database_url: "sqlite::memory:".to_string(),
        bind_addr: ([127, 0, 0, 1], 0).into(),
        jwt_secret: "test-access-secret".to_string(),
        refresh_token_secret: "test-refresh-secret".to_string(),
        access_token_ttl: Duration::from_secs(3600),
        refresh_token_ttl: Duration::from_secs(7 * 86_400),
        idempotency_ttl: Duration::from_secs(86_400),
        sweep_interval: Duration::from_secs(600),
        production: false,
        run_migrations: true,
    }
}

/// One connection only: every pooled connection would otherwise get its own empty database.
pub async fn memory_db() -> DatabaseConnection {
    let mut opts = ConnectOptions::new("sqlite::memory:");
    opts.max_connections(1)
        .min_connections(1)
        .idle_timeout(Duration::from_secs(3600))
        .sqlx_logging(false);
    let db = Database::connect(opts).await.expect("sqlite connect");
    crm_migration::Migrator::up(&db, None)
        .await
        .expect("migrations");
    db
}

pub async fn insert_user(
    db: &DatabaseConnection,
    username: &str,
    password: &str,
    role: Role,
) -> users::Model {
    let now = chrono::Utc::now();
    users::ActiveModel {
        full_name: Set(None),
        username: Set(username.to_string()),
        email: Set(format!("{username}@example.com")),
        password_hash: Set(hash_password(password.to_string()).await.unwrap()),
        role: Set(role),
        team_id: Set(None),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("insert user")
}
