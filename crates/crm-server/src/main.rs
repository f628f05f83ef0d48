use std::sync::Arc;

use anyhow::Context;
use crm_server::config::Config;
use crm_server::state::AppState;
use crm_server::sweeper::Sweeper;
use sea_orm_migration::MigratorTrait;

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine; real deployments set the environment directly.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::from_env()?;
    let db = crm_db::connect(&config.database_url)
        .await
        .context("connect to database")?;

    if config.run_migrations {
        // Apply migrations on boot (idempotent).
        crm_migration::Migrator::up(&db, None)
            .await
            .context("apply migrations")?;
    }

    let addr = config.bind_addr;
    let state = AppState::new(db, config);
    let sweeper = Sweeper::new(&state).spawn();

    let app = crm_server::app(state.clone());
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    tracing::info!(%addr, "crm-server HTTP listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();
    let _ = sweeper.await;
    let AppState { db, tokens, .. } = state;
    drop(tokens);
    match Arc::try_unwrap(db) {
        Ok(db) => db.close().await?,
        Err(_) => tracing::warn!("database handle still shared at shutdown; skipping close"),
    }
    tracing::info!("crm-server stopped");
    Ok(())
}
