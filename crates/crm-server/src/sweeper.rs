use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sea_orm::DatabaseConnection;
use tokio::task::JoinHandle;

use crate::idempotency;
use crate::state::AppState;
use crate::tokens::TokenService;

/// Periodically drops expired refresh tokens and stale idempotency records.
#[derive(Clone)]
pub struct Sweeper {
    db: Arc<DatabaseConnection>,
    tokens: TokenService,
    idempotency_ttl: Duration,
    interval: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub refresh_tokens: u64,
    pub idempotency_keys: u64,
}

impl Sweeper {
    pub fn new(state: &AppState) -> Self {
        Self {
            db: state.db.clone(),
            tokens: state.tokens.clone(),
            idempotency_ttl: state.config.idempotency_ttl,
            interval: state.config.sweep_interval,
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                self.tick().await;
            }
        })
    }

    pub async fn tick(&self) -> SweepReport {
        let now = Utc::now();
        let refresh_tokens = match self.tokens.purge_expired(now).await {
            Ok(n) => n,
            Err(e) => {
                tracing::error!(error = %e, "failed to purge expired refresh tokens");
                0
            }
        };

        let ttl = chrono::Duration::from_std(self.idempotency_ttl)
            .unwrap_or_else(|_| chrono::Duration::hours(24));
        let idempotency_keys = match idempotency::purge_older_than(&*self.db, now - ttl).await {
            Ok(n) => n,
            Err(e) => {
                tracing::error!(error = %e, "failed to purge idempotency records");
                0
            }
        };

        if refresh_tokens > 0 || idempotency_keys > 0 {
            tracing::info!(refresh_tokens, idempotency_keys, "sweep removed stale rows");
        }
        SweepReport {
            refresh_tokens,
            idempotency_keys,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;
    use crm_db::entities::sea_orm_active_enums::Role;
    use crm_db::entities::{idempotency_keys, refresh_tokens};
    use sea_orm::prelude::Uuid;
    use sea_orm::{EntityTrait, PaginatorTrait, Set};

    #[tokio::test]
    async fn removes_only_stale_rows() {
        let state = AppState::new(test_support::memory_db().await, test_support::config());
        let db = &*state.db;
        let user = test_support::insert_user(db, "alice", "correct-horse-1", Role::Sales).await;

        let live = state.tokens.issue_token_pair(&user).await.unwrap();
        let past = Utc::now() - chrono::Duration::days(2);
        refresh_tokens::Entity::insert(refresh_tokens::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user.id),
            token_hash: Set("stale".to_string()),
            created_at: Set(past.into()),
            expires_at: Set((past + chrono::Duration::hours(1)).into()),
        })
        .exec(db)
        .await
        .unwrap();

        for (key, created) in [("fresh-key-0001", Utc::now()), ("stale-key-0001", past)] {
            idempotency_keys::Entity::insert(idempotency_keys::ActiveModel {
                key: Set(key.to_string()),
                response_body: Set("{}".to_string()),
                status_code: Set(201),
                created_at: Set(created.into()),
            })
            .exec_without_returning(db)
            .await
            .unwrap();
        }

        let report = Sweeper::new(&state).tick().await;
        assert_eq!(
            report,
            SweepReport {
                refresh_tokens: 1,
                idempotency_keys: 1
            }
        );
        assert_eq!(refresh_tokens::Entity::find().count(db).await.unwrap(), 1);
        assert!(
            idempotency_keys::Entity::find_by_id("fresh-key-0001".to_string())
                .one(db)
                .await
                .unwrap()
                .is_some()
        );
        // The live pair still rotates.
        state.tokens.rotate_refresh_token(&live.refresh_token).await.unwrap();
    }
}
