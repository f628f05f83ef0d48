//! Access/refresh token issuance and refresh-token rotation.
//!
//! Access tokens are stateless JWTs. Refresh tokens are JWTs too, but every issued
//! refresh token also has a row in `refresh_tokens`; a token whose row is gone
//! (rotated away or revoked) is rejected even when its signature still verifies.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use crm_db::entities::sea_orm_active_enums::Role;
use crm_db::entities::{refresh_tokens, users};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, errors::ErrorKind};
use sea_orm::prelude::Uuid;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::password::verify_password;

const ISSUER: &str = "crm";
const ACCESS_AUDIENCE: &str = "crm-api";
const REFRESH_AUDIENCE: &str = "crm-refresh";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: String,
    pub role: Role,
    pub team_id: Option<i32>,
    pub exp: usize,
    pub iat: usize,
    pub iss: String,
    pub aud: String,
}

impl AccessClaims {
    pub fn user_id(&self) -> AppResult<i32> {
        self.sub.parse().map_err(|_| AppError::InvalidToken)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RefreshClaims {
    sub: String,
    /// Makes two pairs issued for the same user in the same second distinct.
    jti: String,
    exp: usize,
    iat: usize,
    iss: String,
    aud: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    /// Access-token lifetime in seconds.
    pub expires_in: u64,
}

struct Keys {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    access_ttl_secs: i64,
    refresh_ttl_secs: i64,
}

#[derive(Clone)]
pub struct TokenService {
    db: Arc<DatabaseConnection>,
    keys: Arc<Keys>,
}

pub fn hash_refresh_token(raw: &str) -> String {
    use sha2::Digest;
    let mut hasher = sha2::Sha256::new();
    hasher.update(raw.as_bytes());
    hex::encode(hasher.finalize())
}

fn decode<C: DeserializeOwned>(token: &str, key: &DecodingKey, audience: &str) -> AppResult<C> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_audience(&[audience]);
    validation.set_issuer(&[ISSUER]);

    jsonwebtoken::decode::<C>(token, key, &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => AppError::ExpiredToken,
            _ => AppError::InvalidToken,
        })
}

impl TokenService {
    pub fn new(db: Arc<DatabaseConnection>, config: &Config) -> Self {
        let keys = Keys {
            access_encoding: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            access_decoding: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            refresh_encoding: EncodingKey::from_secret(config.refresh_token_secret.as_bytes()),
            refresh_decoding: DecodingKey::from_secret(config.refresh_token_secret.as_bytes()),
            access_ttl_secs: config.access_token_ttl.as_secs() as i64,
            refresh_ttl_secs: config.refresh_token_ttl.as_secs() as i64,
        };
        Self {
            db,
            keys: Arc::new(keys),
        }
    }

    pub fn refresh_ttl_secs(&self) -> i64 {
        self.keys.refresh_ttl_secs
    }

    /// Signs a new access/refresh pair for `user` and records the refresh token.
    pub async fn issue_token_pair(&self, user: &users::Model) -> AppResult<TokenPair> {
        self.issue_with(&*self.db, user).await
    }

    async fn issue_with<C: ConnectionTrait>(
        &self,
        conn: &C,
        user: &users::Model,
    ) -> AppResult<TokenPair> {
        let now = Utc::now();
        let iat = now.timestamp() as usize;
        let access_exp = now + chrono::Duration::seconds(self.keys.access_ttl_secs);
        let refresh_exp = now + chrono::Duration::seconds(self.keys.refresh_ttl_secs);

        let access = AccessClaims {
            sub: user.id.to_string(),
            role: user.role,
            team_id: user.team_id,
            exp: access_exp.timestamp() as usize,
            iat,
            iss: ISSUER.to_string(),
            aud: ACCESS_AUDIENCE.to_string(),
        };
        let refresh = RefreshClaims {
            sub: user.id.to_string(),
            jti: Uuid::new_v4().to_string(),
            exp: refresh_exp.timestamp() as usize,
            iat,
            iss: ISSUER.to_string(),
            aud: REFRESH_AUDIENCE.to_string(),
        };

        let header = Header::new(Algorithm::HS256);
        let access_token = jsonwebtoken::encode(&header, &access, &self.keys.access_encoding)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("jwt error: {e}")))?;
        let refresh_token = jsonwebtoken::encode(&header, &refresh, &self.keys.refresh_encoding)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("jwt error: {e}")))?;

        let record = refresh_tokens::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user.id),
            token_hash: Set(hash_refresh_token(&refresh_token)),
            created_at: Set(now.into()),
            expires_at: Set(refresh_exp.into()),
        };
        refresh_tokens::Entity::insert(record).exec(conn).await?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            token_type: "Bearer",
            expires_in: self.keys.access_ttl_secs as u64,
        })
    }

    /// Usernames are stored lowercase, so lookup is case-insensitive.
    pub async fn authenticate(&self, username: &str, password: &str) -> AppResult<users::Model> {
        let username = username.trim().to_lowercase();
        let user = users::Entity::find()
            .filter(users::Column::Username.eq(username.clone()))
            .one(&*self.db)
            .await?;

        let Some(user) = user else {
            tracing::warn!(%username, "login failed: unknown username");
            return Err(AppError::InvalidCredentials);
        };

        if !verify_password(user.password_hash.clone(), password.to_string()).await? {
            tracing::warn!(user_id = user.id, "login failed: wrong password");
            return Err(AppError::InvalidCredentials);
        }

        Ok(user)
    }

    /// Exchanges a refresh token for a new pair. The presented token is consumed.
    pub async fn rotate_refresh_token(
        &self,
        presented: &str,
    ) -> AppResult<(TokenPair, users::Model)> {
        let claims: RefreshClaims =
            decode(presented, &self.keys.refresh_decoding, REFRESH_AUDIENCE).inspect_err(|e| {
                match e {
                    AppError::ExpiredToken => tracing::warn!("refresh rejected: token expired"),
                    _ => tracing::warn!("refresh rejected: bad signature or claims"),
                }
            })?;

        let db = &*self.db;
        let token_hash = hash_refresh_token(presented);
        let Some(record) = refresh_tokens::Entity::find()
            .filter(refresh_tokens::Column::TokenHash.eq(token_hash.clone()))
            .one(db)
            .await?
        else {
            tracing::warn!(sub = %claims.sub, "refresh rejected: token not in store");
            return Err(AppError::InvalidToken);
        };

        if claims.sub != record.user_id.to_string() {
            tracing::warn!(sub = %claims.sub, owner = record.user_id, "refresh rejected: owner mismatch");
            return Err(AppError::InvalidToken);
        }

        let user = users::Entity::find_by_id(record.user_id)
            .one(db)
            .await?
            .ok_or(AppError::NotFound {
                resource: "user",
                id: Some(record.user_id),
            })?;

        // Delete and reissue atomically; the row count tells a concurrent rotator it lost.
        let txn = db.begin().await?;
        let deleted = refresh_tokens::Entity::delete_many()
            .filter(refresh_tokens::Column::TokenHash.eq(token_hash))
            .exec(&txn)
            .await?;
        if deleted.rows_affected == 0 {
            txn.rollback().await?;
            tracing::warn!(user_id = user.id, "refresh rejected: token consumed concurrently");
            return Err(AppError::InvalidToken);
        }
        let pair = self.issue_with(&txn, &user).await?;
        txn.commit().await?;

        tracing::info!(user_id = user.id, "refresh token rotated");
        Ok((pair, user))
    }

    /// Deletes the stored refresh token. Unknown tokens are not an error.
    pub async fn revoke(&self, presented: &str) -> AppResult<bool> {
        let res = refresh_tokens::Entity::delete_many()
            .filter(refresh_tokens::Column::TokenHash.eq(hash_refresh_token(presented)))
            .exec(&*self.db)
            .await?;
        Ok(res.rows_affected > 0)
    }

    pub fn verify_access_token(&self, token: &str) -> AppResult<AccessClaims> {
        decode(token, &self.keys.access_decoding, ACCESS_AUDIENCE)
    }

    pub async fn purge_expired(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let res = refresh_tokens::Entity::delete_many()
            .filter(refresh_tokens::Column::ExpiresAt.lt(now))
            .exec(&*self.db)
            .await?;
        Ok(res.rows_affected)
    }
}
