use std::sync::Arc;

use crm_db::sea_orm::DatabaseConnection;

use crate::config::Config;
use crate::tokens::TokenService;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: Arc<Config>,
    pub tokens: TokenService,
}

impl AppState {
    pub fn new(db: DatabaseConnection, config: Config) -> Self {
        let db = Arc::new(db);
        let config = Arc::new(config);
        let tokens = TokenService::new(db.clone(), &config);
        Self { db, config, tokens }
    }
}
