use sea_orm_migration::prelude::*;

mod m0001_create_teams;
mod m0002_create_users;
mod m0003_add_team_manager_fk;
mod m0004_create_refresh_tokens;
mod m0005_create_customers;
mod m0006_create_interactions;
mod m0007_create_products;
mod m0008_create_conversions;
mod m0009_create_idempotency_keys;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m0001_create_teams::Migration),
            Box::new(m0002_create_users::Migration),
            Box::new(m0003_add_team_manager_fk::Migration),
            Box::new(m0004_create_refresh_tokens::Migration),
            Box::new(m0005_create_customers::Migration),
            Box::new(m0006_create_interactions::Migration),
            Box::new(m0007_create_products::Migration),
            Box::new(m0008_create_conversions::Migration),
            Box::new(m0009_create_idempotency_keys::Migration),
        ]
    }
}
