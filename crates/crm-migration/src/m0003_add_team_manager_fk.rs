use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::DbBackend;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // SQLite cannot add constraints to an existing table; the column stays unconstrained there.
        if manager.get_database_backend() == DbBackend::Sqlite {
            return Ok(());
        }

        manager
            .create_foreign_key(
                ForeignKey::create()
                    .name("fk_teams_manager")
                    .from(Teams::Table, Teams::ManagerId)
                    .to(Users::Table, Users::Id)
                    .on_delete(ForeignKeyAction::SetNull)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        if manager.get_database_backend() == DbBackend::Sqlite {
            return Ok(());
        }

        manager
            .drop_foreign_key(
                ForeignKey::drop()
                    .name("fk_teams_manager")
                    .table(Teams::Table)
                    .to_owned(),
            )
            .await
    }
}

#[derive(DeriveIden)]
enum Teams {
    Table,
    ManagerId,
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
}
