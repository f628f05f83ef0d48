use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Interactions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Interactions::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Interactions::CustomerId).integer().not_null())
                    .col(ColumnDef::new(Interactions::UserId).integer().not_null())
                    .col(ColumnDef::new(Interactions::ContactMethod).string_len(16).null())
                    .col(ColumnDef::new(Interactions::DurationSeconds).integer().null())
                    .col(ColumnDef::new(Interactions::CampaignContact).integer().null())
                    .col(ColumnDef::new(Interactions::PreviousOutcome).string_len(256).null())
                    .col(ColumnDef::new(Interactions::Outcome).string_len(24).null())
                    .col(ColumnDef::new(Interactions::Notes).text().null())
                    .col(
                        ColumnDef::new(Interactions::InteractionDate)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_interactions_customer")
                            .from(Interactions::Table, Interactions::CustomerId)
                            .to(Customers::Table, Customers::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_interactions_user")
                            .from(Interactions::Table, Interactions::UserId)
                            .to(Users::Table, Users::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_interactions_customer_id")
                    .table(Interactions::Table)
                    .col(Interactions::CustomerId)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_interactions_user_id")
                    .table(Interactions::Table)
                    .col(Interactions::UserId)
                    .if_not_exists()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Interactions::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Customers {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Interactions {
    Table,
    Id,
    CustomerId,
    UserId,
    ContactMethod,
    DurationSeconds,
    CampaignContact,
    PreviousOutcome,
    Outcome,
    Notes,
    InteractionDate,
}
