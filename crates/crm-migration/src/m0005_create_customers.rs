use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Customers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Customers::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Customers::Age).integer().null())
                    .col(ColumnDef::new(Customers::Job).string_len(100).null())
                    .col(ColumnDef::new(Customers::MaritalStatus).string_len(50).null())
                    .col(ColumnDef::new(Customers::Education).string_len(100).null())
                    .col(
                        ColumnDef::new(Customers::HasCreditDefault)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Customers::Balance)
                            .double()
                            .not_null()
                            .default(0.0),
                    )
                    .col(
                        ColumnDef::new(Customers::HousingLoan)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Customers::PersonalLoan)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Customers::AssignedUserId).integer().null())
                    .col(ColumnDef::new(Customers::PredictionScore).double().null())
                    .col(ColumnDef::new(Customers::CustomerSegment).string_len(100).null())
                    .col(ColumnDef::new(Customers::LeadStatus).string_len(16).null())
                    .col(
                        ColumnDef::new(Customers::LastEngagedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Customers::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Customers::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_customers_assigned_user")
                            .from(Customers::Table, Customers::AssignedUserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_customers_assigned_user_id")
                    .table(Customers::Table)
                    .col(Customers::AssignedUserId)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_customers_lead_status")
                    .table(Customers::Table)
                    .col(Customers::LeadStatus)
                    .if_not_exists()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Customers::Table).to_owned())
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
    Age,
    Job,
    MaritalStatus,
    Education,
    HasCreditDefault,
    Balance,
    HousingLoan,
    PersonalLoan,
    AssignedUserId,
    PredictionScore,
    CustomerSegment,
    LeadStatus,
    LastEngagedAt,
    CreatedAt,
    UpdatedAt,
}
