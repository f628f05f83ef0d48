use sea_orm::entity::prelude::*;

use super::sea_orm_active_enums::{ContactMethod, InteractionOutcome};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "interactions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub customer_id: i32,
    pub user_id: i32,
    pub contact_method: Option<ContactMethod>,
    pub duration_seconds: Option<i32>,
    pub campaign_contact: Option<i32>,
    pub previous_outcome: Option<String>,
    pub outcome: Option<InteractionOutcome>,
    #[sea_orm(column_type = "Text", nullable)]
    pub notes: Option<String>,
    pub interaction_date: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::customers::Entity",
        from = "Column::CustomerId",
        to = "super::customers::Column::Id"
    )]
    Customer,
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Id"
    )]
    User,
}

impl Related<super::customers::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Customer.def()
    }
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
