use sea_orm::entity::prelude::*;

use super::sea_orm_active_enums::LeadStatus;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "customers")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub age: Option<i32>,
    pub job: Option<String>,
    pub marital_status: Option<String>,
    pub education: Option<String>,
    pub has_credit_default: bool,
    #[sea_orm(column_type = "Double")]
    pub balance: f64,
    pub housing_loan: bool,
    pub personal_loan: bool,
    pub assigned_user_id: Option<i32>,
    #[sea_orm(column_type = "Double", nullable)]
    pub prediction_score: Option<f64>,
    pub customer_segment: Option<String>,
    pub lead_status: Option<LeadStatus>,
    pub last_engaged_at: Option<DateTimeWithTimeZone>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::AssignedUserId",
        to = "super::users::Column::Id"
    )]
    AssignedUser,
    #[sea_orm(has_many = "super::interactions::Entity")]
    Interactions,
    #[sea_orm(has_many = "super::conversions::Entity")]
    Conversions,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AssignedUser.def()
    }
}

impl Related<super::interactions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Interactions.def()
    }
}

impl Related<super::conversions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Conversions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
