//! `SeaORM` Entity for guardian_links table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "guardian_links")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub guardian_id: Uuid,
    #[sea_orm(primary_key, auto_increment = false)]
    pub payee_id: Uuid,
    pub organization_id: Uuid,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::payers::Entity",
        from = "Column::GuardianId",
        to = "super::payers::Column::Id"
    )]
    Guardian,
    #[sea_orm(
        belongs_to = "super::payers::Entity",
        from = "Column::PayeeId",
        to = "super::payers::Column::Id"
    )]
    Payee,
}

impl ActiveModelBehavior for ActiveModel {}
