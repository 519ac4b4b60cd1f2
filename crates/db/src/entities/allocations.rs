//! `SeaORM` Entity for allocations table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "allocations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub organization_id: Uuid,
    pub payer_id: Uuid,
    pub debit_id: Uuid,
    pub credit_id: Uuid,
    pub amount: i64,
    pub transaction_id: Uuid,
    pub status: String,
    pub created_at: DateTimeWithTimeZone,
    pub removed_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::receipts::Entity",
        from = "Column::DebitId",
        to = "super::receipts::Column::Id"
    )]
    Debit,
    #[sea_orm(
        belongs_to = "super::receipts::Entity",
        from = "Column::CreditId",
        to = "super::receipts::Column::Id"
    )]
    Credit,
}

impl ActiveModelBehavior for ActiveModel {}
