//! `SeaORM` Entity for ledger_transactions table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "ledger_transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub organization_id: Uuid,
    pub kind: String,
    pub payer_id: Option<Uuid>,
    pub amount: i64,
    pub method: Option<String>,
    pub handled_by: Option<Uuid>,
    pub description: Option<String>,
    #[sea_orm(column_type = "JsonBinary")]
    pub payee_payments: Json,
    #[sea_orm(column_type = "JsonBinary")]
    pub receipt_ids: Json,
    #[sea_orm(column_type = "JsonBinary")]
    pub allocation_ids: Json,
    pub idempotency_key: Option<String>,
    pub is_deleted: bool,
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub deletion_backup: Option<Json>,
    pub deleted_at: Option<DateTimeWithTimeZone>,
    pub deleted_by: Option<Uuid>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::receipts::Entity")]
    Receipts,
}

impl Related<super::receipts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Receipts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
