use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One row per (date, product): beginning stock carried from the previous
/// day, same-day movement totals, and the resulting ending stock.
///
/// Only the daily ledger generator writes these rows. The id is derived
/// deterministically from (date, product) so regeneration with unchanged
/// transactions reproduces identical rows.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "daily_ledgers")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub ledger_date: Date,
    pub product_code: String,
    pub beginning_stock: i64,
    pub total_inbound: i64,
    pub total_outbound: i64,
    pub adjustments: i64,
    pub ending_stock: i64,
}

impl Model {
    /// The ledger identity every persisted row must satisfy.
    pub fn balances(&self) -> bool {
        self.ending_stock
            == self.beginning_stock + self.total_inbound - self.total_outbound + self.adjustments
    }
}

/// Deterministic row id for a (date, product) pair.
pub fn ledger_row_id(ledger_date: Date, product_code: &str) -> Uuid {
    Uuid::new_v5(
        &Uuid::NAMESPACE_OID,
        format!("daily_ledger:{}:{}", ledger_date, product_code).as_bytes(),
    )
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductCode",
        to = "super::product::Column::Code"
    )]
    Product,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
