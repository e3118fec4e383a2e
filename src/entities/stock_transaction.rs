use async_trait::async_trait;
use chrono::Utc;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Movement kinds recorded in the transaction log. Returns count as inbound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionType {
    Inbound,
    Outbound,
    Return,
    Adjust,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Inbound => "IN",
            TransactionType::Outbound => "OUT",
            TransactionType::Return => "RETURN",
            TransactionType::Adjust => "ADJUST",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "IN" => Some(TransactionType::Inbound),
            "OUT" => Some(TransactionType::Outbound),
            "RETURN" => Some(TransactionType::Return),
            "ADJUST" => Some(TransactionType::Adjust),
            _ => None,
        }
    }

    /// Signed contribution of a transaction to stock.
    ///
    /// OUT stores a positive magnitude and contributes negatively; ADJUST
    /// stores a signed delta, not an absolute value.
    pub fn effect(&self, quantity: i64) -> i64 {
        match self {
            TransactionType::Inbound | TransactionType::Return => quantity,
            TransactionType::Outbound => -quantity,
            TransactionType::Adjust => quantity,
        }
    }
}

/// Immutable movement fact. `previous_stock`/`new_stock` are snapshots taken
/// at write time and are never rewritten; together with `quantity` they make
/// history reconstructable even after a checkpoint supersedes the row.
///
/// The only legal mutation is flipping `affects_current_stock` to false and
/// attaching the superseding `checkpoint_id`. Rows are never deleted.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stock_transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub product_code: String,
    pub transaction_type: String,
    pub quantity: i64,
    pub previous_stock: i64,
    pub new_stock: i64,
    pub occurred_at: DateTimeUtc,
    pub reason: Option<String>,
    pub memo: Option<String>,
    pub location: Option<String>,
    pub created_by: Option<String>,
    pub affects_current_stock: bool,
    pub checkpoint_id: Option<Uuid>,
    pub created_at: DateTimeUtc,
}

impl Model {
    /// Parsed movement kind, or `None` for an unknown stored string.
    pub fn kind(&self) -> Option<TransactionType> {
        TransactionType::from_str(&self.transaction_type)
    }

    /// Signed effect of this row, or `None` for an unknown stored type.
    pub fn signed_effect(&self) -> Option<i64> {
        self.kind().map(|t| t.effect(self.quantity))
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductCode",
        to = "super::product::Column::Code"
    )]
    Product,
    #[sea_orm(
        belongs_to = "super::stock_checkpoint::Entity",
        from = "Column::CheckpointId",
        to = "super::stock_checkpoint::Column::Id"
    )]
    Checkpoint,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl Related<super::stock_checkpoint::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Checkpoint.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C: ConnectionTrait>(self, _db: &C, _insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        if let ActiveValue::NotSet = active_model.created_at {
            active_model.created_at = Set(Utc::now());
        }
        Ok(active_model)
    }
}
