use async_trait::async_trait;
use chrono::Utc;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckpointType {
    Adjust,
    DailyClose,
    Monthly,
}

impl CheckpointType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckpointType::Adjust => "ADJUST",
            CheckpointType::DailyClose => "DAILY_CLOSE",
            CheckpointType::Monthly => "MONTHLY",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "ADJUST" => Some(CheckpointType::Adjust),
            "DAILY_CLOSE" => Some(CheckpointType::DailyClose),
            "MONTHLY" => Some(CheckpointType::Monthly),
            _ => None,
        }
    }
}

/// Confirms an absolute stock value for a product at a point in time.
/// Transactions at or before an active checkpoint stop contributing to the
/// live stock computation but stay in the audit trail.
///
/// Checkpoints are never deleted; they may only be deactivated.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stock_checkpoints")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub product_code: String,
    pub checkpoint_type: String,
    pub confirmed_stock: i64,
    pub confirmed_at: DateTimeUtc,
    pub reason: Option<String>,
    pub is_active: bool,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductCode",
        to = "super::product::Column::Code"
    )]
    Product,
    #[sea_orm(has_many = "super::stock_transaction::Entity")]
    SupersededTransactions,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
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
