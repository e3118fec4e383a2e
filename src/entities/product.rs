use async_trait::async_trait;
use chrono::Utc;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};

/// Product master record. `code` is the stable business key used as the
/// foreign key everywhere; there is no surrogate id.
///
/// `current_stock` is a denormalized cache maintained by the movement write
/// path. The projection service is the authority whenever cache and ledger
/// disagree.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub code: String,
    pub name: String,
    pub category: Option<String>,
    pub unit: Option<String>,
    pub safety_stock: i64,
    pub lead_time_days: i32,
    pub is_active: bool,
    pub current_stock: i64,
    pub created_at: DateTimeUtc,
    pub updated_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::stock_transaction::Entity")]
    StockTransactions,
    #[sea_orm(has_many = "super::stock_checkpoint::Entity")]
    StockCheckpoints,
}

impl Related<super::stock_transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StockTransactions.def()
    }
}

impl Related<super::stock_checkpoint::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StockCheckpoints.def()
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
