use crate::{
    db::DbPool,
    entities::{
        product::Entity as Products,
        stock_checkpoint::{self, Entity as StockCheckpoints},
        stock_transaction::{self, Entity as StockTransactions},
    },
    errors::ServiceError,
};
use chrono::{DateTime, Utc};
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Result of projecting a product's stock from the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockProjection {
    pub product_code: String,
    pub stock: i64,
    pub as_of: DateTime<Utc>,
    /// Checkpoint the projection was floored on, when one existed.
    pub checkpoint_id: Option<Uuid>,
    /// Denormalized cache value at read time.
    pub cached_stock: i64,
    /// True for a "now" projection whose result disagrees with the cache.
    /// The projection is authoritative; the cache is the write path's job.
    pub cache_divergence: bool,
}

/// Computes live stock as a fold over the transaction log, floored on the
/// most recent active checkpoint at or before the requested time.
#[derive(Clone)]
pub struct StockProjectionService {
    db_pool: Arc<DbPool>,
}

impl StockProjectionService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Projects a product's stock, by default as of now.
    ///
    /// With an active checkpoint at or before `as_of`, the stock is the
    /// checkpoint's confirmed value plus the effects of contributing
    /// transactions strictly after it. Without one, it is the plain fold of
    /// contributing transactions up to `as_of`.
    pub async fn project_current_stock(
        &self,
        product_code: &str,
        as_of: Option<DateTime<Utc>>,
    ) -> Result<StockProjection, ServiceError> {
        let db = self.db_pool.as_ref();

        let product = Products::find_by_id(product_code.to_string())
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::not_found(format!("Product {}", product_code)))?;

        let is_now = as_of.is_none();
        let as_of = as_of.unwrap_or_else(Utc::now);

        let (stock, checkpoint_id) = project_on(db, product_code, as_of).await?;

        Ok(StockProjection {
            product_code: product_code.to_string(),
            stock,
            as_of,
            checkpoint_id,
            cached_stock: product.current_stock,
            cache_divergence: is_now && stock != product.current_stock,
        })
    }
}

/// Core projection fold, usable inside an open transaction so checkpoint
/// creation can read a consistent value while it holds the product lock.
pub(crate) async fn project_on<C: ConnectionTrait>(
    db: &C,
    product_code: &str,
    as_of: DateTime<Utc>,
) -> Result<(i64, Option<Uuid>), ServiceError> {
    let checkpoint = StockCheckpoints::find()
        .filter(stock_checkpoint::Column::ProductCode.eq(product_code))
        .filter(stock_checkpoint::Column::IsActive.eq(true))
        .filter(stock_checkpoint::Column::ConfirmedAt.lte(as_of))
        .order_by_desc(stock_checkpoint::Column::ConfirmedAt)
        .order_by_desc(stock_checkpoint::Column::CreatedAt)
        .one(db)
        .await
        .map_err(ServiceError::db_error)?;

    let mut query = StockTransactions::find()
        .filter(stock_transaction::Column::ProductCode.eq(product_code))
        .filter(stock_transaction::Column::AffectsCurrentStock.eq(true))
        .filter(stock_transaction::Column::OccurredAt.lte(as_of));

    let (base, checkpoint_id) = match &checkpoint {
        Some(cp) => {
            query = query.filter(stock_transaction::Column::OccurredAt.gt(cp.confirmed_at));
            (cp.confirmed_stock, Some(cp.id))
        }
        None => (0, None),
    };

    let transactions = query.all(db).await.map_err(ServiceError::db_error)?;

    let mut stock = base;
    for tx in &transactions {
        let effect = tx.signed_effect().ok_or_else(|| {
            ServiceError::ConsistencyError(format!(
                "Transaction {} has unknown type '{}'",
                tx.id, tx.transaction_type
            ))
        })?;
        stock += effect;
    }

    Ok((stock, checkpoint_id))
}
