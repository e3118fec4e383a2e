use crate::{
    db::DbPool,
    entities::{
        product::{self, Entity as Products},
        stock_checkpoint::{self, CheckpointType, Entity as StockCheckpoints},
        stock_transaction::{self, Entity as StockTransactions, TransactionType},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::{locks::ProductLocks, projection::project_on},
};
use chrono::{DateTime, Utc};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter,
    Set, TransactionError, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointResult {
    pub checkpoint: stock_checkpoint::Model,
    /// Number of transactions this checkpoint took ownership of.
    pub superseded_transactions: u64,
    /// Signed delta the confirming ADJUST transaction recorded; zero when
    /// the confirmed value already matched the ledger or for close
    /// checkpoints, which confirm the projected value as-is.
    pub adjustment_delta: i64,
}

/// Creates checkpoints and reconciles the transaction log against them.
///
/// Checkpoint insert and the supersession sweep are one DB transaction:
/// either the checkpoint exists and every captured transaction is flagged,
/// or nothing happened. Historical snapshot fields are never rewritten.
#[derive(Clone)]
pub struct CheckpointService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    locks: ProductLocks,
}

impl CheckpointService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>, locks: ProductLocks) -> Self {
        Self {
            db_pool,
            event_sender,
            locks,
        }
    }

    /// Force-corrects a product to an absolute confirmed value.
    ///
    /// Writes an ADJUST transaction for the difference between the projected
    /// and the confirmed stock (ground truth kept in its snapshot fields),
    /// then checkpoints the confirmed value and supersedes prior
    /// transactions.
    pub async fn record_adjustment_checkpoint(
        &self,
        product_code: &str,
        confirmed_stock: i64,
        reason: Option<String>,
        at: Option<DateTime<Utc>>,
    ) -> Result<CheckpointResult, ServiceError> {
        let lock = self.locks.for_product(product_code);
        let _guard = lock.lock().await;

        let db = self.db_pool.as_ref();
        let confirmed_at = at.unwrap_or_else(Utc::now);
        let code = product_code.to_string();

        let result = db
            .transaction::<_, CheckpointResult, ServiceError>(move |txn| {
                Box::pin(async move {
                    let prod = Products::find_by_id(code.clone())
                        .one(txn)
                        .await
                        .map_err(ServiceError::db_error)?
                        .ok_or_else(|| ServiceError::not_found(format!("Product {}", code)))?;

                    let (projected, _) = project_on(txn, &code, confirmed_at).await?;
                    let delta = confirmed_stock - projected;

                    if delta != 0 {
                        let adjust = stock_transaction::ActiveModel {
                            id: Set(Uuid::new_v4()),
                            product_code: Set(code.clone()),
                            transaction_type: Set(TransactionType::Adjust.as_str().to_string()),
                            quantity: Set(delta),
                            previous_stock: Set(projected),
                            new_stock: Set(confirmed_stock),
                            occurred_at: Set(confirmed_at),
                            reason: Set(reason.clone()),
                            memo: Set(None),
                            location: Set(None),
                            created_by: Set(None),
                            affects_current_stock: Set(true),
                            checkpoint_id: Set(None),
                            ..Default::default()
                        };
                        adjust.insert(txn).await.map_err(ServiceError::db_error)?;
                    }

                    apply_checkpoint(
                        txn,
                        prod,
                        CheckpointType::Adjust,
                        confirmed_stock,
                        confirmed_at,
                        reason,
                        delta,
                    )
                    .await
                })
            })
            .await
            .map_err(|e| match e {
                TransactionError::Connection(db_err) => ServiceError::db_error(db_err),
                TransactionError::Transaction(service_err) => service_err,
            })?;

        self.publish_created(&result).await?;
        Ok(result)
    }

    /// Checkpoints the projected value at a close boundary (daily/monthly).
    /// No correction is applied; the ledger's own value is confirmed.
    pub async fn record_close_checkpoint(
        &self,
        product_code: &str,
        checkpoint_type: CheckpointType,
        at: DateTime<Utc>,
        reason: Option<String>,
    ) -> Result<CheckpointResult, ServiceError> {
        let lock = self.locks.for_product(product_code);
        let _guard = lock.lock().await;

        let db = self.db_pool.as_ref();
        let code = product_code.to_string();

        let result = db
            .transaction::<_, CheckpointResult, ServiceError>(move |txn| {
                Box::pin(async move {
                    let prod = Products::find_by_id(code.clone())
                        .one(txn)
                        .await
                        .map_err(ServiceError::db_error)?
                        .ok_or_else(|| ServiceError::not_found(format!("Product {}", code)))?;

                    let (projected, _) = project_on(txn, &code, at).await?;

                    apply_checkpoint(txn, prod, checkpoint_type, projected, at, reason, 0).await
                })
            })
            .await
            .map_err(|e| match e {
                TransactionError::Connection(db_err) => ServiceError::db_error(db_err),
                TransactionError::Transaction(service_err) => service_err,
            })?;

        self.publish_created(&result).await?;
        Ok(result)
    }

    /// Deactivates a checkpoint so the projector stops treating it as a
    /// stock floor. Supersession flags on transactions it owns are kept;
    /// the audit trail records what happened, not what should have.
    pub async fn deactivate_checkpoint(&self, checkpoint_id: Uuid) -> Result<(), ServiceError> {
        let db = self.db_pool.as_ref();

        let checkpoint = StockCheckpoints::find_by_id(checkpoint_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::not_found(format!("Checkpoint {}", checkpoint_id)))?;

        let product_code = checkpoint.product_code.clone();
        let lock = self.locks.for_product(&product_code);
        let _guard = lock.lock().await;

        let code = product_code.clone();
        db.transaction::<_, (), ServiceError>(move |txn| {
            Box::pin(async move {
                let mut active: stock_checkpoint::ActiveModel = checkpoint.into();
                active.is_active = Set(false);
                active.update(txn).await.map_err(ServiceError::db_error)?;

                refresh_stock_cache(txn, &code).await?;
                Ok(())
            })
        })
        .await
        .map_err(|e| match e {
            TransactionError::Connection(db_err) => ServiceError::db_error(db_err),
            TransactionError::Transaction(service_err) => service_err,
        })?;

        self.event_sender
            .send(Event::CheckpointDeactivated {
                checkpoint_id,
                product_code,
            })
            .await
            .map_err(ServiceError::EventError)?;

        Ok(())
    }

    pub async fn get_checkpoints(
        &self,
        product_code: &str,
    ) -> Result<Vec<stock_checkpoint::Model>, ServiceError> {
        use sea_orm::QueryOrder;

        StockCheckpoints::find()
            .filter(stock_checkpoint::Column::ProductCode.eq(product_code))
            .order_by_desc(stock_checkpoint::Column::ConfirmedAt)
            .all(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)
    }

    async fn publish_created(&self, result: &CheckpointResult) -> Result<(), ServiceError> {
        info!(
            product_code = %result.checkpoint.product_code,
            checkpoint_type = %result.checkpoint.checkpoint_type,
            confirmed_stock = result.checkpoint.confirmed_stock,
            superseded = result.superseded_transactions,
            delta = result.adjustment_delta,
            "checkpoint recorded"
        );

        self.event_sender
            .send(Event::CheckpointCreated {
                checkpoint_id: result.checkpoint.id,
                product_code: result.checkpoint.product_code.clone(),
                checkpoint_type: result.checkpoint.checkpoint_type.clone(),
                confirmed_stock: result.checkpoint.confirmed_stock,
                superseded_transactions: result.superseded_transactions,
            })
            .await
            .map_err(ServiceError::EventError)
    }
}

/// Inserts the checkpoint row, sweeps unowned prior transactions under it,
/// and refreshes the product cache. Runs inside the caller's transaction.
///
/// The sweep only touches transactions with no `checkpoint_id`: a row owned
/// by a checkpoint is never rebound, which is what keeps out-of-order
/// checkpoint insertion from un-superseding later history.
async fn apply_checkpoint<C: ConnectionTrait>(
    txn: &C,
    prod: product::Model,
    checkpoint_type: CheckpointType,
    confirmed_stock: i64,
    confirmed_at: DateTime<Utc>,
    reason: Option<String>,
    adjustment_delta: i64,
) -> Result<CheckpointResult, ServiceError> {
    let checkpoint_id = Uuid::new_v4();
    let checkpoint = stock_checkpoint::ActiveModel {
        id: Set(checkpoint_id),
        product_code: Set(prod.code.clone()),
        checkpoint_type: Set(checkpoint_type.as_str().to_string()),
        confirmed_stock: Set(confirmed_stock),
        confirmed_at: Set(confirmed_at),
        reason: Set(reason),
        is_active: Set(true),
        ..Default::default()
    };
    let checkpoint = checkpoint.insert(txn).await.map_err(ServiceError::db_error)?;

    let sweep = StockTransactions::update_many()
        .col_expr(
            stock_transaction::Column::AffectsCurrentStock,
            Expr::value(false),
        )
        .col_expr(
            stock_transaction::Column::CheckpointId,
            Expr::value(checkpoint_id),
        )
        .filter(stock_transaction::Column::ProductCode.eq(prod.code.clone()))
        .filter(stock_transaction::Column::OccurredAt.lte(confirmed_at))
        .filter(stock_transaction::Column::CheckpointId.is_null())
        .exec(txn)
        .await
        .map_err(ServiceError::db_error)?;

    refresh_stock_cache(txn, &prod.code).await?;

    Ok(CheckpointResult {
        checkpoint,
        superseded_transactions: sweep.rows_affected,
        adjustment_delta,
    })
}

/// Re-derives the product's `current_stock` cache from the ledger.
async fn refresh_stock_cache<C: ConnectionTrait>(
    txn: &C,
    product_code: &str,
) -> Result<(), ServiceError> {
    let (now_stock, _) = project_on(txn, product_code, Utc::now()).await?;

    let prod = Products::find_by_id(product_code.to_string())
        .one(txn)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| ServiceError::not_found(format!("Product {}", product_code)))?;

    let mut active: product::ActiveModel = prod.into();
    active.current_stock = Set(now_stock);
    active.updated_at = Set(Some(Utc::now()));
    active.update(txn).await.map_err(ServiceError::db_error)?;

    Ok(())
}
