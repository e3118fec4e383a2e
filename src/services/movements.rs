use crate::{
    db::DbPool,
    entities::{
        product::{self, Entity as Products},
        stock_transaction::{self, Entity as StockTransactions, TransactionType},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::locks::ProductLocks,
};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set, TransactionError,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Input for appending one movement fact to the transaction log.
#[derive(Debug, Clone)]
pub struct NewMovement {
    pub product_code: String,
    pub transaction_type: TransactionType,
    /// Positive magnitude for IN/OUT/RETURN; signed delta for ADJUST.
    pub quantity: i64,
    /// Defaults to now when unset.
    pub occurred_at: Option<DateTime<Utc>>,
    pub reason: Option<String>,
    pub memo: Option<String>,
    pub location: Option<String>,
    pub created_by: Option<String>,
    /// Optional guard: reject the write if the ledger's stock at write time
    /// differs from what the caller observed.
    pub expected_previous_stock: Option<i64>,
}

impl NewMovement {
    pub fn new(product_code: impl Into<String>, transaction_type: TransactionType, quantity: i64) -> Self {
        Self {
            product_code: product_code.into(),
            transaction_type,
            quantity,
            occurred_at: None,
            reason: None,
            memo: None,
            location: None,
            created_by: None,
            expected_previous_stock: None,
        }
    }

    pub fn occurred_at(mut self, at: DateTime<Utc>) -> Self {
        self.occurred_at = Some(at);
        self
    }

    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn expecting_previous_stock(mut self, stock: i64) -> Self {
        self.expected_previous_stock = Some(stock);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovementResult {
    pub transaction_id: Uuid,
    pub product_code: String,
    pub transaction_type: String,
    pub quantity: i64,
    pub previous_stock: i64,
    pub new_stock: i64,
}

/// Append-only write path of the ledger store.
///
/// Appends are serialized per product code; the transaction snapshot and the
/// product's `current_stock` cache are committed atomically.
#[derive(Clone)]
pub struct InventoryMovementService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    locks: ProductLocks,
    allow_negative_stock: bool,
}

impl InventoryMovementService {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        locks: ProductLocks,
        allow_negative_stock: bool,
    ) -> Self {
        Self {
            db_pool,
            event_sender,
            locks,
            allow_negative_stock,
        }
    }

    /// Records one movement: snapshots previous/new stock, appends the
    /// transaction, and updates the product cache in one DB transaction.
    pub async fn record_movement(&self, input: NewMovement) -> Result<MovementResult, ServiceError> {
        validate_quantity(input.transaction_type, input.quantity)?;

        let lock = self.locks.for_product(&input.product_code);
        let _guard = lock.lock().await;

        let db = self.db_pool.as_ref();
        let allow_negative = self.allow_negative_stock;
        let occurred_at = input.occurred_at.unwrap_or_else(Utc::now);
        let movement = input.clone();

        let result = db
            .transaction::<_, MovementResult, ServiceError>(move |txn| {
                Box::pin(async move {
                    let prod = Products::find_by_id(movement.product_code.clone())
                        .one(txn)
                        .await
                        .map_err(ServiceError::db_error)?
                        .ok_or_else(|| {
                            ServiceError::not_found(format!("Product {}", movement.product_code))
                        })?;

                    let previous_stock = prod.current_stock;

                    if let Some(expected) = movement.expected_previous_stock {
                        if expected != previous_stock {
                            return Err(ServiceError::ValidationError(format!(
                                "Stale stock snapshot for {}: expected {}, ledger has {}",
                                movement.product_code, expected, previous_stock
                            )));
                        }
                    }

                    let effect = movement.transaction_type.effect(movement.quantity);
                    let new_stock = previous_stock + effect;

                    // ADJUST records an observed reality and is exempt from
                    // the negative-stock policy.
                    if new_stock < 0
                        && !allow_negative
                        && movement.transaction_type != TransactionType::Adjust
                    {
                        return Err(ServiceError::ValidationError(format!(
                            "Movement would drive {} stock to {} (available {})",
                            movement.product_code, new_stock, previous_stock
                        )));
                    }

                    verify_snapshot(movement.transaction_type, movement.quantity, previous_stock, new_stock)?;

                    let transaction_id = Uuid::new_v4();
                    let tx = stock_transaction::ActiveModel {
                        id: Set(transaction_id),
                        product_code: Set(movement.product_code.clone()),
                        transaction_type: Set(movement.transaction_type.as_str().to_string()),
                        quantity: Set(movement.quantity),
                        previous_stock: Set(previous_stock),
                        new_stock: Set(new_stock),
                        occurred_at: Set(occurred_at),
                        reason: Set(movement.reason.clone()),
                        memo: Set(movement.memo.clone()),
                        location: Set(movement.location.clone()),
                        created_by: Set(movement.created_by.clone()),
                        affects_current_stock: Set(true),
                        checkpoint_id: Set(None),
                        ..Default::default()
                    };
                    tx.insert(txn).await.map_err(ServiceError::db_error)?;

                    let mut active_prod: product::ActiveModel = prod.into();
                    active_prod.current_stock = Set(new_stock);
                    active_prod.updated_at = Set(Some(Utc::now()));
                    active_prod.update(txn).await.map_err(ServiceError::db_error)?;

                    Ok(MovementResult {
                        transaction_id,
                        product_code: movement.product_code,
                        transaction_type: movement.transaction_type.as_str().to_string(),
                        quantity: movement.quantity,
                        previous_stock,
                        new_stock,
                    })
                })
            })
            .await
            .map_err(|e| match e {
                TransactionError::Connection(db_err) => ServiceError::db_error(db_err),
                TransactionError::Transaction(service_err) => service_err,
            })?;

        info!(
            product_code = %result.product_code,
            transaction_type = %result.transaction_type,
            quantity = result.quantity,
            new_stock = result.new_stock,
            "recorded stock movement"
        );

        self.event_sender
            .send(Event::StockTransactionRecorded {
                transaction_id: result.transaction_id,
                product_code: result.product_code.clone(),
                transaction_type: result.transaction_type.clone(),
                quantity: result.quantity,
                new_stock: result.new_stock,
            })
            .await
            .map_err(ServiceError::EventError)?;

        Ok(result)
    }

    /// Range read over a product's transaction log, newest first.
    pub async fn get_transactions(
        &self,
        product_code: &str,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<stock_transaction::Model>, ServiceError> {
        let db = self.db_pool.as_ref();

        let mut query = StockTransactions::find()
            .filter(stock_transaction::Column::ProductCode.eq(product_code));

        if let Some(from) = from {
            query = query.filter(stock_transaction::Column::OccurredAt.gte(from));
        }
        if let Some(to) = to {
            query = query.filter(stock_transaction::Column::OccurredAt.lte(to));
        }

        query
            .order_by_desc(stock_transaction::Column::OccurredAt)
            .all(db)
            .await
            .map_err(ServiceError::db_error)
    }
}

fn validate_quantity(transaction_type: TransactionType, quantity: i64) -> Result<(), ServiceError> {
    match transaction_type {
        TransactionType::Adjust => {
            if quantity == 0 {
                return Err(ServiceError::InvalidInput(
                    "Adjustment delta must be nonzero".to_string(),
                ));
            }
        }
        _ => {
            if quantity <= 0 {
                return Err(ServiceError::InvalidInput(format!(
                    "Quantity must be positive for {} movements, got {}",
                    transaction_type.as_str(),
                    quantity
                )));
            }
        }
    }
    Ok(())
}

/// Ground-truth arithmetic the store enforces on every insert:
/// `new_stock = previous_stock + effect(type, quantity)`.
pub(crate) fn verify_snapshot(
    transaction_type: TransactionType,
    quantity: i64,
    previous_stock: i64,
    new_stock: i64,
) -> Result<(), ServiceError> {
    let expected = previous_stock + transaction_type.effect(quantity);
    if new_stock != expected {
        return Err(ServiceError::ValidationError(format!(
            "Snapshot arithmetic mismatch: {} + effect({}, {}) = {} but new_stock is {}",
            previous_stock,
            transaction_type.as_str(),
            quantity,
            expected,
            new_stock
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantity_rules_per_type() {
        assert!(validate_quantity(TransactionType::Inbound, 1).is_ok());
        assert!(validate_quantity(TransactionType::Inbound, 0).is_err());
        assert!(validate_quantity(TransactionType::Outbound, -3).is_err());
        assert!(validate_quantity(TransactionType::Adjust, -3).is_ok());
        assert!(validate_quantity(TransactionType::Adjust, 0).is_err());
    }

    #[test]
    fn snapshot_arithmetic_is_enforced() {
        assert!(verify_snapshot(TransactionType::Adjust, 5, 50, 55).is_ok());
        assert!(verify_snapshot(TransactionType::Adjust, 5, 50, 55 + 1).is_err());
        assert!(verify_snapshot(TransactionType::Outbound, 30, 100, 70).is_ok());
        assert!(verify_snapshot(TransactionType::Outbound, 30, 100, 130).is_err());
    }
}
