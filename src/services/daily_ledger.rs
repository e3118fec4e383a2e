use crate::{
    db::DbPool,
    entities::{
        daily_ledger::{self, ledger_row_id, Entity as DailyLedgers},
        product::{self, Entity as Products},
        stock_transaction::{self, Entity as StockTransactions, TransactionType},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::{locks::ProductLocks, projection::project_on},
};
use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use futures::stream::{self, StreamExt};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set, TransactionError,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// An ADJUST row whose `quantity` disagrees with its snapshot difference.
/// Rows written under the legacy absolute-quantity convention surface here;
/// the snapshot difference stays authoritative for ledger math and the
/// mismatch is reported, never silently patched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdjustmentMismatch {
    pub transaction_id: Uuid,
    pub product_code: String,
    pub quantity: i64,
    pub snapshot_delta: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductGenerationError {
    pub product_code: String,
    pub error: String,
    /// True for transient failures (database, event delivery) where rerunning
    /// the same generation may succeed; false for conflicts and bad data.
    pub retryable: bool,
}

/// Outcome of one generation run. Per-product failures do not abort the
/// run; callers distinguish full, partial, and failed runs from the counts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationReport {
    pub ledger_date: NaiveDate,
    pub created: u64,
    pub errors: Vec<ProductGenerationError>,
    pub flagged_adjustments: Vec<AdjustmentMismatch>,
}

impl GenerationReport {
    pub fn fully_succeeded(&self) -> bool {
        self.errors.is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DailyLedgerSummary {
    pub ledger_date: Option<NaiveDate>,
    pub total_products: u64,
    pub total_inbound: i64,
    pub total_outbound: i64,
    pub total_adjustments: i64,
}

/// Same-day movement totals for one product.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DayTotals {
    pub total_inbound: i64,
    pub total_outbound: i64,
    pub adjustments: i64,
}

/// Closes the books: one ledger row per active product per day, chaining
/// each day's beginning stock to the previous day's ending stock.
#[derive(Clone)]
pub struct DailyLedgerService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    locks: ProductLocks,
    concurrency: usize,
}

impl DailyLedgerService {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        locks: ProductLocks,
        concurrency: usize,
    ) -> Self {
        Self {
            db_pool,
            event_sender,
            locks,
            concurrency: concurrency.max(1),
        }
    }

    /// Generates (or with `regenerate`, rebuilds) the ledger rows for one
    /// calendar day across all active products.
    ///
    /// Products are processed in a bounded worker pool; a failure on one
    /// product is collected and the rest continue. Running twice over
    /// unchanged transactions yields identical rows.
    pub async fn generate(
        &self,
        ledger_date: NaiveDate,
        regenerate: bool,
    ) -> Result<GenerationReport, ServiceError> {
        let products = Products::find()
            .filter(product::Column::IsActive.eq(true))
            .order_by_asc(product::Column::Code)
            .all(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)?;

        info!(
            ledger_date = %ledger_date,
            products = products.len(),
            regenerate,
            "starting daily ledger generation"
        );

        let outcomes: Vec<(String, Result<Vec<AdjustmentMismatch>, ServiceError>)> =
            stream::iter(products)
                .map(|prod| {
                    let svc = self.clone();
                    async move {
                        let code = prod.code.clone();
                        let outcome = svc.generate_for_product(prod, ledger_date, regenerate).await;
                        (code, outcome)
                    }
                })
                .buffer_unordered(self.concurrency)
                .collect()
                .await;

        let mut report = GenerationReport {
            ledger_date,
            created: 0,
            errors: Vec::new(),
            flagged_adjustments: Vec::new(),
        };

        for (product_code, outcome) in outcomes {
            match outcome {
                Ok(mismatches) => {
                    report.created += 1;
                    report.flagged_adjustments.extend(mismatches);
                }
                Err(e) => {
                    let retryable = !e.is_permanent();
                    warn!(
                        product_code = %product_code,
                        error = %e,
                        retryable,
                        "daily ledger generation failed for product"
                    );
                    report.errors.push(ProductGenerationError {
                        product_code,
                        error: e.to_string(),
                        retryable,
                    });
                }
            }
        }

        self.event_sender
            .send(Event::DailyLedgerGenerated {
                ledger_date,
                created: report.created,
                failed: report.errors.len() as u64,
            })
            .await
            .map_err(ServiceError::EventError)?;

        Ok(report)
    }

    async fn generate_for_product(
        &self,
        prod: product::Model,
        ledger_date: NaiveDate,
        regenerate: bool,
    ) -> Result<Vec<AdjustmentMismatch>, ServiceError> {
        // Serializes against movement appends and checkpoint creation for
        // this product so the day is not read mid-reconciliation.
        let lock = self.locks.for_product(&prod.code);
        let _guard = lock.lock().await;

        let db = self.db_pool.as_ref();
        let (day_start, day_end) = day_bounds(ledger_date)?;

        db.transaction::<_, Vec<AdjustmentMismatch>, ServiceError>(move |txn| {
            Box::pin(async move {
                let existing = DailyLedgers::find()
                    .filter(daily_ledger::Column::LedgerDate.eq(ledger_date))
                    .filter(daily_ledger::Column::ProductCode.eq(prod.code.clone()))
                    .one(txn)
                    .await
                    .map_err(ServiceError::db_error)?;

                if existing.is_some() && !regenerate {
                    return Err(ServiceError::Conflict(format!(
                        "Ledger for {} on {} already exists; pass regenerate to rebuild it",
                        prod.code, ledger_date
                    )));
                }

                // Prior day's ending stock is the anchor. Without a prior
                // ledger the projector supplies the stock as of the instant
                // the day began, so the day's own transactions are not
                // double-counted. Assumption: transactions before the first
                // ledger day have not been superseded by a checkpoint
                // confirmed after it; the chained path is unaffected.
                let prior_row = match prior_day(ledger_date)? {
                    Some(prior_date) => DailyLedgers::find()
                        .filter(daily_ledger::Column::LedgerDate.eq(prior_date))
                        .filter(daily_ledger::Column::ProductCode.eq(prod.code.clone()))
                        .one(txn)
                        .await
                        .map_err(ServiceError::db_error)?,
                    None => None,
                };
                let beginning_stock = match prior_row {
                    Some(row) => row.ending_stock,
                    None => project_on(txn, &prod.code, day_start).await?.0,
                };

                // Date-scoped on purpose: the daily rollup counts every
                // transaction of the day, superseded or not. This diverges
                // from the projector's checkpoint-scoped semantics.
                let transactions = StockTransactions::find()
                    .filter(stock_transaction::Column::ProductCode.eq(prod.code.clone()))
                    .filter(stock_transaction::Column::OccurredAt.gte(day_start))
                    .filter(stock_transaction::Column::OccurredAt.lt(day_end))
                    .order_by_asc(stock_transaction::Column::OccurredAt)
                    .all(txn)
                    .await
                    .map_err(ServiceError::db_error)?;

                let (totals, mismatches) = fold_day(&transactions)?;
                for mismatch in &mismatches {
                    warn!(
                        transaction_id = %mismatch.transaction_id,
                        product_code = %mismatch.product_code,
                        quantity = mismatch.quantity,
                        snapshot_delta = mismatch.snapshot_delta,
                        "ADJUST quantity disagrees with snapshot delta; using snapshot delta"
                    );
                }

                let ending_stock = beginning_stock + totals.total_inbound
                    - totals.total_outbound
                    + totals.adjustments;

                if existing.is_some() {
                    DailyLedgers::delete_many()
                        .filter(daily_ledger::Column::LedgerDate.eq(ledger_date))
                        .filter(daily_ledger::Column::ProductCode.eq(prod.code.clone()))
                        .exec(txn)
                        .await
                        .map_err(ServiceError::db_error)?;
                }

                let row = daily_ledger::ActiveModel {
                    id: Set(ledger_row_id(ledger_date, &prod.code)),
                    ledger_date: Set(ledger_date),
                    product_code: Set(prod.code.clone()),
                    beginning_stock: Set(beginning_stock),
                    total_inbound: Set(totals.total_inbound),
                    total_outbound: Set(totals.total_outbound),
                    adjustments: Set(totals.adjustments),
                    ending_stock: Set(ending_stock),
                };
                row.insert(txn).await.map_err(ServiceError::db_error)?;

                Ok(mismatches)
            })
        })
        .await
        .map_err(|e| match e {
            TransactionError::Connection(db_err) => ServiceError::db_error(db_err),
            TransactionError::Transaction(service_err) => service_err,
        })
    }

    /// Aggregate totals across all products for a date. Zero-valued when no
    /// ledgers exist for the date.
    pub async fn summarize(&self, ledger_date: NaiveDate) -> Result<DailyLedgerSummary, ServiceError> {
        let rows = self.get_ledgers(ledger_date).await?;

        let mut summary = DailyLedgerSummary {
            ledger_date: Some(ledger_date),
            ..Default::default()
        };
        for row in &rows {
            summary.total_products += 1;
            summary.total_inbound += row.total_inbound;
            summary.total_outbound += row.total_outbound;
            summary.total_adjustments += row.adjustments;
        }

        Ok(summary)
    }

    pub async fn get_ledgers(
        &self,
        ledger_date: NaiveDate,
    ) -> Result<Vec<daily_ledger::Model>, ServiceError> {
        DailyLedgers::find()
            .filter(daily_ledger::Column::LedgerDate.eq(ledger_date))
            .order_by_asc(daily_ledger::Column::ProductCode)
            .all(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)
    }
}

fn day_bounds(date: NaiveDate) -> Result<(DateTime<Utc>, DateTime<Utc>), ServiceError> {
    let start = date.and_time(NaiveTime::MIN).and_utc();
    let end = date
        .checked_add_days(Days::new(1))
        .ok_or_else(|| ServiceError::InvalidInput(format!("Date {} is out of range", date)))?
        .and_time(NaiveTime::MIN)
        .and_utc();
    Ok((start, end))
}

fn prior_day(date: NaiveDate) -> Result<Option<NaiveDate>, ServiceError> {
    Ok(date.pred_opt())
}

/// Aggregates one day of transactions by type.
///
/// Inbound and outbound sum the `quantity` field; adjustments sum the
/// snapshot difference `new_stock - previous_stock`, which survives the
/// historical absolute-vs-relative quantity ambiguity on old ADJUST rows.
pub(crate) fn fold_day(
    transactions: &[stock_transaction::Model],
) -> Result<(DayTotals, Vec<AdjustmentMismatch>), ServiceError> {
    let mut totals = DayTotals::default();
    let mut mismatches = Vec::new();

    for tx in transactions {
        let transaction_type = tx.kind().ok_or_else(|| {
            ServiceError::ConsistencyError(format!(
                "Transaction {} has unknown type '{}'",
                tx.id, tx.transaction_type
            ))
        })?;

        match transaction_type {
            TransactionType::Inbound | TransactionType::Return => {
                totals.total_inbound += tx.quantity;
            }
            TransactionType::Outbound => {
                totals.total_outbound += tx.quantity;
            }
            TransactionType::Adjust => {
                let snapshot_delta = tx.new_stock - tx.previous_stock;
                if snapshot_delta != tx.quantity {
                    mismatches.push(AdjustmentMismatch {
                        transaction_id: tx.id,
                        product_code: tx.product_code.clone(),
                        quantity: tx.quantity,
                        snapshot_delta,
                    });
                }
                totals.adjustments += snapshot_delta;
            }
        }
    }

    Ok((totals, mismatches))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn tx(
        transaction_type: TransactionType,
        quantity: i64,
        previous_stock: i64,
        new_stock: i64,
    ) -> stock_transaction::Model {
        stock_transaction::Model {
            id: Uuid::new_v4(),
            product_code: "SKU-1".to_string(),
            transaction_type: transaction_type.as_str().to_string(),
            quantity,
            previous_stock,
            new_stock,
            occurred_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
            reason: None,
            memo: None,
            location: None,
            created_by: None,
            affects_current_stock: true,
            checkpoint_id: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn totals_split_by_type() {
        let day = [
            tx(TransactionType::Inbound, 100, 0, 100),
            tx(TransactionType::Return, 5, 100, 105),
            tx(TransactionType::Outbound, 30, 105, 75),
            tx(TransactionType::Adjust, -5, 75, 70),
        ];
        let (totals, mismatches) = fold_day(&day).unwrap();
        assert_eq!(totals.total_inbound, 105);
        assert_eq!(totals.total_outbound, 30);
        assert_eq!(totals.adjustments, -5);
        assert!(mismatches.is_empty());
    }

    #[test]
    fn adjustment_uses_snapshot_delta_not_quantity() {
        // Legacy row written under the absolute-quantity convention:
        // quantity holds the absolute stock, snapshots hold the truth.
        let day = [tx(TransactionType::Adjust, 55, 50, 55)];
        let (totals, mismatches) = fold_day(&day).unwrap();
        assert_eq!(totals.adjustments, 5);
        assert_eq!(mismatches.len(), 1);
        assert_eq!(mismatches[0].quantity, 55);
        assert_eq!(mismatches[0].snapshot_delta, 5);
    }

    #[test]
    fn unknown_type_is_a_consistency_error() {
        let mut bad = tx(TransactionType::Inbound, 1, 0, 1);
        bad.transaction_type = "TRANSFER".to_string();
        assert!(fold_day(&[bad]).is_err());
    }

    fn movement_strategy() -> impl Strategy<Value = (u8, i64)> {
        (0u8..4, 1i64..10_000).prop_map(|(kind, qty)| match kind {
            // ADJUST deltas may be negative
            3 => (kind, if qty % 2 == 0 { qty } else { -qty }),
            _ => (kind, qty),
        })
    }

    proptest! {
        /// Replaying any chained day of movements satisfies the ledger
        /// identity: ending = beginning + inbound - outbound + adjustments.
        #[test]
        fn ledger_identity_holds(
            beginning in -100_000i64..100_000,
            movements in proptest::collection::vec(movement_strategy(), 0..40),
        ) {
            let mut running = beginning;
            let mut day = Vec::new();
            for (kind, qty) in movements {
                let transaction_type = match kind {
                    0 => TransactionType::Inbound,
                    1 => TransactionType::Outbound,
                    2 => TransactionType::Return,
                    _ => TransactionType::Adjust,
                };
                let previous = running;
                running += transaction_type.effect(qty);
                day.push(tx(transaction_type, qty, previous, running));
            }

            let (totals, mismatches) = fold_day(&day).unwrap();
            prop_assert!(mismatches.is_empty());
            prop_assert_eq!(
                beginning + totals.total_inbound - totals.total_outbound + totals.adjustments,
                running
            );
        }
    }
}
