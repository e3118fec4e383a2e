use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Domain events emitted by the ledger services after a write commits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    StockTransactionRecorded {
        transaction_id: Uuid,
        product_code: String,
        transaction_type: String,
        quantity: i64,
        new_stock: i64,
    },
    CheckpointCreated {
        checkpoint_id: Uuid,
        product_code: String,
        checkpoint_type: String,
        confirmed_stock: i64,
        superseded_transactions: u64,
    },
    CheckpointDeactivated {
        checkpoint_id: Uuid,
        product_code: String,
    },
    DailyLedgerGenerated {
        ledger_date: NaiveDate,
        created: u64,
        failed: u64,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// Drains the event channel and logs each event. External consumers
/// (notification delivery, analytics) subscribe by replacing or wrapping
/// this loop; the core only guarantees the events are emitted.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::StockTransactionRecorded {
                product_code,
                transaction_type,
                quantity,
                new_stock,
                ..
            } => {
                info!(
                    product_code = %product_code,
                    transaction_type = %transaction_type,
                    quantity,
                    new_stock,
                    "stock transaction recorded"
                );
            }
            Event::CheckpointCreated {
                product_code,
                checkpoint_type,
                confirmed_stock,
                superseded_transactions,
                ..
            } => {
                info!(
                    product_code = %product_code,
                    checkpoint_type = %checkpoint_type,
                    confirmed_stock,
                    superseded_transactions,
                    "checkpoint created"
                );
            }
            Event::CheckpointDeactivated {
                checkpoint_id,
                product_code,
            } => {
                warn!(
                    checkpoint_id = %checkpoint_id,
                    product_code = %product_code,
                    "checkpoint deactivated"
                );
            }
            Event::DailyLedgerGenerated {
                ledger_date,
                created,
                failed,
            } => {
                info!(
                    ledger_date = %ledger_date,
                    created,
                    failed,
                    "daily ledger generation finished"
                );
            }
        }
    }

    info!("Event processing loop stopped");
}
