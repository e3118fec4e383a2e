//! Stock Ledger Core
//!
//! Tracks per-product inventory through an append-only transaction log,
//! closes the books into daily ledger snapshots, force-corrects stock via
//! checkpoints that supersede (never delete) prior history, and derives
//! set-product availability from component stock.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
#[allow(elided_lifetimes_in_paths)]
pub mod migrator;
pub mod services;

use sea_orm::DatabaseConnection;
use std::sync::Arc;

pub use errors::ServiceError;

/// Wired service set sharing one pool, one event channel, and one
/// per-product lock table.
#[derive(Clone)]
pub struct AppServices {
    pub movements: services::InventoryMovementService,
    pub projection: services::StockProjectionService,
    pub checkpoints: services::CheckpointService,
    pub daily_ledger: services::DailyLedgerService,
    pub bom: services::BomService,
}

/// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: Arc<events::EventSender>,
    pub services: AppServices,
}

impl AppState {
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: config::AppConfig,
        event_sender: Arc<events::EventSender>,
    ) -> Self {
        let locks = services::ProductLocks::new();

        let services = AppServices {
            movements: services::InventoryMovementService::new(
                db.clone(),
                event_sender.clone(),
                locks.clone(),
                config.allow_negative_stock,
            ),
            projection: services::StockProjectionService::new(db.clone()),
            checkpoints: services::CheckpointService::new(
                db.clone(),
                event_sender.clone(),
                locks.clone(),
            ),
            daily_ledger: services::DailyLedgerService::new(
                db.clone(),
                event_sender.clone(),
                locks,
                config.generation_concurrency,
            ),
            bom: services::BomService::new(db.clone()),
        };

        Self {
            db,
            config,
            event_sender,
            services,
        }
    }
}
