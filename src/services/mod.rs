pub mod bom;
pub mod checkpoints;
pub mod daily_ledger;
pub mod locks;
pub mod movements;
pub mod projection;

pub use bom::BomService;
pub use checkpoints::CheckpointService;
pub use daily_ledger::DailyLedgerService;
pub use locks::ProductLocks;
pub use movements::InventoryMovementService;
pub use projection::StockProjectionService;
