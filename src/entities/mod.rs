pub mod bom_line;
pub mod daily_ledger;
pub mod product;
pub mod stock_checkpoint;
pub mod stock_transaction;

pub use bom_line::Entity as BomLines;
pub use daily_ledger::Entity as DailyLedgers;
pub use product::Entity as Products;
pub use stock_checkpoint::Entity as StockCheckpoints;
pub use stock_transaction::Entity as StockTransactions;
