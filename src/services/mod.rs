// Order lifecycle
pub mod completeness;
pub mod order_status;
pub mod orders;
pub mod requirements;

// Stock ledgers
pub mod finished_goods;
pub mod raw_materials;
pub mod stock_ledger;

// Shared building blocks
pub mod audit;
pub mod catalog;
pub mod notifications;
