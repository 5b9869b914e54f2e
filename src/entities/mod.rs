// Orders and their audit trail
pub mod order;
pub mod order_history;
pub mod order_media;

// Catalog / reference data
pub mod color;
pub mod dealer;
pub mod factory;
pub mod material_item;
pub mod product_model;
pub mod stock_location;

// Stock ledgers
pub mod finished_goods_stock;
pub mod finished_goods_txn;
pub mod material_stock;
pub mod material_txn;
pub mod stock_txn_kind;
