//! sea-orm models, one per ledger table.
//!
//! Registries, the usage table and the supply history are append-only; only
//! material balances, product stages, timelines and vendor counters are
//! updated in place.

pub mod distributor;
pub mod manufacturer;
pub mod material;
pub mod product;
pub mod product_material_usage;
pub mod product_timeline;
pub mod retailer;
pub mod role_assignment;
pub mod supply_history;
pub mod vendor;
pub mod vendor_performance;
