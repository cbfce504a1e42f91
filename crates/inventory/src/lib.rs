//! Inventory domain module.
//!
//! This crate contains the business rules for stock lots, the cache
//! aggregate projection and order fulfillment, implemented purely as
//! deterministic domain logic (no IO, no HTTP, no storage).

pub mod insight;
pub mod lot;
pub mod order;
pub mod product;

pub use insight::{BestSeller, DEFAULT_BEST_SELLER_LIMIT, DEFAULT_INSIGHT_WINDOW, rank_best_sellers};
pub use lot::{LotChange, StockLot, merge_quantity, plan_consumption};
pub use order::{OrderLine, OrderOutcome, OrderRequest, PreCheck};
pub use product::{ProductLine, StockIntake, StockSnapshot};
