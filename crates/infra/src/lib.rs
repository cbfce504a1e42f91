//! Infrastructure layer: ledger and cache adapters plus the stock services
//! that coordinate them.

pub mod cache;
pub mod guard;
pub mod insight;
pub mod ledger;
pub mod order_fulfiller;
pub mod service;
pub mod stock_writer;


pub use guard::{GuardError, MutationGuard, MutationPermit};
pub use insight::InsightAggregator;
pub use order_fulfiller::OrderFulfiller;
pub use service::{ServiceConfig, ServiceError, StockService};
pub use stock_writer::{IntakeReport, StockWriter};
