//! The lot ledger: the authoritative record of products, stock lots and
//! orders.
//!
//! Every mutation runs inside a [`LedgerTx`] obtained from
//! [`LotLedger::begin`]. Nothing a transaction does is visible to other
//! readers until [`LedgerTx::commit`] succeeds; a transaction that is rolled
//! back (or simply dropped) leaves the ledger untouched.
//!
//! ## Error Categories
//!
//! - **Connection**: the backing store could not be reached
//! - **Query**: a statement failed for a reason other than a constraint
//! - **Constraint**: a uniqueness/check constraint rejected the write
//! - **Conflict**: a concurrent transaction committed first
//! - **Decode**: a stored row could not be turned back into a domain value
//! - **LotNotFound**: an update or delete targeted a lot that does not exist

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use stockroom_core::{LotId, OrderId, ProductName, Quantity, UnitPrice};
use stockroom_inventory::{BestSeller, OrderLine, StockLot};

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryLotLedger;
pub use postgres::PostgresLotLedger;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger connection error: {0}")]
    Connection(String),

    #[error("ledger query failed: {0}")]
    Query(String),

    #[error("ledger constraint violated: {0}")]
    Constraint(String),

    #[error("ledger conflict: {0}")]
    Conflict(String),

    #[error("failed to decode ledger row: {0}")]
    Decode(String),

    #[error("lot not found: {0}")]
    LotNotFound(LotId),
}

/// Entry point to the ledger.
#[async_trait]
pub trait LotLedger: Send + Sync {
    /// Open a transaction. All writes go through it.
    async fn begin(&self) -> Result<Box<dyn LedgerTx>, LedgerError>;

    /// Lots of a product as currently committed, cheapest first.
    async fn lots_for(&self, product: &ProductName) -> Result<Vec<StockLot>, LedgerError>;

    /// Products ranked by units ordered in orders created at or after `since`.
    ///
    /// Ordered by summed quantity descending, then name ascending, capped to
    /// `limit`.
    async fn best_sellers_since(
        &self,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<BestSeller>, LedgerError>;
}

/// One open ledger transaction.
#[async_trait]
pub trait LedgerTx: Send {
    /// Record product metadata unless the product already exists. An existing
    /// description is never overwritten.
    async fn insert_product_if_absent(
        &mut self,
        product: &ProductName,
        description: Option<&str>,
    ) -> Result<(), LedgerError>;

    /// The lot holding `product` at exactly `price`, if any.
    async fn find_lot(
        &mut self,
        product: &ProductName,
        price: UnitPrice,
    ) -> Result<Option<StockLot>, LedgerError>;

    async fn insert_lot(
        &mut self,
        product: &ProductName,
        price: UnitPrice,
        quantity: Quantity,
        at: DateTime<Utc>,
    ) -> Result<LotId, LedgerError>;

    async fn set_lot_quantity(
        &mut self,
        lot: LotId,
        quantity: Quantity,
        at: DateTime<Utc>,
    ) -> Result<(), LedgerError>;

    async fn delete_lot(&mut self, lot: LotId) -> Result<(), LedgerError>;

    /// Delete every lot of `product`, returning how many were removed.
    async fn delete_lots_for(&mut self, product: &ProductName) -> Result<u64, LedgerError>;

    /// Lots of `product` as seen by this transaction, ascending by price.
    async fn lots_by_price(&mut self, product: &ProductName) -> Result<Vec<StockLot>, LedgerError>;

    /// Create an order header plus one ordered-product row per line.
    async fn create_order(
        &mut self,
        created_at: DateTime<Utc>,
        lines: &[OrderLine],
    ) -> Result<OrderId, LedgerError>;

    async fn commit(self: Box<Self>) -> Result<(), LedgerError>;

    async fn rollback(self: Box<Self>) -> Result<(), LedgerError>;
}

#[async_trait]
impl<L> LotLedger for Arc<L>
where
    L: LotLedger + ?Sized,
{
    async fn begin(&self) -> Result<Box<dyn LedgerTx>, LedgerError> {
        (**self).begin().await
    }

    async fn lots_for(&self, product: &ProductName) -> Result<Vec<StockLot>, LedgerError> {
        (**self).lots_for(product).await
    }

    async fn best_sellers_since(
        &self,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<BestSeller>, LedgerError> {
        (**self).best_sellers_since(since, limit).await
    }
}
