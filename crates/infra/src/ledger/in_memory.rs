use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use stockroom_core::{LotId, OrderId, ProductName, Quantity, UnitPrice};
use stockroom_inventory::{rank_best_sellers, BestSeller, OrderLine, StockLot};

use super::{LedgerError, LedgerTx, LotLedger};

#[derive(Debug, Clone)]
struct StoredOrder {
    created_at: DateTime<Utc>,
    lines: Vec<OrderLine>,
}

#[derive(Debug, Clone, Default)]
struct LedgerState {
    /// Bumped on every commit; a transaction only commits on the version it
    /// started from.
    version: u64,
    products: BTreeMap<ProductName, Option<String>>,
    lots: BTreeMap<LotId, StockLot>,
    orders: BTreeMap<OrderId, StoredOrder>,
    last_lot_id: i64,
    last_order_id: i64,
}

impl LedgerState {
    fn lots_by_price(&self, product: &ProductName) -> Vec<StockLot> {
        let mut lots: Vec<StockLot> = self
            .lots
            .values()
            .filter(|lot| &lot.product == product)
            .cloned()
            .collect();
        lots.sort_by_key(|lot| (lot.price, lot.id));
        lots
    }
}

/// In-memory lot ledger.
///
/// Intended for tests/dev. A transaction works on a private copy of the state
/// and swaps it in on commit, so readers never observe a half-applied batch.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLotLedger {
    state: Arc<RwLock<LedgerState>>,
}

impl InMemoryLotLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Description recorded for a product, `None` when the product is unknown.
    pub fn product_description(&self, product: &ProductName) -> Option<Option<String>> {
        self.state
            .read()
            .ok()
            .and_then(|s| s.products.get(product).cloned())
    }

    /// Number of committed orders.
    pub fn order_count(&self) -> usize {
        self.state.read().map(|s| s.orders.len()).unwrap_or(0)
    }

    /// Lines of a committed order.
    pub fn order_lines(&self, order: OrderId) -> Option<Vec<OrderLine>> {
        self.state
            .read()
            .ok()
            .and_then(|s| s.orders.get(&order).map(|o| o.lines.clone()))
    }

    fn read_state(&self) -> Result<std::sync::RwLockReadGuard<'_, LedgerState>, LedgerError> {
        self.state
            .read()
            .map_err(|_| LedgerError::Connection("lock poisoned".to_string()))
    }
}

#[async_trait]
impl LotLedger for InMemoryLotLedger {
    async fn begin(&self) -> Result<Box<dyn LedgerTx>, LedgerError> {
        let working = self.read_state()?.clone();
        Ok(Box::new(InMemoryLedgerTx {
            shared: Arc::clone(&self.state),
            base_version: working.version,
            working,
        }))
    }

    async fn lots_for(&self, product: &ProductName) -> Result<Vec<StockLot>, LedgerError> {
        Ok(self.read_state()?.lots_by_price(product))
    }

    async fn best_sellers_since(
        &self,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<BestSeller>, LedgerError> {
        let state = self.read_state()?;
        let lines = state
            .orders
            .values()
            .filter(|order| order.created_at >= since)
            .flat_map(|order| order.lines.iter())
            .map(|line| (line.product.clone(), line.quantity));
        Ok(rank_best_sellers(lines, limit))
    }
}

struct InMemoryLedgerTx {
    shared: Arc<RwLock<LedgerState>>,
    base_version: u64,
    working: LedgerState,
}

#[async_trait]
impl LedgerTx for InMemoryLedgerTx {
    async fn insert_product_if_absent(
        &mut self,
        product: &ProductName,
        description: Option<&str>,
    ) -> Result<(), LedgerError> {
        self.working
            .products
            .entry(product.clone())
            .or_insert_with(|| description.map(str::to_string));
        Ok(())
    }

    async fn find_lot(
        &mut self,
        product: &ProductName,
        price: UnitPrice,
    ) -> Result<Option<StockLot>, LedgerError> {
        Ok(self
            .working
            .lots
            .values()
            .find(|lot| &lot.product == product && lot.price == price)
            .cloned())
    }

    async fn insert_lot(
        &mut self,
        product: &ProductName,
        price: UnitPrice,
        quantity: Quantity,
        at: DateTime<Utc>,
    ) -> Result<LotId, LedgerError> {
        if quantity <= 0 || price <= 0 {
            return Err(LedgerError::Constraint(format!(
                "lot of '{product}' needs positive price and quantity (got {price}, {quantity})"
            )));
        }
        if !self.working.products.contains_key(product) {
            return Err(LedgerError::Constraint(format!("unknown product '{product}'")));
        }
        if self
            .working
            .lots
            .values()
            .any(|lot| &lot.product == product && lot.price == price)
        {
            return Err(LedgerError::Constraint(format!(
                "lot of '{product}' at price {price} already exists"
            )));
        }

        self.working.last_lot_id += 1;
        let id = LotId::new(self.working.last_lot_id);
        self.working.lots.insert(
            id,
            StockLot {
                id,
                product: product.clone(),
                price,
                quantity,
                updated_at: at,
            },
        );
        Ok(id)
    }

    async fn set_lot_quantity(
        &mut self,
        lot: LotId,
        quantity: Quantity,
        at: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        if quantity <= 0 {
            return Err(LedgerError::Constraint(format!(
                "lot {lot} cannot hold {quantity} units"
            )));
        }
        let stored = self
            .working
            .lots
            .get_mut(&lot)
            .ok_or(LedgerError::LotNotFound(lot))?;
        stored.quantity = quantity;
        stored.updated_at = at;
        Ok(())
    }

    async fn delete_lot(&mut self, lot: LotId) -> Result<(), LedgerError> {
        self.working
            .lots
            .remove(&lot)
            .map(|_| ())
            .ok_or(LedgerError::LotNotFound(lot))
    }

    async fn delete_lots_for(&mut self, product: &ProductName) -> Result<u64, LedgerError> {
        let before = self.working.lots.len();
        self.working.lots.retain(|_, lot| &lot.product != product);
        Ok((before - self.working.lots.len()) as u64)
    }

    async fn lots_by_price(&mut self, product: &ProductName) -> Result<Vec<StockLot>, LedgerError> {
        Ok(self.working.lots_by_price(product))
    }

    async fn create_order(
        &mut self,
        created_at: DateTime<Utc>,
        lines: &[OrderLine],
    ) -> Result<OrderId, LedgerError> {
        self.working.last_order_id += 1;
        let id = OrderId::new(self.working.last_order_id);
        self.working.orders.insert(
            id,
            StoredOrder {
                created_at,
                lines: lines.to_vec(),
            },
        );
        Ok(id)
    }

    async fn commit(self: Box<Self>) -> Result<(), LedgerError> {
        let InMemoryLedgerTx {
            shared,
            base_version,
            mut working,
        } = *self;
        let mut state = shared
            .write()
            .map_err(|_| LedgerError::Connection("lock poisoned".to_string()))?;

        if state.version != base_version {
            return Err(LedgerError::Conflict(format!(
                "ledger moved from version {} to {} during the transaction",
                base_version, state.version
            )));
        }

        working.version = base_version + 1;
        *state = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), LedgerError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> ProductName {
        ProductName::parse(s).unwrap()
    }

    #[tokio::test]
    async fn uncommitted_writes_are_invisible() {
        let ledger = InMemoryLotLedger::new();
        let apple = name("apple");

        let mut tx = ledger.begin().await.unwrap();
        tx.insert_product_if_absent(&apple, None).await.unwrap();
        tx.insert_lot(&apple, 5, 10, Utc::now()).await.unwrap();
        assert!(ledger.lots_for(&apple).await.unwrap().is_empty());

        tx.rollback().await.unwrap();
        assert!(ledger.lots_for(&apple).await.unwrap().is_empty());
        assert_eq!(ledger.product_description(&apple), None);
    }

    #[tokio::test]
    async fn committed_lots_are_listed_cheapest_first() {
        let ledger = InMemoryLotLedger::new();
        let apple = name("apple");

        let mut tx = ledger.begin().await.unwrap();
        tx.insert_product_if_absent(&apple, Some("red")).await.unwrap();
        tx.insert_lot(&apple, 8, 10, Utc::now()).await.unwrap();
        tx.insert_lot(&apple, 5, 3, Utc::now()).await.unwrap();
        tx.commit().await.unwrap();

        let prices: Vec<UnitPrice> = ledger
            .lots_for(&apple)
            .await
            .unwrap()
            .iter()
            .map(|l| l.price)
            .collect();
        assert_eq!(prices, vec![5, 8]);
        assert_eq!(ledger.product_description(&apple), Some(Some("red".to_string())));
    }

    #[tokio::test]
    async fn duplicate_price_lot_is_a_constraint_error() {
        let ledger = InMemoryLotLedger::new();
        let apple = name("apple");

        let mut tx = ledger.begin().await.unwrap();
        tx.insert_product_if_absent(&apple, None).await.unwrap();
        tx.insert_lot(&apple, 5, 1, Utc::now()).await.unwrap();
        let err = tx.insert_lot(&apple, 5, 1, Utc::now()).await.unwrap_err();
        assert!(matches!(err, LedgerError::Constraint(_)));
    }

    #[tokio::test]
    async fn interleaved_commit_is_a_conflict() {
        let ledger = InMemoryLotLedger::new();
        let apple = name("apple");

        let mut first = ledger.begin().await.unwrap();
        let mut second = ledger.begin().await.unwrap();
        first.insert_product_if_absent(&apple, None).await.unwrap();
        second.insert_product_if_absent(&apple, None).await.unwrap();

        first.commit().await.unwrap();
        let err = second.commit().await.unwrap_err();
        assert!(matches!(err, LedgerError::Conflict(_)));
    }

    #[tokio::test]
    async fn best_sellers_only_count_orders_in_window() {
        let ledger = InMemoryLotLedger::new();
        let now = Utc::now();
        let old = now - chrono::Duration::hours(2);

        let mut tx = ledger.begin().await.unwrap();
        tx.create_order(old, &[OrderLine { product: name("pear"), quantity: 50 }])
            .await
            .unwrap();
        tx.create_order(now, &[OrderLine { product: name("apple"), quantity: 2 }])
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let since = now - chrono::Duration::hours(1);
        let ranked = ledger.best_sellers_since(since, 5).await.unwrap();
        assert_eq!(ranked, vec![BestSeller { name: name("apple"), quantity: 2 }]);
    }
}
