//! `StockService`: the single entry point the boundary talks to.
//!
//! Wires the stock writer, order fulfiller and insight aggregator to one
//! ledger and one cache, and serializes the two mutating paths through the
//! [`MutationGuard`].

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tracing::{instrument, warn};

use stockroom_core::DomainError;
use stockroom_inventory::{
    BestSeller, OrderOutcome, OrderRequest, ProductLine, StockSnapshot, DEFAULT_BEST_SELLER_LIMIT,
    DEFAULT_INSIGHT_WINDOW,
};

use crate::cache::{CacheError, CacheMirror};
use crate::guard::{GuardError, MutationGuard};
use crate::insight::InsightAggregator;
use crate::ledger::{LedgerError, LedgerTx, LotLedger};
use crate::order_fulfiller::OrderFulfiller;
use crate::stock_writer::{IntakeReport, StockWriter};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Busy(#[from] GuardError),
}

impl ServiceError {
    /// Whether the caller sent something the domain rejects (as opposed to a
    /// store failure).
    pub fn is_validation(&self) -> bool {
        matches!(self, ServiceError::Domain(DomainError::Validation(_)))
    }

    pub fn is_busy(&self) -> bool {
        matches!(self, ServiceError::Busy(_))
    }
}

/// Roll `tx` back after `err`, keeping `err` as the reported cause.
pub(crate) async fn abort(tx: Box<dyn LedgerTx>, err: ServiceError) -> ServiceError {
    if let Err(rollback_err) = tx.rollback().await {
        warn!(error = %rollback_err, cause = %err, "ledger rollback failed");
    }
    err
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Longest a mutation waits for the guard; `None` waits indefinitely.
    pub lock_timeout: Option<Duration>,
    pub insight_window: Duration,
    pub best_seller_limit: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            lock_timeout: None,
            insight_window: DEFAULT_INSIGHT_WINDOW,
            best_seller_limit: DEFAULT_BEST_SELLER_LIMIT,
        }
    }
}

pub struct StockService {
    writer: StockWriter,
    fulfiller: OrderFulfiller,
    insights: InsightAggregator,
    cache: Arc<dyn CacheMirror>,
    guard: MutationGuard,
}

impl StockService {
    pub fn new(
        ledger: Arc<dyn LotLedger>,
        cache: Arc<dyn CacheMirror>,
        config: ServiceConfig,
    ) -> Self {
        Self {
            writer: StockWriter::new(Arc::clone(&ledger), Arc::clone(&cache)),
            fulfiller: OrderFulfiller::new(Arc::clone(&ledger), Arc::clone(&cache)),
            insights: InsightAggregator::new(ledger, config.insight_window, config.best_seller_limit),
            cache,
            guard: MutationGuard::new(config.lock_timeout),
        }
    }

    /// Intake a batch of product lines under the mutation guard.
    pub async fn add_stock(&self, lines: Vec<ProductLine>) -> Result<IntakeReport, ServiceError> {
        let _permit = self.guard.acquire("intake").await?;
        self.writer.intake(lines).await
    }

    /// Every cached aggregate, ordered by product name.
    #[instrument(skip(self), err)]
    pub async fn available(&self) -> Result<Vec<StockSnapshot>, ServiceError> {
        Ok(self.cache.list().await?)
    }

    /// Fulfill an order under the mutation guard.
    pub async fn order(&self, request: &OrderRequest) -> Result<OrderOutcome, ServiceError> {
        let _permit = self.guard.acquire("order").await?;
        self.fulfiller.fulfill(request, Utc::now()).await
    }

    pub async fn best_sellers(&self) -> Result<Vec<BestSeller>, ServiceError> {
        self.insights.best_sellers().await
    }

    pub fn insights(&self) -> &InsightAggregator {
        &self.insights
    }

    pub fn guard(&self) -> &MutationGuard {
        &self.guard
    }
}
