//! Order fulfillment: pre-check against the cache, consume ledger lots
//! cheapest first, record the order, then mirror the remaining totals.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};

use stockroom_core::{DomainError, OrderId, ProductName};
use stockroom_inventory::{
    plan_consumption, LotChange, OrderLine, OrderOutcome, OrderRequest, PreCheck, StockSnapshot,
};

use crate::cache::CacheMirror;
use crate::ledger::{LedgerTx, LotLedger};
use crate::service::{abort, ServiceError};

pub struct OrderFulfiller {
    ledger: Arc<dyn LotLedger>,
    cache: Arc<dyn CacheMirror>,
}

/// Cache state to publish once the order commits: `None` removes the entry.
type StagedSnapshot = (ProductName, Option<StockSnapshot>);

impl OrderFulfiller {
    pub fn new(ledger: Arc<dyn LotLedger>, cache: Arc<dyn CacheMirror>) -> Self {
        Self { ledger, cache }
    }

    /// Fulfill `request` as of `now`.
    ///
    /// Every product must pass the cache pre-check before anything is
    /// written; otherwise the order is rejected with the full list of
    /// unavailable products. Past the pre-check, any failure before the
    /// commit rolls the whole order back. A cache write failing after the
    /// commit is reported as an error but the order stands.
    ///
    /// Callers must hold the mutation guard.
    #[instrument(skip(self, request), fields(line_count = request.len()), err)]
    pub async fn fulfill(
        &self,
        request: &OrderRequest,
        now: DateTime<Utc>,
    ) -> Result<OrderOutcome, ServiceError> {
        if request.is_empty() {
            return Err(DomainError::validation("order has no lines").into());
        }

        let mut check = PreCheck::new();
        for (name, requested) in request.iter() {
            let on_hand = match ProductName::parse(name) {
                Ok(product) if requested > 0 => self.cache.get(&product).await?.map(|s| s.quantity),
                _ => None,
            };
            check.record(name, requested, on_hand);
        }
        if !check.passed() {
            let unavailable = check.into_unavailable();
            info!(?unavailable, "order rejected by availability pre-check");
            return Ok(OrderOutcome::Rejected { unavailable });
        }

        let lines = request.to_lines()?;
        let mut tx = self.ledger.begin().await?;
        let (order_id, staged) = match self.consume(tx.as_mut(), &lines, now).await {
            Ok(done) => done,
            Err(err) => return Err(abort(tx, err).await),
        };
        tx.commit().await?;
        info!(order_id = %order_id, "order committed");

        self.publish(&staged).await?;

        Ok(OrderOutcome::Placed {
            order_id,
            ordered: lines.into_iter().map(|line| line.product).collect(),
        })
    }

    async fn consume(
        &self,
        tx: &mut dyn LedgerTx,
        lines: &[OrderLine],
        now: DateTime<Utc>,
    ) -> Result<(OrderId, Vec<StagedSnapshot>), ServiceError> {
        let order_id = tx.create_order(now, lines).await?;
        let mut staged = Vec::with_capacity(lines.len());

        for line in lines {
            // Re-read under the guard; the pre-check result may be stale.
            let cached = self.cache.get(&line.product).await?;
            let available = cached.as_ref().map_or(0, |s| s.quantity);
            let snapshot = match cached {
                Some(snapshot) if available >= line.quantity => snapshot,
                _ => {
                    return Err(DomainError::insufficient(
                        line.product.as_str(),
                        line.quantity,
                        available,
                    )
                    .into());
                }
            };

            let remaining = snapshot.after_consumption(line.quantity);
            if remaining.is_none() {
                tx.delete_lots_for(&line.product).await?;
            } else {
                let lots = tx.lots_by_price(&line.product).await?;
                let changes = plan_consumption(&lots, line.quantity).map_err(|err| match err {
                    DomainError::InsufficientQuantity {
                        requested,
                        available,
                        ..
                    } => DomainError::insufficient(line.product.as_str(), requested, available),
                    other => other,
                })?;
                for change in changes {
                    match change {
                        LotChange::Delete(lot) => tx.delete_lot(lot).await?,
                        LotChange::SetQuantity { lot, quantity } => {
                            tx.set_lot_quantity(lot, quantity, now).await?
                        }
                    }
                }
            }
            staged.push((line.product.clone(), remaining));
        }

        Ok((order_id, staged))
    }

    async fn publish(&self, staged: &[StagedSnapshot]) -> Result<(), ServiceError> {
        for (product, remaining) in staged {
            let result = match remaining {
                Some(snapshot) => self.cache.put(snapshot).await,
                None => self.cache.remove(product).await,
            };
            if let Err(err) = result {
                warn!(
                    product = %product,
                    error = %err,
                    "cache write failed after order commit; cache is stale"
                );
                return Err(err.into());
            }
        }
        Ok(())
    }
}
