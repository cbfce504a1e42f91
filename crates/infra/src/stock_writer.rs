//! Stock intake: fold a batch of product lines into the ledger, then mirror
//! the new per-product totals into the cache.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn, Span};

use stockroom_core::{ProductName, Quantity};
use stockroom_inventory::{merge_quantity, ProductLine, StockIntake, StockSnapshot};

use crate::cache::CacheMirror;
use crate::ledger::{LedgerTx, LotLedger};
use crate::service::{abort, ServiceError};

/// What an intake batch changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntakeReport {
    /// Aggregate quantity of each product touched by the batch, after it.
    pub aggregates: BTreeMap<ProductName, Quantity>,
    /// Lines dropped for a blank name or a non-positive price or quantity.
    pub skipped: usize,
}

impl IntakeReport {
    pub fn is_empty(&self) -> bool {
        self.aggregates.is_empty()
    }
}

pub struct StockWriter {
    ledger: Arc<dyn LotLedger>,
    cache: Arc<dyn CacheMirror>,
}

impl StockWriter {
    pub fn new(ledger: Arc<dyn LotLedger>, cache: Arc<dyn CacheMirror>) -> Self {
        Self { ledger, cache }
    }

    /// Apply a batch of product lines in one ledger transaction.
    ///
    /// Invalid lines are skipped; the rest commit or roll back together. A
    /// line at a price the product already has merges into that lot, any other
    /// price opens a new lot. Cache entries are written only after the commit,
    /// so a cache failure leaves the committed ledger in place and is reported
    /// as an error.
    ///
    /// Callers must hold the mutation guard.
    #[instrument(skip(self, lines), fields(line_count = lines.len(), accepted = tracing::field::Empty), err)]
    pub async fn intake(&self, lines: Vec<ProductLine>) -> Result<IntakeReport, ServiceError> {
        let mut report = IntakeReport::default();
        let mut accepted = Vec::with_capacity(lines.len());
        for line in lines {
            let name = line.name.clone();
            match line.accept() {
                Some(intake) => accepted.push(intake),
                None => {
                    debug!(product = %name, "skipping invalid intake line");
                    report.skipped += 1;
                }
            }
        }
        Span::current().record("accepted", accepted.len());

        if accepted.is_empty() {
            return Ok(report);
        }

        let now = Utc::now();
        let mut tx = self.ledger.begin().await?;
        let mut staged: BTreeMap<ProductName, StockSnapshot> = BTreeMap::new();

        for intake in &accepted {
            if let Err(err) = self.apply(tx.as_mut(), intake, now, &mut staged).await {
                return Err(abort(tx, err).await);
            }
        }

        tx.commit().await?;
        info!(products = staged.len(), "intake committed");

        self.publish(staged.values()).await?;
        report.aggregates = staged
            .into_iter()
            .map(|(name, snapshot)| (name, snapshot.quantity))
            .collect();
        Ok(report)
    }

    async fn apply(
        &self,
        tx: &mut dyn LedgerTx,
        intake: &StockIntake,
        now: DateTime<Utc>,
        staged: &mut BTreeMap<ProductName, StockSnapshot>,
    ) -> Result<(), ServiceError> {
        tx.insert_product_if_absent(&intake.name, intake.description.as_deref())
            .await?;

        match tx.find_lot(&intake.name, intake.price).await? {
            Some(lot) => {
                let quantity = merge_quantity(lot.quantity, intake.quantity)?;
                tx.set_lot_quantity(lot.id, quantity, now).await?;
            }
            None => {
                tx.insert_lot(&intake.name, intake.price, intake.quantity, now)
                    .await?;
            }
        }

        // Earlier lines of the same batch build on the staged value, not on
        // the cache, which is still untouched.
        let prior = match staged.get(&intake.name) {
            Some(snapshot) => Some(snapshot.clone()),
            None => self.cache.get(&intake.name).await?,
        };
        let next = StockSnapshot::after_intake(prior.as_ref(), intake)?;
        staged.insert(intake.name.clone(), next);
        Ok(())
    }

    async fn publish<'a>(
        &self,
        snapshots: impl Iterator<Item = &'a StockSnapshot>,
    ) -> Result<(), ServiceError> {
        for snapshot in snapshots {
            if let Err(err) = self.cache.put(snapshot).await {
                warn!(
                    product = %snapshot.name,
                    error = %err,
                    "cache write failed after intake commit; cache is stale"
                );
                return Err(err.into());
            }
        }
        Ok(())
    }
}
