//! Best-seller insight over recent orders.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::instrument;

use stockroom_inventory::BestSeller;

use crate::ledger::LotLedger;

/// Read-only view ranking products by units ordered in a trailing window.
pub struct InsightAggregator {
    ledger: Arc<dyn LotLedger>,
    window: Duration,
    limit: usize,
}

impl InsightAggregator {
    pub fn new(ledger: Arc<dyn LotLedger>, window: Duration, limit: usize) -> Self {
        Self {
            ledger,
            window,
            limit,
        }
    }

    pub async fn best_sellers(&self) -> Result<Vec<BestSeller>, crate::ServiceError> {
        self.best_sellers_at(Utc::now()).await
    }

    /// Best sellers among orders created in `[now - window, now]`.
    #[instrument(skip(self), fields(window_secs = self.window.as_secs(), limit = self.limit), err)]
    pub async fn best_sellers_at(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<BestSeller>, crate::ServiceError> {
        let since = TimeDelta::from_std(self.window)
            .ok()
            .and_then(|window| now.checked_sub_signed(window))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        Ok(self.ledger.best_sellers_since(since, self.limit).await?)
    }
}
