use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use stockroom_core::{ProductName, Quantity};

/// Trailing window over which best sellers are ranked.
pub const DEFAULT_INSIGHT_WINDOW: Duration = Duration::from_secs(60 * 60);

/// How many best sellers are reported.
pub const DEFAULT_BEST_SELLER_LIMIT: usize = 5;

/// Units ordered of one product within the insight window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BestSeller {
    pub name: ProductName,
    pub quantity: Quantity,
}

/// Sum ordered quantities per product and keep the top `limit`.
///
/// Ordered by summed quantity descending; ties go to the lexically smaller
/// name so the ranking is stable. Totals saturate at `Quantity::MAX`.
pub fn rank_best_sellers(
    lines: impl IntoIterator<Item = (ProductName, Quantity)>,
    limit: usize,
) -> Vec<BestSeller> {
    let mut totals: HashMap<ProductName, Quantity> = HashMap::new();
    for (name, quantity) in lines {
        let total = totals.entry(name).or_insert(0);
        *total = total.saturating_add(quantity);
    }

    let mut ranked: Vec<BestSeller> = totals
        .into_iter()
        .map(|(name, quantity)| BestSeller { name, quantity })
        .collect();
    ranked.sort_by(|a, b| b.quantity.cmp(&a.quantity).then_with(|| a.name.cmp(&b.name)));
    ranked.truncate(limit);
    ranked
}
