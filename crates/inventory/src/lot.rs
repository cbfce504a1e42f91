use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::{DomainError, DomainResult, LotId, ProductName, Quantity, UnitPrice};

/// One price tier of remaining stock for a product.
///
/// At most one lot exists per (product, price); intake at a known price
/// merges into the existing lot. A lot never sits at zero: it is deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLot {
    pub id: LotId,
    pub product: ProductName,
    pub price: UnitPrice,
    pub quantity: Quantity,
    pub updated_at: DateTime<Utc>,
}

/// A mutation the ledger must apply to satisfy a fulfillment.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LotChange {
    /// The lot was consumed entirely.
    Delete(LotId),
    /// The lot was partially consumed and keeps `quantity` units.
    SetQuantity { lot: LotId, quantity: Quantity },
}

/// Quantity of a lot after merging an intake at the same price point.
pub fn merge_quantity(existing: Quantity, incoming: Quantity) -> DomainResult<Quantity> {
    if existing < 0 || incoming <= 0 {
        return Err(DomainError::invariant(format!(
            "cannot merge {incoming} into lot holding {existing}"
        )));
    }
    existing
        .checked_add(incoming)
        .ok_or_else(|| DomainError::invariant("lot quantity overflow"))
}

/// Plan how `requested` units are taken from `lots`, cheapest first.
///
/// Lots are walked in ascending price order (lot id breaks ties). A lot whose
/// quantity fits in the remaining request is deleted; the first lot larger
/// than the remainder is decremented and the walk stops.
///
/// Fails when the lots together hold less than `requested`: the ledger is
/// authoritative and an order is never fulfilled short.
pub fn plan_consumption(lots: &[StockLot], requested: Quantity) -> DomainResult<Vec<LotChange>> {
    if requested <= 0 {
        return Err(DomainError::validation("requested quantity must be positive"));
    }

    let mut ordered: Vec<&StockLot> = lots.iter().collect();
    ordered.sort_by_key(|lot| (lot.price, lot.id));

    let mut remaining = requested;
    let mut changes = Vec::new();

    for lot in ordered {
        if remaining == 0 {
            break;
        }
        if lot.quantity <= 0 {
            return Err(DomainError::invariant(format!(
                "lot {} of '{}' holds non-positive quantity {}",
                lot.id, lot.product, lot.quantity
            )));
        }

        if lot.quantity <= remaining {
            remaining -= lot.quantity;
            changes.push(LotChange::Delete(lot.id));
        } else {
            changes.push(LotChange::SetQuantity {
                lot: lot.id,
                quantity: lot.quantity - remaining,
            });
            remaining = 0;
        }
    }

    if remaining > 0 {
        let available = lots
            .iter()
            .fold(0 as Quantity, |acc, l| acc.saturating_add(l.quantity));
        let product = lots
            .first()
            .map(|l| l.product.to_string())
            .unwrap_or_default();
        return Err(DomainError::insufficient(product, requested, available));
    }

    Ok(changes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn lot(id: i64, price: UnitPrice, quantity: Quantity) -> StockLot {
        StockLot {
            id: LotId::new(id),
            product: ProductName::parse("x").unwrap(),
            price,
            quantity,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn consumes_cheapest_lot_first() {
        let lots = vec![lot(2, 8, 10), lot(1, 5, 3)];
        let changes = plan_consumption(&lots, 5).unwrap();
        assert_eq!(
            changes,
            vec![
                LotChange::Delete(LotId::new(1)),
                LotChange::SetQuantity { lot: LotId::new(2), quantity: 8 },
            ]
        );
    }

    #[test]
    fn exact_lot_match_deletes_without_touching_next_lot() {
        let lots = vec![lot(1, 5, 3), lot(2, 8, 10)];
        let changes = plan_consumption(&lots, 3).unwrap();
        assert_eq!(changes, vec![LotChange::Delete(LotId::new(1))]);
    }

    #[test]
    fn same_price_lots_break_ties_by_id() {
        let lots = vec![lot(7, 4, 2), lot(3, 4, 2)];
        let changes = plan_consumption(&lots, 1).unwrap();
        assert_eq!(
            changes,
            vec![LotChange::SetQuantity { lot: LotId::new(3), quantity: 1 }]
        );
    }

    #[test]
    fn shortfall_is_rejected() {
        let lots = vec![lot(1, 5, 3), lot(2, 8, 1)];
        let err = plan_consumption(&lots, 5).unwrap_err();
        match err {
            DomainError::InsufficientQuantity { requested, available, .. } => {
                assert_eq!(requested, 5);
                assert_eq!(available, 4);
            }
            other => panic!("expected insufficient quantity, got {other:?}"),
        }
    }

    #[test]
    fn non_positive_request_is_rejected() {
        assert!(plan_consumption(&[lot(1, 1, 1)], 0).is_err());
    }

    #[test]
    fn merge_adds_quantities() {
        assert_eq!(merge_quantity(10, 5).unwrap(), 15);
        assert!(merge_quantity(10, 0).is_err());
        assert!(merge_quantity(Quantity::MAX, 1).is_err());
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: a successful plan removes exactly the requested units and
        /// never leaves a lot at zero or below.
        #[test]
        fn plan_consumes_exactly_the_request(
            tiers in prop::collection::vec((1i64..100i64, 1i64..50i64), 1..8),
            pick in 1i64..400i64,
        ) {
            let lots: Vec<StockLot> = tiers
                .iter()
                .enumerate()
                .map(|(i, (price, qty))| lot(i as i64 + 1, *price, *qty))
                .collect();
            let total: Quantity = lots.iter().map(|l| l.quantity).sum();
            let requested = pick.min(total);

            let changes = plan_consumption(&lots, requested).unwrap();

            let mut consumed = 0;
            for change in &changes {
                match change {
                    LotChange::Delete(id) => {
                        let l = lots.iter().find(|l| l.id == *id).unwrap();
                        consumed += l.quantity;
                    }
                    LotChange::SetQuantity { lot: id, quantity } => {
                        let l = lots.iter().find(|l| l.id == *id).unwrap();
                        prop_assert!(*quantity > 0);
                        prop_assert!(*quantity < l.quantity);
                        consumed += l.quantity - quantity;
                    }
                }
            }
            prop_assert_eq!(consumed, requested);
        }

        /// Property: every deleted lot is priced at or below any lot left with stock.
        #[test]
        fn cheaper_lots_are_exhausted_first(
            tiers in prop::collection::vec((1i64..100i64, 1i64..50i64), 1..8),
            requested in 1i64..50i64,
        ) {
            let lots: Vec<StockLot> = tiers
                .iter()
                .enumerate()
                .map(|(i, (price, qty))| lot(i as i64 + 1, *price, *qty))
                .collect();
            let total: Quantity = lots.iter().map(|l| l.quantity).sum();
            prop_assume!(requested <= total);

            let changes = plan_consumption(&lots, requested).unwrap();
            let deleted: Vec<LotId> = changes
                .iter()
                .filter_map(|c| match c {
                    LotChange::Delete(id) => Some(*id),
                    LotChange::SetQuantity { .. } => None,
                })
                .collect();

            let max_deleted_price = lots
                .iter()
                .filter(|l| deleted.contains(&l.id))
                .map(|l| l.price)
                .max();
            let min_kept_price = lots
                .iter()
                .filter(|l| !deleted.contains(&l.id))
                .map(|l| l.price)
                .min();

            if let (Some(d), Some(k)) = (max_deleted_price, min_kept_price) {
                prop_assert!(d <= k);
            }
        }
    }
}
