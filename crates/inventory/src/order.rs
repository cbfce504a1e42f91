use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use stockroom_core::{DomainError, DomainResult, OrderId, ProductName, Quantity};

/// Requested quantities keyed by product name.
///
/// Names are kept raw: a blank or unknown name is an unavailable product, not
/// a decoding failure. Iteration order is by name, so fulfillment visits
/// products deterministically.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderRequest(BTreeMap<String, Quantity>);

impl OrderRequest {
    pub fn new(lines: BTreeMap<String, Quantity>) -> Self {
        Self(lines)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Quantity)> {
        self.0.iter().map(|(name, qty)| (name.as_str(), *qty))
    }

    /// Typed order lines, valid only once every product passed the pre-check.
    pub fn to_lines(&self) -> DomainResult<Vec<OrderLine>> {
        if self.is_empty() {
            return Err(DomainError::validation("order has no lines"));
        }
        self.iter()
            .map(|(name, quantity)| {
                if quantity <= 0 {
                    return Err(DomainError::validation(format!(
                        "quantity for '{name}' must be positive"
                    )));
                }
                Ok(OrderLine {
                    product: ProductName::parse(name)?,
                    quantity,
                })
            })
            .collect()
    }
}

impl<S: Into<String>> FromIterator<(S, Quantity)> for OrderRequest {
    fn from_iter<T: IntoIterator<Item = (S, Quantity)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// One product line of a committed order (the requested quantity).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product: ProductName,
    pub quantity: Quantity,
}

/// Cache-backed availability check that runs before any ledger work.
#[derive(Debug, Default)]
pub struct PreCheck {
    unavailable: Vec<String>,
}

impl PreCheck {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `requested` units can be served from `on_hand` (the cached
    /// aggregate, `None` when the product has no cache entry).
    pub fn covers(requested: Quantity, on_hand: Option<Quantity>) -> bool {
        requested > 0 && on_hand.is_some_and(|q| q >= requested)
    }

    /// Record the outcome for one requested product.
    pub fn record(&mut self, name: &str, requested: Quantity, on_hand: Option<Quantity>) {
        if !Self::covers(requested, on_hand) {
            self.unavailable.push(name.to_string());
        }
    }

    pub fn passed(&self) -> bool {
        self.unavailable.is_empty()
    }

    pub fn into_unavailable(self) -> Vec<String> {
        self.unavailable
    }
}

/// Result of a fulfillment attempt that did not hit a store failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderOutcome {
    /// Every line was fulfilled and the order committed.
    Placed {
        order_id: OrderId,
        ordered: Vec<ProductName>,
    },
    /// At least one product failed the pre-check; nothing was written.
    Rejected { unavailable: Vec<String> },
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn pre_check_requires_positive_covered_quantity() {
        assert!(PreCheck::covers(5, Some(5)));
        assert!(PreCheck::covers(1, Some(10)));
        assert!(!PreCheck::covers(6, Some(5)));
        assert!(!PreCheck::covers(1, None));
        assert!(!PreCheck::covers(0, Some(5)));
        assert!(!PreCheck::covers(-1, Some(5)));
    }

    #[test]
    fn pre_check_collects_every_unavailable_product() {
        let mut check = PreCheck::new();
        check.record("apple", 2, Some(10));
        check.record("kiwi", 1, None);
        check.record("pear", 0, Some(3));

        assert!(!check.passed());
        assert_eq!(check.into_unavailable(), vec!["kiwi".to_string(), "pear".to_string()]);
    }

    #[test]
    fn empty_request_has_no_lines() {
        let err = OrderRequest::default().to_lines().unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn lines_follow_name_order() {
        let request: OrderRequest = [("pear", 1), ("apple", 2)].into_iter().collect();
        let lines = request.to_lines().unwrap();
        assert_eq!(lines[0].product.as_str(), "apple");
        assert_eq!(lines[1].product.as_str(), "pear");
    }

    proptest! {
        /// Property: the pre-check passes exactly when every line is covered.
        #[test]
        fn pre_check_passes_iff_all_lines_covered(
            lines in prop::collection::vec((-5i64..20i64, prop::option::of(0i64..20i64)), 1..10)
        ) {
            let mut check = PreCheck::new();
            for (i, (requested, on_hand)) in lines.iter().enumerate() {
                check.record(&format!("p{i}"), *requested, *on_hand);
            }
            let all_covered = lines.iter().all(|(r, h)| PreCheck::covers(*r, *h));
            prop_assert_eq!(check.passed(), all_covered);
        }
    }
}
