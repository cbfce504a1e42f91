use serde::{Deserialize, Serialize};

use stockroom_core::{DomainError, DomainResult, ProductName, Quantity, UnitPrice, ValueObject};

/// A proposed stock line as submitted for intake.
///
/// Nothing is validated yet; [`ProductLine::accept`] decides whether the
/// line takes part in the batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductLine {
    #[serde(alias = "Name")]
    pub name: String,
    #[serde(default, alias = "Description")]
    pub description: String,
    #[serde(alias = "Price")]
    pub price: UnitPrice,
    #[serde(alias = "Quantity")]
    pub quantity: Quantity,
}

impl ProductLine {
    /// Validate the line for intake.
    ///
    /// Lines with a non-positive price or quantity (or a blank name) are
    /// skipped, not rejected: the rest of the batch still commits.
    pub fn accept(self) -> Option<StockIntake> {
        if self.price <= 0 || self.quantity <= 0 {
            return None;
        }
        let name = ProductName::parse(self.name).ok()?;
        let description = Some(self.description).filter(|d| !d.trim().is_empty());

        Some(StockIntake {
            name,
            description,
            price: self.price,
            quantity: self.quantity,
        })
    }
}

/// An intake line that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockIntake {
    pub name: ProductName,
    pub description: Option<String>,
    pub price: UnitPrice,
    pub quantity: Quantity,
}

/// Aggregate stock view of one product, as mirrored in the cache.
///
/// Carries the total quantity across every lot of the product. Price and lot
/// detail never appear here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockSnapshot {
    pub name: ProductName,
    pub quantity: Quantity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ValueObject for StockSnapshot {}

impl StockSnapshot {
    pub fn new(name: ProductName, quantity: Quantity, description: Option<String>) -> Self {
        Self {
            name,
            quantity,
            description,
        }
    }

    /// Fold an accepted intake into the prior snapshot (if any).
    ///
    /// A missing prior snapshot counts as zero. The intake's description is
    /// ledger metadata only and never enters the cached aggregate. Fails when
    /// the aggregate would overflow.
    pub fn after_intake(prior: Option<&StockSnapshot>, intake: &StockIntake) -> DomainResult<Self> {
        let quantity = prior
            .map_or(0, |p| p.quantity)
            .checked_add(intake.quantity)
            .ok_or_else(|| {
                DomainError::invariant(format!("aggregate quantity of '{}' overflows", intake.name))
            })?;
        Ok(Self {
            name: intake.name.clone(),
            quantity,
            description: prior.and_then(|p| p.description.clone()),
        })
    }

    /// Snapshot left after `consumed` units were fulfilled, or `None` when the
    /// product is depleted and its cache entry must be removed.
    pub fn after_consumption(&self, consumed: Quantity) -> Option<Self> {
        let remaining = self.quantity - consumed;
        if remaining <= 0 {
            return None;
        }
        Some(Self {
            quantity: remaining,
            ..self.clone()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(name: &str, price: UnitPrice, quantity: Quantity) -> ProductLine {
        ProductLine {
            name: name.to_string(),
            description: "fresh".to_string(),
            price,
            quantity,
        }
    }

    #[test]
    fn non_positive_lines_are_skipped() {
        assert!(line("apple", 0, 10).accept().is_none());
        assert!(line("apple", -1, 10).accept().is_none());
        assert!(line("apple", 2, 0).accept().is_none());
        assert!(line("apple", 2, -5).accept().is_none());
        assert!(line("  ", 2, 5).accept().is_none());
    }

    #[test]
    fn accepted_line_keeps_its_values() {
        let intake = line("apple", 2, 10).accept().unwrap();
        assert_eq!(intake.name.as_str(), "apple");
        assert_eq!(intake.price, 2);
        assert_eq!(intake.quantity, 10);
        assert_eq!(intake.description.as_deref(), Some("fresh"));
    }

    #[test]
    fn blank_description_becomes_none() {
        let mut l = line("apple", 2, 10);
        l.description = String::new();
        assert_eq!(l.accept().unwrap().description, None);
    }

    #[test]
    fn intake_adds_to_prior_snapshot() {
        let intake = line("apple", 2, 5).accept().unwrap();
        let prior = StockSnapshot::new(intake.name.clone(), 10, Some("seasonal".to_string()));

        let next = StockSnapshot::after_intake(Some(&prior), &intake).unwrap();
        assert_eq!(next.quantity, 15);
        assert_eq!(next.description.as_deref(), Some("seasonal"));

        let first = StockSnapshot::after_intake(None, &intake).unwrap();
        assert_eq!(first.quantity, 5);
        assert_eq!(first.description, None);
    }

    #[test]
    fn intake_past_the_quantity_range_is_rejected() {
        let intake = line("apple", 2, 1).accept().unwrap();
        let prior = StockSnapshot::new(intake.name.clone(), Quantity::MAX, None);

        let err = StockSnapshot::after_intake(Some(&prior), &intake).unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn consumption_to_zero_removes_snapshot() {
        let name = ProductName::parse("apple").unwrap();
        let snap = StockSnapshot::new(name, 15, None);
        assert_eq!(snap.after_consumption(15), None);
        assert_eq!(snap.after_consumption(5).unwrap().quantity, 10);
    }

    #[test]
    fn snapshot_json_omits_missing_description() {
        let snap = StockSnapshot::new(ProductName::parse("apple").unwrap(), 3, None);
        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json, serde_json::json!({"name": "apple", "quantity": 3}));
    }
}
