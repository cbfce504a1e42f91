use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use stockroom_core::Quantity;
use stockroom_infra::IntakeReport;
use stockroom_inventory::{BestSeller, OrderOutcome, OrderRequest, ProductLine, StockSnapshot};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddProductsRequest {
    #[serde(default, alias = "Products")]
    pub products: Vec<ProductLine>,
    #[serde(default, alias = "Comment")]
    pub comment: String,
    #[serde(default, alias = "Username", alias = "UserName")]
    pub username: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderProductsRequest {
    #[serde(default, alias = "ProductsOrder")]
    pub products_order: OrderRequest,
    #[serde(default, alias = "Comment")]
    pub comment: String,
    #[serde(default, alias = "Username", alias = "UserName")]
    pub username: String,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AddProductsResponse {
    pub added_products: BTreeMap<String, Quantity>,
}

impl From<IntakeReport> for AddProductsResponse {
    fn from(report: IntakeReport) -> Self {
        Self {
            added_products: report
                .aggregates
                .into_iter()
                .map(|(name, quantity)| (name.into_inner(), quantity))
                .collect(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProductsResponse {
    pub products: Vec<StockSnapshot>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct BestSellersResponse {
    pub products: Vec<BestSeller>,
}

/// Order result. A failed order serializes as `{}`.
#[derive(Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OrderProductsResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ordered_products: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unavailable_products: Vec<String>,
}

impl From<OrderOutcome> for OrderProductsResponse {
    fn from(outcome: OrderOutcome) -> Self {
        match outcome {
            OrderOutcome::Placed { order_id, ordered } => Self {
                order_id: Some(order_id.get()),
                ordered_products: ordered.into_iter().map(|p| p.into_inner()).collect(),
                unavailable_products: Vec::new(),
            },
            OrderOutcome::Rejected { unavailable } => Self {
                unavailable_products: unavailable,
                ..Self::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use stockroom_core::{OrderId, ProductName};

    use super::*;

    #[test]
    fn intake_request_accepts_missing_metadata() {
        let req: AddProductsRequest = serde_json::from_value(json!({
            "products": [{"name": "apple", "price": 2, "quantity": 10}]
        }))
        .unwrap();
        assert_eq!(req.products.len(), 1);
        assert_eq!(req.products[0].description, "");
        assert!(req.comment.is_empty());
    }

    #[test]
    fn pascal_case_request_keys_are_accepted() {
        let order: OrderProductsRequest = serde_json::from_value(json!({
            "ProductsOrder": {"apple": 3},
            "Comment": "rush",
            "Username": "ops"
        }))
        .unwrap();
        assert_eq!(order.products_order.iter().collect::<Vec<_>>(), vec![("apple", 3)]);
        assert_eq!(order.username, "ops");

        let intake: AddProductsRequest = serde_json::from_value(json!({
            "Products": [{"Name": "apple", "Description": "red", "Price": 2, "Quantity": 10}]
        }))
        .unwrap();
        assert_eq!(intake.products[0].name, "apple");
        assert_eq!(intake.products[0].quantity, 10);
    }

    #[test]
    fn placed_order_serializes_without_unavailable_list() {
        let body = OrderProductsResponse::from(OrderOutcome::Placed {
            order_id: OrderId::new(7),
            ordered: vec![ProductName::parse("apple").unwrap()],
        });
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({"orderId": 7, "orderedProducts": ["apple"]})
        );
    }

    #[test]
    fn rejected_order_lists_only_unavailable_products() {
        let body = OrderProductsResponse::from(OrderOutcome::Rejected {
            unavailable: vec!["kiwi".to_string()],
        });
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({"unavailableProducts": ["kiwi"]})
        );
    }

    #[test]
    fn failed_order_body_is_empty() {
        assert_eq!(
            serde_json::to_value(OrderProductsResponse::default()).unwrap(),
            json!({})
        );
    }
}
