use axum::{
    routing::{get, post},
    Router,
};

pub mod insights;
pub mod orders;
pub mod products;
pub mod system;

/// Router for the product-management endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/products", post(products::add_products))
        .route("/available-products", get(products::available_products))
        .route("/order", post(orders::order_products))
        .route("/products/best-seller", get(insights::best_sellers))
}
