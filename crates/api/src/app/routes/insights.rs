use std::sync::Arc;

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use tracing::warn;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub async fn best_sellers(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services.stock().best_sellers().await {
        Ok(products) => (StatusCode::OK, Json(dto::BestSellersResponse { products })).into_response(),
        Err(e) => {
            warn!(error = %e, "best seller insight failed");
            errors::service_error_to_response(&e)
        }
    }
}
