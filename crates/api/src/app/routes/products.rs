use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use tracing::{info, warn};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub async fn add_products(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::AddProductsRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_body", rejection.body_text());
        }
    };

    info!(
        username = %body.username,
        comment = %body.comment,
        lines = body.products.len(),
        "stock intake requested"
    );

    match services.stock().add_stock(body.products).await {
        Ok(report) => {
            if report.is_empty() {
                info!(skipped = report.skipped, "intake batch had no valid lines");
            }
            (StatusCode::OK, Json(dto::AddProductsResponse::from(report))).into_response()
        }
        Err(e) => {
            warn!(error = %e, "stock intake failed");
            errors::service_error_to_response(&e)
        }
    }
}

pub async fn available_products(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.stock().available().await {
        Ok(products) => (StatusCode::OK, Json(dto::ProductsResponse { products })).into_response(),
        Err(e) => {
            warn!(error = %e, "availability listing failed");
            errors::service_error_to_response(&e)
        }
    }
}
