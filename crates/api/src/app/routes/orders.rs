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

pub async fn order_products(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::OrderProductsRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_body", rejection.body_text());
        }
    };

    info!(
        username = %body.username,
        lines = body.products_order.len(),
        "order requested"
    );

    match services.stock().order(&body.products_order).await {
        Ok(outcome) => (StatusCode::OK, Json(dto::OrderProductsResponse::from(outcome))).into_response(),
        Err(e) if e.is_validation() || e.is_busy() => errors::service_error_to_response(&e),
        Err(e) => {
            warn!(error = %e, "order fulfillment failed");
            failed_order()
        }
    }
}

/// A failed order answers 500 with every field omitted; the cause stays in
/// the logs.
fn failed_order() -> axum::response::Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(dto::OrderProductsResponse::default()),
    )
        .into_response()
}
