use std::sync::Arc;

use axum::{Json, extract::Extension, http::StatusCode, response::IntoResponse};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub async fn record_event(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::BillingEventRequest>,
) -> axum::response::Response {
    match services
        .producer
        .notify_billing(body.user_id, body.event, body.tier, body.days_remaining)
        .await
    {
        Ok(receipt) => (StatusCode::ACCEPTED, Json(receipt)).into_response(),
        Err(e) => errors::pipeline_error_to_response(e),
    }
}
