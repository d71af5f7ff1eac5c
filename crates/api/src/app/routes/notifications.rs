use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use folio_core::NotificationId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::UserContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_notifications))
        .route("/:id/read", post(mark_read))
}

pub async fn list_notifications(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
) -> axum::response::Response {
    match services.reader.notifications(user.user_id()).await {
        Ok(items) => (StatusCode::OK, Json(items)).into_response(),
        Err(e) => errors::pipeline_error_to_response(e),
    }
}

pub async fn mark_read(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: NotificationId = match dto::parse_id(&id, "notification") {
        Ok(v) => v,
        Err(r) => return r,
    };

    match services.reader.mark_read(user.user_id(), id).await {
        Ok(item) => (StatusCode::OK, Json(item)).into_response(),
        Err(e) => errors::pipeline_error_to_response(e),
    }
}
