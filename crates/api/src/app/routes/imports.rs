use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use folio_core::ImportRunId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::UserContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(start_import))
        .route("/:id", get(get_import))
}

pub async fn start_import(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
    Json(body): Json<dto::StartImportRequest>,
) -> axum::response::Response {
    match services
        .producer
        .start_import(user.user_id(), &body.providers, &body.oauth_tokens)
        .await
    {
        Ok(receipt) => (StatusCode::ACCEPTED, Json(receipt)).into_response(),
        Err(e) => errors::pipeline_error_to_response(e),
    }
}

pub async fn get_import(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: ImportRunId = match dto::parse_id(&id, "import run") {
        Ok(v) => v,
        Err(r) => return r,
    };

    match services.reader.import_status(user.user_id(), id).await {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(e) => errors::pipeline_error_to_response(e),
    }
}
