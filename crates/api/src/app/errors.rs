use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use folio_infra::PipelineError;

pub fn pipeline_error_to_response(err: PipelineError) -> axum::response::Response {
    match err {
        PipelineError::NotFound(msg) => json_error(StatusCode::NOT_FOUND, "not_found", msg),
        PipelineError::Validation(msg) | PipelineError::InvalidPayload(msg) => {
            json_error(StatusCode::BAD_REQUEST, "validation_error", msg)
        }
        PipelineError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        PipelineError::Persistence(msg) | PipelineError::External(msg) | PipelineError::Queue(msg) => {
            tracing::warn!(error = %msg, "request failed on a retryable error");
            json_error(StatusCode::SERVICE_UNAVAILABLE, "unavailable", msg)
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
