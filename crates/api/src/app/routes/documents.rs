use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use folio_core::DocumentId;
use folio_documents::Document;
use folio_infra::pipeline::Enqueued;
use folio_infra::{PipelineError, PipelineResult};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::UserContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_document))
        .route("/:id", get(get_document))
        .route("/:id/status", get(get_status))
        .route("/:id/generate", post(generate))
        .route("/:id/duplicate", post(duplicate))
        .route("/:id/critique", post(critique))
        .route("/:id/ats-scan", post(ats_scan))
        .route("/:id/seo-audit", post(seo_audit))
        .route("/:id/publish", post(publish))
}

/// 202 with the receipt, or the mapped pipeline error.
fn accepted(result: PipelineResult<Enqueued>) -> axum::response::Response {
    match result {
        Ok(receipt) => (StatusCode::ACCEPTED, Json(receipt)).into_response(),
        Err(e) => errors::pipeline_error_to_response(e),
    }
}

pub async fn create_document(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
    Json(body): Json<dto::CreateDocumentRequest>,
) -> axum::response::Response {
    let title = body.title.trim();
    if title.is_empty() {
        return errors::json_error(StatusCode::BAD_REQUEST, "validation_error", "title is required");
    }

    let mut doc = Document::new(DocumentId::new(), user.user_id(), body.doc_type, title);
    doc.seo = body.seo;

    match services.deps.records.documents.insert(doc).await {
        Ok(doc) => (StatusCode::CREATED, Json(doc)).into_response(),
        Err(e) => errors::pipeline_error_to_response(PipelineError::from(e)),
    }
}

pub async fn get_document(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: DocumentId = match dto::parse_id(&id, "document") {
        Ok(v) => v,
        Err(r) => return r,
    };

    match services.deps.records.documents.get(id).await {
        Ok(Some(doc)) if doc.owned_by(user.user_id()) => (StatusCode::OK, Json(doc)).into_response(),
        Ok(_) => errors::json_error(StatusCode::NOT_FOUND, "not_found", format!("document {id}")),
        Err(e) => errors::pipeline_error_to_response(PipelineError::from(e)),
    }
}

pub async fn get_status(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: DocumentId = match dto::parse_id(&id, "document") {
        Ok(v) => v,
        Err(r) => return r,
    };

    match services.reader.document_status(user.user_id(), id).await {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(e) => errors::pipeline_error_to_response(e),
    }
}

pub async fn generate(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::GenerateRequest>,
) -> axum::response::Response {
    let id: DocumentId = match dto::parse_id(&id, "document") {
        Ok(v) => v,
        Err(r) => return r,
    };
    accepted(
        services
            .producer
            .request_generate(user.user_id(), id, &body.prompt)
            .await,
    )
}

pub async fn duplicate(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: DocumentId = match dto::parse_id(&id, "document") {
        Ok(v) => v,
        Err(r) => return r,
    };
    accepted(services.producer.request_duplicate(user.user_id(), id).await)
}

pub async fn critique(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: DocumentId = match dto::parse_id(&id, "document") {
        Ok(v) => v,
        Err(r) => return r,
    };
    accepted(services.producer.request_critique(user.user_id(), id).await)
}

pub async fn ats_scan(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
    body: Option<Json<dto::AtsScanRequest>>,
) -> axum::response::Response {
    let id: DocumentId = match dto::parse_id(&id, "document") {
        Ok(v) => v,
        Err(r) => return r,
    };
    let body = body.map(|Json(b)| b).unwrap_or_default();
    accepted(
        services
            .producer
            .request_ats_scan(user.user_id(), id, body.job_description)
            .await,
    )
}

pub async fn seo_audit(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: DocumentId = match dto::parse_id(&id, "document") {
        Ok(v) => v,
        Err(r) => return r,
    };
    accepted(services.producer.request_seo_audit(user.user_id(), id).await)
}

pub async fn publish(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::PublishRequest>,
) -> axum::response::Response {
    let id: DocumentId = match dto::parse_id(&id, "document") {
        Ok(v) => v,
        Err(r) => return r,
    };
    accepted(
        services
            .producer
            .request_publish(
                user.user_id(),
                id,
                &body.subdomain,
                body.custom_domain,
                &services.config.public_base_domain,
            )
            .await,
    )
}
