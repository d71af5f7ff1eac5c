//! One handler per topic. Every handler is safe to run more than once for
//! the same job.

mod ats_scan;
mod billing;
mod critique;
mod duplicate;
mod generate;
mod import_unify;
mod publish;
mod seo_audit;

use serde_json::json;
use tracing::{debug, warn};

use folio_core::{DocumentId, UserId};
use folio_documents::{Document, GeneratingStatus, Notification, NotificationKind};

use crate::error::{PipelineError, PipelineResult};
use crate::jobs::Job;

use super::PipelineDeps;
use super::run::fail_run;

pub use ats_scan::AtsScanHandler;
pub use billing::{BillingNotifyHandler, billing_template};
pub use critique::CritiqueHandler;
pub use duplicate::DuplicateHandler;
pub use generate::GenerateHandler;
pub use import_unify::ImportUnifyHandler;
pub use publish::PublishHandler;
pub use seo_audit::SeoAuditHandler;

/// How a document handler tells the owner its run ended.
struct RunNotices {
    failed: NotificationKind,
    failed_title: &'static str,
    /// Success notification, built from the completed document.
    ready: fn(&Job, &Document) -> Option<Notification>,
}

fn completed_by(doc: &Document, job: &Job) -> bool {
    doc.status.state == GeneratingStatus::Completed && doc.status.job_id == Some(job.id)
}

/// Tell the owner a run finished. Only a saved `completed` status is
/// announced, so the notice never runs ahead of the result.
async fn announce_completion(
    deps: &PipelineDeps,
    job: &Job,
    doc: &Document,
    notices: &RunNotices,
) -> PipelineResult<()> {
    if !completed_by(doc, job) {
        debug!(document_id = %doc.id, job_id = %job.id, state = doc.status.state.as_str(), "run ended without completing");
        return Ok(());
    }
    if let Some(notification) = (notices.ready)(job, doc) {
        deps.records.notifications.append(notification).await?;
    }
    Ok(())
}

/// Terminal failure of a job that owns a document run: mark the run failed
/// and tell the user. A run whose `completed` status was already saved is
/// announced as a success instead.
async fn fail_document_job(
    deps: &PipelineDeps,
    job: &Job,
    document_id: DocumentId,
    user_id: UserId,
    notices: &RunNotices,
    error: &PipelineError,
) -> PipelineResult<()> {
    let documents = deps.records.documents.as_ref();
    if let Some(doc) = documents.get(document_id).await?
        && completed_by(&doc, job)
    {
        warn!(%document_id, job_id = %job.id, error = %error, "run completed before the job gave up");
        return announce_completion(deps, job, &doc, notices).await;
    }

    let message = error.to_string();
    if let Err(e) = fail_run(documents, document_id, job.id, &message).await {
        warn!(%document_id, job_id = %job.id, error = %e, "could not mark run failed");
    }
    let notification = Notification::new(
        user_id,
        notices.failed,
        notices.failed_title,
        json!({ "documentId": document_id, "error": message }),
    )
    .from_job(job.id);
    deps.records.notifications.append(notification).await?;
    Ok(())
}
