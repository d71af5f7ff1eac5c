//! Status-store steps shared by the producer and the document handlers.
//!
//! Every write re-reads the document and saves against the revision it read,
//! so a concurrent writer makes the step retry instead of clobbering.

use tracing::debug;

use folio_core::{DocumentId, ExpectedVersion, JobId, UserId};
use folio_documents::{Document, StepOutcome};

use crate::error::{PipelineError, PipelineResult};
use crate::store::{DocumentStore, StoreError};

const MAX_WRITE_ATTEMPTS: u32 = 5;

/// Load a document, treating one owned by someone else as missing.
pub(crate) async fn load_owned(
    documents: &dyn DocumentStore,
    id: DocumentId,
    user_id: UserId,
) -> PipelineResult<Document> {
    documents
        .get(id)
        .await?
        .filter(|doc| doc.owned_by(user_id))
        .ok_or_else(|| PipelineError::not_found(format!("document {id}")))
}

/// Apply `mutate` to the latest revision of a document and save it.
///
/// Nothing is written when `mutate` leaves the document unchanged.
pub(crate) async fn modify_document<T, F>(
    documents: &dyn DocumentStore,
    id: DocumentId,
    mut mutate: F,
) -> PipelineResult<(Document, T)>
where
    F: FnMut(&mut Document) -> PipelineResult<T> + Send,
    T: Send,
{
    for attempt in 1..=MAX_WRITE_ATTEMPTS {
        let current = documents
            .get(id)
            .await?
            .ok_or_else(|| PipelineError::not_found(format!("document {id}")))?;
        let mut next = current.clone();
        let out = mutate(&mut next)?;
        if next == current {
            return Ok((current, out));
        }
        match documents
            .save(&next, ExpectedVersion::Exact(current.revision))
            .await
        {
            Ok(saved) => return Ok((saved, out)),
            Err(StoreError::Conflict(reason)) => {
                debug!(document_id = %id, attempt, %reason, "revision moved, re-reading");
            }
            Err(e) => return Err(e.into()),
        }
    }
    Err(PipelineError::Persistence(format!(
        "document {id} kept changing under {MAX_WRITE_ATTEMPTS} write attempts"
    )))
}

/// Mark a new run `queued` for `job_id`.
pub(crate) async fn queue_run(
    documents: &dyn DocumentStore,
    id: DocumentId,
    user_id: UserId,
    job_id: JobId,
) -> PipelineResult<Document> {
    let (doc, _) = modify_document(documents, id, |doc| {
        if !doc.owned_by(user_id) {
            return Err(PipelineError::not_found(format!("document {id}")));
        }
        Ok(doc.status.queue(job_id)?)
    })
    .await?;
    Ok(doc)
}

/// Whether a picked-up run still has work to do.
pub(crate) enum RunStart {
    Proceed(Document),
    /// The same job already finished this run.
    Done(Document),
}

/// Move the run to `processing`. A redelivered job that already reached
/// a terminal state gets [`RunStart::Done`] with the finished document.
pub(crate) async fn begin_run(
    documents: &dyn DocumentStore,
    id: DocumentId,
    user_id: UserId,
    job_id: JobId,
) -> PipelineResult<RunStart> {
    let (doc, outcome) = modify_document(documents, id, |doc| {
        if !doc.owned_by(user_id) {
            return Err(PipelineError::not_found(format!("document {id}")));
        }
        Ok(doc.status.begin(job_id)?)
    })
    .await?;
    Ok(match outcome {
        StepOutcome::AlreadyTerminal => RunStart::Done(doc),
        StepOutcome::Applied | StepOutcome::Redelivered => RunStart::Proceed(doc),
    })
}

/// Write the run's results with `apply` and mark it `completed`, in one save.
pub(crate) async fn complete_run<F>(
    documents: &dyn DocumentStore,
    id: DocumentId,
    job_id: JobId,
    mut apply: F,
) -> PipelineResult<Document>
where
    F: FnMut(&mut Document) + Send,
{
    let (doc, _) = modify_document(documents, id, |doc| {
        if doc.status.complete(job_id)? == StepOutcome::Applied {
            apply(doc);
        }
        Ok(())
    })
    .await?;
    Ok(doc)
}

/// Mark the run `failed` with `message`.
pub(crate) async fn fail_run(
    documents: &dyn DocumentStore,
    id: DocumentId,
    job_id: JobId,
    message: &str,
) -> PipelineResult<Document> {
    let (doc, _) = modify_document(documents, id, |doc| Ok(doc.status.fail(job_id, message)?)).await?;
    Ok(doc)
}
