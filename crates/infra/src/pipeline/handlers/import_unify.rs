use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, info, warn};

use folio_documents::{
    ImportRun, ImportStatus, NormalizedProfile, Notification, NotificationKind, merge_profiles,
};

use crate::error::{PipelineError, PipelineResult};
use crate::jobs::{Job, JobHandler, Topic};
use crate::pipeline::PipelineDeps;
use crate::pipeline::payloads::ImportPayload;

/// Share of the progress bar spent fetching; the last 10% is the merge.
const FETCH_PROGRESS_PCT: usize = 90;

/// Fetches every provider that has a token, merges the profiles in request
/// order and leaves the merged profile on the import run.
pub struct ImportUnifyHandler {
    deps: PipelineDeps,
}

impl ImportUnifyHandler {
    pub fn new(deps: PipelineDeps) -> Self {
        Self { deps }
    }

    /// Tell the owner the import finished; only a saved completed run is
    /// announced.
    async fn announce(&self, job: &Job, run: &ImportRun) -> PipelineResult<()> {
        let Some(merged) = run.merged.as_ref().filter(|_| run.status == ImportStatus::Completed)
        else {
            return Ok(());
        };
        let notification = Notification::new(
            run.user_id,
            NotificationKind::ImportReady,
            "Your profile import is ready",
            json!({
                "importRunId": run.id,
                "skills": merged.skills.len(),
                "projects": merged.projects.len(),
            }),
        )
        .from_job(job.id);
        self.deps.records.notifications.append(notification).await?;
        Ok(())
    }

    async fn load(&self, payload: &ImportPayload) -> PipelineResult<ImportRun> {
        self.deps
            .records
            .imports
            .get(payload.import_run_id)
            .await?
            .filter(|run| run.user_id == payload.user_id)
            .ok_or_else(|| PipelineError::not_found(format!("import run {}", payload.import_run_id)))
    }
}

#[async_trait]
impl JobHandler for ImportUnifyHandler {
    const TOPIC: Topic = Topic::ImportUnify;
    type Payload = ImportPayload;

    async fn handle(&self, job: &Job, payload: ImportPayload) -> PipelineResult<()> {
        let imports = self.deps.records.imports.as_ref();
        let mut run = self.load(&payload).await?;
        if run.status.is_terminal() {
            debug!(import_run_id = %run.id, job_id = %job.id, "import already finished");
            return self.announce(job, &run).await;
        }
        run.begin()?;
        imports.save(&run).await?;

        let total = payload.providers.len().max(1);
        let mut profiles: Vec<NormalizedProfile> = Vec::new();
        let mut attempted = 0usize;
        for (i, &provider) in payload.providers.iter().enumerate() {
            match payload.oauth_tokens.get(&provider) {
                Some(token) => {
                    attempted += 1;
                    match self.deps.providers.fetch_profile(provider, token).await {
                        Ok(profile) => profiles.push(profile),
                        Err(e) => warn!(
                            import_run_id = %run.id,
                            job_id = %job.id,
                            %provider,
                            error = %e,
                            "provider fetch failed, skipping"
                        ),
                    }
                }
                None => debug!(import_run_id = %run.id, %provider, "no token, skipping"),
            }
            let pct = (i + 1) * FETCH_PROGRESS_PCT / total;
            run.set_progress(u8::try_from(pct).unwrap_or(99));
            imports.save(&run).await?;
        }

        if attempted > 0 && profiles.is_empty() {
            return Err(PipelineError::External(format!(
                "all {attempted} provider fetches failed"
            )));
        }

        let merged = merge_profiles(&profiles);
        let (skills, projects) = (merged.skills.len(), merged.projects.len());
        run.complete(merged)?;
        imports.save(&run).await?;
        self.announce(job, &run).await?;

        info!(import_run_id = %run.id, job_id = %job.id, skills, projects, "import merged");
        Ok(())
    }

    async fn on_terminal_failure(
        &self,
        job: &Job,
        payload: ImportPayload,
        error: &PipelineError,
    ) -> PipelineResult<()> {
        let message = error.to_string();
        match self.load(&payload).await {
            Ok(run) if run.status == ImportStatus::Completed => {
                warn!(import_run_id = %run.id, job_id = %job.id, error = %message, "import completed before the job gave up");
                return self.announce(job, &run).await;
            }
            Ok(mut run) => {
                if run.fail(message.clone()).is_ok() {
                    self.deps.records.imports.save(&run).await?;
                }
            }
            Err(e) => warn!(import_run_id = %payload.import_run_id, error = %e, "could not mark import failed"),
        }

        let notification = Notification::new(
            payload.user_id,
            NotificationKind::ImportFailed,
            "Profile import failed",
            json!({ "importRunId": payload.import_run_id, "error": message }),
        )
        .from_job(job.id);
        self.deps.records.notifications.append(notification).await?;
        Ok(())
    }
}
