use async_trait::async_trait;
use serde_json::json;
use tracing::{info, warn};

use folio_documents::{Notification, NotificationKind};

use crate::error::PipelineResult;
use crate::external::Email;
use crate::jobs::{Job, JobHandler, Topic};
use crate::pipeline::PipelineDeps;
use crate::pipeline::payloads::{BillingEvent, BillingPayload};

/// Title and body for a billing event. `tier` defaults to "current" and
/// `days_remaining` to 0.
pub fn billing_template(
    event: BillingEvent,
    tier: Option<&str>,
    days_remaining: Option<u32>,
) -> (&'static str, String) {
    let tier = tier.filter(|t| !t.trim().is_empty()).unwrap_or("current");
    match event {
        BillingEvent::RenewalSuccess => (
            "Subscription renewed",
            format!("Your {tier} plan has been renewed."),
        ),
        BillingEvent::RenewalFailed => (
            "Payment failed",
            format!(
                "We could not renew your {tier} plan. Update your payment method to keep access."
            ),
        ),
        BillingEvent::TrialEnding => (
            "Your trial ends soon",
            format!(
                "Your trial ends in {} day(s). Choose a plan to keep your portfolio online.",
                days_remaining.unwrap_or(0)
            ),
        ),
        BillingEvent::Cancelled => (
            "Subscription cancelled",
            format!("Your {tier} plan has been cancelled."),
        ),
        BillingEvent::Upgraded => ("Plan upgraded", format!("You are now on the {tier} plan.")),
    }
}

/// Writes the billing notification, then mails it. Mail is best-effort.
pub struct BillingNotifyHandler {
    deps: PipelineDeps,
}

impl BillingNotifyHandler {
    pub fn new(deps: PipelineDeps) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl JobHandler for BillingNotifyHandler {
    const TOPIC: Topic = Topic::BillingNotify;
    type Payload = BillingPayload;

    async fn handle(&self, job: &Job, payload: BillingPayload) -> PipelineResult<()> {
        let (title, body) =
            billing_template(payload.event, payload.tier.as_deref(), payload.days_remaining);

        let notification = Notification::new(
            payload.user_id,
            NotificationKind::Billing,
            title,
            json!({
                "event": payload.event,
                "body": body,
                "tier": payload.tier,
                "daysRemaining": payload.days_remaining,
            }),
        )
        .from_job(job.id);
        let fresh = self.deps.records.notifications.append(notification).await?;
        if !fresh {
            info!(job_id = %job.id, "billing notification already written");
            return Ok(());
        }

        let email = Email {
            to: payload.user_id,
            subject: title.to_owned(),
            body,
        };
        match tokio::time::timeout(self.deps.config.mail_timeout, self.deps.mailer.send(&email)).await {
            Ok(Ok(())) => info!(user_id = %payload.user_id, job_id = %job.id, "billing email sent"),
            Ok(Err(e)) => warn!(user_id = %payload.user_id, job_id = %job.id, error = %e, "billing email not sent"),
            Err(_) => warn!(user_id = %payload.user_id, job_id = %job.id, "billing email timed out"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use folio_core::UserId;

    use crate::pipeline::testing::{RecordingMailer, ScriptedGenerator, StubProviders, claimed, deps_with};

    #[test]
    fn templates_fill_defaults() {
        let (title, body) = billing_template(BillingEvent::TrialEnding, None, Some(3));
        assert_eq!(title, "Your trial ends soon");
        assert_eq!(
            body,
            "Your trial ends in 3 day(s). Choose a plan to keep your portfolio online."
        );
        let (_, body) = billing_template(BillingEvent::RenewalSuccess, None, None);
        assert_eq!(body, "Your current plan has been renewed.");
        let (_, body) = billing_template(BillingEvent::Upgraded, Some("pro"), None);
        assert_eq!(body, "You are now on the pro plan.");
    }

    fn payload(user: UserId) -> BillingPayload {
        BillingPayload {
            user_id: user,
            event: BillingEvent::RenewalFailed,
            tier: Some("pro".into()),
            days_remaining: None,
        }
    }

    #[tokio::test]
    async fn writes_notification_and_mails_once() {
        let mailer = Arc::new(RecordingMailer::default());
        let deps = deps_with(
            Arc::new(ScriptedGenerator::failing()),
            Arc::new(StubProviders::default()),
            mailer.clone(),
        );
        let user = UserId::new();
        let job = claimed(Topic::BillingNotify, user, &payload(user));
        let handler = BillingNotifyHandler::new(deps.clone());

        handler.handle(&job, payload(user)).await.unwrap();
        handler.handle(&job, payload(user)).await.unwrap();

        let notes = deps.records.notifications.list_for_user(user).await.unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].title, "Payment failed");
        assert_eq!(notes[0].payload["event"], "renewal_failed");
        assert_eq!(mailer.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn mail_failure_does_not_fail_the_job() {
        let mailer = Arc::new(RecordingMailer {
            fail: true,
            ..RecordingMailer::default()
        });
        let deps = deps_with(
            Arc::new(ScriptedGenerator::failing()),
            Arc::new(StubProviders::default()),
            mailer,
        );
        let user = UserId::new();
        let job = claimed(Topic::BillingNotify, user, &payload(user));

        BillingNotifyHandler::new(deps.clone())
            .handle(&job, payload(user))
            .await
            .unwrap();
        assert_eq!(deps.records.notifications.list_for_user(user).await.unwrap().len(), 1);
    }
}
