use async_trait::async_trait;
use tracing::info;

use folio_core::UserId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    /// Recipient; address resolution belongs to the mail collaborator.
    pub to: UserId,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, thiserror::Error)]
#[error("mail delivery failed: {0}")]
pub struct MailError(pub String);

/// Outbound mail collaborator. Delivery is best-effort from the pipeline's
/// point of view.
#[async_trait]
pub trait Mailer: Send + Sync + 'static {
    async fn send(&self, email: &Email) -> Result<(), MailError>;
}

/// Mailer that only logs, for development and tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingMailer;

#[async_trait]
impl Mailer for TracingMailer {
    async fn send(&self, email: &Email) -> Result<(), MailError> {
        info!(to = %email.to, subject = %email.subject, "email sent");
        Ok(())
    }
}
