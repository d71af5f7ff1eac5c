//! Clients for the pipeline's external collaborators other than the AI
//! generator: third-party profile providers and the mail service.

pub mod mail;
pub mod providers;

pub use mail::{Email, MailError, Mailer, TracingMailer};
pub use providers::{HttpProviderClient, ProviderClient, ProviderEndpoints, ProviderError};
