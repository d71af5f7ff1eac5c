//! `folio-ai`
//!
//! **Responsibility:** boundary to the external AI content generator.
//!
//! This crate is intentionally **not** part of the document domain:
//! - It must not depend on document types or stores.
//! - It must not mutate domain state.
//! - It returns raw text; callers map it onto documents and own the fallback.

pub mod generator;
pub mod http;
pub mod prompts;
pub mod result;

pub use generator::{ContentGenerator, GenerationRequest, UnavailableGenerator, generate_within};
pub use http::{HttpContentGenerator, HttpGeneratorConfig};
pub use result::AiError;
