use std::time::Duration;

use async_trait::async_trait;

use crate::result::AiError;

/// One text-generation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub system: Option<String>,
    pub max_tokens: u32,
}

impl GenerationRequest {
    pub const DEFAULT_MAX_TOKENS: u32 = 2048;

    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system: None,
            max_tokens: Self::DEFAULT_MAX_TOKENS,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// The external AI content generator. May be slow, fail, or return garbage.
#[async_trait]
pub trait ContentGenerator: Send + Sync + 'static {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, AiError>;
}

/// Call `generator` bounded by `timeout`.
///
/// Elapsed time becomes [`AiError::Timeout`] and blank output becomes
/// [`AiError::Malformed`], so callers only need one failure branch.
pub async fn generate_within(
    generator: &dyn ContentGenerator,
    request: &GenerationRequest,
    timeout: Duration,
) -> Result<String, AiError> {
    let text = tokio::time::timeout(timeout, generator.generate(request))
        .await
        .map_err(|_| AiError::Timeout(timeout))??;

    if text.trim().is_empty() {
        return Err(AiError::Malformed("empty completion".to_string()));
    }
    Ok(text)
}

/// Generator used when no AI endpoint is configured: every call fails, so
/// every handler takes its fallback path.
#[derive(Debug, Default, Copy, Clone)]
pub struct UnavailableGenerator;

#[async_trait]
impl ContentGenerator for UnavailableGenerator {
    async fn generate(&self, _request: &GenerationRequest) -> Result<String, AiError> {
        Err(AiError::Unavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(&'static str);

    #[async_trait]
    impl ContentGenerator for Fixed {
        async fn generate(&self, _request: &GenerationRequest) -> Result<String, AiError> {
            Ok(self.0.to_string())
        }
    }

    struct Slow;

    #[async_trait]
    impl ContentGenerator for Slow {
        async fn generate(&self, _request: &GenerationRequest) -> Result<String, AiError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok("too late".to_string())
        }
    }

    #[tokio::test]
    async fn passes_text_through() {
        let text = generate_within(&Fixed("hello"), &GenerationRequest::new("p"), Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(text, "hello");
    }

    #[tokio::test]
    async fn blank_output_is_malformed() {
        let err = generate_within(&Fixed("  \n"), &GenerationRequest::new("p"), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, AiError::Malformed(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_generator_times_out() {
        let err = generate_within(&Slow, &GenerationRequest::new("p"), Duration::from_secs(2))
            .await
            .unwrap_err();
        assert!(matches!(err, AiError::Timeout(d) if d == Duration::from_secs(2)));
    }

    #[tokio::test]
    async fn unavailable_always_fails() {
        let err = UnavailableGenerator
            .generate(&GenerationRequest::new("p"))
            .await
            .unwrap_err();
        assert!(matches!(err, AiError::Unavailable));
    }
}
