//! LLM provider trait definition

use crate::{CompletionRequest, CompletionResponse, LLMError, Result};
use async_trait::async_trait;

/// A chat-completion backend (Gemini, OpenAI or any OpenAI-compatible server)
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Generate a completion from the LLM
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;

    /// Short provider name used in logs, e.g. "gemini"
    fn name(&self) -> &str;

    /// Complete and return the trimmed answer text
    ///
    /// A blank answer (typically a safety-filtered one) is an
    /// [`LLMError::UnexpectedResponse`].
    async fn complete_text(&self, request: CompletionRequest) -> Result<String> {
        let response = self.complete(request).await?;
        let text = response.text().trim();
        if text.is_empty() {
            return Err(LLMError::UnexpectedResponse(format!(
                "{} returned no text ({:?})",
                self.name(),
                response.stop_reason
            )));
        }
        tracing::debug!(
            provider = self.name(),
            tokens = response.usage.total(),
            "completion of {} chars",
            text.len()
        );
        Ok(text.to_string())
    }
}
