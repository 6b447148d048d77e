//! Model provider abstraction
//!
//! The boundary to the remote chat model. One provider is implemented
//! ([`GrokService`]); [`LoggingService`] wraps any provider with request
//! timing and failure classification logs.

mod error;
mod grok;
mod types;

pub use error::{LlmError, LlmErrorKind};
pub use grok::{GrokConfig, GrokService, DEFAULT_BASE_URL, DEFAULT_MODEL};
pub use types::{LlmRequest, LlmResponse, TextStream, Usage};

use async_trait::async_trait;
use std::sync::Arc;

/// Common interface for model providers
#[async_trait]
pub trait LlmService: Send + Sync {
    /// Structured, non-streaming completion; may return tool call requests
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError>;

    /// Plain text completion delivered as chunks. Tool declarations on the
    /// request are ignored.
    async fn complete_streaming(&self, request: &LlmRequest) -> Result<TextStream, LlmError>;

    /// Get the model ID
    fn model_id(&self) -> &str;
}

/// Logging wrapper for model services
pub struct LoggingService {
    inner: Arc<dyn LlmService>,
    model_id: String,
}

impl LoggingService {
    pub fn new(inner: Arc<dyn LlmService>) -> Self {
        let model_id = inner.model_id().to_string();
        Self { inner, model_id }
    }
}

#[async_trait]
impl LlmService for LoggingService {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let start = std::time::Instant::now();
        let result = self.inner.complete(request).await;
        let duration = start.elapsed();

        match &result {
            Ok(response) => {
                tracing::info!(
                    model = %self.model_id,
                    duration_ms = %duration.as_millis(),
                    input_tokens = response.usage.input_tokens,
                    output_tokens = response.usage.output_tokens,
                    tool_calls = response.tool_calls.len(),
                    "LLM request completed"
                );
            }
            Err(e) => {
                tracing::error!(
                    model = %self.model_id,
                    duration_ms = %duration.as_millis(),
                    error = %e.message,
                    kind = ?e.kind,
                    retryable = e.kind.is_retryable(),
                    "LLM request failed"
                );
            }
        }

        result
    }

    async fn complete_streaming(&self, request: &LlmRequest) -> Result<TextStream, LlmError> {
        let start = std::time::Instant::now();
        let result = self.inner.complete_streaming(request).await;

        match &result {
            Ok(_) => tracing::info!(
                model = %self.model_id,
                duration_ms = %start.elapsed().as_millis(),
                "LLM stream opened"
            ),
            Err(e) => tracing::error!(
                model = %self.model_id,
                duration_ms = %start.elapsed().as_millis(),
                error = %e.message,
                kind = ?e.kind,
                retryable = e.kind.is_retryable(),
                "LLM stream failed to open"
            ),
        }

        result
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}
