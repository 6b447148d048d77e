//! Trait abstractions for runtime I/O
//!
//! These traits enable testing the runner with mock implementations.

use crate::conversation::Conversation;
use crate::functions::{Dispatcher, FunctionOutput};
use crate::llm::{LlmError, LlmRequest, LlmResponse, LlmService, TextStream};
use crate::schema::FunctionDescriptor;
use crate::state_machine::Notice;
use async_trait::async_trait;
use std::sync::Arc;

/// Client for making model requests
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Structured completion; may carry tool call requests
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError>;

    /// Plain streamed completion
    async fn complete_streaming(&self, request: &LlmRequest) -> Result<TextStream, LlmError>;
}

/// Executor for function calls
#[async_trait]
pub trait FunctionExecutor: Send + Sync {
    /// Run a function; failures come back as result text, never as errors
    async fn execute(&self, name: &str, raw_arguments: &str) -> FunctionOutput;

    /// Tool declarations advertised to the model
    fn descriptors(&self) -> Arc<[FunctionDescriptor]>;
}

/// Durable storage for transcripts
#[async_trait]
pub trait TranscriptStore: Send + Sync {
    /// Store the whole conversation; called after every turn mutation
    async fn save(&self, conversation: &Conversation) -> Result<(), String>;
}

/// User-facing output
pub trait OutputSink: Send + Sync {
    /// Assistant text, possibly a partial chunk
    fn text(&self, text: &str);

    fn notice(&self, notice: &Notice);

    /// The turn ended without an answer
    fn failure(&self, message: &str);
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: ModelClient + ?Sized> ModelClient for Arc<T> {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        (**self).complete(request).await
    }

    async fn complete_streaming(&self, request: &LlmRequest) -> Result<TextStream, LlmError> {
        (**self).complete_streaming(request).await
    }
}

#[async_trait]
impl<T: FunctionExecutor + ?Sized> FunctionExecutor for Arc<T> {
    async fn execute(&self, name: &str, raw_arguments: &str) -> FunctionOutput {
        (**self).execute(name, raw_arguments).await
    }

    fn descriptors(&self) -> Arc<[FunctionDescriptor]> {
        (**self).descriptors()
    }
}

#[async_trait]
impl<T: TranscriptStore + ?Sized> TranscriptStore for Arc<T> {
    async fn save(&self, conversation: &Conversation) -> Result<(), String> {
        (**self).save(conversation).await
    }
}

impl<T: OutputSink + ?Sized> OutputSink for Arc<T> {
    fn text(&self, text: &str) {
        (**self).text(text);
    }

    fn notice(&self, notice: &Notice) {
        (**self).notice(notice);
    }

    fn failure(&self, message: &str) {
        (**self).failure(message);
    }
}

// ============================================================================
// Production Adapters
// ============================================================================

use crate::db::Database;

/// Adapter to use an `LlmService` as `ModelClient`
#[derive(Clone)]
pub struct ServiceModelClient {
    service: Arc<dyn LlmService>,
}

impl ServiceModelClient {
    pub fn new(service: Arc<dyn LlmService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl ModelClient for ServiceModelClient {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        self.service.complete(request).await
    }

    async fn complete_streaming(&self, request: &LlmRequest) -> Result<TextStream, LlmError> {
        self.service.complete_streaming(request).await
    }
}

#[async_trait]
impl FunctionExecutor for Dispatcher {
    async fn execute(&self, name: &str, raw_arguments: &str) -> FunctionOutput {
        Dispatcher::execute(self, name, raw_arguments).await
    }

    fn descriptors(&self) -> Arc<[FunctionDescriptor]> {
        Dispatcher::descriptors(self)
    }
}

/// Adapter to use Database as `TranscriptStore`
#[derive(Clone)]
pub struct DatabaseStorage {
    db: Database,
}

impl DatabaseStorage {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TranscriptStore for DatabaseStorage {
    async fn save(&self, conversation: &Conversation) -> Result<(), String> {
        self.db
            .save_conversation(conversation)
            .map_err(|e| e.to_string())
    }
}
