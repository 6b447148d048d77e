//! Mock implementations for testing
//!
//! These mocks enable turn-level testing without real I/O.

use super::traits::{FunctionExecutor, ModelClient, OutputSink, TranscriptStore};
use crate::conversation::Conversation;
use crate::functions::FunctionOutput;
use crate::llm::{LlmError, LlmRequest, LlmResponse, TextStream};
use crate::schema::{FunctionDescriptor, ParameterSchema};
use crate::state_machine::Notice;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

// ============================================================================
// Mock Model Client
// ============================================================================

/// Mock model client that returns queued responses and streams
pub struct MockModelClient {
    responses: Mutex<VecDeque<Result<LlmResponse, LlmError>>>,
    streams: Mutex<VecDeque<Result<Vec<Result<String, LlmError>>, LlmError>>>,
    /// Record of all requests made, structured and streaming
    requests: Mutex<Vec<LlmRequest>>,
    stream_requests: Mutex<usize>,
}

impl MockModelClient {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            streams: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            stream_requests: Mutex::new(0),
        }
    }

    /// Queue a successful response
    pub fn queue_response(&self, response: LlmResponse) {
        self.responses.lock().unwrap().push_back(Ok(response));
    }

    /// Queue an error response
    pub fn queue_error(&self, error: LlmError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    /// Queue a stream yielding these items in order
    pub fn queue_stream(&self, items: Vec<Result<String, LlmError>>) {
        self.streams.lock().unwrap().push_back(Ok(items));
    }

    /// Queue a stream that fails to open
    pub fn queue_stream_error(&self, error: LlmError) {
        self.streams.lock().unwrap().push_back(Err(error));
    }

    /// Get recorded requests
    pub fn recorded_requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of streaming requests made
    pub fn stream_requests(&self) -> usize {
        *self.stream_requests.lock().unwrap()
    }
}

impl Default for MockModelClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModelClient for MockModelClient {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::network("No mock response queued")))
    }

    async fn complete_streaming(&self, request: &LlmRequest) -> Result<TextStream, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        *self.stream_requests.lock().unwrap() += 1;
        let items = self
            .streams
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::network("No mock stream queued")))?;
        Ok(Box::pin(futures::stream::iter(items)))
    }
}

// ============================================================================
// Mock Function Executor
// ============================================================================

/// Mock function executor with predefined outputs
pub struct MockFunctionExecutor {
    outputs: HashMap<String, FunctionOutput>,
    descriptors: Vec<FunctionDescriptor>,
    /// Record of executions as (name, raw arguments)
    executions: Mutex<Vec<(String, String)>>,
}

impl MockFunctionExecutor {
    pub fn new() -> Self {
        Self {
            outputs: HashMap::new(),
            descriptors: Vec::new(),
            executions: Mutex::new(Vec::new()),
        }
    }

    /// Add a function with a predefined output
    pub fn with_output(mut self, name: impl Into<String>, output: FunctionOutput) -> Self {
        let name = name.into();
        self.descriptors.push(FunctionDescriptor {
            name: name.clone(),
            description: format!("Mock {name}"),
            parameters: ParameterSchema::default(),
        });
        self.outputs.insert(name, output);
        self
    }

    /// Get recorded executions
    pub fn recorded_executions(&self) -> Vec<(String, String)> {
        self.executions.lock().unwrap().clone()
    }
}

impl Default for MockFunctionExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FunctionExecutor for MockFunctionExecutor {
    async fn execute(&self, name: &str, raw_arguments: &str) -> FunctionOutput {
        self.executions
            .lock()
            .unwrap()
            .push((name.to_string(), raw_arguments.to_string()));
        self.outputs
            .get(name)
            .cloned()
            .unwrap_or_else(|| FunctionOutput::error(format!("Function {name} not found")))
    }

    fn descriptors(&self) -> Arc<[FunctionDescriptor]> {
        self.descriptors.clone().into()
    }
}

// ============================================================================
// In-Memory Transcript Store
// ============================================================================

/// Keeps the latest saved copy of each conversation
pub struct MemoryTranscriptStore {
    saved: Mutex<HashMap<String, Conversation>>,
}

impl MemoryTranscriptStore {
    pub fn new() -> Self {
        Self {
            saved: Mutex::new(HashMap::new()),
        }
    }

    pub fn saved(&self, conv_id: &str) -> Option<Conversation> {
        self.saved.lock().unwrap().get(conv_id).cloned()
    }
}

impl Default for MemoryTranscriptStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TranscriptStore for MemoryTranscriptStore {
    async fn save(&self, conversation: &Conversation) -> Result<(), String> {
        self.saved
            .lock()
            .unwrap()
            .insert(conversation.id.clone(), conversation.clone());
        Ok(())
    }
}

// ============================================================================
// Recording Sink
// ============================================================================

/// Captures everything the runner shows the user
#[derive(Default)]
pub struct RecordingSink {
    text: Mutex<String>,
    notices: Mutex<Vec<Notice>>,
    failures: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All emitted text, concatenated
    pub fn emitted_text(&self) -> String {
        self.text.lock().unwrap().clone()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().unwrap().clone()
    }

    pub fn failures(&self) -> Vec<String> {
        self.failures.lock().unwrap().clone()
    }
}

impl OutputSink for RecordingSink {
    fn text(&self, text: &str) {
        self.text.lock().unwrap().push_str(text);
    }

    fn notice(&self, notice: &Notice) {
        self.notices.lock().unwrap().push(notice.clone());
    }

    fn failure(&self, message: &str) {
        self.failures.lock().unwrap().push(message.to_string());
    }
}
