//! Common types for LLM interactions

use crate::conversation::{ConversationTurn, ToolCallRequest};
use crate::schema::FunctionDescriptor;
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;

use super::LlmError;

/// LLM request
#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub turns: Vec<ConversationTurn>,
    /// Tool declarations; `None` asks for a plain completion
    pub tools: Option<Arc<[FunctionDescriptor]>>,
}

impl LlmRequest {
    pub fn with_tools(turns: Vec<ConversationTurn>, tools: Arc<[FunctionDescriptor]>) -> Self {
        Self {
            turns,
            tools: Some(tools),
        }
    }

    pub fn plain(turns: Vec<ConversationTurn>) -> Self {
        Self { turns, tools: None }
    }

    pub fn has_tools(&self) -> bool {
        self.tools.as_ref().is_some_and(|t| !t.is_empty())
    }
}

/// LLM response
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LlmResponse {
    /// Assistant text, absent when empty
    pub text: Option<String>,
    pub tool_calls: Vec<ToolCallRequest>,
    pub usage: Usage,
}

impl LlmResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn tool_calls(text: Option<String>, tool_calls: Vec<ToolCallRequest>) -> Self {
        Self {
            text,
            tool_calls,
            usage: Usage::default(),
        }
    }
}

/// Usage statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Finite, non-restartable sequence of text chunks. Dropping it closes the
/// underlying connection.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send>>;
