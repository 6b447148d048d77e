//! Events that drive a turn forward

use crate::conversation::ToolCallRequest;
use crate::llm::LlmErrorKind;

/// Events that trigger state transitions
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    UserMessage {
        text: String,
    },

    // Structured requests (initial and follow-up)
    ModelResponded {
        text: Option<String>,
        tool_calls: Vec<ToolCallRequest>,
    },
    ModelFailed {
        kind: LlmErrorKind,
        message: String,
    },

    ToolCompleted {
        tool_call_id: String,
        success: bool,
        result_text: String,
    },

    // Plain streaming fallback
    StreamChunk {
        text: String,
    },
    StreamFinished,
    StreamFailed {
        kind: LlmErrorKind,
        message: String,
    },

    // Plain non-streaming fallback
    PlainResponded {
        text: Option<String>,
    },
    PlainFailed {
        kind: LlmErrorKind,
        message: String,
    },
}

impl Event {
    pub fn label(&self) -> &'static str {
        match self {
            Event::UserMessage { .. } => "user_message",
            Event::ModelResponded { .. } => "model_responded",
            Event::ModelFailed { .. } => "model_failed",
            Event::ToolCompleted { .. } => "tool_completed",
            Event::StreamChunk { .. } => "stream_chunk",
            Event::StreamFinished => "stream_finished",
            Event::StreamFailed { .. } => "stream_failed",
            Event::PlainResponded { .. } => "plain_responded",
            Event::PlainFailed { .. } => "plain_failed",
        }
    }
}
