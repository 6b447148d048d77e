//! Effects produced by state transitions

use crate::conversation::{ConversationTurn, ToolCallRequest};
use std::fmt;

/// Effects to be executed after state transition, in order
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Append a turn to the conversation
    AppendTurn(ConversationTurn),

    /// Hand the conversation to the transcript store
    Persist,

    /// Structured request with the full conversation and tool declarations
    RequestCompletion,

    /// Run one tool call through the dispatcher
    DispatchTool(ToolCallRequest),

    /// Open a plain streamed completion and read its first chunk
    OpenStream,

    /// Read the next chunk of the open stream
    PollStream,

    /// Plain non-streaming completion without tool declarations
    RequestPlain,

    /// Show assistant text to the user
    EmitText(String),

    /// Show a progress notice
    Notify(Notice),

    /// Tell the user the turn failed
    ReportFailure { message: String },
}

/// User-facing progress notices
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    CallingFunctions { count: usize },
    FunctionStarted { name: String },
    FunctionCompleted { name: String, success: bool },
    ProcessingResults,
    NoResponse,
    FollowupFailed { message: String },
    FallingBackToStreaming { reason: String },
    FallingBackToPlain { reason: String },
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::CallingFunctions { count } => write!(f, "Calling {count} function(s):"),
            Notice::FunctionStarted { name } => write!(f, "  -> {name}"),
            Notice::FunctionCompleted { success: true, .. } => write!(f, "     completed"),
            Notice::FunctionCompleted { success: false, .. } => {
                write!(f, "     completed with errors")
            }
            Notice::ProcessingResults => write!(f, "Processing function results..."),
            Notice::NoResponse => write!(f, "No response from the model."),
            Notice::FollowupFailed { message } => {
                write!(f, "Error getting final response: {message}")
            }
            Notice::FallingBackToStreaming { reason } => {
                write!(f, "Function calling failed: {reason}. Falling back to regular streaming...")
            }
            Notice::FallingBackToPlain { reason } => {
                write!(f, "Streaming failed: {reason}. Falling back to regular API call...")
            }
        }
    }
}
