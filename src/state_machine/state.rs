//! Turn state types

use crate::conversation::ToolCallRequest;
use serde::{Deserialize, Serialize};

/// Where one user turn currently stands
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnState {
    /// Ready for user input, no pending operations
    #[default]
    AwaitingUserInput,

    /// Structured request with tool declarations in flight
    ModelRequested,

    /// Executing requested tool calls serially, in request order
    ToolsExecuting {
        current: ToolCallRequest,
        remaining: Vec<ToolCallRequest>,
    },

    /// Every tool call answered; follow-up request in flight
    FollowupRequested,

    /// Initial request failed; consuming a plain streamed completion
    StreamingFallback {
        /// Text received so far
        buffer: String,
    },

    /// Streaming failed too; single plain completion in flight
    PlainFallback,

    /// Turn finished; `answer` is the final assistant text, if any
    FinalAnswerReceived { answer: Option<String> },

    /// Turn ended without an assistant reply
    Failed { message: String },
}

impl TurnState {
    /// Whether the current turn has ended
    pub fn is_turn_complete(&self) -> bool {
        matches!(
            self,
            TurnState::FinalAnswerReceived { .. } | TurnState::Failed { .. }
        )
    }

    /// Whether a new user message can start a turn
    pub fn accepts_user_input(&self) -> bool {
        matches!(self, TurnState::AwaitingUserInput) || self.is_turn_complete()
    }

    pub fn label(&self) -> &'static str {
        match self {
            TurnState::AwaitingUserInput => "awaiting_user_input",
            TurnState::ModelRequested => "model_requested",
            TurnState::ToolsExecuting { .. } => "tools_executing",
            TurnState::FollowupRequested => "followup_requested",
            TurnState::StreamingFallback { .. } => "streaming_fallback",
            TurnState::PlainFallback => "plain_fallback",
            TurnState::FinalAnswerReceived { .. } => "final_answer_received",
            TurnState::Failed { .. } => "failed",
        }
    }
}
