//! Conversation transcript types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A model-issued request to run a named function
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Opaque, provider-assigned id
    pub id: String,
    pub function_name: String,
    /// Argument JSON exactly as the model produced it
    pub raw_arguments: String,
}

impl ToolCallRequest {
    pub fn new(
        id: impl Into<String>,
        function_name: impl Into<String>,
        raw_arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            function_name: function_name.into(),
            raw_arguments: raw_arguments.into(),
        }
    }
}

/// One atomic contribution to the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum ConversationTurn {
    User {
        text: String,
    },
    Assistant {
        text: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCallRequest>,
    },
    ToolResult {
        tool_call_id: String,
        result_text: String,
    },
}

impl ConversationTurn {
    pub fn user(text: impl Into<String>) -> Self {
        ConversationTurn::User { text: text.into() }
    }

    /// Assistant turn with no tool calls
    pub fn assistant(text: impl Into<String>) -> Self {
        ConversationTurn::Assistant {
            text: text.into(),
            tool_calls: Vec::new(),
        }
    }

    pub fn assistant_with_calls(text: impl Into<String>, tool_calls: Vec<ToolCallRequest>) -> Self {
        ConversationTurn::Assistant {
            text: text.into(),
            tool_calls,
        }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, result_text: impl Into<String>) -> Self {
        ConversationTurn::ToolResult {
            tool_call_id: tool_call_id.into(),
            result_text: result_text.into(),
        }
    }

    pub fn role(&self) -> &'static str {
        match self {
            ConversationTurn::User { .. } => "user",
            ConversationTurn::Assistant { .. } => "assistant",
            ConversationTurn::ToolResult { .. } => "tool_result",
        }
    }

    pub fn tool_calls(&self) -> &[ToolCallRequest] {
        match self {
            ConversationTurn::Assistant { tool_calls, .. } => tool_calls,
            _ => &[],
        }
    }
}

/// Ordered, append-only transcript of one chat session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub turns: Vec<ConversationTurn>,
}

impl Conversation {
    pub fn new() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            turns: Vec::new(),
        }
    }

    pub fn push(&mut self, turn: ConversationTurn) {
        self.turns.push(turn);
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Tool call ids requested by assistant turns that have no result yet
    pub fn unanswered_tool_calls(&self) -> Vec<&str> {
        let mut pending: Vec<&str> = Vec::new();
        for turn in &self.turns {
            match turn {
                ConversationTurn::Assistant { tool_calls, .. } => {
                    pending.extend(tool_calls.iter().map(|c| c.id.as_str()));
                }
                ConversationTurn::ToolResult { tool_call_id, .. } => {
                    pending.retain(|id| id != tool_call_id);
                }
                ConversationTurn::User { .. } => {}
            }
        }
        pending
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}
