//! Pure state transition function

use super::{Effect, Event, Notice, TurnState};
use crate::conversation::{ConversationTurn, ToolCallRequest};
use std::collections::HashSet;
use thiserror::Error;

/// Appended when the follow-up request fails or returns no text
pub const FOLLOWUP_FALLBACK_MESSAGE: &str =
    "I executed the requested functions, but encountered an error generating the final response.";

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: TurnState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: TurnState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("A turn is already in progress")]
    Busy,
    #[error("Message is empty")]
    EmptyMessage,
    #[error("Result for tool call {got} arrived while {expected} was executing")]
    UnexpectedToolResult { expected: String, got: String },
    #[error("Invalid transition: {event} in state {state}")]
    InvalidTransition {
        state: &'static str,
        event: &'static str,
    },
}

/// Pure transition function
///
/// Given the same inputs it always produces the same outputs; all I/O is
/// described by the returned effects.
pub fn transition(state: &TurnState, event: Event) -> Result<TransitionResult, TransitionError> {
    match (state, event) {
        // ============================================================
        // Turn start
        // ============================================================
        (s, Event::UserMessage { text }) if s.accepts_user_input() => {
            if text.trim().is_empty() {
                return Err(TransitionError::EmptyMessage);
            }
            Ok(TransitionResult::new(TurnState::ModelRequested)
                .with_effect(Effect::AppendTurn(ConversationTurn::user(text)))
                .with_effect(Effect::Persist)
                .with_effect(Effect::RequestCompletion))
        }

        (_, Event::UserMessage { .. }) => Err(TransitionError::Busy),

        // ============================================================
        // Initial structured response
        // ============================================================
        (TurnState::ModelRequested, Event::ModelResponded { text, tool_calls }) => {
            let text = text.filter(|t| !t.is_empty());
            let calls = dedupe_by_id(tool_calls);

            let Some((first, rest)) = calls.split_first() else {
                return Ok(final_answer(text));
            };

            let mut effects = Vec::new();
            if let Some(text) = &text {
                effects.push(Effect::EmitText(text.clone()));
            }
            effects.push(Effect::AppendTurn(ConversationTurn::assistant_with_calls(
                text.unwrap_or_default(),
                calls.clone(),
            )));
            effects.push(Effect::Persist);
            effects.push(Effect::Notify(Notice::CallingFunctions { count: calls.len() }));
            effects.extend(start_tool(first));

            Ok(TransitionResult::new(TurnState::ToolsExecuting {
                current: first.clone(),
                remaining: rest.to_vec(),
            })
            .with_effects(effects))
        }

        (TurnState::ModelRequested, Event::ModelFailed { kind, message }) => {
            if kind.allows_fallback() {
                Ok(TransitionResult::new(TurnState::StreamingFallback {
                    buffer: String::new(),
                })
                .with_effect(Effect::Notify(Notice::FallingBackToStreaming {
                    reason: message,
                }))
                .with_effect(Effect::OpenStream))
            } else {
                Ok(failed(message))
            }
        }

        // ============================================================
        // Tool execution
        // ============================================================
        (
            TurnState::ToolsExecuting { current, remaining },
            Event::ToolCompleted {
                tool_call_id,
                success,
                result_text,
            },
        ) => {
            if tool_call_id != current.id {
                return Err(TransitionError::UnexpectedToolResult {
                    expected: current.id.clone(),
                    got: tool_call_id,
                });
            }

            let result = TransitionResult::new(TurnState::FollowupRequested)
                .with_effect(Effect::AppendTurn(ConversationTurn::tool_result(
                    tool_call_id,
                    result_text,
                )))
                .with_effect(Effect::Persist)
                .with_effect(Effect::Notify(Notice::FunctionCompleted {
                    name: current.function_name.clone(),
                    success,
                }));

            match remaining.split_first() {
                Some((next, rest)) => Ok(TransitionResult {
                    new_state: TurnState::ToolsExecuting {
                        current: next.clone(),
                        remaining: rest.to_vec(),
                    },
                    effects: result.effects,
                }
                .with_effects(start_tool(next))),
                None => Ok(result
                    .with_effect(Effect::Notify(Notice::ProcessingResults))
                    .with_effect(Effect::RequestCompletion)),
            }
        }

        // ============================================================
        // Follow-up response; failures are absorbed with a fixed message
        // ============================================================
        (TurnState::FollowupRequested, Event::ModelResponded { text, .. }) => {
            match text.filter(|t| !t.is_empty()) {
                Some(text) => Ok(final_answer(Some(text))),
                None => Ok(followup_fallback(Notice::NoResponse)),
            }
        }

        (TurnState::FollowupRequested, Event::ModelFailed { message, .. }) => {
            Ok(followup_fallback(Notice::FollowupFailed { message }))
        }

        // ============================================================
        // Plain streaming fallback
        // ============================================================
        (TurnState::StreamingFallback { buffer }, Event::StreamChunk { text }) => {
            Ok(TransitionResult::new(TurnState::StreamingFallback {
                buffer: format!("{buffer}{text}"),
            })
            .with_effect(Effect::EmitText(text))
            .with_effect(Effect::PollStream))
        }

        (TurnState::StreamingFallback { buffer }, Event::StreamFinished) => {
            let answer = Some(buffer.clone()).filter(|b| !b.is_empty());
            let mut result = TransitionResult::new(TurnState::FinalAnswerReceived {
                answer: answer.clone(),
            });
            match answer {
                Some(text) => {
                    result = result
                        .with_effect(Effect::AppendTurn(ConversationTurn::assistant(text)))
                        .with_effect(Effect::Persist);
                }
                None => result = result.with_effect(Effect::Notify(Notice::NoResponse)),
            }
            Ok(result)
        }

        // Partial streamed text is discarded; the plain request starts over
        (TurnState::StreamingFallback { .. }, Event::StreamFailed { kind, message }) => {
            if kind.allows_fallback() {
                Ok(TransitionResult::new(TurnState::PlainFallback)
                    .with_effect(Effect::Notify(Notice::FallingBackToPlain { reason: message }))
                    .with_effect(Effect::RequestPlain))
            } else {
                Ok(failed(message))
            }
        }

        // ============================================================
        // Plain non-streaming fallback
        // ============================================================
        (TurnState::PlainFallback, Event::PlainResponded { text }) => {
            Ok(final_answer(text.filter(|t| !t.is_empty())))
        }

        (TurnState::PlainFallback, Event::PlainFailed { message, .. }) => Ok(failed(message)),

        (state, event) => Err(TransitionError::InvalidTransition {
            state: state.label(),
            event: event.label(),
        }),
    }
}

/// Keep the first request for each id so no id is dispatched twice
fn dedupe_by_id(tool_calls: Vec<ToolCallRequest>) -> Vec<ToolCallRequest> {
    let mut seen = HashSet::new();
    tool_calls
        .into_iter()
        .filter(|call| seen.insert(call.id.clone()))
        .collect()
}

fn start_tool(call: &ToolCallRequest) -> [Effect; 2] {
    [
        Effect::Notify(Notice::FunctionStarted {
            name: call.function_name.clone(),
        }),
        Effect::DispatchTool(call.clone()),
    ]
}

/// Finish with `text` as the answer; no assistant turn when there is none
fn final_answer(text: Option<String>) -> TransitionResult {
    let result = TransitionResult::new(TurnState::FinalAnswerReceived {
        answer: text.clone(),
    });
    match text {
        Some(text) => result
            .with_effect(Effect::EmitText(text.clone()))
            .with_effect(Effect::AppendTurn(ConversationTurn::assistant(text)))
            .with_effect(Effect::Persist),
        None => result.with_effect(Effect::Notify(Notice::NoResponse)),
    }
}

fn followup_fallback(notice: Notice) -> TransitionResult {
    TransitionResult::new(TurnState::FinalAnswerReceived {
        answer: Some(FOLLOWUP_FALLBACK_MESSAGE.to_string()),
    })
    .with_effect(Effect::Notify(notice))
    .with_effect(Effect::EmitText(FOLLOWUP_FALLBACK_MESSAGE.to_string()))
    .with_effect(Effect::AppendTurn(ConversationTurn::assistant(
        FOLLOWUP_FALLBACK_MESSAGE,
    )))
    .with_effect(Effect::Persist)
}

fn failed(message: String) -> TransitionResult {
    TransitionResult::new(TurnState::Failed {
        message: message.clone(),
    })
    .with_effect(Effect::ReportFailure { message })
}
