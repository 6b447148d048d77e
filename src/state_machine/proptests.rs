//! Property-based tests for the turn state machine
//!
//! A small simulator plays the runtime's role: it answers every effect that
//! needs a reply with an event drawn from a scripted outcome, so whole turns
//! can be checked for ordering and termination.

#![allow(clippy::single_match_else)]

use super::*;
use crate::conversation::{ConversationTurn, ToolCallRequest};
use crate::llm::LlmErrorKind;
use proptest::prelude::*;
use std::collections::{HashSet, VecDeque};

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_tool_call() -> impl Strategy<Value = ToolCallRequest> {
    // Small id alphabet so duplicates show up regularly
    (
        "call_[a-d]",
        prop_oneof![
            Just("list_accounts"),
            Just("make_payment"),
            Just("transfer_funds"),
        ],
    )
        .prop_map(|(id, name)| ToolCallRequest::new(id, name, "{}"))
}

fn arb_error_kind() -> impl Strategy<Value = LlmErrorKind> {
    prop_oneof![
        Just(LlmErrorKind::Network),
        Just(LlmErrorKind::RateLimit),
        Just(LlmErrorKind::Auth),
        Just(LlmErrorKind::InvalidRequest),
        Just(LlmErrorKind::ServerError),
        Just(LlmErrorKind::Cancelled),
        Just(LlmErrorKind::Unknown),
    ]
}

fn arb_text() -> impl Strategy<Value = Option<String>> {
    prop::option::of("[a-zA-Z ]{0,12}")
}

/// Scripted results for every remote call a turn may make
#[derive(Debug, Clone)]
struct Script {
    initial: Result<(Option<String>, Vec<ToolCallRequest>), LlmErrorKind>,
    tool_success: Vec<bool>,
    followup: Result<Option<String>, LlmErrorKind>,
    stream: Result<Vec<String>, (Vec<String>, LlmErrorKind)>,
    plain: Result<Option<String>, LlmErrorKind>,
}

fn arb_reply() -> impl Strategy<Value = Result<Option<String>, LlmErrorKind>> {
    prop_oneof![
        arb_text().prop_map(Ok::<_, LlmErrorKind>),
        arb_error_kind().prop_map(Err::<Option<String>, _>),
    ]
}

fn arb_script() -> impl Strategy<Value = Script> {
    let initial = prop_oneof![
        (arb_text(), prop::collection::vec(arb_tool_call(), 0..6)).prop_map(Ok::<_, LlmErrorKind>),
        arb_error_kind().prop_map(Err::<(Option<String>, Vec<ToolCallRequest>), _>),
    ];
    let chunks = prop::collection::vec("[a-z]{1,4}", 0..4);
    let stream = prop_oneof![
        chunks.clone().prop_map(Ok::<_, (Vec<String>, LlmErrorKind)>),
        (chunks, arb_error_kind()).prop_map(Err::<Vec<String>, _>),
    ];
    (
        initial,
        prop::collection::vec(any::<bool>(), 6),
        arb_reply(),
        stream,
        arb_reply(),
    )
        .prop_map(|(initial, tool_success, followup, stream, plain)| Script {
            initial,
            tool_success,
            followup,
            stream,
            plain,
        })
}

// ============================================================================
// Simulator
// ============================================================================

#[derive(Debug, Default)]
struct Trace {
    final_state: TurnState,
    history: Vec<ConversationTurn>,
    effects: Vec<Effect>,
    /// Number of structured requests issued
    completions: usize,
}

fn run_turn(script: &Script) -> Result<Trace, TransitionError> {
    let mut trace = Trace::default();
    let mut state = TurnState::AwaitingUserInput;
    let mut pending = VecDeque::from([Event::UserMessage {
        text: "pay my bills".to_string(),
    }]);
    let mut chunks: VecDeque<String> = match &script.stream {
        Ok(chunks) | Err((chunks, _)) => chunks.iter().cloned().collect(),
    };
    let mut tools_run = 0;

    // Generous bound; a correct machine needs far fewer steps
    for _ in 0..200 {
        let Some(event) = pending.pop_front() else {
            break;
        };
        let result = transition(&state, event)?;
        state = result.new_state;

        for effect in result.effects {
            match &effect {
                Effect::AppendTurn(turn) => trace.history.push(turn.clone()),
                Effect::RequestCompletion if trace.completions == 0 => {
                    trace.completions += 1;
                    pending.push_back(match &script.initial {
                        Ok((text, tool_calls)) => Event::ModelResponded {
                            text: text.clone(),
                            tool_calls: tool_calls.clone(),
                        },
                        Err(kind) => Event::ModelFailed {
                            kind: *kind,
                            message: "initial failed".to_string(),
                        },
                    });
                }
                Effect::RequestCompletion => {
                    trace.completions += 1;
                    pending.push_back(match &script.followup {
                        Ok(text) => Event::ModelResponded {
                            text: text.clone(),
                            tool_calls: vec![],
                        },
                        Err(kind) => Event::ModelFailed {
                            kind: *kind,
                            message: "followup failed".to_string(),
                        },
                    });
                }
                Effect::DispatchTool(call) => {
                    let success = script.tool_success[tools_run % script.tool_success.len()];
                    tools_run += 1;
                    pending.push_back(Event::ToolCompleted {
                        tool_call_id: call.id.clone(),
                        success,
                        result_text: format!("result of {}", call.function_name),
                    });
                }
                Effect::OpenStream | Effect::PollStream => {
                    pending.push_back(match (chunks.pop_front(), &script.stream) {
                        (Some(text), _) => Event::StreamChunk { text },
                        (None, Ok(_)) => Event::StreamFinished,
                        (None, Err((_, kind))) => Event::StreamFailed {
                            kind: *kind,
                            message: "stream broke".to_string(),
                        },
                    });
                }
                Effect::RequestPlain => {
                    pending.push_back(match &script.plain {
                        Ok(text) => Event::PlainResponded { text: text.clone() },
                        Err(kind) => Event::PlainFailed {
                            kind: *kind,
                            message: "plain failed".to_string(),
                        },
                    });
                }
                Effect::Persist
                | Effect::EmitText(_)
                | Effect::Notify(_)
                | Effect::ReportFailure { .. } => {}
            }
            trace.effects.push(effect);
        }
    }

    trace.final_state = state;
    Ok(trace)
}

/// Tool call ids that do not yet have a tool result in `history`
fn unanswered(history: &[ConversationTurn]) -> Vec<String> {
    let mut open: Vec<String> = Vec::new();
    for turn in history {
        match turn {
            ConversationTurn::ToolResult { tool_call_id, .. } => open.retain(|id| id != tool_call_id),
            other => open.extend(other.tool_calls().iter().map(|c| c.id.clone())),
        }
    }
    open
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Every turn ends in a terminal state without transition errors
    #[test]
    fn prop_turn_always_terminates(script in arb_script()) {
        let trace = run_turn(&script);
        prop_assert!(trace.is_ok(), "transition error: {:?}", trace);
        let trace = trace.unwrap();
        prop_assert!(
            trace.final_state.is_turn_complete(),
            "stuck in {:?}",
            trace.final_state
        );
    }

    /// The follow-up request is only made once every tool call is answered
    #[test]
    fn prop_followup_after_all_results(script in arb_script()) {
        let trace = run_turn(&script).unwrap();
        let mut history = Vec::new();
        let mut completions = 0;
        for effect in &trace.effects {
            match effect {
                Effect::AppendTurn(turn) => history.push(turn.clone()),
                Effect::RequestCompletion => {
                    completions += 1;
                    if completions > 1 {
                        prop_assert!(
                            unanswered(&history).is_empty(),
                            "follow-up with open calls: {:?}",
                            unanswered(&history)
                        );
                    }
                }
                _ => {}
            }
        }
        prop_assert!(unanswered(&trace.history).is_empty());
    }

    /// No tool call id is dispatched twice within a turn
    #[test]
    fn prop_each_id_dispatched_once(script in arb_script()) {
        let trace = run_turn(&script).unwrap();
        let mut seen = HashSet::new();
        for effect in &trace.effects {
            if let Effect::DispatchTool(call) = effect {
                prop_assert!(seen.insert(call.id.clone()), "{} dispatched twice", call.id);
            }
        }
    }

    /// A failed initial request never leaves a tool-call turn behind and
    /// goes to the streaming fallback unless the failure was authentication
    #[test]
    fn prop_initial_failure_path(script in arb_script()) {
        let trace = run_turn(&script).unwrap();
        let opened_stream = trace.effects.contains(&Effect::OpenStream);
        match &script.initial {
            Err(kind) => {
                prop_assert!(trace.history.iter().all(|t| t.tool_calls().is_empty()));
                prop_assert!(!trace
                    .effects
                    .iter()
                    .any(|e| matches!(e, Effect::DispatchTool(_))));
                prop_assert_eq!(opened_stream, kind.allows_fallback());
            }
            Ok(_) => prop_assert!(!opened_stream),
        }
    }

    /// At most two structured requests per turn: the initial and one follow-up
    #[test]
    fn prop_at_most_one_followup(script in arb_script()) {
        let trace = run_turn(&script).unwrap();
        prop_assert!(trace.completions <= 2);
    }

    /// A busy machine rejects new user messages
    #[test]
    fn prop_busy_rejects_messages(call in arb_tool_call(), buffer in "[a-z]{0,8}") {
        let busy = [
            TurnState::ModelRequested,
            TurnState::ToolsExecuting { current: call, remaining: vec![] },
            TurnState::FollowupRequested,
            TurnState::StreamingFallback { buffer },
            TurnState::PlainFallback,
        ];
        for state in &busy {
            let result = transition(state, Event::UserMessage { text: "hi".to_string() });
            prop_assert_eq!(result.unwrap_err(), TransitionError::Busy);
        }
    }
}
