//! Turn runner: executes state machine effects

use super::traits::{FunctionExecutor, ModelClient, OutputSink, TranscriptStore};
use crate::conversation::Conversation;
use crate::llm::{LlmError, LlmRequest, TextStream};
use crate::state_machine::{transition, Effect, Event, TransitionError, TurnState};
use futures::StreamExt;
use std::collections::VecDeque;
use std::future::Future;
use tokio_util::sync::CancellationToken;

/// Drives one user turn at a time against generic model, function, storage
/// and output implementations
pub struct TurnRunner<M, F, S, O>
where
    M: ModelClient,
    F: FunctionExecutor,
    S: TranscriptStore,
    O: OutputSink,
{
    model: M,
    functions: F,
    store: S,
    sink: O,
    auto_save: bool,
}

impl<M, F, S, O> TurnRunner<M, F, S, O>
where
    M: ModelClient,
    F: FunctionExecutor,
    S: TranscriptStore,
    O: OutputSink,
{
    pub fn new(model: M, functions: F, store: S, sink: O) -> Self {
        Self {
            model,
            functions,
            store,
            sink,
            auto_save: true,
        }
    }

    /// Skip `Persist` effects when disabled
    pub fn with_auto_save(mut self, auto_save: bool) -> Self {
        self.auto_save = auto_save;
        self
    }

    pub fn functions(&self) -> &F {
        &self.functions
    }

    /// Run one user turn to completion, appending to `conversation`
    ///
    /// Cancelling `cancel` fails the in-flight model call; the turn then
    /// follows the same fallback path as any transport failure. Tool calls
    /// that already started run to completion.
    pub async fn run_turn(
        &self,
        conversation: &mut Conversation,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<TurnState, TransitionError> {
        let mut state = TurnState::AwaitingUserInput;
        let mut stream: Option<TextStream> = None;
        let mut events = VecDeque::from([Event::UserMessage {
            text: text.to_string(),
        }]);

        // Process events in a loop - no recursion
        while let Some(event) = events.pop_front() {
            tracing::debug!(
                conv_id = %conversation.id,
                state = state.label(),
                event = event.label(),
                "Processing event"
            );
            let result = transition(&state, event)?;
            state = result.new_state;

            for effect in result.effects {
                if let Some(next) = self
                    .execute_effect(effect, conversation, &mut stream, cancel)
                    .await
                {
                    events.push_back(next);
                }
            }
        }

        tracing::info!(
            conv_id = %conversation.id,
            state = state.label(),
            turns = conversation.len(),
            "Turn finished"
        );
        Ok(state)
    }

    /// Perform one effect; effects that call out produce the next event
    async fn execute_effect(
        &self,
        effect: Effect,
        conversation: &mut Conversation,
        stream: &mut Option<TextStream>,
        cancel: &CancellationToken,
    ) -> Option<Event> {
        match effect {
            Effect::AppendTurn(turn) => {
                conversation.push(turn);
                None
            }

            Effect::Persist => {
                if self.auto_save {
                    if let Err(e) = self.store.save(conversation).await {
                        tracing::warn!(conv_id = %conversation.id, error = %e, "Failed to persist conversation");
                    }
                }
                None
            }

            Effect::RequestCompletion => {
                let request =
                    LlmRequest::with_tools(conversation.turns.clone(), self.functions.descriptors());
                Some(
                    match cancellable(cancel, self.model.complete(&request)).await {
                        Ok(response) => Event::ModelResponded {
                            text: response.text,
                            tool_calls: response.tool_calls,
                        },
                        Err(e) => Event::ModelFailed {
                            kind: e.kind,
                            message: e.message,
                        },
                    },
                )
            }

            Effect::DispatchTool(call) => {
                let output = self
                    .functions
                    .execute(&call.function_name, &call.raw_arguments)
                    .await;
                Some(Event::ToolCompleted {
                    tool_call_id: call.id,
                    success: output.success,
                    result_text: output.output,
                })
            }

            Effect::OpenStream => {
                let request = LlmRequest::plain(conversation.turns.clone());
                match cancellable(cancel, self.model.complete_streaming(&request)).await {
                    Ok(opened) => {
                        *stream = Some(opened);
                        Some(next_chunk(stream, cancel).await)
                    }
                    Err(e) => Some(Event::StreamFailed {
                        kind: e.kind,
                        message: e.message,
                    }),
                }
            }

            Effect::PollStream => Some(next_chunk(stream, cancel).await),

            Effect::RequestPlain => {
                let request = LlmRequest::plain(conversation.turns.clone());
                Some(
                    match cancellable(cancel, self.model.complete(&request)).await {
                        Ok(response) => Event::PlainResponded {
                            text: response.text,
                        },
                        Err(e) => Event::PlainFailed {
                            kind: e.kind,
                            message: e.message,
                        },
                    },
                )
            }

            Effect::EmitText(text) => {
                self.sink.text(&text);
                None
            }

            Effect::Notify(notice) => {
                self.sink.notice(&notice);
                None
            }

            Effect::ReportFailure { message } => {
                tracing::error!(conv_id = %conversation.id, error = %message, "Turn failed");
                self.sink.failure(&message);
                None
            }
        }
    }
}

/// Race a model call against cancellation
async fn cancellable<T>(
    cancel: &CancellationToken,
    request: impl Future<Output = Result<T, LlmError>>,
) -> Result<T, LlmError> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(LlmError::cancelled("Request cancelled")),
        result = request => result,
    }
}

/// Read the next non-empty chunk. The stream is dropped, closing its
/// connection, as soon as it ends, errors or is cancelled.
async fn next_chunk(stream: &mut Option<TextStream>, cancel: &CancellationToken) -> Event {
    let Some(open) = stream.as_mut() else {
        return Event::StreamFailed {
            kind: crate::llm::LlmErrorKind::Unknown,
            message: "Stream is not open".to_string(),
        };
    };

    loop {
        let item = tokio::select! {
            biased;
            () = cancel.cancelled() => Some(Err(LlmError::cancelled("Stream cancelled"))),
            item = open.next() => item,
        };
        match item {
            Some(Ok(text)) if text.is_empty() => {}
            Some(Ok(text)) => return Event::StreamChunk { text },
            Some(Err(e)) => {
                *stream = None;
                return Event::StreamFailed {
                    kind: e.kind,
                    message: e.message,
                };
            }
            None => {
                *stream = None;
                return Event::StreamFinished;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::{ConversationTurn, ToolCallRequest};
    use crate::functions::FunctionOutput;
    use crate::llm::LlmResponse;
    use crate::runtime::testing::{
        MemoryTranscriptStore, MockFunctionExecutor, MockModelClient, RecordingSink,
    };
    use crate::state_machine::{Notice, FOLLOWUP_FALLBACK_MESSAGE};
    use std::sync::Arc;

    type TestRunner = TurnRunner<
        Arc<MockModelClient>,
        Arc<MockFunctionExecutor>,
        Arc<MemoryTranscriptStore>,
        Arc<RecordingSink>,
    >;

    struct Harness {
        model: Arc<MockModelClient>,
        functions: Arc<MockFunctionExecutor>,
        store: Arc<MemoryTranscriptStore>,
        sink: Arc<RecordingSink>,
        runner: TestRunner,
    }

    fn harness(functions: MockFunctionExecutor) -> Harness {
        let model = Arc::new(MockModelClient::new());
        let functions = Arc::new(functions);
        let store = Arc::new(MemoryTranscriptStore::new());
        let sink = Arc::new(RecordingSink::new());
        let runner = TurnRunner::new(
            model.clone(),
            functions.clone(),
            store.clone(),
            sink.clone(),
        );
        Harness {
            model,
            functions,
            store,
            sink,
            runner,
        }
    }

    fn call(id: &str, name: &str, args: &str) -> ToolCallRequest {
        ToolCallRequest::new(id, name, args)
    }

    #[tokio::test]
    async fn test_plain_answer() {
        let h = harness(
            MockFunctionExecutor::new().with_output("list_accounts", FunctionOutput::success("[]")),
        );
        h.model.queue_response(LlmResponse::text("Hello there"));

        let mut conversation = Conversation::new();
        let state = h
            .runner
            .run_turn(&mut conversation, "hi", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            state,
            TurnState::FinalAnswerReceived {
                answer: Some("Hello there".to_string())
            }
        );
        assert_eq!(
            conversation.turns,
            vec![
                ConversationTurn::user("hi"),
                ConversationTurn::assistant("Hello there")
            ]
        );
        assert_eq!(h.sink.emitted_text(), "Hello there");
        assert!(h.model.recorded_requests()[0].has_tools());
        assert_eq!(h.store.saved(&conversation.id), Some(conversation.clone()));
    }

    #[tokio::test]
    async fn test_tool_calls_run_in_order_before_followup() {
        let h = harness(
            MockFunctionExecutor::new()
                .with_output("list_accounts", FunctionOutput::success("[accounts]"))
                .with_output("make_payment", FunctionOutput::error("Payee not found")),
        );
        h.model.queue_response(LlmResponse::tool_calls(
            Some("Let me check.".to_string()),
            vec![
                call("c1", "list_accounts", "{}"),
                call("c2", "make_payment", r#"{"amount":5}"#),
            ],
        ));
        h.model.queue_response(LlmResponse::text("Done."));

        let mut conversation = Conversation::new();
        h.runner
            .run_turn(&mut conversation, "pay", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            h.functions.recorded_executions(),
            vec![
                ("list_accounts".to_string(), "{}".to_string()),
                ("make_payment".to_string(), r#"{"amount":5}"#.to_string()),
            ]
        );

        // Follow-up saw both results
        let requests = h.model.recorded_requests();
        assert_eq!(requests.len(), 2);
        let followup = &requests[1].turns;
        assert_eq!(followup.len(), 4);
        assert_eq!(
            followup[2],
            ConversationTurn::tool_result("c1", "[accounts]")
        );
        assert_eq!(
            followup[3],
            ConversationTurn::tool_result("c2", "Payee not found")
        );

        assert_eq!(conversation.len(), 5);
        assert!(conversation.unanswered_tool_calls().is_empty());
        assert!(h.sink.notices().contains(&Notice::CallingFunctions { count: 2 }));
        assert!(h.sink.notices().contains(&Notice::FunctionCompleted {
            name: "make_payment".to_string(),
            success: false
        }));
        assert_eq!(h.sink.emitted_text(), "Let me check.Done.");
    }

    #[tokio::test]
    async fn test_followup_failure_appends_fallback() {
        let h = harness(
            MockFunctionExecutor::new().with_output("list_payees", FunctionOutput::success("[]")),
        );
        h.model.queue_response(LlmResponse::tool_calls(
            None,
            vec![call("c1", "list_payees", "{}")],
        ));
        h.model.queue_error(LlmError::server_error("boom"));

        let mut conversation = Conversation::new();
        h.runner
            .run_turn(&mut conversation, "payees?", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            conversation.turns.last(),
            Some(&ConversationTurn::assistant(FOLLOWUP_FALLBACK_MESSAGE))
        );
        // No fallback cascade for the follow-up leg
        assert_eq!(h.model.stream_requests(), 0);
    }

    #[tokio::test]
    async fn test_initial_failure_streams() {
        let h = harness(MockFunctionExecutor::new());
        h.model.queue_error(LlmError::network("connection reset"));
        h.model.queue_stream(vec![Ok("Hel".to_string()), Ok("lo".to_string())]);

        let mut conversation = Conversation::new();
        let state = h
            .runner
            .run_turn(&mut conversation, "hi", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            state,
            TurnState::FinalAnswerReceived {
                answer: Some("Hello".to_string())
            }
        );
        assert_eq!(h.model.stream_requests(), 1);
        assert!(!h.model.recorded_requests()[1].has_tools());
        assert_eq!(
            conversation.turns,
            vec![
                ConversationTurn::user("hi"),
                ConversationTurn::assistant("Hello")
            ]
        );
        assert!(conversation.turns.iter().all(|t| t.tool_calls().is_empty()));
        assert_eq!(h.sink.emitted_text(), "Hello");
    }

    #[tokio::test]
    async fn test_stream_failure_falls_back_to_plain() {
        let h = harness(MockFunctionExecutor::new());
        h.model.queue_error(LlmError::server_error("503"));
        h.model.queue_stream(vec![
            Ok("par".to_string()),
            Err(LlmError::network("dropped")),
        ]);
        h.model.queue_response(LlmResponse::text("Full answer"));

        let mut conversation = Conversation::new();
        h.runner
            .run_turn(&mut conversation, "hi", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            conversation.turns.last(),
            Some(&ConversationTurn::assistant("Full answer"))
        );
        assert_eq!(conversation.len(), 2);
    }

    #[tokio::test]
    async fn test_every_leg_failing_reports_failure() {
        let h = harness(MockFunctionExecutor::new());
        h.model.queue_error(LlmError::network("down"));
        h.model.queue_stream_error(LlmError::network("down"));
        h.model.queue_error(LlmError::network("still down"));

        let mut conversation = Conversation::new();
        let state = h
            .runner
            .run_turn(&mut conversation, "hi", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            state,
            TurnState::Failed {
                message: "still down".to_string()
            }
        );
        assert_eq!(conversation.turns, vec![ConversationTurn::user("hi")]);
        assert_eq!(h.sink.failures(), vec!["still down".to_string()]);
    }

    #[tokio::test]
    async fn test_auth_failure_skips_cascade() {
        let h = harness(MockFunctionExecutor::new());
        h.model.queue_error(LlmError::from_status(401, "bad key"));

        let mut conversation = Conversation::new();
        let state = h
            .runner
            .run_turn(&mut conversation, "hi", &CancellationToken::new())
            .await
            .unwrap();

        assert!(matches!(state, TurnState::Failed { .. }));
        assert_eq!(h.model.recorded_requests().len(), 1);
        assert_eq!(h.model.stream_requests(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_turn_follows_cascade_and_fails() {
        let h = harness(MockFunctionExecutor::new());
        h.model.queue_response(LlmResponse::text("never seen"));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let mut conversation = Conversation::new();
        let state = h
            .runner
            .run_turn(&mut conversation, "hi", &cancel)
            .await
            .unwrap();

        assert!(matches!(state, TurnState::Failed { .. }));
        assert!(h.sink.notices().iter().any(|n| matches!(
            n,
            Notice::FallingBackToStreaming { .. }
        )));
        assert_eq!(conversation.len(), 1);
    }

    #[tokio::test]
    async fn test_auto_save_disabled() {
        let h = harness(MockFunctionExecutor::new());
        h.model.queue_response(LlmResponse::text("ok"));
        let runner = h.runner.with_auto_save(false);

        let mut conversation = Conversation::new();
        runner
            .run_turn(&mut conversation, "hi", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(h.store.saved(&conversation.id), None);
    }

    #[tokio::test]
    async fn test_empty_message_rejected() {
        let h = harness(MockFunctionExecutor::new());
        let mut conversation = Conversation::new();
        let result = h
            .runner
            .run_turn(&mut conversation, "  ", &CancellationToken::new())
            .await;
        assert_eq!(result.unwrap_err(), TransitionError::EmptyMessage);
        assert!(conversation.is_empty());
        assert_eq!(h.model.recorded_requests().len(), 0);
    }

    #[tokio::test]
    async fn test_stream_error_kind_preserved() {
        let h = harness(MockFunctionExecutor::new());
        h.model.queue_error(LlmError::network("down"));
        h.model.queue_stream_error(LlmError::auth("revoked"));

        let mut conversation = Conversation::new();
        let state = h
            .runner
            .run_turn(&mut conversation, "hi", &CancellationToken::new())
            .await
            .unwrap();

        // Auth on the streaming leg ends the cascade there
        assert_eq!(
            state,
            TurnState::Failed {
                message: "revoked".to_string()
            }
        );
        assert_eq!(h.model.recorded_requests().len(), 2);
    }
}
