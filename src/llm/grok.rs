//! xAI Grok provider over the `OpenAI`-compatible chat completions API

use super::types::{LlmRequest, LlmResponse, TextStream, Usage};
use super::{LlmError, LlmService};
use crate::conversation::{ConversationTurn, ToolCallRequest};
use crate::schema::FunctionDescriptor;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.x.ai/v1";
pub const DEFAULT_MODEL: &str = "grok-3";

/// Connection and sampling settings
#[derive(Debug, Clone, PartialEq)]
pub struct GrokConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout: Duration,
}

impl GrokConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: 4000,
            temperature: 0.7,
            timeout: Duration::from_secs(120),
        }
    }
}

pub struct GrokService {
    client: Client,
    config: GrokConfig,
    endpoint: String,
}

impl GrokService {
    pub fn new(config: GrokConfig) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::unknown(format!("Failed to create HTTP client: {e}")))?;
        let endpoint = format!("{}/chat/completions", config.base_url.trim_end_matches('/'));

        Ok(Self {
            client,
            config,
            endpoint,
        })
    }

    fn translate_request<'a>(&'a self, request: &'a LlmRequest, stream: bool) -> ChatRequest<'a> {
        let messages = request.turns.iter().map(translate_turn).collect();

        // Streaming is the plain fallback leg; tool declarations ride only on
        // structured requests
        let tools: Option<Vec<ChatTool<'a>>> = match &request.tools {
            Some(tools) if !stream && !tools.is_empty() => Some(
                tools
                    .iter()
                    .map(|function| ChatTool {
                        kind: "function",
                        function,
                    })
                    .collect(),
            ),
            _ => None,
        };
        let tool_choice = tools.as_ref().map(|_| "auto");

        ChatRequest {
            model: &self.config.model,
            messages,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            tools,
            tool_choice,
            stream,
        }
    }

    async fn send(&self, body: &ChatRequest<'_>) -> Result<reqwest::Response, LlmError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.config.api_key)
            .json(body)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response
            .text()
            .await
            .map_err(|e| LlmError::network(format!("Failed to read response: {e}")))?;
        let message = serde_json::from_str::<ChatErrorResponse>(&body)
            .map_or(body, |e| e.error.message);

        Err(LlmError::from_status(status.as_u16(), &message))
    }
}

fn map_transport_error(e: reqwest::Error) -> LlmError {
    if e.is_timeout() {
        LlmError::network(format!("Request timeout: {e}"))
    } else if e.is_connect() {
        LlmError::network(format!("Connection failed: {e}"))
    } else {
        LlmError::unknown(format!("Request failed: {e}"))
    }
}

fn translate_turn(turn: &ConversationTurn) -> ChatMessage {
    match turn {
        ConversationTurn::User { text } => ChatMessage {
            role: "user",
            content: Some(text.clone()),
            tool_calls: None,
            tool_call_id: None,
        },
        ConversationTurn::Assistant { text, tool_calls } => {
            let calls: Vec<WireToolCall> = tool_calls
                .iter()
                .map(|call| WireToolCall {
                    id: call.id.clone(),
                    kind: "function".to_string(),
                    function: WireFunctionCall {
                        name: call.function_name.clone(),
                        arguments: call.raw_arguments.clone(),
                    },
                })
                .collect();
            let content = if text.is_empty() && !calls.is_empty() {
                None
            } else {
                Some(text.clone())
            };
            ChatMessage {
                role: "assistant",
                content,
                tool_calls: (!calls.is_empty()).then_some(calls),
                tool_call_id: None,
            }
        }
        ConversationTurn::ToolResult {
            tool_call_id,
            result_text,
        } => ChatMessage {
            role: "tool",
            content: Some(result_text.clone()),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.clone()),
        },
    }
}

fn normalize_response(resp: ChatResponse) -> Result<LlmResponse, LlmError> {
    let choice = resp
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::unknown("No choices in response"))?;

    let text = choice.message.content.filter(|t| !t.is_empty());
    let tool_calls = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .filter(|tc| !tc.function.name.is_empty())
        .map(|tc| ToolCallRequest::new(tc.id, tc.function.name, tc.function.arguments))
        .collect();
    let usage = resp.usage.map_or_else(Usage::default, |u| Usage {
        input_tokens: u64::from(u.prompt_tokens),
        output_tokens: u64::from(u.completion_tokens),
    });

    Ok(LlmResponse {
        text,
        tool_calls,
        usage,
    })
}

/// One decoded server-sent-events line
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SseLine {
    Text(String),
    Done,
    /// Comments, keep-alives, empty deltas and malformed payloads
    Skip,
}

pub(crate) fn parse_sse_line(line: &str) -> SseLine {
    let Some(data) = line.trim().strip_prefix("data:") else {
        return SseLine::Skip;
    };
    let data = data.trim_start();
    if data == "[DONE]" {
        return SseLine::Done;
    }
    match serde_json::from_str::<StreamChunk>(data) {
        Ok(chunk) => chunk
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.delta.content)
            .filter(|t| !t.is_empty())
            .map_or(SseLine::Skip, SseLine::Text),
        Err(e) => {
            tracing::debug!(error = %e, "Skipping malformed stream chunk");
            SseLine::Skip
        }
    }
}

/// Parse every complete line in `buffer`. At end of body the unterminated
/// tail counts as a line too.
pub(crate) fn take_lines(buffer: &mut Vec<u8>, at_end: bool) -> Vec<SseLine> {
    let mut lines = Vec::new();
    while let Some(end) = buffer.iter().position(|b| *b == b'\n') {
        let line: Vec<u8> = buffer.drain(..=end).collect();
        lines.push(parse_sse_line(&String::from_utf8_lossy(&line)));
    }
    if at_end && !buffer.is_empty() {
        let tail = std::mem::take(buffer);
        lines.push(parse_sse_line(&String::from_utf8_lossy(&tail)));
    }
    lines
}

#[async_trait]
impl LlmService for GrokService {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let body = self.translate_request(request, false);
        let response = self.send(&body).await?;
        let text = response
            .text()
            .await
            .map_err(|e| LlmError::network(format!("Failed to read response: {e}")))?;
        let parsed: ChatResponse = serde_json::from_str(&text)
            .map_err(|e| LlmError::unknown(format!("Failed to parse response: {e}")))?;
        normalize_response(parsed)
    }

    async fn complete_streaming(&self, request: &LlmRequest) -> Result<TextStream, LlmError> {
        let body = self.translate_request(request, true);
        let response = self.send(&body).await?;

        let stream = async_stream::stream! {
            let mut bytes = response.bytes_stream();
            let mut buffer: Vec<u8> = Vec::new();

            'read: loop {
                let (lines, at_end) = match bytes.next().await {
                    Some(Ok(chunk)) => {
                        buffer.extend_from_slice(&chunk);
                        (take_lines(&mut buffer, false), false)
                    }
                    Some(Err(e)) => {
                        yield Err(map_transport_error(e));
                        break;
                    }
                    None => (take_lines(&mut buffer, true), true),
                };
                for line in lines {
                    match line {
                        SseLine::Text(text) => yield Ok(text),
                        SseLine::Done => break 'read,
                        SseLine::Skip => {}
                    }
                }
                if at_end {
                    break;
                }
            }
        };

        Ok(Box::pin(stream))
    }

    fn model_id(&self) -> &str {
        &self.config.model
    }
}

// Wire types

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ChatTool<'a>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct ChatTool<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    function: &'a FunctionDescriptor,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type", default = "function_kind")]
    kind: String,
    function: WireFunctionCall,
}

fn function_kind() -> String {
    "function".to_string()
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFunctionCall {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatErrorResponse {
    error: ChatErrorBody,
}

#[derive(Debug, Deserialize)]
struct ChatErrorBody {
    message: String,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}
