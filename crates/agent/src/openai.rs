use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio_util::io::StreamReader;
use tracing::debug;

use opsdesk_core::config::LlmConfig;

use crate::conversation::Role;
use crate::llm::{
    ChatRequest, EventStream, GatewayError, InvocationRequest, LlmClient, Reply, StreamEvent,
};

const ERROR_BODY_EXCERPT: usize = 200;

/// Gateway for OpenAI-compatible `/chat/completions` endpoints using function calling.
pub struct OpenAiClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<SecretString>,
    model: String,
    timeout: Duration,
}

impl OpenAiClient {
    pub fn new(
        base_url: &str,
        api_key: Option<SecretString>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        // Reads are bounded individually so streams can outlive `timeout`.
        let http = reqwest::Client::builder()
            .connect_timeout(timeout)
            .read_timeout(timeout)
            .build()
            .map_err(|error| GatewayError::Network(error.to_string()))?;

        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key,
            model: model.into(),
            timeout,
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, GatewayError> {
        Self::new(
            &config.effective_base_url(),
            config.api_key.clone(),
            config.model.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn request_body(&self, request: &ChatRequest<'_>, stream: bool) -> Value {
        let messages = request
            .turns
            .iter()
            .map(|turn| match (turn.role(), turn.operation()) {
                (Role::Operation, Some(name)) => {
                    json!({ "role": "function", "name": name, "content": turn.content() })
                }
                (role, _) => json!({ "role": wire_role(role), "content": turn.content() }),
            })
            .collect::<Vec<_>>();

        let mut body = json!({ "model": self.model, "messages": messages, "stream": stream });
        if !request.catalog.is_empty() {
            body["functions"] = json!(request.catalog);
        }
        body
    }

    async fn post(
        &self,
        body: &Value,
        deadline: Option<Duration>,
    ) -> Result<reqwest::Response, GatewayError> {
        let mut builder = self.http.post(&self.endpoint).json(body);
        if let Some(deadline) = deadline {
            builder = builder.timeout(deadline);
        }
        if let Some(api_key) = &self.api_key {
            builder = builder.bearer_auth(api_key.expose_secret());
        }

        let response = builder.send().await.map_err(transport_error)?;
        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(GatewayError::RateLimited);
        }
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|error| format!("<body unavailable: {error}>"));
            return Err(GatewayError::Api { status: status.as_u16(), body: excerpt(&body) });
        }

        Ok(response)
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, request: ChatRequest<'_>) -> Result<Reply, GatewayError> {
        let body = self.request_body(&request, false);
        debug!(
            event_name = "llm.complete.request",
            model = %self.model,
            turns = request.turns.len(),
            "sending completion request"
        );

        let response = self.post(&body, Some(self.timeout)).await?;
        let raw = response.text().await.map_err(transport_error)?;
        parse_completion(&raw)
    }

    async fn complete_streaming(
        &self,
        request: ChatRequest<'_>,
    ) -> Result<EventStream, GatewayError> {
        let body = self.request_body(&request, true);
        debug!(
            event_name = "llm.stream.request",
            model = %self.model,
            turns = request.turns.len(),
            "opening completion stream"
        );

        let response = self.post(&body, None).await?;
        let byte_stream =
            response.bytes_stream().map(|result| result.map_err(std::io::Error::other));
        Ok(parse_event_stream(BufReader::new(StreamReader::new(Box::pin(byte_stream)))))
    }
}

fn wire_role(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Operation => "function",
        Role::Assistant => "assistant",
    }
}

fn transport_error(error: reqwest::Error) -> GatewayError {
    if error.is_timeout() {
        GatewayError::Timeout
    } else {
        GatewayError::Network(error.to_string())
    }
}

/// Recovers the transport error carried through `StreamReader`.
fn read_error(error: std::io::Error) -> GatewayError {
    let timed_out = error
        .get_ref()
        .and_then(|inner| inner.downcast_ref::<reqwest::Error>())
        .is_some_and(reqwest::Error::is_timeout);
    if timed_out || error.kind() == std::io::ErrorKind::TimedOut {
        GatewayError::Timeout
    } else {
        GatewayError::Network(error.to_string())
    }
}

fn excerpt(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= ERROR_BODY_EXCERPT {
        return trimmed.to_string();
    }
    let mut cut: String = trimmed.chars().take(ERROR_BODY_EXCERPT).collect();
    cut.push_str("...");
    cut
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    function_call: Option<FunctionCall>,
}

#[derive(Debug, Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    arguments: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Option<StreamDelta>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    function_call: Option<Value>,
}

fn parse_completion(raw: &str) -> Result<Reply, GatewayError> {
    let response: CompletionResponse =
        serde_json::from_str(raw).map_err(|error| GatewayError::Decode(error.to_string()))?;
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| GatewayError::Decode("response contained no choices".to_string()))?;

    match choice.message.function_call {
        Some(call) => Ok(Reply::Invocation(InvocationRequest {
            name: call.name,
            raw_arguments: call.arguments.unwrap_or_default(),
        })),
        None => Ok(Reply::Text(choice.message.content.unwrap_or_default())),
    }
}

/// Events carried by one `data:` payload, in emission order.
fn chunk_events(chunk: StreamChunk) -> Vec<StreamEvent> {
    let Some(choice) = chunk.choices.into_iter().next() else {
        return Vec::new();
    };

    let mut events = Vec::new();
    if let Some(delta) = choice.delta {
        if let Some(content) = delta.content.filter(|content| !content.is_empty()) {
            events.push(StreamEvent::Text(content));
        }
        if delta.function_call.is_some() {
            events.push(StreamEvent::Invocation);
            return events;
        }
    }

    match choice.finish_reason.as_deref() {
        Some("function_call") | Some("tool_calls") => events.push(StreamEvent::Invocation),
        Some(_) => events.push(StreamEvent::End),
        None => {}
    }
    events
}

/// Turns an SSE body into gateway events. The stream ends after the first terminal event.
fn parse_event_stream<R>(reader: R) -> EventStream
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    let mut lines = reader.lines();

    Box::pin(async_stream::stream! {
        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => {
                    yield Ok(StreamEvent::End);
                    break;
                }
                Err(error) => {
                    yield Err(read_error(error));
                    break;
                }
            };

            let Some(data) = line.strip_prefix("data:") else {
                continue;
            };
            let data = data.trim();
            if data.is_empty() {
                continue;
            }
            if data == "[DONE]" {
                yield Ok(StreamEvent::End);
                break;
            }

            let chunk = match serde_json::from_str::<StreamChunk>(data) {
                Ok(chunk) => chunk,
                Err(error) => {
                    yield Err(GatewayError::Decode(error.to_string()));
                    break;
                }
            };

            let events = chunk_events(chunk);
            let terminal =
                events.last().is_some_and(|event| !matches!(event, StreamEvent::Text(_)));
            for event in events {
                yield Ok(event);
            }
            if terminal {
                break;
            }
        }
    })
}
