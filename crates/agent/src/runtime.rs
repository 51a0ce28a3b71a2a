use std::sync::Arc;

use futures::stream::BoxStream;
use futures::StreamExt;
use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use opsdesk_core::config::AgentConfig;

use crate::conversation::Conversation;
use crate::format::{format_result, truncate_result};
use crate::llm::{ChatRequest, GatewayError, InvocationRequest, LlmClient, Reply, StreamEvent};
use crate::prompt::system_directive;
use crate::tools::ToolRegistry;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuntimeSettings {
    /// Bound applied to formatted operation results before they enter the history.
    pub max_result_chars: Option<usize>,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self { max_result_chars: Some(16_000) }
    }
}

impl RuntimeSettings {
    pub fn from_config(config: &AgentConfig) -> Self {
        Self { max_result_chars: config.result_limit() }
    }
}

/// How the most recent submission ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TurnOutcome {
    /// An assistant turn was committed.
    Replied,
    /// The turn ended on an operation diagnostic.
    OperationFailed,
    /// The model backend failed; no assistant turn was committed.
    GatewayFailed,
}

/// Per-conversation orchestrator. Each submission invokes at most one operation.
pub struct AgentRuntime {
    llm: Arc<dyn LlmClient>,
    registry: Arc<ToolRegistry>,
    conversation: Conversation,
    settings: RuntimeSettings,
    outcome: Option<TurnOutcome>,
}

impl AgentRuntime {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        registry: Arc<ToolRegistry>,
        settings: RuntimeSettings,
    ) -> Self {
        let conversation = Conversation::new(system_directive(&registry.names()));
        Self { llm, registry, conversation, settings, outcome: None }
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn reset(&mut self) {
        self.conversation.reset();
    }

    /// Outcome of the last submission. `None` before the first one, or when a streamed
    /// submission was dropped before it finished.
    pub fn last_outcome(&self) -> Option<TurnOutcome> {
        self.outcome
    }

    /// Runs one turn and returns the reply shown to the user.
    pub async fn submit(&mut self, text: &str, reset: bool) -> String {
        let correlation_id = self.begin_turn(text, reset);

        let reply = match self.llm.complete(self.request()).await {
            Ok(reply) => reply,
            Err(error) => return self.gateway_failure(correlation_id, &error),
        };

        let invocation = match reply {
            Reply::Text(content) => {
                debug!(event_name = "agent.reply.direct", %correlation_id, "model answered");
                return self.commit_reply(&content);
            }
            Reply::Invocation(invocation) => invocation,
        };

        if let Err(diagnostic) = self.dispatch(correlation_id, &invocation).await {
            return diagnostic;
        }

        match self.llm.complete(self.request()).await {
            Ok(Reply::Text(content)) => self.commit_reply(&content),
            Ok(Reply::Invocation(extra)) => {
                warn!(
                    event_name = "agent.invocation.ignored",
                    %correlation_id,
                    operation = %extra.name,
                    "model requested a second operation in one turn"
                );
                self.commit_reply("")
            }
            Err(error) => self.gateway_failure(correlation_id, &error),
        }
    }

    /// Runs one turn, yielding reply text as it arrives.
    ///
    /// Nothing happens until the stream is polled. Dropping the stream abandons the turn at
    /// the last committed history entry.
    pub fn submit_streaming(&mut self, text: &str, reset: bool) -> BoxStream<'_, String> {
        let text = text.to_string();

        Box::pin(async_stream::stream! {
            let correlation_id = self.begin_turn(&text, reset);

            let mut first = match self.llm.complete_streaming(self.request()).await {
                Ok(stream) => stream,
                Err(error) => {
                    yield self.stream_failure(correlation_id, &error);
                    return;
                }
            };

            let mut accumulated = String::new();
            let mut signalled = false;
            loop {
                match first.next().await {
                    Some(Ok(StreamEvent::Text(fragment))) => {
                        if fragment.is_empty() {
                            continue;
                        }
                        accumulated.push_str(&fragment);
                        yield fragment;
                    }
                    Some(Ok(StreamEvent::Invocation)) => {
                        signalled = true;
                        break;
                    }
                    Some(Ok(StreamEvent::End)) | None => break,
                    Some(Err(error)) => {
                        yield self.stream_failure(correlation_id, &error);
                        return;
                    }
                }
            }
            drop(first);

            debug!(
                event_name = "agent.stream.drained",
                %correlation_id,
                streamed_chars = accumulated.chars().count(),
                signalled,
                "first stream drained; confirming decision"
            );

            // The confirmation doubles as the definitive decision.
            let decision = match self.llm.complete(self.request()).await {
                Ok(decision) => decision,
                Err(error) => {
                    yield self.stream_failure(correlation_id, &error);
                    return;
                }
            };

            let invocation = match decision {
                Reply::Text(_) if !accumulated.is_empty() => {
                    self.commit_reply(&accumulated);
                    return;
                }
                Reply::Text(content) => {
                    yield self.commit_reply(&content);
                    return;
                }
                Reply::Invocation(invocation) => invocation,
            };

            if let Err(diagnostic) = self.dispatch(correlation_id, &invocation).await {
                yield diagnostic;
                return;
            }

            let mut last = match self.llm.complete_streaming(self.request()).await {
                Ok(stream) => stream,
                Err(error) => {
                    yield self.stream_failure(correlation_id, &error);
                    return;
                }
            };

            let mut reply = String::new();
            loop {
                match last.next().await {
                    Some(Ok(StreamEvent::Text(fragment))) => {
                        if fragment.is_empty() {
                            continue;
                        }
                        reply.push_str(&fragment);
                        yield fragment;
                    }
                    Some(Ok(StreamEvent::Invocation)) | Some(Ok(StreamEvent::End)) | None => break,
                    Some(Err(error)) => {
                        yield self.stream_failure(correlation_id, &error);
                        return;
                    }
                }
            }

            if reply.is_empty() {
                yield self.commit_reply("");
            } else {
                self.commit_reply(&reply);
            }
        })
    }

    fn begin_turn(&mut self, text: &str, reset: bool) -> Uuid {
        let correlation_id = Uuid::new_v4();
        self.outcome = None;
        if reset {
            info!(event_name = "agent.conversation.reset", %correlation_id, "conversation reset");
            self.conversation.reset();
        }
        self.conversation.push_user(text);
        debug!(
            event_name = "agent.turn.received",
            %correlation_id,
            turns = self.conversation.len(),
            "user turn appended"
        );
        correlation_id
    }

    fn request(&self) -> ChatRequest<'_> {
        ChatRequest { turns: self.conversation.turns(), catalog: self.registry.catalog() }
    }

    fn commit_reply(&mut self, content: &str) -> String {
        self.outcome = Some(TurnOutcome::Replied);
        self.conversation.push_assistant(content).content().to_string()
    }

    fn gateway_failure(&mut self, correlation_id: Uuid, failure: &GatewayError) -> String {
        error!(
            event_name = "agent.gateway.failed",
            %correlation_id,
            error = %failure,
            "model request failed"
        );
        self.outcome = Some(TurnOutcome::GatewayFailed);
        format!("[Error: {failure}]")
    }

    fn stream_failure(&mut self, correlation_id: Uuid, failure: &GatewayError) -> String {
        error!(
            event_name = "agent.stream.failed",
            %correlation_id,
            error = %failure,
            "model stream failed"
        );
        self.outcome = Some(TurnOutcome::GatewayFailed);
        format!("[Streaming error: {failure}]")
    }

    /// Runs the requested operation and records its outcome as an operation-result turn.
    /// On failure the recorded diagnostic is returned as the error.
    async fn dispatch(
        &mut self,
        correlation_id: Uuid,
        invocation: &InvocationRequest,
    ) -> Result<(), String> {
        debug!(
            event_name = "agent.invocation.requested",
            %correlation_id,
            operation = %invocation.name,
            "model requested an operation"
        );

        match self.run_operation(invocation).await {
            Ok(result) => {
                debug!(
                    event_name = "agent.invocation.completed",
                    %correlation_id,
                    operation = %invocation.name,
                    result_chars = result.chars().count(),
                    "operation completed"
                );
                self.conversation.push_operation_result(&invocation.name, &result);
                Ok(())
            }
            Err(diagnostic) => {
                warn!(
                    event_name = "agent.invocation.failed",
                    %correlation_id,
                    operation = %invocation.name,
                    diagnostic = %diagnostic,
                    "operation failed"
                );
                self.conversation.push_operation_result(&invocation.name, &diagnostic);
                self.outcome = Some(TurnOutcome::OperationFailed);
                Err(diagnostic)
            }
        }
    }

    async fn run_operation(&self, invocation: &InvocationRequest) -> Result<String, String> {
        let name = invocation.name.as_str();
        let arguments = parse_arguments(&invocation.raw_arguments)
            .map_err(|detail| format!("[Failed to parse arguments JSON: {detail}]"))?;

        let tool = self.registry.resolve(name).ok_or_else(|| {
            format!(
                "[Error executing function '{name}': no operation named '{name}' is registered]"
            )
        })?;

        let validated = tool
            .schema()
            .validate(&arguments)
            .map_err(|error| format!("[Invalid arguments for function '{name}': {error}]"))?;

        let value = tool
            .invoke(validated)
            .await
            .map_err(|error| format!("[Error executing function '{name}': {error}]"))?;

        Ok(truncate_result(format_result(&value), self.settings.max_result_chars))
    }
}

/// Decodes the raw payload into a JSON object. A blank payload means no arguments.
fn parse_arguments(raw: &str) -> Result<Map<String, Value>, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(Map::new());
    }

    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(arguments)) => Ok(arguments),
        Ok(_) => Err("expected a JSON object".to_string()),
        Err(error) => Err(error.to_string()),
    }
}
