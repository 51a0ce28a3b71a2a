use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

use crate::conversation::Turn;
use crate::tools::ToolDescriptor;

/// A model decision to run one operation. `raw_arguments` is untrusted JSON text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InvocationRequest {
    pub name: String,
    pub raw_arguments: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reply {
    Text(String),
    Invocation(InvocationRequest),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamEvent {
    Text(String),
    /// The model chose to invoke an operation instead of producing more text.
    Invocation,
    End,
}

pub type EventStream = BoxStream<'static, Result<StreamEvent, GatewayError>>;

#[derive(Clone, Copy, Debug)]
pub struct ChatRequest<'a> {
    pub turns: &'a [Turn],
    pub catalog: &'a [ToolDescriptor],
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out")]
    Timeout,
    #[error("rate limited by model backend")]
    RateLimited,
    #[error("model backend returned HTTP {status}: {body}")]
    Api { status: u16, body: String },
    #[error("could not decode model response: {0}")]
    Decode(String),
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: ChatRequest<'_>) -> Result<Reply, GatewayError>;

    /// Opens an incremental completion. The returned stream is consumed once.
    async fn complete_streaming(
        &self,
        request: ChatRequest<'_>,
    ) -> Result<EventStream, GatewayError>;
}
