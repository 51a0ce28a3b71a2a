//! Conversational operations agent.
//!
//! Each user turn is answered either directly by the language model or by
//! invoking exactly one registered operation and letting the model phrase the
//! operation's result. The pieces:
//!
//! - `conversation` - append-only turn history seeded with a system directive
//! - `format` - typed operation results and their plain-text rendering
//! - `tools` - operation registry, input schemas and argument validation
//! - `llm` / `openai` - the language-model gateway and its HTTP implementation
//! - `operations` - team member, client and e-mail operations
//! - `runtime` - the per-turn orchestrator, in blocking and streaming form

pub mod conversation;
pub mod format;
pub mod llm;
pub mod openai;
pub mod operations;
pub mod prompt;
pub mod runtime;
pub mod tools;

pub use conversation::{Conversation, Role, Turn};
pub use format::{format_result, Record, ResultValue, Scalar};
pub use llm::{ChatRequest, GatewayError, InvocationRequest, LlmClient, Reply, StreamEvent};
pub use runtime::{AgentRuntime, RuntimeSettings, TurnOutcome};
pub use tools::{Tool, ToolDescriptor, ToolError, ToolRegistry};
