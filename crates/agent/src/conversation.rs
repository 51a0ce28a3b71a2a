use serde::Serialize;

pub const EMPTY_USER_PLACEHOLDER: &str = "[No user message provided.]";
pub const EMPTY_RESULT_PLACEHOLDER: &str = "[No data returned by function.]";
pub const EMPTY_REPLY_PLACEHOLDER: &str = "[No reply returned.]";

const FALLBACK_DIRECTIVE: &str = "You are a helpful assistant.";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Operation,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Operation => "operation",
            Self::Assistant => "assistant",
        }
    }
}

/// One entry of the history. Content is never empty; empty input is replaced by a placeholder.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Turn {
    role: Role,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    operation: Option<String>,
}

impl Turn {
    fn new(role: Role, content: &str, placeholder: &str, operation: Option<&str>) -> Self {
        let content = if content.is_empty() { placeholder } else { content };
        Self { role, content: content.to_string(), operation: operation.map(str::to_string) }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Name of the operation that produced an operation-result turn.
    pub fn operation(&self) -> Option<&str> {
        self.operation.as_deref()
    }
}

#[derive(Clone, Debug)]
pub struct Conversation {
    directive: String,
    turns: Vec<Turn>,
}

impl Conversation {
    pub fn new(directive: impl Into<String>) -> Self {
        let directive = directive.into();
        let turns = vec![Turn::new(Role::System, &directive, FALLBACK_DIRECTIVE, None)];
        Self { directive, turns }
    }

    /// Drops every turn except a fresh system turn.
    pub fn reset(&mut self) {
        self.turns.clear();
        self.turns.push(Turn::new(Role::System, &self.directive, FALLBACK_DIRECTIVE, None));
    }

    pub fn push_user(&mut self, text: &str) -> &Turn {
        self.push(Turn::new(Role::User, text, EMPTY_USER_PLACEHOLDER, None))
    }

    pub fn push_operation_result(&mut self, operation: &str, text: &str) -> &Turn {
        self.push(Turn::new(Role::Operation, text, EMPTY_RESULT_PLACEHOLDER, Some(operation)))
    }

    pub fn push_assistant(&mut self, text: &str) -> &Turn {
        self.push(Turn::new(Role::Assistant, text, EMPTY_REPLY_PLACEHOLDER, None))
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    fn push(&mut self, turn: Turn) -> &Turn {
        self.turns.push(turn);
        &self.turns[self.turns.len() - 1]
    }
}
