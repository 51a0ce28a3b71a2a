use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Map, Value};
use thiserror::Error;

use opsdesk_core::errors::DomainError;
use opsdesk_db::repositories::RepositoryError;

use crate::format::ResultValue;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
}

impl ParamType {
    pub fn json_type(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamType,
    pub required: bool,
    pub description: &'static str,
}

impl ParamSpec {
    pub fn required(name: &'static str, kind: ParamType, description: &'static str) -> Self {
        Self { name, kind, required: true, description }
    }

    pub fn optional(name: &'static str, kind: ParamType, description: &'static str) -> Self {
        Self { name, kind, required: false, description }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InputSchema {
    params: Vec<ParamSpec>,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ArgumentError {
    #[error("missing required argument `{name}`")]
    Missing { name: String },
    #[error("unexpected argument `{name}`")]
    Unexpected { name: String },
    #[error("argument `{name}` must be {expected}, got {found}")]
    TypeMismatch { name: String, expected: &'static str, found: &'static str },
}

#[derive(Clone, Debug, PartialEq)]
pub enum ArgValue {
    Text(String),
    Integer(i64),
    Number(f64),
    Boolean(bool),
}

/// Arguments that passed schema validation. Optional parameters sent as `null` are absent.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ValidatedArguments {
    values: BTreeMap<String, ArgValue>,
}

impl ValidatedArguments {
    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.values.get(name)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        match self.values.get(name) {
            Some(ArgValue::Text(value)) => Some(value),
            _ => None,
        }
    }

    pub fn integer(&self, name: &str) -> Option<i64> {
        match self.values.get(name) {
            Some(ArgValue::Integer(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn number(&self, name: &str) -> Option<f64> {
        match self.values.get(name) {
            Some(ArgValue::Number(value)) => Some(*value),
            Some(ArgValue::Integer(value)) => Some(*value as f64),
            _ => None,
        }
    }

    pub fn boolean(&self, name: &str) -> Option<bool> {
        match self.values.get(name) {
            Some(ArgValue::Boolean(value)) => Some(*value),
            _ => None,
        }
    }

    /// Text argument the schema declares as required.
    pub fn require_text(&self, name: &str) -> Result<&str, ToolError> {
        self.text(name)
            .ok_or_else(|| ToolError::InvalidInput(format!("missing required argument `{name}`")))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl InputSchema {
    pub fn new(params: Vec<ParamSpec>) -> Self {
        Self { params }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    pub fn to_json_schema(&self) -> Value {
        let properties = self
            .params
            .iter()
            .map(|param| {
                let property =
                    json!({ "type": param.kind.json_type(), "description": param.description });
                (param.name.to_string(), property)
            })
            .collect::<Map<String, Value>>();
        let required = self
            .params
            .iter()
            .filter(|param| param.required)
            .map(|param| Value::String(param.name.to_string()))
            .collect::<Vec<_>>();

        json!({ "type": "object", "properties": properties, "required": required })
    }

    pub fn validate(
        &self,
        arguments: &Map<String, Value>,
    ) -> Result<ValidatedArguments, ArgumentError> {
        let unexpected = arguments
            .keys()
            .find(|key| !self.params.iter().any(|param| param.name == key.as_str()));
        if let Some(name) = unexpected {
            return Err(ArgumentError::Unexpected { name: name.clone() });
        }

        let mut values = BTreeMap::new();
        for param in &self.params {
            match arguments.get(param.name) {
                None | Some(Value::Null) if param.required => {
                    return Err(ArgumentError::Missing { name: param.name.to_string() });
                }
                None | Some(Value::Null) => {}
                Some(raw) => {
                    values.insert(param.name.to_string(), coerce(param, raw)?);
                }
            }
        }

        Ok(ValidatedArguments { values })
    }
}

fn coerce(param: &ParamSpec, raw: &Value) -> Result<ArgValue, ArgumentError> {
    let mismatch = || ArgumentError::TypeMismatch {
        name: param.name.to_string(),
        expected: article_type(param.kind),
        found: json_kind(raw),
    };

    match (param.kind, raw) {
        (ParamType::String, Value::String(value)) => Ok(ArgValue::Text(value.clone())),
        (ParamType::String, Value::Number(value)) => Ok(ArgValue::Text(value.to_string())),
        (ParamType::String, Value::Bool(value)) => Ok(ArgValue::Text(value.to_string())),
        (ParamType::Integer, Value::Number(value)) => value
            .as_i64()
            .or_else(|| value.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
            .map(ArgValue::Integer)
            .ok_or_else(mismatch),
        (ParamType::Number, Value::Number(value)) => {
            value.as_f64().map(ArgValue::Number).ok_or_else(mismatch)
        }
        (ParamType::Boolean, Value::Bool(value)) => Ok(ArgValue::Boolean(*value)),
        _ => Err(mismatch()),
    }
}

fn article_type(kind: ParamType) -> &'static str {
    match kind {
        ParamType::String => "a string",
        ParamType::Integer => "an integer",
        ParamType::Number => "a number",
        ParamType::Boolean => "a boolean",
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Failure reported by an operation; the message is shown to the model verbatim.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ToolError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    InvalidInput(String),
    #[error("storage failure: {0}")]
    Backend(String),
}

impl From<DomainError> for ToolError {
    fn from(error: DomainError) -> Self {
        Self::InvalidInput(error.to_string())
    }
}

impl From<RepositoryError> for ToolError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::Duplicate { email } => {
                Self::Conflict(format!("A record with email '{email}' already exists."))
            }
            other => Self::Backend(other.to_string()),
        }
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn schema(&self) -> InputSchema;
    async fn execute(&self, arguments: ValidatedArguments) -> Result<ResultValue, ToolError>;
}

/// What the model backend is told about one operation.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("operation `{0}` is registered more than once")]
    Duplicate(String),
}

pub struct RegisteredTool {
    schema: InputSchema,
    tool: Box<dyn Tool>,
}

impl RegisteredTool {
    pub fn name(&self) -> &'static str {
        self.tool.name()
    }

    pub fn schema(&self) -> &InputSchema {
        &self.schema
    }

    pub async fn invoke(&self, arguments: ValidatedArguments) -> Result<ResultValue, ToolError> {
        self.tool.execute(arguments).await
    }
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<RegisteredTool>,
    catalog: Vec<ToolDescriptor>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn register<T>(&mut self, tool: T) -> Result<(), RegistryError>
    where
        T: Tool + 'static,
    {
        let name = tool.name();
        if self.index.contains_key(name) {
            return Err(RegistryError::Duplicate(name.to_string()));
        }

        let schema = tool.schema();
        self.catalog.push(ToolDescriptor {
            name: name.to_string(),
            description: tool.description().to_string(),
            parameters: schema.to_json_schema(),
        });
        self.index.insert(name.to_string(), self.tools.len());
        self.tools.push(RegisteredTool { schema, tool: Box::new(tool) });
        Ok(())
    }

    pub fn resolve(&self, name: &str) -> Option<&RegisteredTool> {
        self.index.get(name).map(|position| &self.tools[*position])
    }

    /// Descriptors in registration order.
    pub fn catalog(&self) -> &[ToolDescriptor] {
        &self.catalog
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.tools.iter().map(RegisteredTool::name).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
