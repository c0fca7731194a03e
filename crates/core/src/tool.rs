//! Tool registry and calling-convention adapter.
//!
//! Tools are external capabilities (a calculation, a data lookup) that
//! responders and the iterative loop invoke by name. Individual tools
//! disagree on how they want their input: some take a keyword mapping,
//! some a single positional value, some nothing at all. [`ToolDescriptor`]
//! hides those differences behind one `invoke(input)` call, and it is the
//! only place in the workspace that branches on calling convention.

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use crate::error::ToolError;

/// Input handed to a tool, as extracted from model output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ToolInput {
    /// No input was given.
    Absent,
    /// A single bare value (`get_weather("Mumbai")`).
    Scalar(Value),
    /// A keyword mapping (`{"expression": "2 + 2"}`).
    Structured(Map<String, Value>),
}

impl ToolInput {
    /// Classify an arbitrary JSON value.
    ///
    /// `null` and blank strings count as absent input.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Null => Self::Absent,
            Value::String(s) if s.trim().is_empty() => Self::Absent,
            Value::Object(map) => Self::Structured(map),
            other => Self::Scalar(other),
        }
    }

    /// Short human-readable rendering for logs and traces.
    pub fn summary(&self) -> String {
        match self {
            Self::Absent => String::new(),
            Self::Scalar(Value::String(s)) => s.clone(),
            Self::Scalar(v) => v.to_string(),
            Self::Structured(map) => Value::Object(map.clone()).to_string(),
        }
    }
}

impl From<&str> for ToolInput {
    fn from(s: &str) -> Self {
        Self::from_value(Value::String(s.to_string()))
    }
}

/// The result of a tool execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// Whether the tool executed successfully
    pub success: bool,

    /// The output content
    pub output: String,

    /// Optional structured data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ToolResult {
    /// A successful result whose text is the JSON rendering of `data`.
    pub fn json(data: Value) -> Self {
        Self {
            success: true,
            output: data.to_string(),
            data: Some(data),
        }
    }

    pub fn text(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            data: None,
        }
    }
}

/// A tool that takes keyword-style arguments.
///
/// Implementations declare a JSON schema for their parameters and may name
/// a primary parameter that receives a bare scalar input.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "calculate").
    fn name(&self) -> &str;

    /// A description of what this tool does (shown to the model).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> Value;

    /// The parameter that a scalar input binds to, if any.
    fn primary_parameter(&self) -> Option<&str> {
        None
    }

    /// Execute the tool with keyword arguments.
    async fn execute(&self, arguments: Map<String, Value>) -> std::result::Result<ToolResult, ToolError>;
}

type ToolFuture = BoxFuture<'static, std::result::Result<ToolResult, ToolError>>;

/// How a tool expects to be called.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallingConvention {
    Keyword,
    Positional,
    Nullary,
}

#[derive(Clone)]
enum Callable {
    Keyword(Arc<dyn Tool>),
    Positional(Arc<dyn Fn(Value) -> ToolFuture + Send + Sync>),
    Nullary(Arc<dyn Fn() -> ToolFuture + Send + Sync>),
}

/// A registered tool: name, description and a uniform `invoke`.
#[derive(Clone)]
pub struct ToolDescriptor {
    name: String,
    description: String,
    callable: Callable,
}

impl ToolDescriptor {
    /// Wrap a keyword-argument [`Tool`].
    pub fn from_tool(tool: impl Tool + 'static) -> Self {
        Self::from_shared(Arc::new(tool))
    }

    pub fn from_shared(tool: Arc<dyn Tool>) -> Self {
        Self {
            name: tool.name().to_string(),
            description: tool.description().to_string(),
            callable: Callable::Keyword(tool),
        }
    }

    /// Wrap a callable that takes one positional value.
    pub fn positional<F, Fut>(name: impl Into<String>, description: impl Into<String>, f: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<ToolResult, ToolError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            callable: Callable::Positional(Arc::new(move |v| Box::pin(f(v)))),
        }
    }

    /// Wrap a callable that takes no arguments.
    pub fn nullary<F, Fut>(name: impl Into<String>, description: impl Into<String>, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<ToolResult, ToolError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            callable: Callable::Nullary(Arc::new(move || Box::pin(f()))),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn calling_convention(&self) -> CallingConvention {
        match self.callable {
            Callable::Keyword(_) => CallingConvention::Keyword,
            Callable::Positional(_) => CallingConvention::Positional,
            Callable::Nullary(_) => CallingConvention::Nullary,
        }
    }

    /// Invoke the tool, adapting `input` to its calling convention.
    ///
    /// Errors raised by the tool propagate unchanged; callers inside the
    /// reasoning loop turn them into observation text.
    pub async fn invoke(&self, input: ToolInput) -> std::result::Result<ToolResult, ToolError> {
        match &self.callable {
            Callable::Keyword(tool) => {
                let arguments = match input {
                    ToolInput::Absent => Map::new(),
                    ToolInput::Structured(map) => map,
                    ToolInput::Scalar(value) => {
                        let Some(param) = tool.primary_parameter() else {
                            return Err(ToolError::InvalidArguments(format!(
                                "'{}' expects named arguments, got a single value",
                                self.name
                            )));
                        };
                        let mut map = Map::new();
                        map.insert(param.to_string(), value);
                        map
                    }
                };
                tool.execute(arguments).await
            }
            Callable::Positional(f) => {
                let value = match input {
                    ToolInput::Absent => Value::Null,
                    ToolInput::Scalar(value) => value,
                    // A one-entry mapping carries the positional value by name.
                    ToolInput::Structured(map) if map.len() == 1 => {
                        map.into_iter().next().map(|(_, v)| v).unwrap_or(Value::Null)
                    }
                    ToolInput::Structured(map) => Value::Object(map),
                };
                f(value).await
            }
            Callable::Nullary(f) => f().await,
        }
    }
}

impl std::fmt::Debug for ToolDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDescriptor")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("convention", &self.calling_convention())
            .finish()
    }
}

/// The tool table, populated at startup and read-only afterwards.
///
/// Registration order is preserved so the catalog shown to the model is
/// stable across runs.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<ToolDescriptor>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, descriptor: ToolDescriptor) {
        match self.index.get(descriptor.name()) {
            Some(&i) => self.tools[i] = descriptor,
            None => {
                self.index.insert(descriptor.name().to_string(), self.tools.len());
                self.tools.push(descriptor);
            }
        }
    }

    /// Register a keyword-argument [`Tool`].
    pub fn register_tool(&mut self, tool: impl Tool + 'static) {
        self.register(ToolDescriptor::from_tool(tool));
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> std::result::Result<&ToolDescriptor, ToolError> {
        self.index
            .get(name)
            .map(|&i| &self.tools[i])
            .ok_or_else(|| ToolError::NotFound(name.to_string()))
    }

    /// All tools in registration order.
    pub fn list(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    /// List all registered tool names.
    pub fn names(&self) -> Vec<&str> {
        self.list().iter().map(|t| t.name()).collect()
    }

    /// `- name: description` lines for prompts.
    pub fn catalog(&self) -> String {
        self.list()
            .iter()
            .map(|t| format!("- {}: {}", t.name(), t.description()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Look up and invoke a tool.
    pub async fn invoke(&self, name: &str, input: ToolInput) -> std::result::Result<ToolResult, ToolError> {
        self.get(name)?.invoke(input).await
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// A simple keyword tool for unit tests.
    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str { "echo" }
        fn description(&self) -> &str { "Echoes back the input" }
        fn parameters_schema(&self) -> Value {
            json!({
                "type": "object",
                "properties": { "text": { "type": "string" } },
                "required": ["text"]
            })
        }
        fn primary_parameter(&self) -> Option<&str> { Some("text") }
        async fn execute(&self, arguments: Map<String, Value>) -> Result<ToolResult, ToolError> {
            let text = arguments.get("text").and_then(Value::as_str).unwrap_or("<none>");
            Ok(ToolResult::text(text))
        }
    }

    struct StrictTool;

    #[async_trait]
    impl Tool for StrictTool {
        fn name(&self) -> &str { "strict" }
        fn description(&self) -> &str { "Only accepts named arguments" }
        fn parameters_schema(&self) -> Value { json!({"type": "object"}) }
        async fn execute(&self, arguments: Map<String, Value>) -> Result<ToolResult, ToolError> {
            Ok(ToolResult::text(arguments.len().to_string()))
        }
    }

    #[test]
    fn input_classification() {
        assert_eq!(ToolInput::from_value(Value::Null), ToolInput::Absent);
        assert_eq!(ToolInput::from("  "), ToolInput::Absent);
        assert_eq!(ToolInput::from("Mumbai"), ToolInput::Scalar(json!("Mumbai")));
        assert_eq!(ToolInput::from_value(json!(42)), ToolInput::Scalar(json!(42)));
        assert!(matches!(ToolInput::from_value(json!({"a": 1})), ToolInput::Structured(_)));
    }

    #[test]
    fn registry_register_and_lookup() {
        let mut registry = ToolRegistry::new();
        registry.register_tool(EchoTool);
        assert!(registry.get("echo").is_ok());
        assert!(matches!(registry.get("nonexistent"), Err(ToolError::NotFound(_))));
    }

    #[test]
    fn registry_preserves_order_and_replaces_in_place() {
        let mut registry = ToolRegistry::new();
        registry.register_tool(EchoTool);
        registry.register_tool(StrictTool);
        registry.register(ToolDescriptor::nullary("echo", "replaced", || async {
            Ok(ToolResult::text("x"))
        }));
        assert_eq!(registry.names(), vec!["echo", "strict"]);
        assert_eq!(registry.get("echo").unwrap().description(), "replaced");
        assert_eq!(registry.len(), 2);

        let listed = registry.list();
        assert_eq!(listed[0].calling_convention(), CallingConvention::Nullary);
        assert_eq!(listed[1].name(), "strict");
        assert_eq!(listed[1].calling_convention(), CallingConvention::Keyword);
    }

    #[test]
    fn catalog_lists_every_tool() {
        let mut registry = ToolRegistry::new();
        registry.register_tool(EchoTool);
        registry.register_tool(StrictTool);
        assert_eq!(
            registry.catalog(),
            "- echo: Echoes back the input\n- strict: Only accepts named arguments"
        );
    }

    #[tokio::test]
    async fn keyword_tool_accepts_mapping_and_scalar() {
        let echo = ToolDescriptor::from_tool(EchoTool);
        let mut map = Map::new();
        map.insert("text".into(), json!("hello world"));
        let result = echo.invoke(ToolInput::Structured(map)).await.unwrap();
        assert_eq!(result.output, "hello world");

        let result = echo.invoke(ToolInput::from("bare")).await.unwrap();
        assert_eq!(result.output, "bare");

        let result = echo.invoke(ToolInput::Absent).await.unwrap();
        assert_eq!(result.output, "<none>");
    }

    #[tokio::test]
    async fn keyword_tool_without_primary_rejects_scalar() {
        let strict = ToolDescriptor::from_tool(StrictTool);
        let err = strict.invoke(ToolInput::from("oops")).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn positional_tool_unwraps_single_entry_mapping() {
        let upper = ToolDescriptor::positional("upper", "Uppercase", |v: Value| async move {
            Ok(ToolResult::text(v.as_str().unwrap_or("null").to_uppercase()))
        });
        assert_eq!(upper.calling_convention(), CallingConvention::Positional);

        let out = upper.invoke(ToolInput::from("mumbai")).await.unwrap();
        assert_eq!(out.output, "MUMBAI");

        let mut map = Map::new();
        map.insert("location".into(), json!("pune"));
        let out = upper.invoke(ToolInput::Structured(map)).await.unwrap();
        assert_eq!(out.output, "PUNE");

        let out = upper.invoke(ToolInput::Absent).await.unwrap();
        assert_eq!(out.output, "NULL");
    }

    #[tokio::test]
    async fn nullary_tool_ignores_input() {
        let here = ToolDescriptor::nullary("here", "Where am I", || async {
            Ok(ToolResult::json(json!({"city": "Baroda"})))
        });
        let out = here.invoke(ToolInput::from("ignored")).await.unwrap();
        assert!(out.output.contains("Baroda"));
    }

    #[tokio::test]
    async fn invocation_errors_propagate_to_caller() {
        let mut registry = ToolRegistry::new();
        registry.register(ToolDescriptor::positional("boom", "Always fails", |_v| async {
            Err(ToolError::ExecutionFailed {
                tool_name: "boom".into(),
                reason: "kaput".into(),
            })
        }));
        let err = registry.invoke("boom", ToolInput::Absent).await.unwrap_err();
        assert!(err.to_string().contains("kaput"));

        let err = registry.invoke("missing", ToolInput::Absent).await.unwrap_err();
        assert!(matches!(err, ToolError::NotFound(_)));
    }
}
