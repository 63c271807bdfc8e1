//! Core of an interactive prompt-authoring workspace.
//!
//! `promptlab` keeps an arbitrary number of editable prompts consistent with
//! the template variables their messages reference, and rebuilds clean,
//! editable prompts from recorded LLM-call telemetry ("spans"). All state
//! transitions go through one pure reducer; everything asynchronous (running
//! prompts, saving them, fetching versions or spans) lives in the
//! [`Workspace`](workspace::Workspace) orchestrator and feeds settled results
//! back into the reducer as actions.
//!
//! # Getting started
//!
//! ```
//! use promptlab::prelude::*;
//!
//! let config = PlaygroundConfig::default();
//! let state = PlaygroundState::new(&config);
//! let state = reduce(state, Action::AddPrompt);
//!
//! let prompt_id = state.prompts[0].id.clone();
//! let message_id = state.prompts[0].messages[0].id.clone();
//! let state = reduce(
//!     state,
//!     Action::EditMessage {
//!         prompt_id,
//!         message_id,
//!         patch: MessagePatch::content("Summarize {{topic}} in {{words}} words."),
//!     },
//! );
//!
//! assert_eq!(state.keywords.names(), vec!["topic", "words"]);
//! ```
//!
//! # Where to find things
//!
//! - **Variables:** [`template::scan`] and [`template::substitute`] handle the
//!   flat `{{name}}` syntax. [`keywords::Keywords`] derives the live variable
//!   set from per-message references.
//! - **Span import:** [`trace::import_span`] turns one span's attribute
//!   dictionary into a [`Prompt`](store::Prompt), whatever instrumentation
//!   convention produced it.
//! - **State:** [`store::reduce`] is the single transition function over
//!   [`PlaygroundState`](store::PlaygroundState). See [`store::Action`] for
//!   everything it accepts.
//! - **Collaborators:** [`api::PlaygroundApi`] and [`api::SpanSource`] are the
//!   seams to persistence, execution, and telemetry.
//! - **Orchestration:** [`workspace::Workspace`] owns the state, calls the
//!   collaborators, and records user-facing [`notify::Notification`]s.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`template`] | `{{name}}` scanning and substitution |
//! | [`keywords`] | Keyword liveness tracking |
//! | [`trace`] | Span attribute decoding and prompt reconstruction |
//! | [`store`] | Entity model and the pure reducer |
//! | [`api`] | Collaborator traits, wire types, single-flight guard |
//! | [`workspace`] | Async orchestration around the store |
//! | [`notify`] | Capped notification buffer |
//! | [`config`] | Workspace defaults |

pub mod api;
pub mod config;
pub mod keywords;
pub mod notify;
pub mod prelude;
pub mod store;
pub mod template;
pub mod trace;
pub mod workspace;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// Re-export schemars for downstream crates.
pub use schemars;

// ── Constants ──────────────────────────────────────────────────────

/// Provider used when neither configuration nor telemetry names one.
pub const DEFAULT_PROVIDER: &str = "openai";

/// Model used when neither configuration nor telemetry names one.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_TOP_P: f32 = 1.0;
pub const DEFAULT_MAX_TOKENS: u32 = 1000;

// ── Schema generation ──────────────────────────────────────────────

/// Generate a JSON Schema `serde_json::Value` from a type that implements
/// `schemars::JsonSchema`.
///
/// Used to publish the normalized prompt shapes that collaborators must
/// produce or accept.
///
/// ```
/// use promptlab::{Message, json_schema_for};
///
/// let schema = json_schema_for::<Message>();
/// assert_eq!(schema["type"], "object");
/// assert!(schema["required"].as_array().unwrap().contains(&"role".into()));
/// ```
pub fn json_schema_for<T: JsonSchema>() -> serde_json::Value {
    let schema = schemars::schema_for!(T);
    serde_json::to_value(schema)
        .unwrap_or_else(|_| serde_json::json!({"type": "object", "properties": {}}))
}

/// The empty object schema used for tools whose parameters are unknown.
pub fn empty_object_schema() -> serde_json::Value {
    serde_json::json!({"type": "object", "properties": {}})
}

// ── Message types ──────────────────────────────────────────────────

/// Role of a message in the conversation.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    Developer,
    System,
    User,
    Assistant,
    Tool,
}

impl MessageRole {
    /// Parse a role string as emitted by instrumentation libraries.
    /// Matching is case-insensitive; unknown roles yield `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "developer" => Some(Self::Developer),
            "system" => Some(Self::System),
            "user" | "human" => Some(Self::User),
            "assistant" | "ai" => Some(Self::Assistant),
            "tool" | "function" => Some(Self::Tool),
            _ => None,
        }
    }
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageRole::Developer => write!(f, "developer"),
            MessageRole::System => write!(f, "system"),
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
            MessageRole::Tool => write!(f, "tool"),
        }
    }
}

/// Message content: plain text, or a list of typed parts such as
/// `{"type": "text", "text": ...}` and `{"type": "image_url", ...}`.
///
/// Parts are kept as raw JSON so that part types this crate does not know
/// about survive a round-trip untouched.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, JsonSchema)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<serde_json::Value>),
}

impl Default for MessageContent {
    fn default() -> Self {
        MessageContent::Text(String::new())
    }
}

impl From<&str> for MessageContent {
    fn from(s: &str) -> Self {
        MessageContent::Text(s.to_string())
    }
}

impl From<String> for MessageContent {
    fn from(s: String) -> Self {
        MessageContent::Text(s)
    }
}

impl MessageContent {
    /// Every text segment: the whole string for plain text, or the `text`
    /// field of each part that has one.
    pub fn text_segments(&self) -> Vec<&str> {
        match self {
            MessageContent::Text(s) => vec![s.as_str()],
            MessageContent::Parts(parts) => parts
                .iter()
                .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
                .collect(),
        }
    }

    /// Concatenated text segments.
    pub fn to_text(&self) -> String {
        self.text_segments().concat()
    }

    pub fn is_empty(&self) -> bool {
        match self {
            MessageContent::Text(s) => s.is_empty(),
            MessageContent::Parts(parts) => parts.is_empty(),
        }
    }
}

/// A message in a prompt.
///
/// The `id` is assigned by the store; messages built elsewhere (constructors,
/// span import, backend configs) carry a placeholder that the store replaces
/// when the message enters the state.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, JsonSchema)]
pub struct Message {
    #[serde(default)]
    pub id: String,
    pub role: MessageRole,
    #[serde(default)]
    pub content: MessageContent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    pub fn new(role: MessageRole, content: impl Into<MessageContent>) -> Self {
        Self {
            id: String::new(),
            role,
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn system(content: impl Into<MessageContent>) -> Self {
        Self::new(MessageRole::System, content)
    }

    pub fn user(content: impl Into<MessageContent>) -> Self {
        Self::new(MessageRole::User, content)
    }

    pub fn assistant_text(content: impl Into<MessageContent>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }

    pub fn assistant_tool_calls(calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls: Some(calls),
            ..Self::new(MessageRole::Assistant, "")
        }
    }

    pub fn tool_result(call_id: impl Into<String>, content: impl Into<MessageContent>) -> Self {
        Self {
            tool_call_id: Some(call_id.into()),
            ..Self::new(MessageRole::Tool, content)
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Whether the message requests at least one tool call.
    pub fn has_tool_calls(&self) -> bool {
        self.tool_calls.as_ref().is_some_and(|c| !c.is_empty())
    }
}

// ── Tool types ─────────────────────────────────────────────────────

/// The type of a tool definition. Currently always `Function`.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, JsonSchema)]
pub enum ToolType {
    #[default]
    #[serde(rename = "function")]
    Function,
}

/// A tool definition attached to a prompt (OpenAI function-calling format).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, JsonSchema)]
pub struct Tool {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type", default)]
    pub tool_type: ToolType,
    pub function: FunctionDef,
}

impl Tool {
    /// Create a function-calling tool definition.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            id: String::new(),
            tool_type: ToolType::Function,
            function: FunctionDef {
                name: name.into(),
                description: description.into(),
                parameters,
                strict: None,
            },
        }
    }

    /// A definition with only a name: no description, empty parameter schema.
    pub fn stub(name: impl Into<String>) -> Self {
        Self::new(name, "", empty_object_schema())
    }

    pub fn name(&self) -> &str {
        &self.function.name
    }

    /// Check that the parameter schema compiles as a JSON Schema.
    ///
    /// Returns `None` if it does, or a human-readable problem otherwise.
    pub fn schema_error(&self) -> Option<String> {
        match jsonschema::validator_for(&self.function.parameters) {
            Ok(_) => None,
            Err(e) => Some(format!(
                "tool '{}' has an invalid parameter schema: {e}",
                self.function.name
            )),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, JsonSchema)]
pub struct FunctionDef {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "empty_object_schema")]
    pub parameters: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strict: Option<bool>,
}

/// The type of a tool call. Currently always `Function`.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, JsonSchema)]
pub enum CallType {
    #[default]
    #[serde(rename = "function")]
    Function,
}

/// A tool call requested by the model.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
pub struct ToolCall {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type", default)]
    pub call_type: CallType,
    pub function: FunctionCallData,
}

impl ToolCall {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            call_type: CallType::Function,
            function: FunctionCallData {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
pub struct FunctionCallData {
    pub name: String,
    /// JSON-encoded arguments.
    #[serde(default)]
    pub arguments: String,
}

// ── Tool choice ────────────────────────────────────────────────────

/// Policy for whether and which tools the model may invoke.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
#[serde(untagged)]
pub enum ToolChoice {
    Mode(ToolChoiceMode),
    Function(NamedToolChoice),
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ToolChoiceMode {
    None,
    Auto,
    Required,
}

/// Force a specific function: `{"type": "function", "function": {"name": ..}}`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
pub struct NamedToolChoice {
    #[serde(rename = "type", default)]
    pub choice_type: CallType,
    pub function: NamedFunction,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
pub struct NamedFunction {
    pub name: String,
}

impl ToolChoice {
    pub fn auto() -> Self {
        ToolChoice::Mode(ToolChoiceMode::Auto)
    }

    pub fn function(name: impl Into<String>) -> Self {
        ToolChoice::Function(NamedToolChoice {
            choice_type: CallType::Function,
            function: NamedFunction { name: name.into() },
        })
    }
}

// ── Response format ────────────────────────────────────────────────

/// Output format requested from the model.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseFormat {
    #[default]
    Text,
    JsonObject,
    JsonSchema { json_schema: JsonSchemaFormat },
}

/// A named JSON Schema for structured output.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, JsonSchema)]
pub struct JsonSchemaFormat {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default = "empty_object_schema")]
    pub schema: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strict: Option<bool>,
}

impl ResponseFormat {
    /// Check that a `json_schema` format carries a compilable schema.
    pub fn schema_error(&self) -> Option<String> {
        let ResponseFormat::JsonSchema { json_schema } = self else {
            return None;
        };
        jsonschema::validator_for(&json_schema.schema)
            .err()
            .map(|e| format!("response format '{}' has an invalid schema: {e}", json_schema.name))
    }
}
