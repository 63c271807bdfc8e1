//! Convenience re-exports for common `promptlab` types.
//!
//! Meant to be glob-imported by frontends:
//!
//! ```ignore
//! use promptlab::prelude::*;
//! ```
//!
//! This pulls in the entity types, the reducer and its actions, the span
//! importer, the collaborator traits, and the [`Workspace`]. Lower-level
//! pieces (attribute lookup, list ordering helpers, the single-flight guard)
//! are left out; import those from their modules directly when needed.

// ── Core types ──────────────────────────────────────────────────────
pub use crate::{
    FunctionDef, JsonSchemaFormat, Message, MessageContent, MessageRole, ResponseFormat, Tool,
    ToolCall, ToolChoice, json_schema_for,
};

// ── Variables ───────────────────────────────────────────────────────
pub use crate::keywords::Keywords;
pub use crate::template::{render_messages, scan, substitute};

// ── State ───────────────────────────────────────────────────────────
pub use crate::store::{
    Action, MessagePatch, ModelParameters, PlaygroundState, Prompt, PromptConfig,
    PromptResponse, reduce,
};

// ── Import ──────────────────────────────────────────────────────────
pub use crate::trace::{ImportOptions, import_span};

// ── Collaborators and orchestration ─────────────────────────────────
pub use crate::api::{
    ApiError, ApiFuture, BackendPrompt, CompletionRequest, CompletionResponse, PlaygroundApi,
    PromptVersion, SavedPrompt, SpanSource,
};
pub use crate::config::PlaygroundConfig;
pub use crate::notify::{Notification, NotificationBuffer, NotificationLevel};
pub use crate::workspace::Workspace;
