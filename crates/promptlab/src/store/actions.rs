//! Actions accepted by [`reduce`](super::reduce).

use crate::api::BackendPrompt;
use crate::store::{ModelParameters, Prompt, PromptConfig, PromptResponse};
use crate::{FunctionDef, MessageContent, MessageRole, ResponseFormat, ToolChoice};

/// A state transition request.
///
/// Actions that name a prompt, message, or tool that does not exist are
/// ignored.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    // ── Prompts ──
    /// Append a blank prompt built from the state's defaults.
    AddPrompt,
    DeletePrompt { prompt_id: String },
    /// Insert an unsaved copy directly after the original.
    DuplicatePrompt { prompt_id: String },
    /// Load a prompt (typically a saved version). With `replace`, it takes
    /// the place and id of an existing prompt; otherwise it is appended.
    HydratePrompt {
        replace: Option<String>,
        prompt: Prompt,
    },
    /// Replace every prompt with those loaded from the backend.
    HydrateFromBackend { prompts: Vec<Prompt> },
    /// Replace every prompt with one reconstructed from a span.
    HydrateFromTrace { prompt: Prompt },

    // ── Messages ──
    /// Append an empty message. Without a role, alternates with the last
    /// message (user after anything but user, assistant after user).
    AddMessage {
        prompt_id: String,
        role: Option<MessageRole>,
    },
    DeleteMessage {
        prompt_id: String,
        message_id: String,
    },
    /// Insert a copy with a fresh id directly after the original.
    DuplicateMessage {
        prompt_id: String,
        message_id: String,
    },
    EditMessage {
        prompt_id: String,
        message_id: String,
        patch: MessagePatch,
    },
    /// Move the message at index `from` so it ends up at index `to`.
    MoveMessage {
        prompt_id: String,
        from: usize,
        to: usize,
    },

    // ── Tools ──
    AddTool { prompt_id: String },
    DeleteTool { prompt_id: String, tool_id: String },
    EditTool {
        prompt_id: String,
        tool_id: String,
        function: FunctionDef,
    },
    SetToolChoice {
        prompt_id: String,
        tool_choice: Option<ToolChoice>,
    },

    // ── Model configuration ──
    UpdateModel {
        prompt_id: String,
        provider: String,
        model: String,
    },
    UpdateParameters {
        prompt_id: String,
        parameters: ModelParameters,
    },
    UpdateResponseFormat {
        prompt_id: String,
        response_format: ResponseFormat,
    },

    // ── Keywords ──
    UpdateKeyword { name: String, value: String },

    // ── Execution ──
    RunStarted { prompt_id: String },
    RunFinished {
        prompt_id: String,
        response: Option<PromptResponse>,
    },

    // ── Persistence ──
    /// The prompt stays dirty if it no longer matches `config`, the
    /// configuration that was sent.
    PromptSaved {
        prompt_id: String,
        name: String,
        version: u32,
        config: PromptConfig,
    },
    SetBackendPrompts { prompts: Vec<BackendPrompt> },

    // ── Provider catalog ──
    SetProviders { providers: Vec<String> },
    SetAvailableModels {
        provider: String,
        models: Vec<String>,
    },
}

impl Action {
    /// Short label for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Action::AddPrompt => "add_prompt",
            Action::DeletePrompt { .. } => "delete_prompt",
            Action::DuplicatePrompt { .. } => "duplicate_prompt",
            Action::HydratePrompt { .. } => "hydrate_prompt",
            Action::HydrateFromBackend { .. } => "hydrate_from_backend",
            Action::HydrateFromTrace { .. } => "hydrate_from_trace",
            Action::AddMessage { .. } => "add_message",
            Action::DeleteMessage { .. } => "delete_message",
            Action::DuplicateMessage { .. } => "duplicate_message",
            Action::EditMessage { .. } => "edit_message",
            Action::MoveMessage { .. } => "move_message",
            Action::AddTool { .. } => "add_tool",
            Action::DeleteTool { .. } => "delete_tool",
            Action::EditTool { .. } => "edit_tool",
            Action::SetToolChoice { .. } => "set_tool_choice",
            Action::UpdateModel { .. } => "update_model",
            Action::UpdateParameters { .. } => "update_parameters",
            Action::UpdateResponseFormat { .. } => "update_response_format",
            Action::UpdateKeyword { .. } => "update_keyword",
            Action::RunStarted { .. } => "run_started",
            Action::RunFinished { .. } => "run_finished",
            Action::PromptSaved { .. } => "prompt_saved",
            Action::SetBackendPrompts { .. } => "set_backend_prompts",
            Action::SetProviders { .. } => "set_providers",
            Action::SetAvailableModels { .. } => "set_available_models",
        }
    }
}

/// Fields of a message to change. `None` leaves the field as it is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessagePatch {
    pub role: Option<MessageRole>,
    pub content: Option<MessageContent>,
}

impl MessagePatch {
    pub fn content(content: impl Into<MessageContent>) -> Self {
        Self {
            content: Some(content.into()),
            ..Default::default()
        }
    }

    pub fn role(role: MessageRole) -> Self {
        Self {
            role: Some(role),
            ..Default::default()
        }
    }
}
