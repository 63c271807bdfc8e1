//! Entity model and the pure reducer that owns it.
//!
//! [`PlaygroundState`] is a plain value. The only way to change it is
//! [`reduce`], which consumes the current state and an [`Action`] and returns
//! the next state. The reducer is total: actions that reference unknown ids
//! or out-of-range indices return the state unchanged.
//!
//! Two invariants hold after every transition:
//!
//! - **Liveness.** `keywords` contains exactly the variables referenced by
//!   messages that are currently part of some prompt. Every transition that
//!   adds, edits, or removes a message reports it to
//!   [`Keywords`](crate::keywords::Keywords).
//! - **Dirtiness.** Editing the configuration of a saved prompt marks it
//!   dirty; the same edit on an unsaved prompt does not.

mod actions;
pub mod order;
mod prompt;

pub use actions::{Action, MessagePatch};
pub use prompt::{ModelParameters, Prompt, PromptConfig, PromptResponse};

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::api::BackendPrompt;
use crate::config::PlaygroundConfig;
use crate::keywords::Keywords;
use crate::template::scan_content;
use crate::{DEFAULT_MODEL, DEFAULT_PROVIDER, Message, MessageRole, Tool, ToolChoice};

// ── State ──────────────────────────────────────────────────────────

/// Model and parameters for prompts created by [`Action::AddPrompt`].
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PromptDefaults {
    pub provider: String,
    pub model: String,
    pub parameters: ModelParameters,
}

impl Default for PromptDefaults {
    fn default() -> Self {
        Self {
            provider: DEFAULT_PROVIDER.to_string(),
            model: DEFAULT_MODEL.to_string(),
            parameters: ModelParameters::default(),
        }
    }
}

/// Deterministic id source. Ids look like `msg-7`, unique across kinds.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct IdSequence {
    next: u64,
}

impl IdSequence {
    pub fn next(&mut self, kind: &str) -> String {
        self.next += 1;
        format!("{kind}-{}", self.next)
    }
}

/// Everything the workspace knows.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct PlaygroundState {
    /// Live keyword values and the per-message references they derive from.
    #[serde(flatten)]
    pub keywords: Keywords,
    pub prompts: Vec<Prompt>,
    /// Saved prompts known to the backend.
    pub backend_prompts: Vec<BackendPrompt>,
    pub enabled_providers: Vec<String>,
    /// Provider → model names.
    pub available_models: BTreeMap<String, Vec<String>>,
    pub defaults: PromptDefaults,
    #[serde(default)]
    ids: IdSequence,
}

impl PlaygroundState {
    /// An empty state seeded with the configured defaults.
    pub fn new(config: &PlaygroundConfig) -> Self {
        Self {
            enabled_providers: config.enabled_providers.clone(),
            defaults: PromptDefaults {
                provider: config.default_provider.clone(),
                model: config.default_model.clone(),
                parameters: config.default_parameters.clone(),
            },
            ..Default::default()
        }
    }

    pub fn prompt(&self, prompt_id: &str) -> Option<&Prompt> {
        self.prompts.iter().find(|p| p.id == prompt_id)
    }

    pub fn prompt_index(&self, prompt_id: &str) -> Option<usize> {
        self.prompts.iter().position(|p| p.id == prompt_id)
    }

    /// Whether any prompt is currently running.
    pub fn any_running(&self) -> bool {
        self.prompts.iter().any(|p| p.is_running)
    }
}

// ── Reducer ────────────────────────────────────────────────────────

/// Apply one action and return the resulting state.
pub fn reduce(mut state: PlaygroundState, action: Action) -> PlaygroundState {
    let label = action.name();
    if apply(&mut state, action) {
        trace!(action = label, "applied");
    } else {
        debug!(action = label, "ignored: unknown target or no change");
    }
    state
}

fn apply(state: &mut PlaygroundState, action: Action) -> bool {
    match action {
        // ── Prompts ──
        Action::AddPrompt => {
            let name = format!("Prompt {}", state.prompts.len() + 1);
            let prompt = Prompt {
                parameters: state.defaults.parameters.clone(),
                ..Prompt::new(name, &state.defaults.provider, &state.defaults.model)
                    .with_messages(vec![Message::user("")])
            };
            let prompt = adopt(&mut state.ids, prompt, None);
            state.prompts.push(prompt);
            true
        }
        Action::DeletePrompt { prompt_id } => {
            let Some(index) = state.prompt_index(&prompt_id) else {
                return false;
            };
            let removed = state.prompts.remove(index);
            forget_messages(&mut state.keywords, &removed.messages);
            true
        }
        Action::DuplicatePrompt { prompt_id } => {
            let Some(index) = state.prompt_index(&prompt_id) else {
                return false;
            };
            let source = &state.prompts[index];
            let copy = Prompt {
                name: format!("{} (copy)", source.name),
                version: None,
                is_dirty: false,
                last_response: None,
                ..source.clone()
            };
            let copy = adopt(&mut state.ids, copy, None);
            observe_messages(&mut state.keywords, &copy.messages);
            order::insert_after(&mut state.prompts, index, copy);
            true
        }
        Action::HydratePrompt { replace, prompt } => match replace {
            Some(target) => {
                let Some(index) = state.prompt_index(&target) else {
                    return false;
                };
                forget_messages(&mut state.keywords, &state.prompts[index].messages);
                let prompt = adopt(&mut state.ids, prompt, Some(target));
                observe_messages(&mut state.keywords, &prompt.messages);
                state.prompts[index] = prompt;
                true
            }
            None => {
                let prompt = adopt(&mut state.ids, prompt, None);
                observe_messages(&mut state.keywords, &prompt.messages);
                state.prompts.push(prompt);
                true
            }
        },
        Action::HydrateFromBackend { prompts } => {
            replace_all(state, prompts);
            true
        }
        Action::HydrateFromTrace { prompt } => {
            replace_all(state, vec![prompt]);
            true
        }

        // ── Messages ──
        Action::AddMessage { prompt_id, role } => {
            let Some(prompt) = find_prompt(&mut state.prompts, &prompt_id) else {
                return false;
            };
            let role = role.unwrap_or(match prompt.messages.last().map(|m| m.role) {
                Some(MessageRole::User) => MessageRole::Assistant,
                _ => MessageRole::User,
            });
            prompt
                .messages
                .push(Message::new(role, "").with_id(state.ids.next("msg")));
            prompt.touch();
            true
        }
        Action::DeleteMessage {
            prompt_id,
            message_id,
        } => {
            let Some(prompt) = find_prompt(&mut state.prompts, &prompt_id) else {
                return false;
            };
            let Some(index) = prompt.message_index(&message_id) else {
                return false;
            };
            let removed = prompt.messages.remove(index);
            state.keywords.forget(&removed.id);
            prompt.touch();
            true
        }
        Action::DuplicateMessage {
            prompt_id,
            message_id,
        } => {
            let Some(prompt) = find_prompt(&mut state.prompts, &prompt_id) else {
                return false;
            };
            let Some(index) = prompt.message_index(&message_id) else {
                return false;
            };
            let copy = Message {
                id: state.ids.next("msg"),
                ..prompt.messages[index].clone()
            };
            state.keywords.observe(&copy.id, scan_content(&copy.content));
            order::insert_after(&mut prompt.messages, index, copy);
            prompt.touch();
            true
        }
        Action::EditMessage {
            prompt_id,
            message_id,
            patch,
        } => {
            let Some(prompt) = find_prompt(&mut state.prompts, &prompt_id) else {
                return false;
            };
            let Some(index) = prompt.message_index(&message_id) else {
                return false;
            };
            let message = &mut prompt.messages[index];
            let mut changed = false;
            if let Some(role) = patch.role
                && role != message.role
            {
                message.role = role;
                changed = true;
            }
            if let Some(content) = patch.content
                && content != message.content
            {
                message.content = content;
                state
                    .keywords
                    .observe(&message.id, scan_content(&message.content));
                changed = true;
            }
            if changed {
                prompt.touch();
            }
            changed
        }
        Action::MoveMessage {
            prompt_id,
            from,
            to,
        } => {
            let Some(prompt) = find_prompt(&mut state.prompts, &prompt_id) else {
                return false;
            };
            if !order::move_item(&mut prompt.messages, from, to) {
                return false;
            }
            prompt.touch();
            true
        }

        // ── Tools ──
        Action::AddTool { prompt_id } => {
            let Some(prompt) = find_prompt(&mut state.prompts, &prompt_id) else {
                return false;
            };
            let tool = Tool {
                id: state.ids.next("tool"),
                ..Tool::stub(format!("new_function_{}", prompt.tools.len() + 1))
            };
            prompt.tools.push(tool);
            if prompt.tool_choice.is_none() {
                prompt.tool_choice = Some(ToolChoice::auto());
            }
            prompt.touch();
            true
        }
        Action::DeleteTool { prompt_id, tool_id } => {
            let Some(prompt) = find_prompt(&mut state.prompts, &prompt_id) else {
                return false;
            };
            let Some(index) = prompt.tool_index(&tool_id) else {
                return false;
            };
            prompt.tools.remove(index);
            if prompt.tools.is_empty() {
                prompt.tool_choice = None;
            }
            prompt.touch();
            true
        }
        Action::EditTool {
            prompt_id,
            tool_id,
            function,
        } => {
            let Some(prompt) = find_prompt(&mut state.prompts, &prompt_id) else {
                return false;
            };
            let Some(index) = prompt.tool_index(&tool_id) else {
                return false;
            };
            if prompt.tools[index].function == function {
                return false;
            }
            prompt.tools[index].function = function;
            prompt.touch();
            true
        }
        Action::SetToolChoice {
            prompt_id,
            tool_choice,
        } => edit_prompt(state, &prompt_id, |p| {
            replace_if_changed(&mut p.tool_choice, tool_choice)
        }),

        // ── Model configuration ──
        Action::UpdateModel {
            prompt_id,
            provider,
            model,
        } => edit_prompt(state, &prompt_id, |p| {
            let provider_changed = replace_if_changed(&mut p.provider, provider);
            let model_changed = replace_if_changed(&mut p.model, model);
            provider_changed || model_changed
        }),
        Action::UpdateParameters {
            prompt_id,
            parameters,
        } => edit_prompt(state, &prompt_id, |p| {
            replace_if_changed(&mut p.parameters, parameters)
        }),
        Action::UpdateResponseFormat {
            prompt_id,
            response_format,
        } => edit_prompt(state, &prompt_id, |p| {
            replace_if_changed(&mut p.response_format, response_format)
        }),

        // ── Keywords ──
        Action::UpdateKeyword { name, value } => state.keywords.set_value(&name, value),

        // ── Execution ──
        Action::RunStarted { prompt_id } => {
            let Some(prompt) = find_prompt(&mut state.prompts, &prompt_id) else {
                return false;
            };
            prompt.is_running = true;
            prompt.last_response = None;
            true
        }
        Action::RunFinished {
            prompt_id,
            response,
        } => {
            let Some(prompt) = find_prompt(&mut state.prompts, &prompt_id) else {
                return false;
            };
            prompt.is_running = false;
            prompt.last_response = response;
            true
        }

        // ── Persistence ──
        Action::PromptSaved {
            prompt_id,
            name,
            version,
            config,
        } => {
            let Some(prompt) = find_prompt(&mut state.prompts, &prompt_id) else {
                return false;
            };
            prompt.name = name;
            prompt.version = Some(version);
            prompt.is_dirty = prompt.to_config() != config;
            true
        }
        Action::SetBackendPrompts { prompts } => {
            state.backend_prompts = prompts;
            true
        }

        // ── Provider catalog ──
        Action::SetProviders { providers } => {
            state
                .available_models
                .retain(|provider, _| providers.contains(provider));
            state.enabled_providers = providers;
            true
        }
        Action::SetAvailableModels { provider, models } => {
            state.available_models.insert(provider, models);
            true
        }
    }
}

// ── Helpers ────────────────────────────────────────────────────────

fn find_prompt<'a>(prompts: &'a mut [Prompt], prompt_id: &str) -> Option<&'a mut Prompt> {
    prompts.iter_mut().find(|p| p.id == prompt_id)
}

/// Run a configuration edit on one prompt; marks it touched when the edit
/// reports a change.
fn edit_prompt(
    state: &mut PlaygroundState,
    prompt_id: &str,
    edit: impl FnOnce(&mut Prompt) -> bool,
) -> bool {
    let Some(prompt) = find_prompt(&mut state.prompts, prompt_id) else {
        return false;
    };
    let changed = edit(prompt);
    if changed {
        prompt.touch();
    }
    changed
}

fn replace_if_changed<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        return false;
    }
    *slot = value;
    true
}

/// Give a prompt entering the state fresh ids for itself (unless `keep_id`),
/// its messages, and its tools.
fn adopt(ids: &mut IdSequence, mut prompt: Prompt, keep_id: Option<String>) -> Prompt {
    prompt.id = keep_id.unwrap_or_else(|| ids.next("prompt"));
    for message in &mut prompt.messages {
        message.id = ids.next("msg");
    }
    for tool in &mut prompt.tools {
        tool.id = ids.next("tool");
    }
    prompt.is_running = false;
    if prompt.version.is_none() {
        prompt.is_dirty = false;
    }
    prompt
}

fn replace_all(state: &mut PlaygroundState, prompts: Vec<Prompt>) {
    for prompt in &state.prompts {
        forget_messages(&mut state.keywords, &prompt.messages);
    }
    let adopted: Vec<Prompt> = prompts
        .into_iter()
        .map(|p| adopt(&mut state.ids, p, None))
        .collect();
    for prompt in &adopted {
        observe_messages(&mut state.keywords, &prompt.messages);
    }
    state.prompts = adopted;
}

fn observe_messages(keywords: &mut Keywords, messages: &[Message]) {
    for message in messages {
        keywords.observe(&message.id, scan_content(&message.content));
    }
}

fn forget_messages(keywords: &mut Keywords, messages: &[Message]) {
    for message in messages {
        keywords.forget(&message.id);
    }
}
