//! Prompt entity, model parameters, and the persisted config shape.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{
    DEFAULT_MAX_TOKENS, DEFAULT_MODEL, DEFAULT_PROVIDER, DEFAULT_TEMPERATURE, DEFAULT_TOP_P,
    Message, ResponseFormat, Tool, ToolCall, ToolChoice,
};

/// Sampling parameters sent with every run.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, JsonSchema)]
pub struct ModelParameters {
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_temperature() -> f32 {
    DEFAULT_TEMPERATURE
}
fn default_top_p() -> f32 {
    DEFAULT_TOP_P
}
fn default_max_tokens() -> u32 {
    DEFAULT_MAX_TOKENS
}

impl Default for ModelParameters {
    fn default() -> Self {
        Self {
            temperature: DEFAULT_TEMPERATURE,
            top_p: DEFAULT_TOP_P,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

/// Result of the most recent run of a prompt.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
pub struct PromptResponse {
    pub content: String,
    /// Estimated cost in USD. `0.0` when unknown.
    #[serde(default)]
    pub cost: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
}

/// An editable prompt: messages, tools, and model configuration.
///
/// `version` is `None` until the prompt has been saved. `is_dirty` is only
/// meaningful for saved prompts and stays `false` otherwise.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, JsonSchema)]
pub struct Prompt {
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub provider: String,
    pub model: String,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub tools: Vec<Tool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,
    #[serde(default)]
    pub parameters: ModelParameters,
    #[serde(default)]
    pub response_format: ResponseFormat,
    #[serde(default)]
    pub is_running: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_response: Option<PromptResponse>,
    #[serde(default)]
    pub version: Option<u32>,
    #[serde(default)]
    pub is_dirty: bool,
}

impl Prompt {
    /// An unsaved prompt with no messages.
    pub fn new(name: impl Into<String>, provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            name: name.into(),
            provider: provider.into(),
            model: model.into(),
            messages: Vec::new(),
            tools: Vec::new(),
            tool_choice: None,
            parameters: ModelParameters::default(),
            response_format: ResponseFormat::default(),
            is_running: false,
            last_response: None,
            version: None,
            is_dirty: false,
        }
    }

    pub fn with_messages(mut self, messages: Vec<Message>) -> Self {
        self.messages = messages;
        self
    }

    pub fn with_tools(mut self, tools: Vec<Tool>) -> Self {
        self.tools = tools;
        self
    }

    pub fn is_saved(&self) -> bool {
        self.version.is_some()
    }

    /// Record an edit to the saved configuration. Only saved prompts become
    /// dirty.
    pub(crate) fn touch(&mut self) {
        self.is_dirty = self.version.is_some();
    }

    pub fn message_index(&self, message_id: &str) -> Option<usize> {
        self.messages.iter().position(|m| m.id == message_id)
    }

    pub fn tool_index(&self, tool_id: &str) -> Option<usize> {
        self.tools.iter().position(|t| t.id == tool_id)
    }

    /// The persisted configuration of this prompt.
    pub fn to_config(&self) -> PromptConfig {
        PromptConfig {
            provider: self.provider.clone(),
            model: self.model.clone(),
            messages: self.messages.clone(),
            tools: self.tools.clone(),
            tool_choice: self.tool_choice.clone(),
            parameters: self.parameters.clone(),
            response_format: self.response_format.clone(),
        }
    }

    /// Rebuild a saved prompt from its persisted configuration.
    pub fn from_config(name: impl Into<String>, version: u32, config: PromptConfig) -> Self {
        Self {
            messages: config.messages,
            tools: config.tools,
            tool_choice: config.tool_choice,
            parameters: config.parameters,
            response_format: config.response_format,
            version: Some(version),
            ..Self::new(name, config.provider, config.model)
        }
    }

    /// Problems that would make the configuration unusable: tool parameter
    /// schemas or a structured-output schema that do not compile.
    pub fn validation_errors(&self) -> Vec<String> {
        schema_problems(&self.tools, &self.response_format)
    }
}

/// Persisted shape of a prompt, as stored and returned by the backend.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, JsonSchema)]
pub struct PromptConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub tools: Vec<Tool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,
    #[serde(default)]
    pub parameters: ModelParameters,
    #[serde(default)]
    pub response_format: ResponseFormat,
}

impl PromptConfig {
    /// Same checks as [`Prompt::validation_errors`].
    pub fn validation_errors(&self) -> Vec<String> {
        schema_problems(&self.tools, &self.response_format)
    }
}

fn schema_problems(tools: &[Tool], response_format: &ResponseFormat) -> Vec<String> {
    tools
        .iter()
        .filter_map(Tool::schema_error)
        .chain(response_format.schema_error())
        .collect()
}

fn default_provider() -> String {
    DEFAULT_PROVIDER.to_string()
}
fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn touch_only_dirties_saved_prompts() {
        let mut unsaved = Prompt::new("p", "openai", "gpt-4o");
        unsaved.touch();
        assert!(!unsaved.is_dirty);

        let mut saved = Prompt {
            version: Some(3),
            ..Prompt::new("p", "openai", "gpt-4o")
        };
        saved.touch();
        assert!(saved.is_dirty);
    }

    #[test]
    fn config_round_trip_keeps_configuration() {
        let prompt = Prompt::new("greeter", "anthropic", "claude-sonnet-4")
            .with_messages(vec![Message::system("Be brief."), Message::user("Hi {{name}}")])
            .with_tools(vec![Tool::stub("lookup")]);

        let restored = Prompt::from_config("greeter", 2, prompt.to_config());
        assert_eq!(restored.version, Some(2));
        assert!(!restored.is_dirty);
        assert_eq!(restored.messages, prompt.messages);
        assert_eq!(restored.tools, prompt.tools);
        assert_eq!(restored.provider, "anthropic");
    }

    #[test]
    fn config_fills_defaults_for_missing_fields() {
        let config: PromptConfig = serde_json::from_value(json!({
            "messages": [{"role": "user", "content": "hello"}]
        }))
        .unwrap();
        assert_eq!(config.provider, DEFAULT_PROVIDER);
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.parameters, ModelParameters::default());
        assert_eq!(config.response_format, ResponseFormat::Text);
    }

    #[test]
    fn partial_parameters_use_defaults() {
        let params: ModelParameters = serde_json::from_value(json!({"temperature": 0.2})).unwrap();
        assert!((params.temperature - 0.2).abs() < f32::EPSILON);
        assert_eq!(params.max_tokens, 1000);
        assert!((params.top_p - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn validation_reports_bad_tool_schema() {
        let prompt = Prompt::new("p", "openai", "gpt-4o").with_tools(vec![
            Tool::stub("fine"),
            Tool::new("bad", "", json!({"type": "not-a-type"})),
        ]);
        let errors = prompt.validation_errors();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("bad"));
    }
}
