//! Reconstruct an editable prompt from one recorded LLM-call span.
//!
//! Spans arrive as attribute dictionaries whose shape depends on the
//! instrumentation that produced them: OpenInference flat keys, LiteLLM's
//! `litellm.*` keys, or a nested `llm` object. [`import_span`] reads all of
//! them through [`SpanAttributes`] and never fails; anything missing or
//! malformed falls back to a default.
//!
//! The recorded input of a tool-using call ends with the assistant turn that
//! requested the tools and the tool results. Replaying that input would
//! duplicate the turn the output already answers, so the final tool-calling
//! run is dropped from the input (see
//! [`extract_input_messages`](messages::extract_input_messages)).

pub mod attributes;
pub mod messages;
pub mod tools;

pub use attributes::SpanAttributes;

use serde_json::Value;
use tracing::info;

use crate::config::PlaygroundConfig;
use crate::store::{ModelParameters, Prompt, PromptResponse};
use crate::{
    DEFAULT_MAX_TOKENS, DEFAULT_MODEL, DEFAULT_PROVIDER, DEFAULT_TEMPERATURE, DEFAULT_TOP_P,
    MessageRole, ResponseFormat, ToolChoice,
};

use attributes::{as_number, decode_if_structured, non_empty_str};
use messages::{extract_input_messages, extract_messages};
use tools::extract_tools;

/// Name given to imported prompts unless configured otherwise.
pub const DEFAULT_IMPORT_NAME: &str = "Imported span";

/// Fallbacks used when a span does not say.
#[derive(Clone, Debug, PartialEq)]
pub struct ImportOptions {
    pub provider: String,
    pub model: String,
    pub name: String,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            provider: DEFAULT_PROVIDER.to_string(),
            model: DEFAULT_MODEL.to_string(),
            name: DEFAULT_IMPORT_NAME.to_string(),
        }
    }
}

impl From<&PlaygroundConfig> for ImportOptions {
    fn from(config: &PlaygroundConfig) -> Self {
        Self {
            provider: config.default_provider.clone(),
            model: config.default_model.clone(),
            name: config.import_name.clone(),
        }
    }
}

/// Build an unsaved prompt from a span's attributes.
pub fn import_span(attributes: &Value, options: &ImportOptions) -> Prompt {
    let attrs = SpanAttributes::new(attributes);

    let metadata = attrs.structured("metadata");
    let from_metadata = |key: &str| {
        metadata
            .as_ref()
            .and_then(|m| m.get(key))
            .and_then(non_empty_str)
    };
    let model = attrs
        .string("llm.model_name")
        .or_else(|| attrs.string("litellm.model"))
        .or_else(|| from_metadata("ls_model_name"))
        .unwrap_or_else(|| options.model.clone());
    let provider = attrs
        .string("llm.provider")
        .or_else(|| attrs.string("litellm.provider"))
        .or_else(|| from_metadata("ls_provider"))
        .map(|p| normalize_provider(&p))
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| options.provider.clone());

    let invocation = attrs.structured("llm.invocation_parameters");
    let (parameters, response_format) = read_parameters(&attrs, invocation.as_ref());

    let input = extract_input_messages(attrs.structured("llm.input_messages").as_ref());
    let output = extract_messages(
        attrs.structured("llm.output_messages").as_ref(),
        MessageRole::Assistant,
    );

    let tools = extract_tools(&attrs, &input);
    let last_response = output.first().map(|m| PromptResponse {
        content: m.content.to_text(),
        cost: 0.0,
        tool_calls: m.tool_calls.clone().unwrap_or_default(),
    });

    info!(
        %provider,
        %model,
        messages = input.len(),
        tools = tools.len(),
        has_output = last_response.is_some(),
        "imported span"
    );

    Prompt {
        tool_choice: (!tools.is_empty()).then(ToolChoice::auto),
        parameters,
        response_format,
        last_response,
        ..Prompt::new(options.name.clone(), provider, model)
            .with_messages(input)
            .with_tools(tools)
    }
}

/// `openai.responses` → `openai`.
pub fn normalize_provider(provider: &str) -> String {
    provider
        .split_once('.')
        .map_or(provider, |(head, _)| head)
        .trim()
        .to_string()
}

fn read_parameters(
    attrs: &SpanAttributes<'_>,
    invocation: Option<&Value>,
) -> (ModelParameters, ResponseFormat) {
    let param = |key: &str| {
        invocation
            .and_then(|p| p.get(key))
            .and_then(as_number)
            .or_else(|| attrs.number(&format!("litellm.{key}")))
    };

    let parameters = ModelParameters {
        temperature: float(param("temperature")).unwrap_or(DEFAULT_TEMPERATURE),
        top_p: float(param("top_p")).unwrap_or(DEFAULT_TOP_P),
        max_tokens: param("max_tokens")
            .filter(|v| (0.0..=f64::from(u32::MAX)).contains(v))
            .map_or(DEFAULT_MAX_TOKENS, |v| v as u32),
    };

    let response_format = invocation
        .and_then(|p| p.get("response_format"))
        .cloned()
        .map(decode_if_structured)
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default();

    (parameters, response_format)
}

/// Narrow to `f32`, dropping values that overflow it.
fn float(value: Option<f64>) -> Option<f32> {
    value.map(|v| v as f32).filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Message, MessageContent, Tool};
    use serde_json::json;

    fn import(attrs: Value) -> Prompt {
        import_span(&attrs, &ImportOptions::default())
    }

    #[test]
    fn removes_final_tool_turn_and_keeps_output() {
        let prompt = import(json!({
            "llm": {
                "model_name": "gpt-4o",
                "provider": "openai",
                "input_messages": [
                    {"message": {"role": "user", "content": "hi"}},
                    {"message": {"role": "assistant", "content": "", "tool_calls": [
                        {"tool_call": {"id": "call_1", "function": {"name": "get_weather", "arguments": "{\"city\":\"Paris\"}"}}}
                    ]}},
                    {"message": {"role": "tool", "content": "sunny", "tool_call_id": "call_1"}}
                ],
                "output_messages": [
                    {"message": {"role": "assistant", "content": "It's sunny"}}
                ]
            }
        }));

        assert_eq!(prompt.messages, vec![Message::user("hi")]);
        let response = prompt.last_response.unwrap();
        assert_eq!(response.content, "It's sunny");
        assert_eq!(response.cost, 0.0);
        assert!(prompt.tools.is_empty());
        assert!(prompt.tool_choice.is_none());
    }

    #[test]
    fn plain_conversation_is_kept_verbatim() {
        let prompt = import(json!({
            "llm.model_name": "gpt-4o",
            "llm.input_messages.0.message.role": "system",
            "llm.input_messages.0.message.content": "Be terse.",
            "llm.input_messages.1.message.role": "user",
            "llm.input_messages.1.message.content": "What is {{topic}}?",
            "llm.input_messages.2.message.role": "assistant",
            "llm.input_messages.2.message.content": "A thing.",
            "llm.input_messages.3.message.role": "user",
            "llm.input_messages.3.message.content": "More.",
        }));
        let roles: Vec<MessageRole> = prompt.messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![
                MessageRole::System,
                MessageRole::User,
                MessageRole::Assistant,
                MessageRole::User
            ]
        );
        assert_eq!(
            prompt.messages[1].content,
            MessageContent::Text("What is {{topic}}?".into())
        );
        assert!(prompt.last_response.is_none());
    }

    #[test]
    fn model_identity_from_metadata_string() {
        let prompt = import(json!({
            "metadata": "{\"ls_model_name\": \"claude-sonnet-4\", \"ls_provider\": \"anthropic\"}"
        }));
        assert_eq!(prompt.model, "claude-sonnet-4");
        assert_eq!(prompt.provider, "anthropic");
    }

    #[test]
    fn identity_fields_resolve_independently() {
        let prompt = import(json!({
            "llm": {"model_name": "gpt-4.1"},
            "metadata": {"ls_provider": "azure.openai"}
        }));
        assert_eq!(prompt.model, "gpt-4.1");
        assert_eq!(prompt.provider, "azure");
    }

    #[test]
    fn provider_is_truncated_at_first_dot() {
        assert_eq!(normalize_provider("openai.responses"), "openai");
        assert_eq!(normalize_provider("anthropic"), "anthropic");
        let prompt = import(json!({"llm.provider": "openai.chat.completions"}));
        assert_eq!(prompt.provider, "openai");
    }

    #[test]
    fn provider_with_empty_head_uses_default() {
        let prompt = import(json!({"llm.provider": ".responses"}));
        assert_eq!(prompt.provider, DEFAULT_PROVIDER);
    }

    #[test]
    fn out_of_range_parameters_use_defaults() {
        let prompt = import(json!({
            "litellm.temperature": "NaN",
            "litellm.top_p": "inf",
            "litellm.max_tokens": "1e20",
        }));
        assert_eq!(prompt.parameters, ModelParameters::default());

        let prompt = import(json!({
            "llm.invocation_parameters": {"temperature": 1e300, "top_p": "-inf", "max_tokens": -3}
        }));
        assert_eq!(prompt.parameters, ModelParameters::default());

        let json = serde_json::to_string(&prompt).unwrap();
        let back: Prompt = serde_json::from_str(&json).unwrap();
        assert_eq!(back.parameters, ModelParameters::default());
    }

    #[test]
    fn litellm_flat_attributes() {
        let tools = json!([{"type": "function", "function": {"name": "search"}}]);
        let prompt = import(json!({
            "litellm.model": "mistral-large",
            "litellm.provider": "mistral",
            "litellm.temperature": "0.2",
            "litellm.top_p": 0.9,
            "litellm.max_tokens": "256",
            "litellm.tools": tools.to_string(),
            "llm.input_messages": "[{\"message\": {\"role\": \"user\", \"content\": {\"text\": \"find it\"}}}]",
        }));
        assert_eq!(prompt.model, "mistral-large");
        assert_eq!(prompt.provider, "mistral");
        assert!((prompt.parameters.temperature - 0.2).abs() < 1e-6);
        assert!((prompt.parameters.top_p - 0.9).abs() < 1e-6);
        assert_eq!(prompt.parameters.max_tokens, 256);
        assert_eq!(prompt.messages[0].content, MessageContent::Text("find it".into()));
        assert_eq!(prompt.tools.iter().map(Tool::name).collect::<Vec<_>>(), vec!["search"]);
        assert_eq!(prompt.tool_choice, Some(ToolChoice::auto()));
    }

    #[test]
    fn invocation_parameters_as_json_string() {
        let prompt = import(json!({
            "llm": {
                "invocation_parameters": "{\"temperature\": 0, \"max_tokens\": 64, \"response_format\": {\"type\": \"json_object\"}}"
            },
            "litellm.temperature": 0.9
        }));
        assert_eq!(prompt.parameters.temperature, 0.0);
        assert_eq!(prompt.parameters.max_tokens, 64);
        assert_eq!(prompt.parameters.top_p, DEFAULT_TOP_P);
        assert_eq!(prompt.response_format, ResponseFormat::JsonObject);
    }

    #[test]
    fn malformed_input_defaults_everything() {
        for attrs in [
            json!(null),
            json!("garbage"),
            json!(17),
            json!({"llm": 5, "metadata": "{not json", "litellm.tools": "["}),
        ] {
            let prompt = import(attrs);
            assert_eq!(prompt.provider, DEFAULT_PROVIDER);
            assert_eq!(prompt.model, DEFAULT_MODEL);
            assert_eq!(prompt.parameters, ModelParameters::default());
            assert!(prompt.messages.is_empty());
            assert!(prompt.tools.is_empty());
            assert!(prompt.last_response.is_none());
            assert_eq!(prompt.name, DEFAULT_IMPORT_NAME);
            assert!(prompt.version.is_none());
            assert!(!prompt.is_dirty);
        }
    }

    #[test]
    fn tools_fall_back_to_called_functions() {
        let prompt = import(json!({
            "llm": {
                "input_messages": [
                    {"message": {"role": "user", "content": "weather?"}},
                    {"message": {"role": "assistant", "tool_calls": [
                        {"id": "1", "function": {"name": "get_weather", "arguments": {"city": "Oslo"}}}
                    ]}},
                    {"message": {"role": "tool", "content": "rain", "tool_call_id": "1"}},
                    {"message": {"role": "user", "content": "and tomorrow?"}}
                ]
            }
        }));
        assert_eq!(prompt.messages.len(), 4);
        assert_eq!(prompt.tools.len(), 1);
        assert_eq!(prompt.tools[0].name(), "get_weather");
        assert_eq!(prompt.tool_choice, Some(ToolChoice::auto()));
        let call = &prompt.messages[1].tool_calls.as_ref().unwrap()[0];
        assert_eq!(call.function.arguments, "{\"city\":\"Oslo\"}");
    }

    #[test]
    fn output_tool_calls_become_response_tool_calls() {
        let prompt = import(json!({
            "llm.output_messages": [
                {"message": {"role": "assistant", "tool_calls": [
                    {"id": "c", "function": {"name": "lookup", "arguments": "{}"}}
                ]}}
            ]
        }));
        let response = prompt.last_response.unwrap();
        assert_eq!(response.content, "");
        assert_eq!(response.tool_calls[0].function.name, "lookup");
    }

    #[test]
    fn options_come_from_config() {
        let config = PlaygroundConfig::default()
            .with_default_model("anthropic", "claude-haiku")
            .with_import_name("From trace");
        let prompt = import_span(&json!({}), &ImportOptions::from(&config));
        assert_eq!(prompt.provider, "anthropic");
        assert_eq!(prompt.model, "claude-haiku");
        assert_eq!(prompt.name, "From trace");
    }
}
