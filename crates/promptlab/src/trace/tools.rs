//! Tool definitions recovered from span attributes.

use std::collections::HashSet;

use serde_json::Value;
use tracing::warn;

use super::attributes::{SpanAttributes, non_empty_str};
use crate::{FunctionDef, Message, Tool, ToolType, empty_object_schema};

/// Tool definitions for an imported prompt.
///
/// Tries LiteLLM's `litellm.tools`, then OpenInference's `llm.tools`. When
/// neither yields a definition, one minimal definition is synthesized per
/// function name called in `messages`.
pub fn extract_tools(attrs: &SpanAttributes<'_>, messages: &[Message]) -> Vec<Tool> {
    let declared = litellm_tools(attrs.get("litellm.tools").as_ref())
        .filter(|tools| !tools.is_empty())
        .or_else(|| openinference_tools(attrs.get("llm.tools").as_ref()))
        .filter(|tools| !tools.is_empty());

    match declared {
        Some(tools) => dedupe(tools),
        None => tools_from_calls(messages),
    }
}

/// `litellm.tools`: a JSON string or an already-decoded list of
/// `{"type": "function", "function": {...}}` entries.
fn litellm_tools(value: Option<&Value>) -> Option<Vec<Tool>> {
    let list = match value? {
        Value::String(raw) => match serde_json::from_str::<Value>(raw) {
            Ok(list) => list,
            Err(e) => {
                warn!(error = %e, "skipping unparseable litellm.tools");
                return None;
            }
        },
        other => other.clone(),
    };
    let Value::Array(items) = list else {
        warn!("litellm.tools is not a list");
        return None;
    };
    Some(items.iter().filter_map(tool_from_definition).collect())
}

/// `llm.tools`: `[{"tool": {"json_schema": "<json>"}}]`.
fn openinference_tools(value: Option<&Value>) -> Option<Vec<Tool>> {
    let Value::Array(items) = value? else {
        return None;
    };
    let tools = items
        .iter()
        .filter_map(|item| {
            let schema = item.get("tool").unwrap_or(item).get("json_schema")?;
            match schema {
                Value::String(raw) => match serde_json::from_str::<Value>(raw) {
                    Ok(definition) => tool_from_definition(&definition),
                    Err(e) => {
                        warn!(error = %e, "skipping unparseable llm.tools entry");
                        None
                    }
                },
                definition => tool_from_definition(definition),
            }
        })
        .collect();
    Some(tools)
}

/// Accepts `{"type": "function", "function": {...}}` or a bare function
/// object. Definitions without a name are dropped.
fn tool_from_definition(definition: &Value) -> Option<Tool> {
    let function = definition.get("function").unwrap_or(definition);
    let name = function.get("name").and_then(non_empty_str)?;
    let parameters = match function.get("parameters") {
        Some(schema @ Value::Object(_)) => schema.clone(),
        Some(Value::String(raw)) => serde_json::from_str(raw).unwrap_or_else(|e| {
            warn!(tool = %name, error = %e, "tool parameters did not parse; using empty schema");
            empty_object_schema()
        }),
        _ => empty_object_schema(),
    };
    Some(Tool {
        id: String::new(),
        tool_type: ToolType::Function,
        function: FunctionDef {
            name,
            description: function
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            parameters,
            strict: function.get("strict").and_then(Value::as_bool),
        },
    })
}

fn dedupe(tools: Vec<Tool>) -> Vec<Tool> {
    let mut seen = HashSet::new();
    tools
        .into_iter()
        .filter(|tool| seen.insert(tool.function.name.clone()))
        .collect()
}

fn tools_from_calls(messages: &[Message]) -> Vec<Tool> {
    let mut seen = HashSet::new();
    messages
        .iter()
        .flat_map(|m| m.tool_calls.iter().flatten())
        .filter(|call| seen.insert(call.function.name.clone()))
        .map(|call| Tool::stub(call.function.name.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ToolCall;
    use serde_json::json;

    #[test]
    fn litellm_string_is_parsed_and_deduped() {
        let tools = json!([
            {"type": "function", "function": {"name": "search", "description": "Find", "parameters": {"type": "object", "properties": {"q": {"type": "string"}}}}},
            {"type": "function", "function": {"name": "search", "description": "dup"}},
            {"type": "function", "function": {"name": "fetch"}},
        ]);
        let attrs = json!({"litellm.tools": tools.to_string()});
        let extracted = extract_tools(&SpanAttributes::new(&attrs), &[]);
        let names: Vec<&str> = extracted.iter().map(Tool::name).collect();
        assert_eq!(names, vec!["search", "fetch"]);
        assert_eq!(extracted[0].function.description, "Find");
        assert_eq!(extracted[1].function.parameters, empty_object_schema());
    }

    #[test]
    fn openinference_json_schema_wrappers() {
        let attrs = json!({
            "llm": {"tools": [
                {"tool": {"json_schema": "{\"type\":\"function\",\"function\":{\"name\":\"lookup\"}}"}},
                {"tool": {"json_schema": "{broken"}},
            ]}
        });
        let extracted = extract_tools(&SpanAttributes::new(&attrs), &[]);
        assert_eq!(extracted.len(), 1);
        assert_eq!(extracted[0].name(), "lookup");
    }

    #[test]
    fn parse_failure_falls_back_to_tool_calls() {
        let attrs = json!({"litellm.tools": "not json at all"});
        let messages = vec![
            Message::assistant_tool_calls(vec![
                ToolCall::new("1", "get_weather", "{}"),
                ToolCall::new("2", "get_weather", "{}"),
            ]),
            Message::assistant_tool_calls(vec![ToolCall::new("3", "get_time", "{}")]),
        ];
        let extracted = extract_tools(&SpanAttributes::new(&attrs), &messages);
        let names: Vec<&str> = extracted.iter().map(Tool::name).collect();
        assert_eq!(names, vec!["get_weather", "get_time"]);
        assert_eq!(extracted[0].function.parameters, empty_object_schema());
    }

    #[test]
    fn empty_declared_list_falls_back() {
        let attrs = json!({"litellm.tools": []});
        let messages = vec![Message::assistant_tool_calls(vec![ToolCall::new("1", "ping", "{}")])];
        let extracted = extract_tools(&SpanAttributes::new(&attrs), &messages);
        assert_eq!(extracted[0].name(), "ping");
    }

    #[test]
    fn nothing_anywhere_means_no_tools() {
        let attrs = json!({});
        assert!(extract_tools(&SpanAttributes::new(&attrs), &[Message::user("hi")]).is_empty());
    }
}
