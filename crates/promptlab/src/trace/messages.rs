//! Message reconstruction from span message lists.

use serde_json::Value;

use super::attributes::{decode_if_structured, non_empty_str};
use crate::{Message, MessageContent, MessageRole, ToolCall};

/// Normalize a content value: strings are kept, lists become parts, an
/// object with a `text` field is unwrapped, any other object is stringified,
/// and absence becomes empty text.
pub fn normalize_content(value: Option<&Value>) -> MessageContent {
    match value {
        None | Some(Value::Null) => MessageContent::default(),
        Some(Value::String(s)) => MessageContent::Text(s.clone()),
        Some(Value::Array(parts)) => MessageContent::Parts(parts.clone()),
        Some(Value::Object(map)) => match map.get("text") {
            Some(text) => normalize_content(Some(text)),
            None => MessageContent::Text(Value::Object(map.clone()).to_string()),
        },
        Some(other) => MessageContent::Text(other.to_string()),
    }
}

/// Tool calls from a `tool_calls` list. Entries may be bare calls or
/// `{"tool_call": ...}` wrappers; calls without a function name are dropped.
pub fn parse_tool_calls(value: Option<&Value>) -> Vec<ToolCall> {
    let Some(Value::Array(items)) = value.cloned().map(decode_if_structured) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| {
            let call = item.get("tool_call").unwrap_or(item);
            let function = call.get("function")?;
            let name = function.get("name").and_then(non_empty_str)?;
            let arguments = match function.get("arguments") {
                None | Some(Value::Null) => "{}".to_string(),
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
            };
            let id = call.get("id").and_then(Value::as_str).unwrap_or_default();
            Some(ToolCall::new(id, name, arguments))
        })
        .collect()
}

/// Unwrap a list of `{"message": {...}}` wrappers. Wrappers without a
/// `message` object are dropped; a missing or unknown role becomes
/// `default_role`.
pub fn extract_messages(list: Option<&Value>, default_role: MessageRole) -> Vec<Message> {
    parse_entries(list, default_role)
        .into_iter()
        .map(|(message, _)| message)
        .collect()
}

/// Input messages with the final tool-calling turn removed.
///
/// An assistant message opens the removed run when its raw `tool_calls`
/// list is non-empty, even if none of the calls survive parsing.
pub fn extract_input_messages(list: Option<&Value>) -> Vec<Message> {
    let mut entries = parse_entries(list, MessageRole::User);
    if let Some(start) = trailing_turn_start(&entries, |(m, _)| m.role, |(_, raw)| *raw) {
        entries.truncate(start);
    }
    entries.into_iter().map(|(message, _)| message).collect()
}

/// Parsed messages paired with whether the raw `tool_calls` list was
/// non-empty.
fn parse_entries(list: Option<&Value>, default_role: MessageRole) -> Vec<(Message, bool)> {
    let Some(Value::Array(wrappers)) = list else {
        return Vec::new();
    };
    wrappers
        .iter()
        .filter_map(|wrapper| {
            let message = wrapper.get("message").filter(|m| m.is_object())?;
            let role = message
                .get("role")
                .and_then(Value::as_str)
                .and_then(MessageRole::parse)
                .unwrap_or(default_role);
            let content = match message.get("content") {
                Some(content) if !content.is_null() => normalize_content(Some(content)),
                _ => content_from_parts(message.get("contents")),
            };
            let raw_calls = message.get("tool_calls").cloned().map(decode_if_structured);
            let requested_tools =
                matches!(&raw_calls, Some(Value::Array(items)) if !items.is_empty());
            let tool_calls = parse_tool_calls(raw_calls.as_ref());
            let parsed = Message {
                tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
                tool_call_id: message.get("tool_call_id").and_then(non_empty_str),
                ..Message::new(role, content)
            };
            Some((parsed, requested_tools))
        })
        .collect()
}

/// OpenInference `contents`: `[{"message_content": {"type": .., "text": ..}}]`.
fn content_from_parts(contents: Option<&Value>) -> MessageContent {
    let Some(Value::Array(items)) = contents else {
        return MessageContent::default();
    };
    let parts: Vec<Value> = items
        .iter()
        .map(|item| item.get("message_content").unwrap_or(item).clone())
        .collect();
    if parts.is_empty() {
        MessageContent::default()
    } else {
        MessageContent::Parts(parts)
    }
}

/// Drop the final tool-calling turn from an input list.
///
/// The removed run is an assistant message with tool calls followed only by
/// tool messages up to the end of the list. At most one run is removed.
pub fn strip_trailing_tool_turn(mut messages: Vec<Message>) -> Vec<Message> {
    if let Some(start) = trailing_turn_start(&messages, |m| m.role, Message::has_tool_calls) {
        messages.truncate(start);
    }
    messages
}

/// Index of the assistant message opening the trailing tool run, if any.
fn trailing_turn_start<T>(
    items: &[T],
    role: impl Fn(&T) -> MessageRole,
    calls_tools: impl Fn(&T) -> bool,
) -> Option<usize> {
    let mut start = items.len();
    while start > 0 && role(&items[start - 1]) == MessageRole::Tool {
        start -= 1;
    }
    let opener = start.checked_sub(1)?;
    let candidate = &items[opener];
    (role(candidate) == MessageRole::Assistant && calls_tools(candidate)).then_some(opener)
}
