//! Flat `{{name}}` template variables.
//!
//! A variable reference is `{{`, optional whitespace, an identifier
//! (`[A-Za-z_][A-Za-z0-9_]*`), optional whitespace, `}}`. Anything else,
//! including `{name}`, `{{ two words }}` or an unterminated `{{name`, is plain
//! text. There are no filters, sections, or escapes.

use std::collections::{BTreeMap, HashSet};
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::{Message, MessageContent};

static VARIABLE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").expect("variable pattern compiles")
});

/// Distinct variable names referenced in `text`, in order of first
/// appearance.
pub fn scan(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    VARIABLE_PATTERN
        .captures_iter(text)
        .filter_map(|cap| cap.get(1))
        .map(|m| m.as_str())
        .filter(|name| seen.insert(*name))
        .map(str::to_string)
        .collect()
}

/// Distinct variable names referenced anywhere in a message's text segments.
pub fn scan_content(content: &MessageContent) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut names = Vec::new();
    for segment in content.text_segments() {
        for name in scan(segment) {
            if seen.insert(name.clone()) {
                names.push(name);
            }
        }
    }
    names
}

/// Replace every variable reference with its value, or with the empty string
/// when `values` has no entry for it.
pub fn substitute(text: &str, values: &BTreeMap<String, String>) -> String {
    VARIABLE_PATTERN
        .replace_all(text, |cap: &Captures<'_>| {
            values.get(&cap[1]).cloned().unwrap_or_default()
        })
        .into_owned()
}

/// Substitute inside every text segment of `content`. Non-text parts are kept
/// as they are.
pub fn substitute_content(
    content: &MessageContent,
    values: &BTreeMap<String, String>,
) -> MessageContent {
    match content {
        MessageContent::Text(s) => MessageContent::Text(substitute(s, values)),
        MessageContent::Parts(parts) => MessageContent::Parts(
            parts
                .iter()
                .map(|part| {
                    let mut part = part.clone();
                    if let Some(text) = part.get_mut("text")
                        && let Some(s) = text.as_str()
                    {
                        *text = serde_json::Value::String(substitute(s, values));
                    }
                    part
                })
                .collect(),
        ),
    }
}

/// Render a message list with the given variable values.
pub fn render_messages(messages: &[Message], values: &BTreeMap<String, String>) -> Vec<Message> {
    messages
        .iter()
        .map(|m| Message {
            content: substitute_content(&m.content, values),
            ..m.clone()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn values(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn scan_finds_distinct_names_in_order() {
        let names = scan("Hi {{name}}, meet {{ friend }} and {{name}} again.");
        assert_eq!(names, vec!["name", "friend"]);
    }

    #[test]
    fn scan_ignores_malformed_delimiters() {
        assert!(scan("{name} {{two words}} {{name {{1abc}} {{}} }}x{{").is_empty());
        assert_eq!(scan("{{{triple}}}"), vec!["triple"]);
        assert_eq!(scan("{{snake_case_9}}"), vec!["snake_case_9"]);
    }

    #[test]
    fn substitute_replaces_known_and_blanks_unknown() {
        let out = substitute(
            "Write about {{topic}} for {{ audience }}.",
            &values(&[("topic", "tides")]),
        );
        assert_eq!(out, "Write about tides for .");
    }

    #[test]
    fn substitute_leaves_plain_text_alone() {
        let text = "no variables {here} or {{ not valid }}";
        assert_eq!(substitute(text, &BTreeMap::new()), text);
    }

    #[test]
    fn substituted_text_no_longer_references_name() {
        let text = "{{a}} then {{b}} then {{c}}";
        for name in scan(text) {
            let out = substitute(text, &values(&[(name.as_str(), "X")]));
            assert!(!scan(&out).contains(&name), "{name} survived substitution");
        }
    }

    #[test]
    fn content_parts_are_scanned_and_rendered() {
        let content = MessageContent::Parts(vec![
            json!({"type": "text", "text": "Describe {{subject}}"}),
            json!({"type": "image_url", "image_url": {"url": "https://x/{{subject}}.png"}}),
            json!({"type": "text", "text": "in {{style}} style, {{subject}} first"}),
        ]);
        assert_eq!(scan_content(&content), vec!["subject", "style"]);

        let rendered = substitute_content(&content, &values(&[("subject", "a cat"), ("style", "noir")]));
        let MessageContent::Parts(parts) = rendered else {
            panic!("expected parts");
        };
        assert_eq!(parts[0]["text"], "Describe a cat");
        assert_eq!(parts[1]["image_url"]["url"], "https://x/{{subject}}.png");
        assert_eq!(parts[2]["text"], "in noir style, a cat first");
    }

    #[test]
    fn render_messages_keeps_ids_and_roles() {
        let messages = vec![
            Message::system("You are {{persona}}.").with_id("msg-1"),
            Message::user("Hi").with_id("msg-2"),
        ];
        let rendered = render_messages(&messages, &values(&[("persona", "terse")]));
        assert_eq!(rendered[0].id, "msg-1");
        assert_eq!(rendered[0].content, MessageContent::Text("You are terse.".into()));
        assert_eq!(rendered[1], messages[1]);
    }
}
