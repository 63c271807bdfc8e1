//! Fallback-chain lookup over span attribute dictionaries.
//!
//! Instrumentation libraries disagree on whether `llm.model_name` is a
//! nested object path or a literal dotted key, whether structured values are
//! inline or JSON-encoded strings, and whether lists are real arrays or
//! flattened into indexed keys (`llm.input_messages.0.message.role`).
//! [`SpanAttributes`] resolves a dotted path against all of these.

use serde_json::{Map, Value};

/// Read-only view over one span's attributes.
#[derive(Clone, Copy, Debug)]
pub struct SpanAttributes<'a> {
    root: &'a Value,
}

impl<'a> SpanAttributes<'a> {
    pub fn new(root: &'a Value) -> Self {
        Self { root }
    }

    /// Resolve a dotted path. Nested objects are tried before literal dotted
    /// keys, and any mix of the two is accepted. JSON-encoded strings met
    /// along the way are decoded. `null` counts as absent.
    pub fn get(&self, path: &str) -> Option<Value> {
        let segments: Vec<&str> = path.split('.').collect();
        resolve(self.root, &segments)
    }

    /// Like [`get`](Self::get), but a string result that holds a JSON object
    /// or array is decoded as well.
    pub fn structured(&self, path: &str) -> Option<Value> {
        self.get(path).map(decode_if_structured)
    }

    /// A non-empty string value.
    pub fn string(&self, path: &str) -> Option<String> {
        self.get(path).as_ref().and_then(non_empty_str)
    }

    /// A number, accepting numeric strings.
    pub fn number(&self, path: &str) -> Option<f64> {
        self.get(path).as_ref().and_then(as_number)
    }
}

/// Interpret a value as a finite number; numeric strings are accepted.
pub fn as_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    number.filter(|v| v.is_finite())
}

pub fn non_empty_str(value: &Value) -> Option<String> {
    value
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Decode a string holding a JSON object or array; anything else is
/// returned unchanged.
pub fn decode_if_structured(value: Value) -> Value {
    match &value {
        Value::String(raw) => decode_json(raw).unwrap_or(value),
        _ => value,
    }
}

fn decode_json(raw: &str) -> Option<Value> {
    let trimmed = raw.trim_start();
    if !(trimmed.starts_with('{') || trimmed.starts_with('[')) {
        return None;
    }
    match serde_json::from_str(trimmed) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::trace!(error = %e, "attribute looked like JSON but did not parse");
            None
        }
    }
}

fn resolve(value: &Value, segments: &[&str]) -> Option<Value> {
    if segments.is_empty() {
        return (!value.is_null()).then(|| value.clone());
    }
    match value {
        Value::Object(map) => {
            for split in 1..=segments.len() {
                let key = segments[..split].join(".");
                if let Some(child) = map.get(&key)
                    && let Some(found) = resolve(child, &segments[split..])
                {
                    return Some(found);
                }
            }
            reassemble(map, &segments.join("."))
        }
        Value::Array(items) => {
            let index: usize = segments[0].parse().ok()?;
            resolve(items.get(index)?, &segments[1..])
        }
        Value::String(raw) => resolve(&decode_json(raw)?, segments),
        _ => None,
    }
}

/// Rebuild the value at `prefix` from flattened keys like `prefix.0.a.b`.
/// Objects whose keys are all indices become arrays.
fn reassemble(map: &Map<String, Value>, prefix: &str) -> Option<Value> {
    let mut root = Value::Null;
    let mut found = false;
    for (key, value) in map {
        let Some(rest) = key.strip_prefix(prefix).and_then(|r| r.strip_prefix('.')) else {
            continue;
        };
        insert_path(&mut root, rest.split('.'), value.clone());
        found = true;
    }
    found.then(|| arrayify(root))
}

fn insert_path<'s>(slot: &mut Value, mut segments: impl Iterator<Item = &'s str>, value: Value) {
    let Some(segment) = segments.next() else {
        *slot = value;
        return;
    };
    if !slot.is_object() {
        *slot = Value::Object(Map::new());
    }
    if let Value::Object(map) = slot {
        let child = map.entry(segment.to_string()).or_insert(Value::Null);
        insert_path(child, segments, value);
    }
}

fn arrayify(value: Value) -> Value {
    let Value::Object(map) = value else {
        return value;
    };
    if !map.is_empty() && map.keys().all(|k| k.parse::<usize>().is_ok()) {
        let mut entries: Vec<(usize, Value)> = map
            .into_iter()
            .filter_map(|(k, v)| Some((k.parse().ok()?, arrayify(v))))
            .collect();
        entries.sort_by_key(|(index, _)| *index);
        Value::Array(entries.into_iter().map(|(_, v)| v).collect())
    } else {
        Value::Object(map.into_iter().map(|(k, v)| (k, arrayify(v))).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn nested_flat_and_mixed_paths() {
        let nested = json!({"llm": {"model_name": "gpt-4o"}});
        let flat = json!({"llm.model_name": "gpt-4o"});
        let mixed = json!({"llm": {"model_name": null}, "llm.model_name": "gpt-4o"});
        for attrs in [&nested, &flat, &mixed] {
            assert_eq!(
                SpanAttributes::new(attrs).string("llm.model_name").as_deref(),
                Some("gpt-4o")
            );
        }
    }

    #[test]
    fn json_strings_are_decoded_along_the_path() {
        let attrs = json!({"metadata": "{\"ls_provider\": \"anthropic\"}"});
        let attrs = SpanAttributes::new(&attrs);
        assert_eq!(attrs.string("metadata.ls_provider").as_deref(), Some("anthropic"));
        assert_eq!(attrs.structured("metadata").unwrap()["ls_provider"], "anthropic");
    }

    #[test]
    fn flattened_indexed_keys_become_arrays() {
        let attrs = json!({
            "llm.input_messages.1.message.role": "assistant",
            "llm.input_messages.0.message.role": "user",
            "llm.input_messages.0.message.content": "hi",
            "llm.input_messages_count": 2,
        });
        let messages = SpanAttributes::new(&attrs).get("llm.input_messages").unwrap();
        assert_eq!(
            messages,
            json!([
                {"message": {"role": "user", "content": "hi"}},
                {"message": {"role": "assistant"}},
            ])
        );
    }

    #[test]
    fn numbers_accept_numeric_strings() {
        let attrs = json!({"litellm.temperature": " 0.25 ", "litellm.max_tokens": 512, "bad": "warm"});
        let attrs = SpanAttributes::new(&attrs);
        assert_eq!(attrs.number("litellm.temperature"), Some(0.25));
        assert_eq!(attrs.number("litellm.max_tokens"), Some(512.0));
        assert_eq!(attrs.number("bad"), None);
    }

    #[test]
    fn non_objects_resolve_to_nothing() {
        for root in [json!(null), json!(42), json!("not json"), json!([1, 2])] {
            assert!(SpanAttributes::new(&root).get("llm.model_name").is_none());
        }
    }
}
