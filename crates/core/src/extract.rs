//! Text extraction over loosely-typed agent response envelopes.

use serde_json::Value;

const TEXT_KEY: &str = "text";

/// Collects every value found under a key literally named `"text"`, at any depth.
///
/// Traversal is depth-first pre-order. Object keys are visited in their
/// insertion order and array elements in sequence. The value of a `"text"`
/// key is collected as a whole and its own children are not searched. Strings
/// are returned verbatim; any other value is rendered as its JSON text.
pub fn extract_texts(value: &Value) -> Vec<String> {
    let mut texts = Vec::new();
    collect_texts(value, &mut texts);
    texts
}

fn collect_texts(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                if key == TEXT_KEY {
                    out.push(render_text(child));
                } else {
                    collect_texts(child, out);
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_texts(item, out);
            }
        }
        Value::String(_) | Value::Number(_) | Value::Bool(_) | Value::Null => {}
    }
}

/// Collects the `text` of each entry in `content.parts`, in order.
///
/// This is the narrow path used for streamed agent events; text found
/// anywhere else in the event is ignored.
pub fn content_part_texts(event: &Value) -> Vec<String> {
    event
        .get("content")
        .and_then(|content| content.get("parts"))
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| part.get(TEXT_KEY))
                .map(render_text)
                .collect()
        })
        .unwrap_or_default()
}

fn render_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
