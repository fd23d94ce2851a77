//! Schema-tolerant text and dialogue harvesting over `serde_json::Value`.
//!
//! The data dump has no stable schema, so everything here is written as a
//! pattern match over the JSON value with ordered lists of candidate keys.
//! Nothing in this crate fails: unexpected shapes degrade to a fallback.
//!
//! - [`harvest_text`] turns one payload into plain text for knowledge bundles
//! - [`speech`] pulls `(speaker, text)` pairs out of story payloads
//! - [`script`] parses the plain-text story script format

pub mod script;
pub mod speech;

use serde_json::{Map, Value};

pub use script::parse_script;
pub use speech::{build_chapters, extract_speeches, payload_title, single_scene_chapter};

/// Upper bound on the characters [`harvest_text`] returns.
pub const MAX_HARVEST_CHARS: usize = 50_000;

/// Keys checked, in priority order, for a payload's main text.
pub const TEXT_KEYS: &[&str] = &["text", "content", "body", "value", "message"];

/// Produce a best-effort plain-text rendering of an arbitrary JSON payload.
///
/// 1. A string is returned as-is.
/// 2. An object with a non-blank string under one of [`TEXT_KEYS`] returns it.
/// 3. An object with a `data` array joins the rows' text fields with `\n`.
/// 4. Anything else joins every string leaf, in traversal order, with `\n`.
///
/// The result is capped at [`MAX_HARVEST_CHARS`] characters.
pub fn harvest_text(payload: &Value) -> String {
    let text = match payload {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Object(map) => direct_text(map)
            .map(str::to_string)
            .or_else(|| data_rows_text(map))
            .unwrap_or_else(|| collect_leaves(payload, MAX_HARVEST_CHARS)),
        _ => collect_leaves(payload, MAX_HARVEST_CHARS),
    };
    truncate_chars(text, MAX_HARVEST_CHARS)
}

/// First non-blank string stored under one of [`TEXT_KEYS`].
fn direct_text(map: &Map<String, Value>) -> Option<&str> {
    TEXT_KEYS.iter().find_map(|key| match map.get(*key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.as_str()),
        _ => None,
    })
}

/// `{"data": [{"text": ...}, {"content": ...}]}` style payloads.
fn data_rows_text(map: &Map<String, Value>) -> Option<String> {
    let rows = map.get("data")?.as_array()?;
    let parts: Vec<&str> = rows
        .iter()
        .filter_map(Value::as_object)
        .filter_map(direct_text)
        .collect();

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n"))
    }
}

/// Join every string leaf under `root`, stopping once `limit` characters are
/// gathered.
///
/// Iterative so arbitrarily deep values cannot exhaust the stack.
fn collect_leaves(root: &Value, limit: usize) -> String {
    let mut out = String::new();
    let mut gathered = 0usize;
    let mut first = true;
    let mut stack: Vec<&Value> = vec![root];

    while let Some(value) = stack.pop() {
        match value {
            Value::String(s) => {
                if !first {
                    out.push('\n');
                    gathered += 1;
                }
                first = false;
                out.push_str(s);
                gathered += s.chars().count();
                if gathered > limit {
                    break;
                }
            }
            Value::Array(items) => stack.extend(items.iter().rev()),
            Value::Object(map) => stack.extend(map.values().rev()),
            _ => {}
        }
    }

    out
}

/// Cut `text` down to at most `max` characters (not bytes).
pub fn truncate_chars(mut text: String, max: usize) -> String {
    if let Some((idx, _)) = text.char_indices().nth(max) {
        text.truncate(idx);
    }
    text
}
