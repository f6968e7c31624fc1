//! Structured-output repair.
//!
//! Recovers a JSON object from generation output that may be wrapped in
//! markdown fences, surrounded by prose, or cut off before the closing
//! braces. Strategies run in order and the first success wins:
//!
//! 1. direct parse
//! 2. strip code fences, then parse
//! 3. take the outermost `{ ... }` span, then parse
//! 4. close unbalanced brackets, then parse
//!
//! Total failure yields an empty map, which callers treat as "produced nothing".

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::LazyLock;
use tracing::debug;

static FENCE_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^```[A-Za-z0-9_-]*[ \t]*\r?\n?").expect("valid regex"));
static FENCE_CLOSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\r?\n?```\s*$").expect("valid regex"));
static OUTER_OBJECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{.*\}").expect("valid regex"));

/// Which strategy produced the object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairStrategy {
    Direct,
    FenceStripped,
    EmbeddedObject,
    BraceCompletion,
}

impl std::fmt::Display for RepairStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RepairStrategy::Direct => "direct",
            RepairStrategy::FenceStripped => "fence_stripped",
            RepairStrategy::EmbeddedObject => "embedded_object",
            RepairStrategy::BraceCompletion => "brace_completion",
        };
        f.write_str(name)
    }
}

/// Recover a JSON object from raw output, or an empty map.
pub fn repair(raw: &str) -> Map<String, Value> {
    match try_repair(raw) {
        Some((object, strategy)) => {
            debug!(%strategy, keys = object.len(), "Recovered structured output");
            object
        }
        None => {
            debug!(chars = raw.len(), "Structured output unrecoverable");
            Map::new()
        }
    }
}

/// Recover a JSON object and report which strategy succeeded.
pub fn try_repair(raw: &str) -> Option<(Map<String, Value>, RepairStrategy)> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Some(object) = parse_object(trimmed) {
        return Some((object, RepairStrategy::Direct));
    }

    let unfenced = strip_fences(trimmed);
    if unfenced != trimmed
        && let Some(object) = parse_object(unfenced)
    {
        return Some((object, RepairStrategy::FenceStripped));
    }

    if let Some(span) = OUTER_OBJECT.find(unfenced)
        && let Some(object) = parse_object(span.as_str())
    {
        return Some((object, RepairStrategy::EmbeddedObject));
    }

    let start = unfenced.find('{')?;
    let completed = complete_brackets(&unfenced[start..]);
    parse_object(&completed).map(|object| (object, RepairStrategy::BraceCompletion))
}

/// Remove a leading ```` ```lang ```` line and a trailing ```` ``` ````.
pub fn strip_fences(text: &str) -> &str {
    let text = text.trim();
    let start = FENCE_OPEN.find(text).map_or(0, |m| m.end());
    let rest = &text[start..];
    let end = FENCE_CLOSE.find(rest).map_or(rest.len(), |m| m.start());
    rest[..end].trim()
}

fn parse_object(text: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// Append the closers an unterminated JSON fragment is missing.
///
/// Brackets inside string literals are ignored. An unterminated string is
/// closed, a dangling comma is dropped and a dangling `:` gets `null`.
fn complete_brackets(fragment: &str) -> String {
    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for ch in fragment.chars() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                if stack.last() == Some(&ch) {
                    stack.pop();
                }
            }
            _ => {}
        }
    }

    let mut out = fragment.trim_end().to_string();
    if in_string {
        if escaped {
            out.pop();
        }
        out.push('"');
    }
    loop {
        let trimmed = out.trim_end();
        if let Some(stripped) = trimmed.strip_suffix(',') {
            out = stripped.to_string();
        } else {
            out.truncate(trimmed.len());
            break;
        }
    }
    if out.ends_with(':') {
        out.push_str(" null");
    }
    while let Some(closer) = stack.pop() {
        out.push(closer);
    }
    out
}
