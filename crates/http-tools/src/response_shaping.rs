//! Response shaping: path extraction, templating, truncation and error-message lookup.
//!
//! Path expressions are a deliberately small subset of JSONPath:
//! - `$` (or the empty string) selects the whole document
//! - `a.b.c` / `$.a.b.c` select nested object keys
//! - `items[2]` selects an array element
//! - `items[*]` selects the array itself (and requires it to be an array)
//!
//! Any missing key, non-array index target, or out-of-range index yields `null`.

use crate::config::{ResponseKind, ResponseTransform};
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

/// Upper bound applied to every tool result regardless of per-tool `truncate`.
pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 100_000;

static TEMPLATE_PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([^}]*?)\s*\}\}").expect("template placeholder regex"));

static TRUNCATION_NOTICE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\n\n\[Response truncated: original size \d+ bytes, limit (\d+) bytes\]\z")
        .expect("truncation notice regex")
});

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment<'a> {
    Field(&'a str),
    Index(&'a str, usize),
    Wildcard(&'a str),
}

fn parse_segment(raw: &str) -> Segment<'_> {
    if let Some(open) = raw.find('[')
        && raw.ends_with(']')
    {
        let field = &raw[..open];
        let inner = &raw[open + 1..raw.len() - 1];
        if inner == "*" {
            return Segment::Wildcard(field);
        }
        if let Ok(idx) = inner.parse::<usize>() {
            return Segment::Index(field, idx);
        }
    }
    Segment::Field(raw)
}

fn select_field<'v>(current: &'v Value, field: &str) -> Option<&'v Value> {
    if field.is_empty() {
        // `[0]` at the root, e.g. `$[0]`.
        return Some(current);
    }
    current.get(field)
}

/// Evaluate a path expression against `data`.
#[must_use]
pub fn apply_path(data: &Value, path: &str) -> Value {
    let path = path.trim();
    if path.is_empty() || path == "$" {
        return data.clone();
    }
    let rest = path
        .strip_prefix("$.")
        .or_else(|| path.strip_prefix('$'))
        .unwrap_or(path);

    let mut current = data;
    for raw in rest.split('.') {
        if current.is_null() {
            return Value::Null;
        }
        let next = match parse_segment(raw) {
            Segment::Field(f) => current.get(f),
            Segment::Wildcard(f) => select_field(current, f).filter(|v| v.is_array()),
            Segment::Index(f, idx) => select_field(current, f)
                .and_then(Value::as_array)
                .and_then(|arr| arr.get(idx)),
        };
        match next {
            Some(v) => current = v,
            None => return Value::Null,
        }
    }
    current.clone()
}

/// Render the text form of a value: strings verbatim, everything else as compact JSON.
#[must_use]
pub fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => serde_json::to_string(other).unwrap_or_else(|_| other.to_string()),
    }
}

/// Replace every `{{path}}` in `template` with the stringified lookup result.
#[must_use]
pub fn render_template(template: &str, data: &Value) -> String {
    TEMPLATE_PLACEHOLDER
        .replace_all(template, |caps: &regex::Captures<'_>| {
            stringify(&apply_path(data, &caps[1]))
        })
        .into_owned()
}

/// Shape a successful response body.
#[must_use]
pub fn transform(body: Value, transform: Option<&ResponseTransform>) -> Value {
    let Some(t) = transform else {
        return body;
    };
    match t.kind {
        ResponseKind::Raw => body,
        ResponseKind::Text => Value::String(stringify(&body)),
        ResponseKind::Json => {
            let extracted = match t.json_path.as_deref() {
                Some(path) => apply_path(&body, path),
                None => body,
            };
            match t.template.as_deref() {
                Some(template) => Value::String(render_template(template, &extracted)),
                None => extracted,
            }
        }
    }
}

/// Serialize a shaped result into the text handed back to the caller.
#[must_use]
pub fn to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => serde_json::to_string(other).unwrap_or_else(|_| other.to_string()),
    }
}

fn truncation_notice(original: usize, limit: usize) -> String {
    format!("\n\n[Response truncated: original size {original} bytes, limit {limit} bytes]")
}

/// Cut `text` to at most `limit` bytes (on a UTF-8 boundary) and append a notice.
///
/// Payloads already within the limit are returned unchanged, as is text that already ends in a
/// notice for the same limit.
#[must_use]
pub fn truncate(text: String, limit: usize) -> String {
    if text.len() <= limit || already_truncated(&text, limit) {
        return text;
    }
    let original = text.len();
    let mut cut = limit;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    let mut out = text;
    out.truncate(cut);
    out.push_str(&truncation_notice(original, limit));
    out
}

fn already_truncated(text: &str, limit: usize) -> bool {
    TRUNCATION_NOTICE.captures(text).is_some_and(|caps| {
        let (Some(notice), Some(noted)) = (caps.get(0), caps.get(1)) else {
            return false;
        };
        notice.start() <= limit && noted.as_str().parse::<usize>().is_ok_and(|n| n == limit)
    })
}

/// Effective byte limit for a tool: the smaller of its own `truncate` and the global maximum.
#[must_use]
pub fn effective_limit(transform: Option<&ResponseTransform>, global_max: usize) -> usize {
    transform
        .and_then(|t| t.truncate)
        .map_or(global_max, |t| t.min(global_max))
}

/// Find a human-readable error message in a failed response body.
///
/// Lookup order: configured `error_path`, `message`, `error` (or `error.message`), then
/// `fallback`, then `"Unknown error"`.
#[must_use]
pub fn extract_error_message(body: &Value, error_path: Option<&str>, fallback: &str) -> String {
    if let Some(path) = error_path
        && let Some(msg) = non_empty_text(&apply_path(body, path))
    {
        return msg;
    }

    if let Some(msg) = body.get("message").and_then(non_empty_text) {
        return msg;
    }

    if let Some(err) = body.get("error") {
        let nested = err.get("message").and_then(non_empty_text);
        if let Some(msg) = nested.or_else(|| non_empty_text(err)) {
            return msg;
        }
    }

    if !fallback.trim().is_empty() {
        return fallback.to_string();
    }
    "Unknown error".to_string()
}

fn non_empty_text(v: &Value) -> Option<String> {
    match v {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::Object(_) => None,
        other => Some(stringify(other)),
    }
}
