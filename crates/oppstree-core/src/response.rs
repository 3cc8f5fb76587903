//! Response validation for model output.
//!
//! Models often wrap JSON in markdown fences or leave a trailing comma
//! after the last element. Both are repaired before parsing. Truncated
//! output is never closed up: a response that is not complete JSON is a
//! [`SynthesisError::MalformedResponse`] naming the stage.
//!
//! The top-level container shape is checked strictly; field access below
//! it is tolerant via the `*_field` readers.

use serde_json::Value;

use crate::error::{Result, Stage, SynthesisError};

/// Expected top-level JSON shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Array,
    Object,
}

impl Shape {
    fn describe(self) -> &'static str {
        match self {
            Self::Array => "a JSON array",
            Self::Object => "a JSON object",
        }
    }

    fn matches(self, value: &Value) -> bool {
        match self {
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
        }
    }
}

/// Parse one JSON value of `shape` out of `raw`.
pub fn parse_response(stage: Stage, raw: &str, shape: Shape) -> Result<Value> {
    let stripped = strip_markdown_fences(raw);
    if stripped.is_empty() {
        return Err(SynthesisError::malformed(stage, "empty response"));
    }

    let value: Value = match serde_json::from_str(&stripped) {
        Ok(v) => v,
        Err(first) => serde_json::from_str(&fix_trailing_commas(&stripped)).map_err(|_| {
            SynthesisError::malformed(stage, format!("invalid JSON: {first}"))
        })?,
    };

    if !shape.matches(&value) {
        return Err(SynthesisError::malformed(
            stage,
            format!("expected {}, got {}", shape.describe(), kind(&value)),
        ));
    }
    Ok(value)
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Remove a surrounding ```` ```json ```` / ```` ``` ```` fence and outer
/// whitespace.
pub fn strip_markdown_fences(input: &str) -> String {
    let trimmed = input.trim();

    let after_open = if let Some(rest) = trimmed.strip_prefix("```json") {
        rest
    } else if let Some(rest) = trimmed.strip_prefix("```JSON") {
        rest
    } else if let Some(rest) = trimmed.strip_prefix("```") {
        rest
    } else {
        return trimmed.to_string();
    };

    let before_close = after_open
        .trim_end()
        .strip_suffix("```")
        .unwrap_or(after_open);

    before_close.trim().to_string()
}

/// Remove commas directly before `]` or `}`, outside string literals.
pub fn fix_trailing_commas(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let len = chars.len();
    let mut result = String::with_capacity(len);
    let mut in_string = false;
    let mut escape_next = false;

    for (i, &c) in chars.iter().enumerate() {
        if escape_next {
            escape_next = false;
        } else if in_string && c == '\\' {
            escape_next = true;
        } else if c == '"' {
            in_string = !in_string;
        } else if !in_string && c == ',' {
            let next = chars[i + 1..].iter().find(|ch| !ch.is_whitespace());
            if matches!(next, Some(']') | Some('}')) {
                continue;
            }
        }
        result.push(c);
    }

    result
}

// ── Tolerant field readers ──────────────────────────────────────────────

/// String field, trimmed; "" when absent or not a string.
pub fn str_field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}

/// Non-negative number field; accepts numeric strings. 0.0 otherwise.
pub fn f64_field(value: &Value, key: &str) -> f64 {
    value
        .get(key)
        .and_then(as_number)
        .filter(|n| n.is_finite() && *n >= 0.0)
        .unwrap_or(0.0)
}

/// Non-negative count field, rounded; 0 otherwise.
pub fn u32_field(value: &Value, key: &str) -> u32 {
    to_count(value.get(key).and_then(as_number))
}

/// Bool field; accepts "true"/"false" strings. `false` otherwise.
pub fn bool_field(value: &Value, key: &str) -> bool {
    match value.get(key) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.trim().eq_ignore_ascii_case("true"),
        _ => false,
    }
}

/// List of non-empty strings. Non-string items are skipped.
pub fn str_list(value: &Value, key: &str) -> Vec<String> {
    value
        .get(key)
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str())
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

/// Array items, or an empty slice when absent or not an array.
pub fn array_field<'a>(value: &'a Value, key: &str) -> &'a [Value] {
    value
        .get(key)
        .and_then(|v| v.as_array())
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Map of key → count; non-numeric entries skipped.
pub fn count_map(value: &Value, key: &str) -> Vec<(String, u32)> {
    value
        .get(key)
        .and_then(|v| v.as_object())
        .map(|obj| {
            obj.iter()
                .filter_map(|(k, v)| as_number(v).map(|n| (k.clone(), to_count(Some(n)))))
                .collect()
        })
        .unwrap_or_default()
}

fn as_number(v: &Value) -> Option<f64> {
    v.as_f64()
        .or_else(|| v.as_str().and_then(|s| s.trim().parse::<f64>().ok()))
}

fn to_count(n: Option<f64>) -> u32 {
    match n {
        Some(n) if n.is_finite() && n > 0.0 => n.round().min(u32::MAX as f64) as u32,
        _ => 0,
    }
}
