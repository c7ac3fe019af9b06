//! Post-processing: turn raw model text into validated JSON.
//!
//! ## Why is post-processing necessary?
//!
//! Even when told to "respond with valid JSON", chat models regularly wrap
//! the object in a Markdown code fence (` ```json … ``` `) or pad it with
//! whitespace. Stripping those wrappers deterministically here keeps the
//! prompt focused on *what to extract*.
//!
//! Validation is intentionally shallow: only the schema's top-level
//! `required` list and the `string` / `number` / `array` type tags of
//! top-level `properties` are checked. Nested schemas, `enum`, `format`,
//! and `additionalProperties` are not enforced.

use crate::error::DocError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use std::fmt;

// ── Sanitising ───────────────────────────────────────────────────────────────

/// Opening fence with an optional language tag (` ```json `, ` ```JSON `, …).
///
/// A word counts as a tag only when whitespace or the end of input follows
/// it; in ` ```true``` ` the `true` is content.
static RE_LEADING_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^```(?:[A-Za-z0-9_+.-]+(?:\s|$))?").unwrap());

/// Strip surrounding whitespace and a single pair of Markdown code fences.
///
/// The leading fence and trailing fence are removed independently, so an
/// unterminated fence is still stripped. Inner content is untouched.
pub fn sanitize_response(raw: &str) -> String {
    let stripped = RE_LEADING_FENCE.replace(raw.trim(), "");
    let s = stripped.strip_suffix("```").unwrap_or(&*stripped);
    s.trim().to_string()
}

// ── Parsing ──────────────────────────────────────────────────────────────────

/// Sanitise, parse and validate a model response against `schema`.
///
/// Parse and validation failures both map to [`DocError::InvalidResponse`].
pub fn parse_response(raw: &str, schema: &Value) -> Result<Value, DocError> {
    let cleaned = sanitize_response(raw);
    let data: Value = serde_json::from_str(&cleaned).map_err(|e| DocError::InvalidResponse {
        detail: e.to_string(),
    })?;
    validate_against_schema(&data, schema).map_err(|v| DocError::InvalidResponse {
        detail: v.to_string(),
    })?;
    Ok(data)
}

// ── Validation ───────────────────────────────────────────────────────────────

/// First rule a response broke.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaViolation {
    MissingField(String),
    WrongType { field: String, expected: &'static str },
}

impl fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaViolation::MissingField(field) => {
                write!(f, "Required field '{field}' missing from response")
            }
            SchemaViolation::WrongType { field, expected } => {
                write!(f, "Field '{field}' should be {expected}")
            }
        }
    }
}

impl std::error::Error for SchemaViolation {}

/// Check `data` against the top level of `schema`.
///
/// Required keys are checked first, in schema order; then declared property
/// types, in schema order. Absent optional fields are not type-checked; a
/// present `null` fails any declared type. Booleans count as numbers, so
/// schemas that passed before keep passing.
pub fn validate_against_schema(data: &Value, schema: &Value) -> Result<(), SchemaViolation> {
    let Some(schema) = schema.as_object() else {
        return Ok(());
    };
    let empty = Map::new();
    let object = data.as_object().unwrap_or(&empty);

    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for field in required.iter().filter_map(Value::as_str) {
            if !object.contains_key(field) {
                return Err(SchemaViolation::MissingField(field.to_string()));
            }
        }
    }

    if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
        for (field, spec) in properties {
            let Some(value) = object.get(field) else {
                continue;
            };
            let expected = match spec.get("type").and_then(Value::as_str) {
                Some("string") if !value.is_string() => "string",
                Some("number") if !(value.is_number() || value.is_boolean()) => "number",
                Some("array") if !value.is_array() => "array",
                _ => continue,
            };
            return Err(SchemaViolation::WrongType {
                field: field.clone(),
                expected,
            });
        }
    }
    Ok(())
}
