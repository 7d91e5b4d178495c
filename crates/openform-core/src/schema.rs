//! Schema Compiler
//!
//! Turns an admin-authored field list into a validator for submission
//! payloads. The field set is per-form and admin-defined, so the validator
//! is built at runtime from the stored schema rather than from any fixed
//! shape. Validation is strictly side-effect-free; the Submission Gate
//! converts failures into rejections before anything is persisted.

use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;

use crate::model::{Field, FieldType};
use crate::registry::ValueShape;
use crate::{FormError, Result};

/// Conservative RFC-lite email pattern.
const EMAIL_PATTERN: &str = r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$";

/// A compiled, reusable validator for one form's field list.
pub struct CompiledSchema {
    rules: Vec<FieldRule>,
    email_re: Option<Regex>,
}

struct FieldRule {
    id: String,
    name: String,
    field_type: FieldType,
    required: bool,
    shape: ValueShape,
}

impl CompiledSchema {
    /// Build per-field rules for every data-bearing field. Display-only
    /// fields never appear in the payload and are skipped entirely.
    pub fn compile(fields: &[Field]) -> Self {
        let rules = fields
            .iter()
            .filter(|f| f.field_type.is_data_bearing())
            .map(|f| FieldRule {
                id: f.id.clone(),
                name: f.display_name().to_string(),
                field_type: f.field_type,
                required: f.required,
                shape: f.field_type.shape(),
            })
            .collect::<Vec<_>>();

        let needs_email = rules.iter().any(|r| r.field_type == FieldType::Email);
        Self {
            rules,
            email_re: if needs_email {
                Regex::new(EMAIL_PATTERN).ok()
            } else {
                None
            },
        }
    }

    /// Validate a raw payload against the schema, producing a normalized
    /// payload or a structured failure naming the offending field.
    ///
    /// The compiler only looks *up* from schema to payload: unknown keys in
    /// the raw payload are silently dropped and never stored. Every
    /// data-bearing field ends up with a key in the output, with optional
    /// missing fields coerced to an explicit empty value.
    pub fn validate(
        &self,
        payload: &serde_json::Map<String, Value>,
    ) -> Result<HashMap<String, Value>> {
        let mut normalized = HashMap::with_capacity(self.rules.len());

        for rule in &self.rules {
            let raw = payload.get(&rule.id);
            let value = self.coerce(rule, raw)?;

            if is_missing(&value) {
                if rule.required {
                    return Err(FormError::validation(&rule.name, "is required"));
                }
                normalized.insert(rule.id.clone(), empty_value(rule.shape));
            } else {
                normalized.insert(rule.id.clone(), value);
            }
        }

        Ok(normalized)
    }

    fn coerce(&self, rule: &FieldRule, raw: Option<&Value>) -> Result<Value> {
        let raw = match raw {
            None | Some(Value::Null) => return Ok(Value::Null),
            Some(v) => v,
        };

        match rule.shape {
            ValueShape::Flag | ValueShape::Many => match raw {
                Value::Bool(b) => Ok(Value::Bool(*b)),
                Value::Array(items) => {
                    let mut out = Vec::with_capacity(items.len());
                    for item in items {
                        match item {
                            Value::String(s) => out.push(Value::String(s.clone())),
                            _ => {
                                return Err(FormError::validation(
                                    &rule.name,
                                    "selections must be strings",
                                ))
                            }
                        }
                    }
                    Ok(Value::Array(out))
                }
                _ => Err(FormError::validation(
                    &rule.name,
                    "must be a boolean or a list of selections",
                )),
            },
            ValueShape::Single => match rule.field_type {
                FieldType::Number => coerce_number(rule, raw),
                FieldType::Email => {
                    let trimmed = expect_string(rule, raw)?;
                    if !trimmed.is_empty() {
                        if let Some(re) = &self.email_re {
                            if !re.is_match(&trimmed) {
                                return Err(FormError::validation(
                                    &rule.name,
                                    "must be a valid email address",
                                ));
                            }
                        }
                    }
                    Ok(Value::String(trimmed))
                }
                _ => Ok(Value::String(expect_string(rule, raw)?)),
            },
        }
    }
}

fn expect_string(rule: &FieldRule, raw: &Value) -> Result<String> {
    match raw {
        Value::String(s) => Ok(s.trim().to_string()),
        _ => Err(FormError::validation(&rule.name, "must be a string")),
    }
}

fn coerce_number(rule: &FieldRule, raw: &Value) -> Result<Value> {
    match raw {
        Value::Number(n) => Ok(Value::Number(n.clone())),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Ok(Value::Null);
            }
            let parsed: f64 = trimmed
                .parse()
                .map_err(|_| FormError::validation(&rule.name, "must be a number"))?;
            if !parsed.is_finite() {
                return Err(FormError::validation(&rule.name, "must be a number"));
            }
            // Keep whole numbers integral so they round-trip cleanly.
            if parsed.fract() == 0.0 && parsed.abs() < i64::MAX as f64 {
                Ok(Value::Number((parsed as i64).into()))
            } else {
                serde_json::Number::from_f64(parsed)
                    .map(Value::Number)
                    .ok_or_else(|| FormError::validation(&rule.name, "must be a number"))
            }
        }
        _ => Err(FormError::validation(&rule.name, "must be a number")),
    }
}

fn is_missing(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

fn empty_value(shape: ValueShape) -> Value {
    match shape {
        ValueShape::Single => Value::String(String::new()),
        ValueShape::Many => Value::Array(Vec::new()),
        ValueShape::Flag => Value::Bool(false),
    }
}

// =============================================================================
// Admin-side schema checks
// =============================================================================

/// Sanity-check an admin-authored field list on save. The builder UI keeps
/// schemas well-formed, but saves can bypass it.
pub fn check_fields(fields: &[Field]) -> Result<()> {
    let mut seen = std::collections::HashSet::new();
    for field in fields {
        if field.id.trim().is_empty() {
            return Err(FormError::validation("fields", "field id must not be empty"));
        }
        if !seen.insert(field.id.as_str()) {
            return Err(FormError::validation(
                &field.id,
                "duplicate field id within form",
            ));
        }
        if field.field_type.supports_options() && field.options.is_empty() {
            return Err(FormError::validation(
                field.display_name(),
                "choice fields need at least one option",
            ));
        }
    }
    Ok(())
}
