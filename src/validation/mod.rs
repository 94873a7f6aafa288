//! Rule-string validation of a [`FormRequest`].

mod rules;

pub use rules::Rule;

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::request::FormRequest;
use crate::storage::DatabaseError;

/// Field name -> rule expression, e.g. `"rubric_id" => "required|numeric|exists:rubrics,id"`.
pub type Rules = BTreeMap<&'static str, &'static str>;

/// `field.rule` -> message overriding the default text for that failure.
pub type Messages = BTreeMap<&'static str, &'static str>;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("The given data was invalid")]
    Invalid(ValidationErrors),
    #[error("Invalid validation rule: {0}")]
    Rule(String),
    #[error("Presence lookup failed: {0}")]
    Presence(#[from] DatabaseError),
}

/// Answers `exists` and `unique` rules against stored records.
pub trait PresenceVerifier {
    fn count(&self, table: &str, column: &str, value: &Value) -> Result<u64, DatabaseError>;
}

/// A single failed rule.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldFailure {
    pub field: String,
    pub rule: String,
    pub message: String,
}

/// Every failed rule of one validation pass, in evaluation order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors {
    failures: Vec<FieldFailure>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, rule: &str, message: impl Into<String>) {
        self.failures.push(FieldFailure {
            field: field.to_string(),
            rule: rule.to_string(),
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    /// Whether the `field.rule` key failed.
    pub fn has(&self, key: &str) -> bool {
        self.failures
            .iter()
            .any(|f| key.split_once('.') == Some((f.field.as_str(), f.rule.as_str())))
    }

    pub fn first(&self, field: &str) -> Option<&str> {
        self.failures
            .iter()
            .find(|f| f.field == field)
            .map(|f| f.message.as_str())
    }

    /// Messages grouped by field.
    pub fn messages(&self) -> BTreeMap<String, Vec<String>> {
        let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for failure in &self.failures {
            grouped
                .entry(failure.field.clone())
                .or_default()
                .push(failure.message.clone());
        }
        grouped
    }
}

/// Pick the override for `field.rule`, falling back to `default`.
pub fn message_for(
    messages: &Messages,
    field: &str,
    rule: &str,
    default: impl FnOnce() -> String,
) -> String {
    messages
        .get(format!("{field}.{rule}").as_str())
        .map(|m| m.to_string())
        .unwrap_or_else(default)
}

pub struct Validator<'a> {
    verifier: &'a dyn PresenceVerifier,
}

impl<'a> Validator<'a> {
    pub fn new(verifier: &'a dyn PresenceVerifier) -> Self {
        Self { verifier }
    }

    /// Check `request` against `rules`. Fails with [`ValidationError::Invalid`] listing
    /// every failed rule, or [`ValidationError::Rule`] if an expression cannot be parsed.
    pub fn validate(
        &self,
        request: &FormRequest,
        rules: &Rules,
        messages: &Messages,
    ) -> Result<(), ValidationError> {
        let mut errors = ValidationErrors::new();

        for (field, expression) in rules {
            let parsed = Rule::parse_list(expression)?;
            self.check_field(request, field, &parsed, messages, &mut errors)?;
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::Invalid(errors))
        }
    }

    fn check_field(
        &self,
        request: &FormRequest,
        field: &str,
        rules: &[Rule],
        messages: &Messages,
        errors: &mut ValidationErrors,
    ) -> Result<(), ValidationError> {
        let submitted = request.has(field) || request.has_file(field);
        if rules.contains(&Rule::Sometimes) && !submitted {
            return Ok(());
        }

        if !request.filled(field) {
            if rules.contains(&Rule::Required) {
                let message = message_for(messages, field, "required", || {
                    format!("The {} field is required.", display_name(field))
                });
                errors.add(field, "required", message);
            }
            return Ok(());
        }

        let numeric = rules.iter().any(|r| matches!(r, Rule::Numeric | Rule::Integer));
        for rule in rules.iter().filter(|r| !r.is_modifier()) {
            if !self.passes(request, field, rule, numeric)? {
                let message = message_for(messages, field, rule.name(), || {
                    default_message(request, field, rule)
                });
                errors.add(field, rule.name(), message);
            }
        }

        Ok(())
    }

    fn passes(
        &self,
        request: &FormRequest,
        field: &str,
        rule: &Rule,
        numeric: bool,
    ) -> Result<bool, ValidationError> {
        let input = request.input(field);
        let file = request.file(field);

        let passed = match rule {
            Rule::Required | Rule::Sometimes | Rule::Nullable => true,
            Rule::Numeric => input.and_then(as_number).is_some(),
            Rule::Integer => match input {
                Some(Value::Number(n)) => n.is_i64() || n.is_u64(),
                Some(Value::String(s)) => s.trim().parse::<i64>().is_ok(),
                _ => false,
            },
            Rule::String => matches!(input, Some(Value::String(_))),
            Rule::Image => file.is_some_and(|f| {
                if f.is_valid() {
                    f.has_image_content()
                } else {
                    // bytes were not kept; the upload itself is rejected after validation
                    mime_guess::from_path(f.original_name())
                        .first_raw()
                        .is_some_and(|mime| mime.starts_with("image/"))
                }
            }),
            Rule::Mimes(allowed) => file.is_some_and(|f| {
                let ext = f
                    .guessed_extension()
                    .map(normalize_extension)
                    .unwrap_or_else(|| normalize_extension(f.original_extension()));
                allowed.iter().any(|a| normalize_extension(a) == ext)
            }),
            Rule::Max(limit) => size_of(request, field, numeric).is_some_and(|s| s <= *limit),
            Rule::Min(limit) => size_of(request, field, numeric).is_some_and(|s| s >= *limit),
            Rule::Exists { table, column } => match input {
                Some(value) => {
                    let column = column.as_deref().unwrap_or(field);
                    self.verifier.count(table, column, value)? > 0
                }
                None => false,
            },
            Rule::Unique { table, column } => match input {
                Some(value) => {
                    let column = column.as_deref().unwrap_or(field);
                    self.verifier.count(table, column, value)? == 0
                }
                None => true,
            },
        };

        Ok(passed)
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn normalize_extension(ext: &str) -> String {
    match ext.to_lowercase().as_str() {
        "jpeg" => "jpg".to_string(),
        other => other.to_string(),
    }
}

/// Size used by `max`/`min`: kilobytes for files, the value for numeric input,
/// character count for other strings.
fn size_of(request: &FormRequest, field: &str, numeric: bool) -> Option<f64> {
    if let Some(file) = request.file(field) {
        return Some(file.size() as f64 / 1024.0);
    }

    match request.input(field)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) if numeric => s.trim().parse().ok(),
        Value::String(s) => Some(s.chars().count() as f64),
        Value::Array(items) => Some(items.len() as f64),
        _ => None,
    }
}

fn display_name(field: &str) -> String {
    field.replace('_', " ")
}

fn default_message(request: &FormRequest, field: &str, rule: &Rule) -> String {
    let name = display_name(field);
    let unit = if request.has_file(field) {
        " kilobytes"
    } else if matches!(request.input(field), Some(Value::String(_))) {
        " characters"
    } else {
        ""
    };

    match rule {
        Rule::Numeric => format!("The {name} must be a number."),
        Rule::Integer => format!("The {name} must be an integer."),
        Rule::String => format!("The {name} must be a string."),
        Rule::Image => format!("The {name} must be an image."),
        Rule::Mimes(allowed) => format!("The {name} must be a file of type: {}.", allowed.join(", ")),
        Rule::Max(limit) => format!("The {name} may not be greater than {limit}{unit}."),
        Rule::Min(limit) => format!("The {name} must be at least {limit}{unit}."),
        Rule::Exists { .. } => format!("The selected {name} is invalid."),
        Rule::Unique { .. } => format!("The {name} has already been taken."),
        Rule::Required | Rule::Sometimes | Rule::Nullable => {
            format!("The {name} field is required.")
        }
    }
}
