//! Value resolution for named form controls.
//!
//! A [`ValueSource`] answers "what should the control called `name` be set
//! to?". Absence means "no preference": the completer then leaves the
//! control alone or picks a random option, depending on the control kind.

use crate::error::{AutofillError, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

/// The kind of control a value is being resolved for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    File,
    Radio,
    Checkbox,
    Select,
}

/// A resolved value for a form control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    /// Literal value: text content, a radio/select option value, or a local
    /// file path for file inputs.
    Text(String),

    /// "Check this box regardless of its value", distinct from absence,
    /// which means "leave unchecked".
    Check,

    /// Accepted values for a checkbox group: boxes whose own value is in the
    /// set get checked, all others get unchecked.
    AnyOf(Vec<String>),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// Supplies preferred values for named controls. Pure lookup; implementations
/// must not carry interaction side effects.
pub trait ValueSource: Send + Sync {
    fn value_for(&self, name: &str, kind: FieldKind) -> Option<FieldValue>;
}

/// Map-backed [`ValueSource`].
///
/// The JSON shape accepted by [`StaticValues::from_json`] maps field names to:
/// - a string: used verbatim (text content, option value, file path)
/// - `true`: check the box regardless of its value
/// - an array of strings: accepted checkbox values
/// - `null` or `false`: no preference (same as omitting the key)
#[derive(Debug, Default, Clone)]
pub struct StaticValues {
    entries: HashMap<String, FieldValue>,
}

impl StaticValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: FieldValue) -> &mut Self {
        self.entries.insert(name.into(), value);
        self
    }

    pub fn from_json(doc: &Value) -> Result<Self> {
        let map = doc
            .as_object()
            .ok_or_else(|| AutofillError::InvalidValues("expected a JSON object".to_string()))?;

        let mut entries = HashMap::new();
        for (name, value) in map {
            match value {
                Value::String(s) => {
                    entries.insert(name.clone(), FieldValue::Text(s.clone()));
                }
                Value::Bool(true) => {
                    entries.insert(name.clone(), FieldValue::Check);
                }
                Value::Bool(false) | Value::Null => {
                    // explicit "no preference"
                }
                Value::Array(items) => {
                    let mut accepted = Vec::with_capacity(items.len());
                    for item in items {
                        let s = item.as_str().ok_or_else(|| {
                            AutofillError::InvalidValues(format!(
                                "entry '{}': array items must be strings",
                                name
                            ))
                        })?;
                        accepted.push(s.to_string());
                    }
                    entries.insert(name.clone(), FieldValue::AnyOf(accepted));
                }
                other => {
                    return Err(AutofillError::InvalidValues(format!(
                        "entry '{}': unsupported value {}",
                        name, other
                    )));
                }
            }
        }

        Ok(Self { entries })
    }

    pub async fn from_file(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| AutofillError::InvalidValues(format!("{}: {}", path.display(), e)))?;
        let doc: Value = serde_json::from_str(&content)
            .map_err(|e| AutofillError::InvalidValues(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&doc)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ValueSource for StaticValues {
    fn value_for(&self, name: &str, _kind: FieldKind) -> Option<FieldValue> {
        self.entries.get(name).cloned()
    }
}
