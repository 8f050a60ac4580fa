//! Validation message templates.
//!
//! Templates are keyed by rule kind in dotted form (`"required"`,
//! `"types.email"`, `"string.min"`) and interpolate `${var}` placeholders.
//! Lookups go field table, then form table, then the built-in defaults.

use crate::error::{FormError, FormResult};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Interpolation variables for a message.
pub type MessageVars = BTreeMap<String, String>;

/// A message template: literal text or a thunk producing it.
#[derive(Clone)]
pub enum MessageTemplate {
    Text(String),
    Thunk(Arc<dyn Fn() -> String + Send + Sync>),
}

impl MessageTemplate {
    pub fn thunk(f: impl Fn() -> String + Send + Sync + 'static) -> Self {
        MessageTemplate::Thunk(Arc::new(f))
    }

    /// Render the template with `vars` substituted.
    pub fn render(&self, vars: &MessageVars) -> String {
        let raw: Cow<'_, str> = match self {
            MessageTemplate::Text(text) => Cow::Borrowed(text),
            MessageTemplate::Thunk(f) => Cow::Owned(f()),
        };
        interpolate(&raw, vars)
    }
}

impl fmt::Debug for MessageTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageTemplate::Text(text) => f.debug_tuple("Text").field(text).finish(),
            MessageTemplate::Thunk(_) => f.write_str("Thunk(<fn>)"),
        }
    }
}

impl From<&str> for MessageTemplate {
    fn from(text: &str) -> Self {
        MessageTemplate::Text(text.to_owned())
    }
}

impl From<String> for MessageTemplate {
    fn from(text: String) -> Self {
        MessageTemplate::Text(text)
    }
}

/// Replace every `${key}` in `template` with `vars[key]`.
///
/// Unknown placeholders and an unterminated `${` are kept verbatim.
///
/// ```
/// use formwork::messages::{interpolate, MessageVars};
///
/// let mut vars = MessageVars::new();
/// vars.insert("name".into(), "age".into());
/// assert_eq!(interpolate("${name} is required (${other})", &vars), "age is required (${other})");
/// ```
pub fn interpolate(template: &str, vars: &MessageVars) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            return out;
        };
        match vars.get(&after[..end]) {
            Some(value) => out.push_str(value),
            None => out.push_str(&rest[start..start + 2 + end + 1]),
        }
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    out
}

/// A table of message templates keyed by dotted rule kind.
#[derive(Clone, Debug, Default)]
pub struct ValidateMessages {
    entries: BTreeMap<String, MessageTemplate>,
}

impl ValidateMessages {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in templates every lookup falls back to.
    pub fn defaults() -> &'static ValidateMessages {
        static DEFAULTS: OnceLock<ValidateMessages> = OnceLock::new();
        DEFAULTS.get_or_init(build_defaults)
    }

    #[must_use]
    pub fn with(mut self, key: impl Into<String>, template: impl Into<MessageTemplate>) -> Self {
        self.insert(key, template);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, template: impl Into<MessageTemplate>) {
        self.entries.insert(key.into(), template.into());
    }

    pub fn get(&self, key: &str) -> Option<&MessageTemplate> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Overlay `other` on top of this table.
    pub fn extend(&mut self, other: &ValidateMessages) {
        for (key, template) in &other.entries {
            self.entries.insert(key.clone(), template.clone());
        }
    }

    /// Build a table from nested JSON, e.g. `{"types": {"email": "..."}}`.
    pub fn from_value(value: &Value) -> FormResult<Self> {
        let Value::Object(map) = value else {
            return Err(FormError::invalid_messages(
                "validate messages must be a JSON object",
            ));
        };
        let mut table = ValidateMessages::new();
        flatten_into(&mut table, "", map)?;
        Ok(table)
    }
}

fn flatten_into(
    table: &mut ValidateMessages,
    prefix: &str,
    map: &serde_json::Map<String, Value>,
) -> FormResult<()> {
    for (key, value) in map {
        let full = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            Value::String(text) => table.insert(full, text.as_str()),
            Value::Object(nested) => flatten_into(table, &full, nested)?,
            other => {
                return Err(FormError::invalid_messages(format!(
                    "message '{full}' must be a string, got {}",
                    formwork_state::value_type_name(other)
                )))
            }
        }
    }
    Ok(())
}

impl<'de> Deserialize<'de> for ValidateMessages {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        ValidateMessages::from_value(&value).map_err(serde::de::Error::custom)
    }
}

fn build_defaults() -> ValidateMessages {
    let type_template = "'${name}' is not a valid ${type}";
    let mut table = ValidateMessages::new()
        .with("default", "Validation error on field ${name}")
        .with("required", "${name} is required")
        .with("enum", "${name} must be one of [${enum}]")
        .with("whitespace", "${name} cannot be empty")
        .with("date.format", "'${name}' is invalid for format date")
        .with("date.parse", "'${name}' could not be parsed as date")
        .with("date.invalid", "'${name}' is invalid date")
        .with("string.len", "'${name}' must be exactly ${len} characters")
        .with("string.min", "'${name}' must be at least ${min} characters")
        .with("string.max", "'${name}' cannot be longer than ${max} characters")
        .with("string.range", "'${name}' must be between ${min} and ${max} characters")
        .with("number.len", "'${name}' must equal ${len}")
        .with("number.min", "'${name}' cannot be less than ${min}")
        .with("number.max", "'${name}' cannot be greater than ${max}")
        .with("number.range", "'${name}' must be between ${min} and ${max}")
        .with("array.len", "'${name}' must be exactly ${len} in length")
        .with("array.min", "'${name}' cannot be less than ${min} in length")
        .with("array.max", "'${name}' cannot be greater than ${max} in length")
        .with("array.range", "'${name}' must be between ${min} and ${max} in length")
        .with("pattern.mismatch", "'${name}' does not match pattern ${pattern}");
    for kind in [
        "string", "method", "array", "object", "number", "date", "boolean", "integer", "float",
        "regexp", "email", "url", "hex",
    ] {
        table.insert(format!("types.{kind}"), type_template);
    }
    table
}

/// The layered view a single field validates with.
#[derive(Clone, Debug)]
pub struct MessageLayers {
    pub field: Option<Arc<ValidateMessages>>,
    pub form: Arc<ValidateMessages>,
}

impl MessageLayers {
    pub fn new(field: Option<Arc<ValidateMessages>>, form: Arc<ValidateMessages>) -> Self {
        Self { field, form }
    }

    fn lookup(&self, key: &str) -> Option<&MessageTemplate> {
        self.field
            .as_deref()
            .and_then(|table| table.get(key))
            .or_else(|| self.form.get(key))
            .or_else(|| ValidateMessages::defaults().get(key))
    }

    /// Render the message for `key`, falling back to the `default` template.
    pub fn render(&self, key: &str, vars: &MessageVars) -> String {
        match self.lookup(key).or_else(|| self.lookup("default")) {
            Some(template) => template.render(vars),
            None => format!(
                "Validation error on field {}",
                vars.get("name").map(String::as_str).unwrap_or_default()
            ),
        }
    }
}

impl Default for MessageLayers {
    fn default() -> Self {
        Self::new(None, Arc::default())
    }
}
