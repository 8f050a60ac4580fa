//! Field declarations and the per-field state views the store hands out.

use crate::messages::{MessageVars, ValidateMessages};
use crate::notify::StoreChange;
use crate::rule::Rule;
use formwork_state::Path;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Identity of one mounted field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldId(pub(crate) u64);

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "field#{}", self.0)
    }
}

/// What a field declares when it mounts.
///
/// A field without a name is a watcher: it takes part in dependency
/// notification but owns no value.
#[derive(Clone, Debug, Default)]
pub struct FieldProps {
    pub name: Option<Path>,
    pub rules: Vec<Rule>,
    pub dependencies: Vec<Path>,
    pub initial_value: Option<Value>,
    /// Triggers that validate this field; `None` uses the form's list.
    pub validate_trigger: Option<Vec<String>>,
    /// Keep the value after unmount; `None` uses the form's setting.
    pub preserve: Option<bool>,
    /// The field renders a dynamic list container.
    pub is_list: bool,
    /// The field is an item inside a list container.
    pub is_list_field: bool,
    /// Stop at the first failing rule instead of running all of them.
    pub validate_first: bool,
    pub validate_messages: Option<ValidateMessages>,
    pub message_variables: MessageVars,
}

impl FieldProps {
    pub fn new(name: impl Into<Path>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// A nameless field that only watches its dependencies.
    pub fn watcher<I, P>(dependencies: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Path>,
    {
        Self::default().with_dependencies(dependencies)
    }

    #[must_use]
    pub fn with_rule(mut self, rule: impl Into<Rule>) -> Self {
        self.rules.push(rule.into());
        self
    }

    #[must_use]
    pub fn with_rules(mut self, rules: Vec<Rule>) -> Self {
        self.rules = rules;
        self
    }

    #[must_use]
    pub fn with_dependencies<I, P>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Path>,
    {
        self.dependencies = dependencies.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_initial_value(mut self, value: Value) -> Self {
        self.initial_value = Some(value);
        self
    }

    #[must_use]
    pub fn with_validate_trigger<I, S>(mut self, triggers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.validate_trigger = Some(triggers.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn with_preserve(mut self, preserve: bool) -> Self {
        self.preserve = Some(preserve);
        self
    }

    #[must_use]
    pub fn list(mut self) -> Self {
        self.is_list = true;
        self
    }

    #[must_use]
    pub fn list_field(mut self) -> Self {
        self.is_list_field = true;
        self
    }

    #[must_use]
    pub fn validate_first(mut self) -> Self {
        self.validate_first = true;
        self
    }

    #[must_use]
    pub fn with_validate_messages(mut self, messages: ValidateMessages) -> Self {
        self.validate_messages = Some(messages);
        self
    }

    #[must_use]
    pub fn with_message_variable(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.message_variables.insert(key.into(), value.into());
        self
    }
}

/// Per-path status.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Meta {
    pub name: Path,
    pub touched: bool,
    pub validating: bool,
    /// Written through an input at least once, or validated.
    pub dirty: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// A partial field update for [`Form::set_fields`](crate::Form::set_fields).
///
/// Only the attributes that are `Some` are applied.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldData {
    pub name: Path,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub touched: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validating: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warnings: Option<Vec<String>>,
}

impl FieldData {
    pub fn new(name: impl Into<Path>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }

    #[must_use]
    pub fn with_touched(mut self, touched: bool) -> Self {
        self.touched = Some(touched);
        self
    }

    #[must_use]
    pub fn with_validating(mut self, validating: bool) -> Self {
        self.validating = Some(validating);
        self
    }

    #[must_use]
    pub fn with_errors<I, S>(mut self, errors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.errors = Some(errors.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn with_warnings<I, S>(mut self, warnings: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.warnings = Some(warnings.into_iter().map(Into::into).collect());
        self
    }
}

/// Complete state of one field, as passed to `on_fields_change`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FieldState {
    pub name: Path,
    pub value: Option<Value>,
    pub touched: bool,
    pub validating: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// Errors and warnings of one field.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct FieldError {
    pub name: Path,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// Receiver of store notifications for a mounted field.
pub trait FieldSubscriber: Send + Sync {
    fn on_store_change(&self, change: &StoreChange);
}

impl<F> FieldSubscriber for F
where
    F: Fn(&StoreChange) + Send + Sync,
{
    fn on_store_change(&self, change: &StoreChange) {
        self(change)
    }
}

/// Subscriber that ignores every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpSubscriber;

impl NoOpSubscriber {
    pub fn arc() -> Arc<dyn FieldSubscriber> {
        Arc::new(Self)
    }
}

impl FieldSubscriber for NoOpSubscriber {
    fn on_store_change(&self, _change: &StoreChange) {}
}
