//! Form configuration.

use crate::error::FormResult;
use crate::evaluator::{BuiltinRules, RuleEvaluator};
use crate::messages::ValidateMessages;
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Trigger fired by a value edit.
pub const TRIGGER_ON_CHANGE: &str = "onChange";
/// Trigger fired when a dependency of the field changed.
pub const TRIGGER_DEPENDENCIES_UPDATE: &str = "dependenciesUpdate";

/// Runtime configuration for a [`Form`](crate::Form).
#[derive(Clone)]
pub struct FormConfig {
    /// Triggers that validate fields which do not declare their own.
    pub validate_trigger: Vec<String>,
    /// Whether values survive the unmount of their field.
    pub preserve: bool,
    /// Form-level message templates.
    pub validate_messages: ValidateMessages,
    pub initial_values: Value,
    /// Rule library used for every field.
    pub evaluator: Arc<dyn RuleEvaluator>,
}

impl Default for FormConfig {
    fn default() -> Self {
        Self {
            validate_trigger: vec![
                TRIGGER_ON_CHANGE.to_owned(),
                TRIGGER_DEPENDENCIES_UPDATE.to_owned(),
            ],
            preserve: true,
            validate_messages: ValidateMessages::new(),
            initial_values: Value::Object(Default::default()),
            evaluator: Arc::new(BuiltinRules),
        }
    }
}

impl fmt::Debug for FormConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormConfig")
            .field("validate_trigger", &self.validate_trigger)
            .field("preserve", &self.preserve)
            .field("validate_messages", &self.validate_messages.len())
            .field("initial_values", &self.initial_values)
            .field("evaluator", &self.evaluator.name())
            .finish()
    }
}

impl FormConfig {
    /// Start from defaults and apply whatever `settings` specify.
    pub fn from_settings(settings: FormSettings) -> Self {
        let mut config = Self::default();
        if let Some(triggers) = settings.validate_trigger {
            config.validate_trigger = triggers;
        }
        if let Some(preserve) = settings.preserve {
            config.preserve = preserve;
        }
        if let Some(messages) = settings.validate_messages {
            config.validate_messages = messages;
        }
        if let Some(initial_values) = settings.initial_values {
            config.initial_values = initial_values;
        }
        config
    }

    #[must_use]
    pub fn with_validate_trigger<I, S>(mut self, triggers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.validate_trigger = triggers.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_preserve(mut self, preserve: bool) -> Self {
        self.preserve = preserve;
        self
    }

    #[must_use]
    pub fn with_validate_messages(mut self, messages: ValidateMessages) -> Self {
        self.validate_messages = messages;
        self
    }

    #[must_use]
    pub fn with_initial_values(mut self, values: Value) -> Self {
        self.initial_values = values;
        self
    }

    #[must_use]
    pub fn with_evaluator(mut self, evaluator: Arc<dyn RuleEvaluator>) -> Self {
        self.evaluator = evaluator;
        self
    }
}

/// The data part of [`FormConfig`], loadable from JSON.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FormSettings {
    pub validate_trigger: Option<Vec<String>>,
    pub preserve: Option<bool>,
    pub validate_messages: Option<ValidateMessages>,
    pub initial_values: Option<Value>,
}

impl FormSettings {
    pub fn from_json(text: &str) -> FormResult<Self> {
        Ok(serde_json::from_str(text)?)
    }
}
