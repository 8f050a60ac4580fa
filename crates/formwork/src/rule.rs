//! Validation rules attached to fields.
//!
//! A [`Rule`] is either a declarative [`RuleObject`] or a render function that
//! produces one from the live form at validation time. Custom checks plug in
//! through the async [`Validator`] trait.

use crate::store::FormSnapshot;
use async_trait::async_trait;
use formwork_state::Path;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Built-in value types a rule can require.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleType {
    String,
    Number,
    Boolean,
    Integer,
    Float,
    Array,
    Object,
    Enum,
    Email,
    Url,
    Hex,
}

impl RuleType {
    pub fn as_str(self) -> &'static str {
        match self {
            RuleType::String => "string",
            RuleType::Number => "number",
            RuleType::Boolean => "boolean",
            RuleType::Integer => "integer",
            RuleType::Float => "float",
            RuleType::Array => "array",
            RuleType::Object => "object",
            RuleType::Enum => "enum",
            RuleType::Email => "email",
            RuleType::Url => "url",
            RuleType::Hex => "hex",
        }
    }
}

impl fmt::Display for RuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a custom validator sees.
#[derive(Clone, Debug)]
pub struct RuleContext {
    pub name: Path,
    /// The field value after the rule's transform, `None` when absent.
    pub value: Option<Value>,
    /// The form as it was when the run started.
    pub form: FormSnapshot,
}

/// A custom asynchronous check.
///
/// `Err` carries the failure message; an empty message falls back to the
/// rule's message or the `default` template.
#[async_trait]
pub trait Validator: Send + Sync {
    async fn validate(&self, ctx: RuleContext) -> Result<(), String>;
}

struct FnValidator<F>(F);

#[async_trait]
impl<F, Fut> Validator for FnValidator<F>
where
    F: Fn(RuleContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), String>> + Send + 'static,
{
    async fn validate(&self, ctx: RuleContext) -> Result<(), String> {
        (self.0)(ctx).await
    }
}

/// Adapt an async closure into a [`Validator`].
///
/// ```
/// use formwork::{validator_fn, RuleContext};
///
/// let not_admin = validator_fn(|ctx: RuleContext| async move {
///     match ctx.value.as_ref().and_then(|v| v.as_str()) {
///         Some("admin") => Err("reserved name".to_string()),
///         _ => Ok(()),
///     }
/// });
/// # let _ = not_admin;
/// ```
pub fn validator_fn<F, Fut>(f: F) -> Arc<dyn Validator>
where
    F: Fn(RuleContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), String>> + Send + 'static,
{
    Arc::new(FnValidator(f))
}

/// Value transform applied before a rule checks the value.
pub type Transform = Arc<dyn Fn(&Value) -> Value + Send + Sync>;

/// A declarative constraint.
#[derive(Clone, Default)]
pub struct RuleObject {
    pub kind: Option<RuleType>,
    pub required: bool,
    /// Reject strings made only of whitespace.
    pub whitespace: bool,
    pub len: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub pattern: Option<Regex>,
    /// Allowed values (`enum`).
    pub one_of: Option<Vec<Value>>,
    /// Replaces whatever message a failed built-in check would produce.
    pub message: Option<String>,
    /// Failures land in `warnings` and never fail the run.
    pub warning_only: bool,
    /// Triggers this rule fires on; `None` fires on every trigger.
    pub validate_trigger: Option<Vec<String>>,
    pub transform: Option<Transform>,
    pub validator: Option<Arc<dyn Validator>>,
    /// Rule applied to each element of an array value.
    pub default_field: Option<Box<RuleObject>>,
}

impl RuleObject {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand for a `required` rule.
    pub fn required() -> Self {
        Self {
            required: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_type(mut self, kind: RuleType) -> Self {
        self.kind = Some(kind);
        self
    }

    #[must_use]
    pub fn with_whitespace(mut self) -> Self {
        self.whitespace = true;
        self
    }

    #[must_use]
    pub fn with_len(mut self, len: f64) -> Self {
        self.len = Some(len);
        self
    }

    #[must_use]
    pub fn with_min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    #[must_use]
    pub fn with_max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }

    #[must_use]
    pub fn with_pattern(mut self, pattern: Regex) -> Self {
        self.pattern = Some(pattern);
        self
    }

    #[must_use]
    pub fn with_enum(mut self, options: Vec<Value>) -> Self {
        self.one_of = Some(options);
        self
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    #[must_use]
    pub fn warning_only(mut self) -> Self {
        self.warning_only = true;
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
    pub fn with_transform(mut self, f: impl Fn(&Value) -> Value + Send + Sync + 'static) -> Self {
        self.transform = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn with_validator(mut self, validator: Arc<dyn Validator>) -> Self {
        self.validator = Some(validator);
        self
    }

    #[must_use]
    pub fn with_default_field(mut self, rule: RuleObject) -> Self {
        self.default_field = Some(Box::new(rule));
        self
    }

    /// Whether this rule runs for `trigger`.
    pub fn fires_on(&self, trigger: &str) -> bool {
        self.validate_trigger
            .as_ref()
            .map_or(true, |triggers| triggers.iter().any(|t| t == trigger))
    }
}

impl fmt::Debug for RuleObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleObject")
            .field("kind", &self.kind)
            .field("required", &self.required)
            .field("whitespace", &self.whitespace)
            .field("len", &self.len)
            .field("min", &self.min)
            .field("max", &self.max)
            .field("pattern", &self.pattern.as_ref().map(Regex::as_str))
            .field("one_of", &self.one_of)
            .field("message", &self.message)
            .field("warning_only", &self.warning_only)
            .field("validate_trigger", &self.validate_trigger)
            .field("transform", &self.transform.is_some())
            .field("validator", &self.validator.is_some())
            .field("default_field", &self.default_field)
            .finish()
    }
}

/// Rule produced from the current form.
pub type RuleRender = Arc<dyn Fn(&FormSnapshot) -> RuleObject + Send + Sync>;

/// A rule as declared on a field.
#[derive(Clone)]
pub enum Rule {
    Object(RuleObject),
    Render(RuleRender),
}

impl Rule {
    pub fn render(f: impl Fn(&FormSnapshot) -> RuleObject + Send + Sync + 'static) -> Self {
        Rule::Render(Arc::new(f))
    }

    /// The concrete rule for `form`. Render functions run on every call.
    pub fn resolve(&self, form: &FormSnapshot) -> RuleObject {
        match self {
            Rule::Object(rule) => rule.clone(),
            Rule::Render(render) => render(form),
        }
    }
}

impl From<RuleObject> for Rule {
    fn from(rule: RuleObject) -> Self {
        Rule::Object(rule)
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rule::Object(rule) => f.debug_tuple("Object").field(rule).finish(),
            Rule::Render(_) => f.write_str("Render(<fn>)"),
        }
    }
}
