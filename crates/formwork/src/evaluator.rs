//! Rule evaluation.
//!
//! [`RuleEvaluator`] is the seam between the engine and a rule library: the
//! engine resolves rules, hands each one over with the field value, and
//! aggregates what comes back. [`BuiltinRules`] is the library shipped with
//! the crate.

use crate::messages::{MessageLayers, MessageVars};
use crate::rule::{RuleContext, RuleObject, RuleType};
use crate::store::FormSnapshot;
use async_trait::async_trait;
use formwork_state::Path;
use serde_json::Value;

/// One rule to check against one value.
#[derive(Clone, Debug)]
pub struct RuleRequest {
    pub name: Path,
    pub value: Option<Value>,
    pub rule: RuleObject,
    pub messages: MessageLayers,
    /// Extra interpolation variables declared by the field.
    pub variables: MessageVars,
    pub form: FormSnapshot,
}

/// A rule library.
#[async_trait]
pub trait RuleEvaluator: Send + Sync {
    /// Check one rule. `Err` carries the failure messages.
    async fn evaluate(&self, request: RuleRequest) -> Result<(), Vec<String>>;

    /// Stable label for logging / debug output.
    fn name(&self) -> &'static str;
}

/// The built-in rule library.
///
/// Checks run in a fixed order and the first failing check decides the
/// message: required, whitespace, type, length or range, enum, pattern,
/// then the custom validator. Array values with a `default_field` rule
/// check every element against it.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinRules;

#[async_trait]
impl RuleEvaluator for BuiltinRules {
    async fn evaluate(&self, request: RuleRequest) -> Result<(), Vec<String>> {
        let RuleRequest {
            name,
            value,
            rule,
            messages,
            variables,
            form,
        } = request;

        let value = match (&rule.transform, value) {
            (Some(transform), Some(value)) => Some(transform(&value)),
            (_, value) => value,
        };
        let vars = message_vars(&name, &rule, &variables);

        if let Some(key) = builtin_failure(&rule, value.as_ref()) {
            let message = rule
                .message
                .clone()
                .unwrap_or_else(|| messages.render(&key, &vars));
            return Err(vec![message]);
        }

        if let (Some(element_rule), Some(Value::Array(items))) = (&rule.default_field, &value) {
            let mut failures = Vec::new();
            for (index, item) in items.iter().enumerate() {
                let element = RuleRequest {
                    name: name.clone().index(index),
                    value: Some(item.clone()),
                    rule: (**element_rule).clone(),
                    messages: messages.clone(),
                    variables: variables.clone(),
                    form: form.clone(),
                };
                if let Err(errors) = self.evaluate(element).await {
                    failures.extend(errors);
                }
            }
            if !failures.is_empty() {
                return Err(failures);
            }
        }

        if let Some(validator) = &rule.validator {
            let ctx = RuleContext {
                name,
                value,
                form,
            };
            if let Err(message) = validator.validate(ctx).await {
                let message = if message.is_empty() {
                    rule.message
                        .clone()
                        .unwrap_or_else(|| messages.render("default", &vars))
                } else {
                    message
                };
                return Err(vec![message]);
            }
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "builtin"
    }
}

fn message_vars(name: &Path, rule: &RuleObject, variables: &MessageVars) -> MessageVars {
    let mut vars = MessageVars::new();
    vars.insert("name".into(), name.joined("."));
    if let Some(kind) = rule.kind {
        vars.insert("type".into(), kind.as_str().into());
    }
    for (key, bound) in [("len", rule.len), ("min", rule.min), ("max", rule.max)] {
        if let Some(bound) = bound {
            vars.insert(key.into(), bound.to_string());
        }
    }
    if let Some(options) = &rule.one_of {
        let rendered: Vec<String> = options.iter().map(display_value).collect();
        vars.insert("enum".into(), rendered.join(", "));
    }
    if let Some(pattern) = &rule.pattern {
        vars.insert("pattern".into(), pattern.as_str().into());
    }
    vars.extend(variables.iter().map(|(k, v)| (k.clone(), v.clone())));
    vars
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn is_empty_value(value: Option<&Value>, kind: Option<RuleType>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Array(items)) => kind == Some(RuleType::Array) && items.is_empty(),
        Some(_) => false,
    }
}

/// Message key of the first built-in check `value` fails.
fn builtin_failure(rule: &RuleObject, value: Option<&Value>) -> Option<String> {
    if rule.required && is_empty_value(value, rule.kind) {
        return Some("required".into());
    }
    if rule.whitespace {
        if let Some(Value::String(s)) = value {
            if s.trim().is_empty() {
                return Some("whitespace".into());
            }
        }
    }
    if is_empty_value(value, rule.kind) {
        return None;
    }
    let value = value?;

    if let Some(kind) = rule.kind {
        if !type_accepts(kind, value) {
            return Some(format!("types.{kind}"));
        }
    }
    if let Some(key) = range_failure(rule, value) {
        return Some(key);
    }
    if let Some(options) = &rule.one_of {
        if !options.contains(value) {
            return Some("enum".into());
        }
    }
    if let (Some(pattern), Value::String(s)) = (&rule.pattern, value) {
        if !pattern.is_match(s) {
            return Some("pattern.mismatch".into());
        }
    }
    None
}

fn range_failure(rule: &RuleObject, value: &Value) -> Option<String> {
    if rule.len.is_none() && rule.min.is_none() && rule.max.is_none() {
        return None;
    }
    let (class, measured) = match value {
        Value::Number(n) => ("number", n.as_f64()?),
        Value::String(s) => ("string", s.chars().count() as f64),
        Value::Array(items) => ("array", items.len() as f64),
        _ => return None,
    };
    if let Some(len) = rule.len {
        return (measured != len).then(|| format!("{class}.len"));
    }
    match (rule.min, rule.max) {
        (Some(min), Some(max)) if measured < min || measured > max => Some(format!("{class}.range")),
        (Some(min), None) if measured < min => Some(format!("{class}.min")),
        (None, Some(max)) if measured > max => Some(format!("{class}.max")),
        _ => None,
    }
}

fn is_integer(value: &Value) -> bool {
    value
        .as_f64()
        .map_or(false, |f| f.is_finite() && f.fract() == 0.0)
}

fn type_accepts(kind: RuleType, value: &Value) -> bool {
    match kind {
        RuleType::String => value.is_string(),
        RuleType::Number => value.is_number(),
        RuleType::Boolean => value.is_boolean(),
        RuleType::Integer => is_integer(value),
        RuleType::Float => value.is_number() && !is_integer(value),
        RuleType::Array => value.is_array(),
        RuleType::Object => value.is_object(),
        RuleType::Enum => true,
        RuleType::Email => value.as_str().map_or(false, is_email),
        RuleType::Url => value.as_str().map_or(false, is_url),
        RuleType::Hex => value.as_str().map_or(false, is_hex_color),
    }
}

fn is_email(s: &str) -> bool {
    let Some((local, domain)) = s.split_once('@') else {
        return false;
    };
    let labels_ok = domain.split('.').all(|label| !label.is_empty());
    !local.is_empty()
        && domain.contains('.')
        && labels_ok
        && !domain.contains('@')
        && !s.chars().any(char::is_whitespace)
}

fn is_url(s: &str) -> bool {
    let Some((scheme, rest)) = s.split_once("://") else {
        return false;
    };
    let host = rest.split(['/', '?', '#']).next().unwrap_or_default();
    matches!(scheme.to_ascii_lowercase().as_str(), "http" | "https" | "ftp")
        && !host.is_empty()
        && !s.chars().any(char::is_whitespace)
}

fn is_hex_color(s: &str) -> bool {
    let digits = s.strip_prefix('#').unwrap_or(s);
    matches!(digits.len(), 3 | 6) && digits.chars().all(|c| c.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::ValidateMessages;
    use crate::rule::validator_fn;
    use crate::store::Form;
    use formwork_state::path;
    use regex::Regex;
    use serde_json::json;
    use std::sync::Arc;

    async fn check(rule: RuleObject, value: Option<Value>) -> Result<(), Vec<String>> {
        BuiltinRules
            .evaluate(RuleRequest {
                name: path!("user", "name"),
                value,
                rule,
                messages: MessageLayers::default(),
                variables: MessageVars::new(),
                form: Form::default().snapshot(),
            })
            .await
    }

    fn one(message: &str) -> Result<(), Vec<String>> {
        Err(vec![message.to_string()])
    }

    #[tokio::test]
    async fn test_required() {
        assert_eq!(check(RuleObject::required(), None).await, one("user.name is required"));
        assert_eq!(check(RuleObject::required(), Some(json!(""))).await, one("user.name is required"));
        assert_eq!(check(RuleObject::required(), Some(json!(0))).await, Ok(()));
        assert_eq!(
            check(RuleObject::required().with_type(RuleType::Array), Some(json!([]))).await,
            one("user.name is required")
        );
    }

    #[tokio::test]
    async fn test_empty_optional_value_skips_checks() {
        let rule = RuleObject::new().with_type(RuleType::Email).with_min(3.0);
        assert_eq!(check(rule, None).await, Ok(()));
    }

    #[tokio::test]
    async fn test_whitespace() {
        let rule = RuleObject::required().with_whitespace();
        assert_eq!(check(rule, Some(json!("   "))).await, one("user.name cannot be empty"));
    }

    #[tokio::test]
    async fn test_types() {
        let email = RuleObject::new().with_type(RuleType::Email);
        assert_eq!(check(email.clone(), Some(json!("a@b.io"))).await, Ok(()));
        assert_eq!(
            check(email, Some(json!("nope"))).await,
            one("'user.name' is not a valid email")
        );

        let int = RuleObject::new().with_type(RuleType::Integer);
        assert_eq!(check(int.clone(), Some(json!(3))).await, Ok(()));
        assert!(check(int, Some(json!(3.5))).await.is_err());

        let url = RuleObject::new().with_type(RuleType::Url);
        assert_eq!(check(url.clone(), Some(json!("https://example.com/x"))).await, Ok(()));
        assert!(check(url, Some(json!("example.com"))).await.is_err());

        let hex = RuleObject::new().with_type(RuleType::Hex);
        assert_eq!(check(hex.clone(), Some(json!("#a0F"))).await, Ok(()));
        assert!(check(hex, Some(json!("#abcd"))).await.is_err());
    }

    #[tokio::test]
    async fn test_ranges_by_value_class() {
        let min3 = RuleObject::new().with_min(3.0);
        assert_eq!(
            check(min3.clone(), Some(json!("ab"))).await,
            one("'user.name' must be at least 3 characters")
        );
        assert_eq!(
            check(min3.clone(), Some(json!(2))).await,
            one("'user.name' cannot be less than 3")
        );
        assert_eq!(
            check(min3, Some(json!([1]))).await,
            one("'user.name' cannot be less than 3 in length")
        );

        let between = RuleObject::new().with_min(1.0).with_max(2.0);
        assert_eq!(
            check(between, Some(json!(5))).await,
            one("'user.name' must be between 1 and 2")
        );

        let exact = RuleObject::new().with_len(2.0);
        assert_eq!(check(exact.clone(), Some(json!("ab"))).await, Ok(()));
        assert_eq!(
            check(exact, Some(json!("abc"))).await,
            one("'user.name' must be exactly 2 characters")
        );
    }

    #[tokio::test]
    async fn test_enum_and_pattern() {
        let color = RuleObject::new().with_enum(vec![json!("red"), json!("blue")]);
        assert_eq!(
            check(color, Some(json!("green"))).await,
            one("user.name must be one of [red, blue]")
        );

        let digits = RuleObject::new().with_pattern(Regex::new(r"^\d+$").unwrap());
        assert_eq!(
            check(digits, Some(json!("12a"))).await,
            one(r"'user.name' does not match pattern ^\d+$")
        );
    }

    #[tokio::test]
    async fn test_rule_message_overrides() {
        let rule = RuleObject::required().with_message("fill me");
        assert_eq!(check(rule, None).await, one("fill me"));
    }

    #[tokio::test]
    async fn test_transform_runs_first() {
        let rule = RuleObject::new()
            .with_max(3.0)
            .with_transform(|v: &Value| json!(v.as_str().unwrap_or_default().trim()));
        assert_eq!(check(rule, Some(json!("  ab  "))).await, Ok(()));
    }

    #[tokio::test]
    async fn test_default_field_checks_elements() {
        let rule = RuleObject::new()
            .with_type(RuleType::Array)
            .with_default_field(RuleObject::new().with_type(RuleType::Number));
        assert_eq!(
            check(rule, Some(json!([1, "x", 3, true]))).await,
            Err(vec![
                "'user.name.1' is not a valid number".to_string(),
                "'user.name.3' is not a valid number".to_string(),
            ])
        );
    }

    #[tokio::test]
    async fn test_custom_validator() {
        let reject = validator_fn(|ctx: RuleContext| async move {
            if ctx.value == Some(json!("admin")) {
                Err("reserved".to_string())
            } else {
                Err(String::new())
            }
        });
        let rule = RuleObject::new().with_validator(reject);
        assert_eq!(check(rule.clone(), Some(json!("admin"))).await, one("reserved"));
        assert_eq!(
            check(rule, Some(json!("x"))).await,
            one("Validation error on field user.name")
        );
    }

    #[tokio::test]
    async fn test_field_messages_and_variables() {
        let messages = MessageLayers::new(
            Some(Arc::new(ValidateMessages::new().with("required", "${label} needed"))),
            Arc::default(),
        );
        let mut variables = MessageVars::new();
        variables.insert("label".into(), "Your name".into());
        let result = BuiltinRules
            .evaluate(RuleRequest {
                name: path!("name"),
                value: None,
                rule: RuleObject::required(),
                messages,
                variables,
                form: Form::default().snapshot(),
            })
            .await;
        assert_eq!(result, one("Your name needed"));
    }
}
