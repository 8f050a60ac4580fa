//! Error types for formwork-state operations.

use thiserror::Error;

/// Result type alias for formwork-state operations.
pub type StateResult<T> = Result<T, StateError>;

/// Errors raised while decoding paths or converting trees.
///
/// Tree reads and writes never fail: absent paths read as `None` and writes
/// materialize whatever containers they need. Only malformed external input
/// ends up here.
#[derive(Debug, Error)]
pub enum StateError {
    /// A name path could not be decoded.
    #[error("malformed name path: {reason}")]
    MalformedPath {
        /// What was wrong with the input.
        reason: String,
    },

    /// JSON serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StateError {
    /// Create a malformed path error.
    #[inline]
    pub fn malformed_path(reason: impl Into<String>) -> Self {
        StateError::MalformedPath {
            reason: reason.into(),
        }
    }
}

/// Get the type name of a JSON value.
#[inline]
pub fn value_type_name(v: &serde_json::Value) -> &'static str {
    match v {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_display() {
        let err = StateError::malformed_path("segment must be a string");
        assert_eq!(
            err.to_string(),
            "malformed name path: segment must be a string"
        );
    }

    #[test]
    fn test_value_type_name() {
        assert_eq!(value_type_name(&json!(null)), "null");
        assert_eq!(value_type_name(&json!(true)), "boolean");
        assert_eq!(value_type_name(&json!(42)), "number");
        assert_eq!(value_type_name(&json!("hello")), "string");
        assert_eq!(value_type_name(&json!([1, 2, 3])), "array");
        assert_eq!(value_type_name(&json!({"a": 1})), "object");
    }
}
