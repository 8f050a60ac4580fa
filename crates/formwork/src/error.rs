//! Error types for the form engine.

use crate::field::FieldError;
use formwork_state::StateError;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Result type alias for fallible form operations.
pub type FormResult<T> = Result<T, FormError>;

/// Integration errors.
///
/// Ordinary store reads and writes never fail. These are raised only when a
/// host wires the engine up wrongly.
#[derive(Debug, Error)]
pub enum FormError {
    /// The privileged hook surface was requested with the wrong mark.
    #[error("internal hooks requested with an invalid mark")]
    InvalidHookMark,

    /// A name path could not be decoded.
    #[error(transparent)]
    Path(#[from] StateError),

    /// A validate-message table had the wrong shape.
    #[error("invalid validate messages: {reason}")]
    InvalidMessages { reason: String },

    /// Settings could not be parsed.
    #[error("invalid form settings: {0}")]
    Settings(#[from] serde_json::Error),
}

impl FormError {
    pub(crate) fn invalid_messages(reason: impl Into<String>) -> Self {
        FormError::InvalidMessages {
            reason: reason.into(),
        }
    }
}

/// Rejection of a validation run.
///
/// `error_fields` lists every targeted field that ended with errors, in
/// target order. A run that passed but raced with a newer write is rejected
/// with no error fields and `out_of_date` set.
#[derive(Clone, Debug, PartialEq, Serialize, Error)]
#[error("validation failed on {} field(s){}", .error_fields.len(), stale_suffix(.out_of_date))]
pub struct ValidateError {
    /// Values of the targeted fields when the run settled.
    pub values: Value,
    pub error_fields: Vec<FieldError>,
    /// The value tree changed while the run was in flight.
    pub out_of_date: bool,
}

fn stale_suffix(out_of_date: &bool) -> &'static str {
    if *out_of_date {
        " (out of date)"
    } else {
        ""
    }
}

impl ValidateError {
    /// True when the run failed only because it was superseded.
    pub fn is_stale_only(&self) -> bool {
        self.out_of_date && self.error_fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formwork_state::path;
    use serde_json::json;

    #[test]
    fn test_validate_error_display() {
        let err = ValidateError {
            values: json!({}),
            error_fields: vec![FieldError {
                name: path!("age"),
                errors: vec!["too young".into()],
                warnings: vec![],
            }],
            out_of_date: false,
        };
        assert_eq!(err.to_string(), "validation failed on 1 field(s)");
        assert!(!err.is_stale_only());

        let stale = ValidateError {
            values: json!({}),
            error_fields: vec![],
            out_of_date: true,
        };
        assert_eq!(stale.to_string(), "validation failed on 0 field(s) (out of date)");
        assert!(stale.is_stale_only());
    }

    #[test]
    fn test_path_error_is_transparent() {
        let err = FormError::from(StateError::malformed_path("bad"));
        assert_eq!(err.to_string(), "malformed name path: bad");
    }
}
