//! Headless form state engine.
//!
//! `formwork` holds the value tree of a form together with per-field
//! metadata, and keeps the two consistent while fields mount, unmount,
//! change and validate asynchronously.
//!
//! # Core Concepts
//!
//! - **Form**: the store. Public reads and writes live on [`Form`]
//! - **InternalHooks**: the privileged surface a binding layer uses to
//!   register fields and dispatch edits, unlocked with [`HOOK_MARK`]
//! - **Rule**: a declarative [`RuleObject`] or a render closure that builds
//!   one from the current form
//! - **RuleEvaluator**: the rule library; [`BuiltinRules`] by default
//! - **Generation**: a counter bumped on every value change, used to flag
//!   validation results that finished after the form moved on
//!
//! # Quick Start
//!
//! ```
//! use formwork::{path, FieldAction, FieldProps, Form, FormConfig, NoOpSubscriber, RuleObject, HOOK_MARK};
//! use serde_json::json;
//!
//! let form = Form::new(FormConfig::default().with_initial_values(json!({"user": {"name": "alice"}})));
//! let hooks = form.internal_hooks(HOOK_MARK).unwrap();
//! let _name = hooks.register_field(
//!     FieldProps::new(path!("user", "name")).with_rule(RuleObject::required()),
//!     NoOpSubscriber::arc(),
//! );
//!
//! futures::executor::block_on(hooks.dispatch(FieldAction::update(path!("user", "name"), json!(""))));
//! assert_eq!(form.get_field_error(path!("user", "name")), vec!["user.name is required"]);
//! ```

pub mod config;
mod dependency;
pub mod error;
pub mod evaluator;
pub mod field;
pub mod hooks;
pub mod messages;
pub mod notify;
mod registry;
pub mod rule;
pub mod store;
pub mod validation;

pub use config::{FormConfig, FormSettings, TRIGGER_DEPENDENCIES_UPDATE, TRIGGER_ON_CHANGE};
pub use error::{FormError, FormResult, ValidateError};
pub use evaluator::{BuiltinRules, RuleEvaluator, RuleRequest};
pub use field::{
    FieldData, FieldError, FieldId, FieldProps, FieldState, FieldSubscriber, Meta, NoOpSubscriber,
};
pub use hooks::{Callbacks, FieldAction, FieldRegistration, InternalHooks, HOOK_MARK};
pub use messages::{MessageTemplate, ValidateMessages};
pub use notify::{NotifyInfo, StoreChange, ValueSource};
pub use rule::{validator_fn, Rule, RuleContext, RuleObject, RuleType, Validator};
pub use store::{FieldSelection, Form, FormSnapshot, MetaFilter};
pub use validation::{ValidateFuture, ValidateOptions};

pub use formwork_state::{parse_path, path, Path, Seg};
