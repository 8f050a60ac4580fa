//! The privileged surface used by a UI binding layer.
//!
//! Registering fields and dispatching field events bypass the public
//! contract, so they are only handed out to callers that present
//! [`HOOK_MARK`].

use crate::error::{FormError, FormResult, ValidateError};
use crate::field::{FieldId, FieldProps, FieldState, FieldSubscriber};
use crate::messages::ValidateMessages;
use crate::store::{Form, FormInner};
use formwork_state::Path;
use futures::future::BoxFuture;
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

/// Mark that unlocks [`Form::internal_hooks`].
pub const HOOK_MARK: &str = "FORMWORK_INTERNAL_HOOKS";

pub type ValuesChangeFn = Arc<dyn Fn(&Value, &Value) + Send + Sync>;
pub type FieldsChangeFn = Arc<dyn Fn(&[FieldState], &[FieldState]) + Send + Sync>;
pub type FinishFn = Arc<dyn Fn(&Value) + Send + Sync>;
pub type FinishFailedFn = Arc<dyn Fn(&ValidateError) + Send + Sync>;

/// Host callbacks.
#[derive(Clone, Default)]
pub struct Callbacks {
    /// `(changed values, all values)` after every field-originated write.
    pub on_values_change: Option<ValuesChangeFn>,
    /// `(changed fields, all fields)` after every meta-affecting event.
    pub on_fields_change: Option<FieldsChangeFn>,
    /// Full value tree after a successful submit.
    pub on_finish: Option<FinishFn>,
    pub on_finish_failed: Option<FinishFailedFn>,
}

impl Callbacks {
    #[must_use]
    pub fn on_values_change(mut self, f: impl Fn(&Value, &Value) + Send + Sync + 'static) -> Self {
        self.on_values_change = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn on_fields_change(
        mut self,
        f: impl Fn(&[FieldState], &[FieldState]) + Send + Sync + 'static,
    ) -> Self {
        self.on_fields_change = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn on_finish(mut self, f: impl Fn(&Value) + Send + Sync + 'static) -> Self {
        self.on_finish = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn on_finish_failed(mut self, f: impl Fn(&ValidateError) + Send + Sync + 'static) -> Self {
        self.on_finish_failed = Some(Arc::new(f));
        self
    }
}

impl fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callbacks")
            .field("on_values_change", &self.on_values_change.is_some())
            .field("on_fields_change", &self.on_fields_change.is_some())
            .field("on_finish", &self.on_finish.is_some())
            .field("on_finish_failed", &self.on_finish_failed.is_some())
            .finish()
    }
}

/// Events a mounted field reports to the store.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldAction {
    /// The user edited the field. `trigger` defaults to `onChange`.
    UpdateValue {
        name: Path,
        value: Value,
        trigger: Option<String>,
    },
    /// A non-editing trigger such as `onBlur` fired on the field.
    ValidateField { name: Path, trigger: String },
}

impl FieldAction {
    pub fn update(name: impl Into<Path>, value: Value) -> Self {
        FieldAction::UpdateValue {
            name: name.into(),
            value,
            trigger: None,
        }
    }

    pub fn validate(name: impl Into<Path>, trigger: impl Into<String>) -> Self {
        FieldAction::ValidateField {
            name: name.into(),
            trigger: trigger.into(),
        }
    }
}

/// Handle returned by [`InternalHooks::register_field`].
///
/// Dropping it does not unregister the field.
pub struct FieldRegistration {
    form: Weak<FormInner>,
    id: FieldId,
    active: AtomicBool,
}

impl FieldRegistration {
    pub fn id(&self) -> FieldId {
        self.id
    }

    pub fn is_registered(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Unmount the field. Calling it again does nothing.
    pub fn unregister(&self) {
        if !self.active.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Some(inner) = self.form.upgrade() {
            Form { inner }.unregister_field(self.id);
        }
    }
}

impl fmt::Debug for FieldRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldRegistration")
            .field("id", &self.id)
            .field("registered", &self.is_registered())
            .finish()
    }
}

/// Privileged operations on a [`Form`].
#[derive(Clone, Debug)]
pub struct InternalHooks {
    form: Form,
}

impl Form {
    /// Unlock the privileged surface.
    pub fn internal_hooks(&self, mark: &str) -> FormResult<InternalHooks> {
        if mark != HOOK_MARK {
            tracing::error!("internal hooks requested with an invalid mark; they are reserved for the field binding layer");
            return Err(FormError::InvalidHookMark);
        }
        Ok(InternalHooks { form: self.clone() })
    }
}

impl InternalHooks {
    pub fn register_field(&self, props: FieldProps, subscriber: Arc<dyn FieldSubscriber>) -> FieldRegistration {
        let id = self.form.register_field(props, subscriber);
        FieldRegistration {
            form: Arc::downgrade(&self.form.inner),
            id,
            active: AtomicBool::new(true),
        }
    }

    /// Apply a field event. The returned future drives any validation the
    /// event triggered; the write and its notifications are already done.
    pub fn dispatch(&self, action: FieldAction) -> BoxFuture<'static, ()> {
        self.form.dispatch(action)
    }

    /// Replace the form's initial values. On first mount they are merged
    /// under whatever the store already holds.
    pub fn set_initial_values(&self, values: Value, first_mount: bool) {
        self.form.set_initial_values(values, first_mount);
    }

    pub fn set_callbacks(&self, callbacks: Callbacks) {
        self.form.set_callbacks(callbacks);
    }

    pub fn set_validate_messages(&self, messages: ValidateMessages) {
        self.form.set_validate_messages(messages);
    }

    pub fn set_preserve(&self, preserve: bool) {
        self.form.set_preserve(preserve);
    }

    /// State of every mounted field, one entry per path.
    pub fn get_fields(&self) -> Vec<FieldState> {
        self.form.get_fields()
    }
}
