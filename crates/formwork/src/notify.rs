//! Change notifications delivered to mounted fields.
//!
//! The store never calls out while it holds its lock. Deliveries and host
//! callbacks are queued in an [`Outbox`] during a mutation and flushed after
//! the lock is released, in the order they were queued.

use crate::field::{FieldData, FieldSubscriber};
use formwork_state::{get_at_path, Node, Path};
use serde::Serialize;
use serde_json::Value;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// Who wrote a value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueSource {
    /// A mounted field dispatched the write.
    Internal,
    /// Host code called a public setter.
    External,
}

/// Why subscribers are being notified.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotifyInfo {
    ValueUpdate { source: ValueSource },
    ValidateStart,
    ValidateFinish,
    Reset,
    /// A field unmounted and its value was dropped.
    Remove,
    SetField { data: FieldData },
    /// Dependents of a write; `related_fields` is the written path followed
    /// by the whole closure.
    DependenciesUpdate { related_fields: Vec<Path> },
}

/// One notification.
#[derive(Clone, Debug)]
pub struct StoreChange {
    pub info: NotifyInfo,
    /// Value tree after the change.
    pub store: Node,
    /// Value tree before the change.
    pub prev_store: Node,
    /// Paths the change concerns; `None` means the whole form.
    pub name_paths: Option<Vec<Path>>,
}

impl StoreChange {
    /// Whether the value at `path` is a different value after the change.
    ///
    /// Untouched subtrees are shared between the two trees, so this is an
    /// identity check along one path.
    pub fn value_changed(&self, path: &Path) -> bool {
        match (get_at_path(&self.prev_store, path), get_at_path(&self.store, path)) {
            (Some(before), Some(after)) => !before.same(after),
            (None, None) => false,
            _ => true,
        }
    }

    /// Whether the change concerns `path` or anything above or below it.
    pub fn concerns(&self, path: &Path) -> bool {
        self.name_paths
            .as_ref()
            .map_or(true, |paths| paths.iter().any(|p| p.intersects(path)))
    }

    pub fn value(&self, path: &Path) -> Option<Value> {
        get_at_path(&self.store, path).map(Value::from)
    }
}

type Callback = Box<dyn FnOnce() + Send>;

/// Deferred deliveries for one store operation.
#[derive(Default)]
pub(crate) struct Outbox {
    deliveries: Vec<(Arc<dyn FieldSubscriber>, Arc<StoreChange>)>,
    callbacks: Vec<(&'static str, Callback)>,
}

impl Outbox {
    pub(crate) fn notify<I>(&mut self, subscribers: I, change: StoreChange)
    where
        I: IntoIterator<Item = Arc<dyn FieldSubscriber>>,
    {
        let change = Arc::new(change);
        let before = self.deliveries.len();
        self.deliveries
            .extend(subscribers.into_iter().map(|s| (s, Arc::clone(&change))));
        tracing::trace!(
            info = ?change.info,
            recipients = self.deliveries.len() - before,
            "queued store change"
        );
    }

    pub(crate) fn callback(&mut self, name: &'static str, f: impl FnOnce() + Send + 'static) {
        self.callbacks.push((name, Box::new(f)));
    }

    /// Deliver everything queued. Must be called without the store lock.
    pub(crate) fn flush(self) {
        for (subscriber, change) in self.deliveries {
            guarded("on_store_change", || subscriber.on_store_change(&change));
        }
        for (name, f) in self.callbacks {
            guarded(name, f);
        }
    }
}

/// Run a host-provided hook, logging instead of unwinding through the store.
pub(crate) fn guarded(name: &str, f: impl FnOnce()) {
    if catch_unwind(AssertUnwindSafe(f)).is_err() {
        tracing::error!(hook = name, "host callback panicked");
    }
}
