//! Shared fixtures for the formwork integration tests.

#![allow(dead_code)]

use formwork::{
    validator_fn, FieldSubscriber, Form, FormConfig, InternalHooks, NotifyInfo, RuleContext,
    StoreChange, Validator, HOOK_MARK,
};
use futures::channel::oneshot;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A form and its privileged hooks.
pub fn form_with(initial_values: Value) -> (Form, InternalHooks) {
    init_tracing();
    let form = Form::new(FormConfig::default().with_initial_values(initial_values));
    let hooks = form.internal_hooks(HOOK_MARK).unwrap();
    (form, hooks)
}

// ============================================================================
// Subscribers
// ============================================================================

/// Records every notification it receives.
#[derive(Default)]
pub struct Recorder {
    changes: Mutex<Vec<StoreChange>>,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn changes(&self) -> Vec<StoreChange> {
        self.changes.lock().unwrap().clone()
    }

    pub fn infos(&self) -> Vec<NotifyInfo> {
        self.changes().into_iter().map(|change| change.info).collect()
    }

    pub fn count(&self, pred: impl Fn(&NotifyInfo) -> bool) -> usize {
        self.infos().iter().filter(|info| pred(info)).count()
    }

    pub fn clear(&self) {
        self.changes.lock().unwrap().clear();
    }
}

impl FieldSubscriber for Recorder {
    fn on_store_change(&self, change: &StoreChange) {
        self.changes.lock().unwrap().push(change.clone());
    }
}

// ============================================================================
// Validators
// ============================================================================

/// Counts its calls and always passes.
pub fn counting(calls: Arc<AtomicUsize>) -> Arc<dyn Validator> {
    validator_fn(move |_ctx: RuleContext| {
        calls.fetch_add(1, Ordering::SeqCst);
        async { Ok(()) }
    })
}

/// Validator whose calls block until the test releases them.
///
/// Calls are numbered in the order the validator was first polled.
#[derive(Clone, Default)]
pub struct Gate {
    pending: Arc<Mutex<Vec<Option<oneshot::Sender<Result<(), String>>>>>>,
}

impl Gate {
    pub fn validator(&self) -> Arc<dyn Validator> {
        let pending = Arc::clone(&self.pending);
        validator_fn(move |_ctx: RuleContext| {
            let (tx, rx) = oneshot::channel();
            pending.lock().unwrap().push(Some(tx));
            async move { rx.await.unwrap_or(Ok(())) }
        })
    }

    pub fn calls(&self) -> usize {
        self.pending.lock().unwrap().len()
    }

    /// Yield until at least `n` calls are parked.
    pub async fn wait_for(&self, n: usize) {
        while self.calls() < n {
            tokio::task::yield_now().await;
        }
    }

    pub fn release(&self, call: usize, outcome: Result<(), String>) {
        let tx = self.pending.lock().unwrap()[call].take().expect("call released twice");
        let _ = tx.send(outcome);
    }
}
