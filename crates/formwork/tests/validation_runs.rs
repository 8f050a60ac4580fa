//! Integration tests for asynchronous validation, dependency revalidation
//! and staleness.

mod common;

use common::{counting, form_with, Gate, Recorder};
use formwork::{
    path, validator_fn, Callbacks, FieldAction, FieldProps, NoOpSubscriber, NotifyInfo, RuleContext,
    RuleObject, ValidateOptions,
};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

fn must_equal_username() -> RuleObject {
    RuleObject::new().with_validator(validator_fn(|ctx: RuleContext| async move {
        if ctx.value == ctx.form.get_field_value("username") {
            Ok(())
        } else {
            Err("must equal username".to_string())
        }
    }))
}

// ============================================================================
// Dependencies
// ============================================================================

#[tokio::test]
async fn test_confirmation_clears_when_dependency_changes() {
    let (form, hooks) = form_with(json!({}));
    let _user = hooks.register_field(
        FieldProps::new("username").with_rule(RuleObject::required()),
        NoOpSubscriber::arc(),
    );
    let confirm_events = Recorder::new();
    let _confirm = hooks.register_field(
        FieldProps::new("confirmUsername")
            .with_dependencies(["username"])
            .with_rule(must_equal_username()),
        confirm_events.clone(),
    );

    hooks.dispatch(FieldAction::update("username", json!("alice"))).await;
    assert!(form.get_field_error("username").is_empty());

    hooks.dispatch(FieldAction::update("confirmUsername", json!("bob"))).await;
    assert_eq!(form.get_field_error("confirmUsername"), vec!["must equal username"]);

    confirm_events.clear();
    hooks.dispatch(FieldAction::update("username", json!("bob"))).await;

    assert!(form.get_field_error("confirmUsername").is_empty());
    assert_eq!(form.get_field_value("confirmUsername"), Some(json!("bob")));
    assert_eq!(
        confirm_events.infos(),
        vec![
            NotifyInfo::DependenciesUpdate {
                related_fields: vec![path!("username"), path!("confirmUsername")],
            },
            NotifyInfo::ValidateStart,
            NotifyInfo::ValidateFinish,
        ]
    );
}

#[tokio::test]
async fn test_untouched_dependent_is_not_revalidated() {
    let (form, hooks) = form_with(json!({}));
    let calls = Arc::new(AtomicUsize::new(0));
    let _user = hooks.register_field(FieldProps::new("username"), NoOpSubscriber::arc());
    let _confirm = hooks.register_field(
        FieldProps::new("confirmUsername")
            .with_dependencies(["username"])
            .with_rule(RuleObject::new().with_validator(counting(Arc::clone(&calls)))),
        NoOpSubscriber::arc(),
    );

    hooks.dispatch(FieldAction::update("username", json!("alice"))).await;

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(!form.is_field_touched("confirmUsername"));
}

#[tokio::test]
async fn test_cycle_revalidates_each_field_once() {
    let (_form, hooks) = form_with(json!({"a": 0, "b": 0}));
    let a_calls = Arc::new(AtomicUsize::new(0));
    let b_calls = Arc::new(AtomicUsize::new(0));
    let _a = hooks.register_field(
        FieldProps::new("a")
            .with_dependencies(["b"])
            .with_rule(RuleObject::new().with_validator(counting(Arc::clone(&a_calls)))),
        NoOpSubscriber::arc(),
    );
    let _b = hooks.register_field(
        FieldProps::new("b")
            .with_dependencies(["a"])
            .with_rule(RuleObject::new().with_validator(counting(Arc::clone(&b_calls)))),
        NoOpSubscriber::arc(),
    );

    // Make b dirty so it takes part in dependency revalidation.
    hooks.dispatch(FieldAction::update("b", json!(1))).await;
    a_calls.store(0, Ordering::SeqCst);
    b_calls.store(0, Ordering::SeqCst);

    hooks.dispatch(FieldAction::update("a", json!(1))).await;

    assert_eq!(a_calls.load(Ordering::SeqCst), 1);
    assert_eq!(b_calls.load(Ordering::SeqCst), 1);
}

// ============================================================================
// Staleness
// ============================================================================

#[tokio::test]
async fn test_run_settling_after_a_write_is_out_of_date() {
    let (form, hooks) = form_with(json!({"x": "one"}));
    let gate = Gate::default();
    let _x = hooks.register_field(
        FieldProps::new("x").with_rule(RuleObject::new().with_validator(gate.validator())),
        NoOpSubscriber::arc(),
    );

    let r1 = tokio::spawn(form.validate_fields(Some(vec![path!("x")]), ValidateOptions::default()));
    gate.wait_for(1).await;

    form.set_fields_value(json!({"x": "two"}));
    let r2 = tokio::spawn(form.validate_fields(Some(vec![path!("x")]), ValidateOptions::default()));
    gate.wait_for(2).await;

    gate.release(1, Ok(()));
    let second = r2.await.unwrap();
    assert_eq!(second, Ok(json!({"x": "two"})));
    assert!(form.is_field_validating("x"));

    gate.release(0, Ok(()));
    let first = r1.await.unwrap().unwrap_err();
    assert!(first.out_of_date);
    assert!(first.is_stale_only());
    assert!(!form.is_field_validating("x"));
}

#[tokio::test]
async fn test_run_started_before_reset_does_not_settle_into_it() {
    let (form, hooks) = form_with(json!({"x": "one"}));
    let gate = Gate::default();
    let _x = hooks.register_field(
        FieldProps::new("x").with_rule(RuleObject::new().with_validator(gate.validator())),
        NoOpSubscriber::arc(),
    );

    let r1 = tokio::spawn(form.validate_fields(Some(vec![path!("x")]), ValidateOptions::default()));
    gate.wait_for(1).await;

    form.reset_fields(Some(vec![path!("x")]));
    assert!(!form.is_field_validating("x"));
    let r2 = tokio::spawn(form.validate_fields(Some(vec![path!("x")]), ValidateOptions::default()));
    gate.wait_for(2).await;

    gate.release(0, Err("stale failure".to_string()));
    let first = r1.await.unwrap().unwrap_err();
    assert!(first.out_of_date);
    assert!(form.get_field_error("x").is_empty());
    assert!(form.is_field_validating("x"));

    gate.release(1, Ok(()));
    assert_eq!(r2.await.unwrap(), Ok(json!({"x": "one"})));
    assert!(form.get_field_error("x").is_empty());
    assert!(!form.is_field_validating("x"));
}

#[tokio::test]
async fn test_run_started_before_remount_does_not_settle_into_it() {
    let (form, hooks) = form_with(json!({"x": "one"}));
    let gate = Gate::default();
    let x = hooks.register_field(
        FieldProps::new("x").with_rule(RuleObject::new().with_validator(gate.validator())),
        NoOpSubscriber::arc(),
    );

    let run = tokio::spawn(form.validate_fields(Some(vec![path!("x")]), ValidateOptions::default()));
    gate.wait_for(1).await;

    x.unregister();
    let _x = hooks.register_field(FieldProps::new("x"), NoOpSubscriber::arc());
    assert!(!form.is_field_validating("x"));

    gate.release(0, Err("stale failure".to_string()));
    let _ = run.await.unwrap();
    assert!(form.get_field_error("x").is_empty());
    assert!(!form.is_field_validating("x"));
}

#[tokio::test]
async fn test_validating_flag_spans_the_run() {
    let (form, hooks) = form_with(json!({}));
    let gate = Gate::default();
    let _x = hooks.register_field(
        FieldProps::new("x").with_rule(RuleObject::new().with_validator(gate.validator())),
        NoOpSubscriber::arc(),
    );

    let run = tokio::spawn(form.validate_fields(None, ValidateOptions::default()));
    assert!(form.is_field_validating("x"));
    assert!(form.is_fields_validating(None));

    gate.wait_for(1).await;
    gate.release(0, Err("taken".to_string()));
    let err = run.await.unwrap().unwrap_err();

    assert!(!err.out_of_date);
    assert_eq!(err.error_fields[0].errors, vec!["taken"]);
    assert!(!form.is_field_validating("x"));
}

// ============================================================================
// Triggers
// ============================================================================

#[tokio::test]
async fn test_blur_only_field_waits_for_blur() {
    let (form, hooks) = form_with(json!({}));
    let _name = hooks.register_field(
        FieldProps::new("name")
            .with_validate_trigger(["onBlur"])
            .with_rule(RuleObject::required()),
        NoOpSubscriber::arc(),
    );

    hooks.dispatch(FieldAction::update("name", json!(""))).await;
    assert!(form.get_field_error("name").is_empty());

    hooks.dispatch(FieldAction::validate("name", "onBlur")).await;
    assert_eq!(form.get_field_error("name"), vec!["name is required"]);
}

#[tokio::test]
async fn test_recursive_dirty_validation() {
    let (form, hooks) = form_with(json!({"user": {"first": "", "last": ""}}));
    let _first = hooks.register_field(
        FieldProps::new(path!("user", "first")).with_rule(RuleObject::required()),
        NoOpSubscriber::arc(),
    );
    let _last = hooks.register_field(
        FieldProps::new(path!("user", "last")).with_rule(RuleObject::required()),
        NoOpSubscriber::arc(),
    );
    hooks.dispatch(FieldAction::validate(path!("user", "first"), "onChange")).await;

    let err = form
        .validate_fields(Some(vec![path!("user")]), ValidateOptions::default().recursive().dirty())
        .await
        .unwrap_err();

    let failed: Vec<_> = err.error_fields.iter().map(|field| field.name.clone()).collect();
    assert_eq!(failed, vec![path!("user", "first")]);
    assert!(form.get_field_error(path!("user", "last")).is_empty());
}

// ============================================================================
// Submit
// ============================================================================

#[tokio::test]
async fn test_submit_calls_finish_with_all_values() {
    let (form, hooks) = form_with(json!({"name": "alice", "note": "unmounted"}));
    let _name = hooks.register_field(
        FieldProps::new("name").with_rule(RuleObject::required()),
        NoOpSubscriber::arc(),
    );
    let finished = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&finished);
    hooks.set_callbacks(Callbacks::default().on_finish(move |values| {
        *sink.lock().unwrap() = Some(values.clone());
    }));

    form.submit().await;

    assert_eq!(
        *finished.lock().unwrap(),
        Some(json!({"name": "alice", "note": "unmounted"}))
    );
}

#[tokio::test]
async fn test_submit_reports_failures_and_survives_panicking_callback() {
    let (form, hooks) = form_with(json!({}));
    let _name = hooks.register_field(
        FieldProps::new("name").with_rule(RuleObject::required().with_message("enter a name")),
        NoOpSubscriber::arc(),
    );
    let failures = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&failures);
    hooks.set_callbacks(
        Callbacks::default()
            .on_fields_change(|_, _| panic!("host bug"))
            .on_finish_failed(move |err| {
                sink.lock().unwrap().extend(err.error_fields.clone());
            }),
    );

    form.submit().await;

    let failures = failures.lock().unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].errors, vec!["enter a name"]);
    assert_eq!(form.get_field_error("name"), vec!["enter a name"]);
}
