//! Validation runs.
//!
//! A run starts synchronously: it records the store generation, resolves
//! the rules of every target against a snapshot, marks the targets as
//! validating and announces the start. The returned future evaluates the
//! rules and settles the run back into the store. Runs are never cancelled;
//! a run that settles after the value tree moved on is flagged out of date.

use crate::error::ValidateError;
use crate::evaluator::{RuleEvaluator, RuleRequest};
use crate::field::FieldError;
use crate::messages::{MessageLayers, MessageVars};
use crate::notify::{guarded, NotifyInfo, Outbox};
use crate::rule::{validator_fn, RuleContext, RuleObject};
use crate::store::{Form, FormSnapshot, StoreState};
use formwork_state::{get_at_path, pick, Path};
use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use serde_json::Value;
use std::collections::BTreeSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// Resolves to the values of the targeted fields, or to the failure.
pub type ValidateFuture = BoxFuture<'static, Result<Value, ValidateError>>;

/// Options for [`Form::validate_fields`].
#[derive(Clone, Debug, Default)]
pub struct ValidateOptions {
    /// Only run rules that fire on this trigger.
    pub trigger: Option<String>,
    /// Expand each requested path to every mounted field at or below it.
    pub recursive: bool,
    /// Skip fields that were never written or validated.
    pub dirty: bool,
}

impl ValidateOptions {
    #[must_use]
    pub fn with_trigger(mut self, trigger: impl Into<String>) -> Self {
        self.trigger = Some(trigger.into());
        self
    }

    #[must_use]
    pub fn recursive(mut self) -> Self {
        self.recursive = true;
        self
    }

    #[must_use]
    pub fn dirty(mut self) -> Self {
        self.dirty = true;
        self
    }
}

struct FieldJob {
    name: Path,
    value: Option<Value>,
    rules: Vec<RuleObject>,
    messages: MessageLayers,
    variables: MessageVars,
    validate_first: bool,
    /// Meta epoch the run was started under.
    epoch: u64,
}

struct FieldOutcome {
    name: Path,
    epoch: u64,
    errors: Vec<String>,
    warnings: Vec<String>,
}

impl Form {
    /// Validate `paths` (every mounted field when `None`).
    ///
    /// Targets are marked validating before this returns. The future must
    /// be driven for the run to settle.
    pub fn validate_fields(&self, paths: Option<Vec<Path>>, options: ValidateOptions) -> ValidateFuture {
        self.mutate(|state, outbox| {
            let mut targets = match paths {
                None => state.registry.named_paths(false),
                Some(paths) if options.recursive => {
                    let mut seen = BTreeSet::new();
                    paths
                        .iter()
                        .flat_map(|prefix| state.registry.paths_under(prefix).cloned().collect::<Vec<_>>())
                        .filter(|path| seen.insert(path.clone()))
                        .collect()
                }
                Some(paths) => paths,
            };
            if options.dirty {
                targets.retain(|path| state.metas.get(path).map_or(false, |meta| meta.dirty));
            }
            self.begin_validation(state, outbox, targets, options.trigger)
        })
    }

    /// Validate every mounted field, then call `on_finish` or
    /// `on_finish_failed`. Always completes.
    pub fn submit(&self) -> BoxFuture<'static, ()> {
        let run = self.validate_fields(None, ValidateOptions::default());
        let form = self.clone();
        Box::pin(async move {
            let result = run.await;
            let (callbacks, values) = {
                let state = form.lock();
                (state.callbacks.clone(), state.values.to_value())
            };
            match result {
                Ok(_) => {
                    tracing::debug!("submit succeeded");
                    if let Some(on_finish) = callbacks.on_finish {
                        guarded("on_finish", || on_finish(&values));
                    }
                }
                Err(err) => {
                    tracing::debug!(error_fields = err.error_fields.len(), out_of_date = err.out_of_date, "submit failed");
                    if let Some(on_finish_failed) = callbacks.on_finish_failed {
                        guarded("on_finish_failed", || on_finish_failed(&err));
                    }
                }
            }
        })
    }

    /// The synchronous half of a run. Called with the lock held.
    pub(crate) fn begin_validation(
        &self,
        state: &mut StoreState,
        outbox: &mut Outbox,
        targets: Vec<Path>,
        trigger: Option<String>,
    ) -> ValidateFuture {
        let generation = state.generation;
        let snapshot = state.snapshot();

        let mut jobs = Vec::new();
        for path in &targets {
            let Some(entry) = state.registry.primary_at(path) else {
                continue;
            };
            if !entry.has_rules() {
                continue;
            }
            let rules: Vec<RuleObject> = entry
                .props
                .rules
                .iter()
                .map(|rule| resolve_guarded(rule, &snapshot, path))
                .filter(|rule| trigger.as_deref().map_or(true, |t| rule.fires_on(t)))
                .collect();
            if rules.is_empty() {
                continue;
            }
            jobs.push(FieldJob {
                name: path.clone(),
                value: get_at_path(&state.values, path).map(Value::from),
                rules,
                messages: MessageLayers::new(entry.messages.clone(), Arc::clone(&state.messages)),
                variables: entry.props.message_variables.clone(),
                validate_first: entry.props.validate_first,
                epoch: 0,
            });
        }

        for job in &mut jobs {
            let meta = state.meta_mut(&job.name);
            meta.validating += 1;
            meta.dirty = true;
            job.epoch = meta.epoch;
        }
        let started: Vec<Path> = jobs.iter().map(|job| job.name.clone()).collect();
        if !started.is_empty() {
            tracing::debug!(fields = started.len(), generation, trigger = ?trigger, "validation started");
            state.notify_matching(outbox, &started, NotifyInfo::ValidateStart, &state.values);
        }

        let form = self.clone();
        let evaluator = Arc::clone(&state.evaluator);
        Box::pin(async move {
            let outcomes = join_all(
                jobs.into_iter()
                    .map(|job| run_field(Arc::clone(&evaluator), job, snapshot.clone())),
            )
            .await;
            form.settle(generation, &targets, outcomes)
        })
    }

    fn settle(&self, generation: u64, targets: &[Path], outcomes: Vec<FieldOutcome>) -> Result<Value, ValidateError> {
        self.mutate(|state, outbox| {
            let out_of_date = state.generation != generation;
            let mut settled = Vec::with_capacity(outcomes.len());
            for outcome in &outcomes {
                // Unmounted, remounted or reset meanwhile: the meta this run
                // counted against is gone.
                let Some(meta) = state
                    .metas
                    .get_mut(&outcome.name)
                    .filter(|meta| meta.epoch == outcome.epoch)
                else {
                    continue;
                };
                meta.validating = meta.validating.saturating_sub(1);
                meta.errors = outcome.errors.clone();
                meta.warnings = outcome.warnings.clone();
                settled.push(outcome.name.clone());
            }
            if !settled.is_empty() {
                state.notify_matching(outbox, &settled, NotifyInfo::ValidateFinish, &state.values);
                state.fields_change(outbox, &settled);
            }

            let values = pick(&state.values, targets).to_value();
            let error_fields: Vec<FieldError> = outcomes
                .into_iter()
                .filter(|outcome| !outcome.errors.is_empty())
                .map(|outcome| FieldError {
                    name: outcome.name,
                    errors: outcome.errors,
                    warnings: outcome.warnings,
                })
                .collect();
            tracing::debug!(
                fields = settled.len(),
                failed = error_fields.len(),
                generation,
                "validation settled"
            );

            if error_fields.is_empty() && !out_of_date {
                return Ok(values);
            }
            if out_of_date {
                tracing::warn!(
                    started_at = generation,
                    current = state.generation,
                    "validation result is out of date"
                );
            }
            Err(ValidateError {
                values,
                error_fields,
                out_of_date,
            })
        })
    }
}

/// Resolve a rule, turning a panicking render function into a rule that
/// always fails with the default message.
fn resolve_guarded(rule: &crate::rule::Rule, snapshot: &FormSnapshot, path: &Path) -> RuleObject {
    match catch_unwind(AssertUnwindSafe(|| rule.resolve(snapshot))) {
        Ok(resolved) => resolved,
        Err(_) => {
            tracing::error!(field = %path, "rule render function panicked");
            RuleObject::new().with_validator(validator_fn(|_: RuleContext| async { Err(String::new()) }))
        }
    }
}

async fn run_field(evaluator: Arc<dyn RuleEvaluator>, job: FieldJob, form: FormSnapshot) -> FieldOutcome {
    let FieldJob {
        name,
        value,
        rules,
        messages,
        variables,
        validate_first,
        epoch,
    } = job;
    let request = |rule: RuleObject| RuleRequest {
        name: name.clone(),
        value: value.clone(),
        rule,
        messages: messages.clone(),
        variables: variables.clone(),
        form: form.clone(),
    };

    let mut results: Vec<(bool, Result<(), Vec<String>>)> = Vec::with_capacity(rules.len());
    if validate_first {
        for rule in rules {
            let warning_only = rule.warning_only;
            let result = evaluate_guarded(evaluator.as_ref(), request(rule)).await;
            let stop = !warning_only && result.is_err();
            results.push((warning_only, result));
            if stop {
                break;
            }
        }
    } else {
        let kinds: Vec<bool> = rules.iter().map(|rule| rule.warning_only).collect();
        let evaluated = join_all(
            rules
                .into_iter()
                .map(|rule| evaluate_guarded(evaluator.as_ref(), request(rule))),
        )
        .await;
        results = kinds.into_iter().zip(evaluated).collect();
    }

    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    for (warning_only, result) in results {
        if let Err(messages) = result {
            if warning_only {
                warnings.extend(messages);
            } else {
                errors.extend(messages);
            }
        }
    }
    FieldOutcome {
        name,
        epoch,
        errors,
        warnings,
    }
}

/// Evaluate one rule, converting a panic into the rule's failure.
async fn evaluate_guarded(evaluator: &dyn RuleEvaluator, request: RuleRequest) -> Result<(), Vec<String>> {
    let name = request.name.clone();
    let fallback = request.rule.message.clone().unwrap_or_else(|| {
        let mut vars = MessageVars::new();
        vars.insert("name".into(), name.joined("."));
        request.messages.render("default", &vars)
    });
    match AssertUnwindSafe(evaluator.evaluate(request)).catch_unwind().await {
        Ok(result) => result,
        Err(_) => {
            tracing::error!(field = %name, evaluator = evaluator.name(), "rule evaluation panicked");
            Err(vec![fallback])
        }
    }
}
