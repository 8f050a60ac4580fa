//! The form store.
//!
//! [`Form`] owns the value tree, the per-path [`Meta`] map, the field
//! registry and the dependency graph behind one mutex. Every operation does
//! its state change in one critical section, queues notifications in an
//! [`Outbox`], and delivers them after the lock is released.

use crate::config::{FormConfig, TRIGGER_DEPENDENCIES_UPDATE, TRIGGER_ON_CHANGE};
use crate::dependency::DependencyGraph;
use crate::evaluator::RuleEvaluator;
use crate::field::{FieldData, FieldError, FieldId, FieldProps, FieldState, FieldSubscriber, Meta};
use crate::hooks::{Callbacks, FieldAction};
use crate::messages::ValidateMessages;
use crate::notify::{NotifyInfo, Outbox, StoreChange, ValueSource};
use crate::registry::FieldRegistry;
use crate::validation::ValidateFuture;
use formwork_state::{delete_at_path, get_at_path, leaf_paths, merge, pick, set_at_path, Node, Path};
use futures::future::{join_all, BoxFuture};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Which fields `get_fields_value` reads.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldSelection {
    /// The whole tree, or every mounted field when a filter is given.
    All,
    /// Mounted fields, except items of list containers.
    Mounted,
    Paths(Vec<Path>),
}

/// Predicate over a field's meta for `get_fields_value`.
pub type MetaFilter<'a> = &'a dyn Fn(&Meta) -> bool;

/// Internal per-path status. `validating` counts runs in flight.
#[derive(Clone, Debug, Default)]
pub(crate) struct FieldMeta {
    /// Changes whenever the meta is recreated or reset. Runs started under
    /// an older epoch do not settle into it.
    pub(crate) epoch: u64,
    pub(crate) touched: bool,
    pub(crate) dirty: bool,
    pub(crate) validating: usize,
    pub(crate) errors: Vec<String>,
    pub(crate) warnings: Vec<String>,
}

impl FieldMeta {
    fn fresh(epoch: u64) -> Self {
        Self {
            epoch,
            ..Self::default()
        }
    }

    fn to_meta(&self, name: &Path) -> Meta {
        Meta {
            name: name.clone(),
            touched: self.touched,
            validating: self.validating > 0,
            dirty: self.dirty,
            errors: self.errors.clone(),
            warnings: self.warnings.clone(),
        }
    }
}

/// A read-only view of the form, handed to rule renderers and validators.
#[derive(Clone, Debug)]
pub struct FormSnapshot {
    values: Node,
    metas: Arc<BTreeMap<Path, Meta>>,
}

impl FormSnapshot {
    pub fn node(&self) -> &Node {
        &self.values
    }

    pub fn values(&self) -> Value {
        self.values.to_value()
    }

    pub fn get_field_value(&self, path: impl Into<Path>) -> Option<Value> {
        get_at_path(&self.values, &path.into()).map(Value::from)
    }

    pub fn get_fields_value<'a>(&self, paths: impl IntoIterator<Item = &'a Path>) -> Value {
        pick(&self.values, paths).to_value()
    }

    pub fn meta(&self, path: &Path) -> Option<&Meta> {
        self.metas.get(path)
    }

    pub fn get_field_error(&self, path: impl Into<Path>) -> Vec<String> {
        self.meta(&path.into())
            .map(|meta| meta.errors.clone())
            .unwrap_or_default()
    }

    pub fn is_field_touched(&self, path: impl Into<Path>) -> bool {
        self.meta(&path.into()).map_or(false, |meta| meta.touched)
    }
}

pub(crate) struct StoreState {
    pub(crate) values: Node,
    pub(crate) initial_values: Node,
    /// Bumped on every committed change to `values`.
    pub(crate) generation: u64,
    /// Last epoch handed to a [`FieldMeta`].
    pub(crate) meta_epoch: u64,
    pub(crate) metas: BTreeMap<Path, FieldMeta>,
    pub(crate) registry: FieldRegistry,
    pub(crate) graph: DependencyGraph,
    pub(crate) callbacks: Callbacks,
    pub(crate) messages: Arc<ValidateMessages>,
    pub(crate) preserve: bool,
    pub(crate) validate_trigger: Vec<String>,
    pub(crate) evaluator: Arc<dyn RuleEvaluator>,
}

impl StoreState {
    fn new(config: FormConfig) -> Self {
        let initial_values = Node::from(config.initial_values);
        Self {
            values: initial_values.clone(),
            initial_values,
            generation: 0,
            meta_epoch: 0,
            metas: BTreeMap::new(),
            registry: FieldRegistry::default(),
            graph: DependencyGraph::default(),
            callbacks: Callbacks::default(),
            messages: Arc::new(config.validate_messages),
            preserve: config.preserve,
            validate_trigger: config.validate_trigger,
            evaluator: config.evaluator,
        }
    }

    /// Install `next` as the value tree. Returns false when nothing changed.
    pub(crate) fn commit(&mut self, next: Node) -> bool {
        if next.same(&self.values) {
            return false;
        }
        self.values = next;
        self.generation += 1;
        true
    }

    pub(crate) fn meta_mut(&mut self, path: &Path) -> &mut FieldMeta {
        let epoch = &mut self.meta_epoch;
        self.metas.entry(path.clone()).or_insert_with(|| {
            *epoch += 1;
            FieldMeta::fresh(*epoch)
        })
    }

    fn next_meta_epoch(&mut self) -> u64 {
        self.meta_epoch += 1;
        self.meta_epoch
    }

    pub(crate) fn meta(&self, path: &Path) -> Meta {
        self.metas
            .get(path)
            .map(|meta| meta.to_meta(path))
            .unwrap_or_else(|| Meta {
                name: path.clone(),
                ..Meta::default()
            })
    }

    pub(crate) fn snapshot(&self) -> FormSnapshot {
        let metas = self
            .metas
            .iter()
            .map(|(path, meta)| (path.clone(), meta.to_meta(path)))
            .collect();
        FormSnapshot {
            values: self.values.clone(),
            metas: Arc::new(metas),
        }
    }

    pub(crate) fn field_state(&self, path: &Path) -> FieldState {
        let meta = self.meta(path);
        FieldState {
            value: get_at_path(&self.values, path).map(Value::from),
            name: meta.name,
            touched: meta.touched,
            validating: meta.validating,
            errors: meta.errors,
            warnings: meta.warnings,
        }
    }

    /// Triggers that validate the field at `path`.
    pub(crate) fn triggers(&self, path: &Path) -> &[String] {
        self.registry
            .primary_at(path)
            .and_then(|entry| entry.props.validate_trigger.as_deref())
            .unwrap_or(&self.validate_trigger)
    }

    pub(crate) fn triggers_on(&self, path: &Path, trigger: &str) -> bool {
        self.triggers(path).iter().any(|t| t == trigger)
    }

    /// Entity initial value at `path`, else the form's.
    fn initial_value_at(&self, path: &Path) -> Option<Node> {
        self.registry
            .at(path)
            .iter()
            .filter_map(|id| self.registry.get(*id))
            .find_map(|entry| entry.props.initial_value.as_ref().map(Node::from))
            .or_else(|| get_at_path(&self.initial_values, path).cloned())
    }

    fn subscribers(&self, ids: impl IntoIterator<Item = FieldId>) -> Vec<Arc<dyn FieldSubscriber>> {
        ids.into_iter()
            .filter_map(|id| self.registry.get(id))
            .map(|entry| Arc::clone(&entry.subscriber))
            .collect()
    }

    fn matching_all(&self, paths: &[Path]) -> BTreeSet<FieldId> {
        paths
            .iter()
            .flat_map(|path| self.registry.matching(path))
            .collect()
    }

    pub(crate) fn change(&self, info: NotifyInfo, prev: &Node, name_paths: Option<Vec<Path>>) -> StoreChange {
        StoreChange {
            info,
            store: self.values.clone(),
            prev_store: prev.clone(),
            name_paths,
        }
    }

    /// Notify every field a change at one of `paths` reaches.
    pub(crate) fn notify_matching(&self, outbox: &mut Outbox, paths: &[Path], info: NotifyInfo, prev: &Node) {
        let recipients = self.subscribers(self.matching_all(paths));
        outbox.notify(recipients, self.change(info, prev, Some(paths.to_vec())));
    }

    /// Queue `on_fields_change` for `changed`.
    pub(crate) fn fields_change(&self, outbox: &mut Outbox, changed: &[Path]) {
        let Some(callback) = self.callbacks.on_fields_change.clone() else {
            return;
        };
        let changed: Vec<FieldState> = changed.iter().map(|path| self.field_state(path)).collect();
        let all: Vec<FieldState> = self
            .registry
            .named_paths(false)
            .iter()
            .map(|path| self.field_state(path))
            .collect();
        outbox.callback("on_fields_change", move || callback(&changed, &all));
    }

    pub(crate) fn all_field_states(&self) -> Vec<FieldState> {
        self.registry
            .named_paths(false)
            .iter()
            .map(|path| self.field_state(path))
            .collect()
    }
}

pub(crate) struct FormInner {
    pub(crate) state: Mutex<StoreState>,
}

/// A form store. Cloning is cheap and clones share state.
#[derive(Clone)]
pub struct Form {
    pub(crate) inner: Arc<FormInner>,
}

impl Default for Form {
    fn default() -> Self {
        Self::new(FormConfig::default())
    }
}

impl fmt::Debug for Form {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("Form")
            .field("generation", &state.generation)
            .field("fields", &state.registry.len())
            .field("metas", &state.metas.len())
            .field("evaluator", &state.evaluator.name())
            .finish()
    }
}

impl Form {
    pub fn new(config: FormConfig) -> Self {
        Self {
            inner: Arc::new(FormInner {
                state: Mutex::new(StoreState::new(config)),
            }),
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` under the lock, then deliver what it queued.
    pub(crate) fn mutate<R>(&self, f: impl FnOnce(&mut StoreState, &mut Outbox) -> R) -> R {
        let mut outbox = Outbox::default();
        let result = {
            let mut state = self.lock();
            f(&mut state, &mut outbox)
        };
        outbox.flush();
        result
    }

    // ========================================================================
    // Reads
    // ========================================================================

    pub fn get_field_value(&self, path: impl Into<Path>) -> Option<Value> {
        let path = path.into();
        get_at_path(&self.lock().values, &path).map(Value::from)
    }

    /// Read several fields at once.
    ///
    /// `FieldSelection::All` without a filter returns the whole tree. Any
    /// other selection returns a tree holding only the selected paths, kept
    /// when `filter` accepts their meta.
    pub fn get_fields_value(&self, selection: FieldSelection, filter: Option<MetaFilter<'_>>) -> Value {
        let (values, candidates) = {
            let state = self.lock();
            let paths = match selection {
                FieldSelection::All if filter.is_none() => return state.values.to_value(),
                FieldSelection::All => state.registry.named_paths(false),
                FieldSelection::Mounted => state.registry.named_paths(true),
                FieldSelection::Paths(paths) => paths,
            };
            let candidates: Vec<(Path, Meta)> = paths
                .into_iter()
                .map(|path| {
                    let meta = state.meta(&path);
                    (path, meta)
                })
                .collect();
            (state.values.clone(), candidates)
        };
        let kept: Vec<Path> = candidates
            .into_iter()
            .filter(|(_, meta)| filter.map_or(true, |f| f(meta)))
            .map(|(path, _)| path)
            .collect();
        pick(&values, &kept).to_value()
    }

    pub fn get_field_error(&self, path: impl Into<Path>) -> Vec<String> {
        self.lock().meta(&path.into()).errors
    }

    pub fn get_field_warning(&self, path: impl Into<Path>) -> Vec<String> {
        self.lock().meta(&path.into()).warnings
    }

    /// Errors and warnings per path; `None` reads every mounted field.
    pub fn get_fields_error(&self, paths: Option<Vec<Path>>) -> Vec<FieldError> {
        let state = self.lock();
        let paths = paths.unwrap_or_else(|| state.registry.named_paths(false));
        paths
            .iter()
            .map(|path| {
                let meta = state.meta(path);
                FieldError {
                    name: meta.name,
                    errors: meta.errors,
                    warnings: meta.warnings,
                }
            })
            .collect()
    }

    /// Whether the field at `path`, or any field below it, is touched.
    pub fn is_field_touched(&self, path: impl Into<Path>) -> bool {
        self.is_fields_touched(Some(vec![path.into()]), false)
    }

    /// Touched state over groups of fields.
    ///
    /// With `paths`, each path forms a group of the fields at or below it,
    /// and a group is touched when any member is. Without, every mounted
    /// field is its own group. `require_all` asks for every group to be
    /// touched instead of any.
    pub fn is_fields_touched(&self, paths: Option<Vec<Path>>, require_all: bool) -> bool {
        let state = self.lock();
        let touched = |path: &Path| state.metas.get(path).map_or(false, |meta| meta.touched);
        let groups: Vec<bool> = match paths {
            None => state.registry.named_paths(false).iter().map(touched).collect(),
            Some(paths) => paths
                .iter()
                .map(|prefix| {
                    state
                        .metas
                        .range(prefix.clone()..)
                        .take_while(|(path, _)| prefix.is_prefix_of(path))
                        .any(|(_, meta)| meta.touched)
                })
                .collect(),
        };
        if require_all {
            groups.iter().all(|touched| *touched)
        } else {
            groups.iter().any(|touched| *touched)
        }
    }

    pub fn is_field_validating(&self, path: impl Into<Path>) -> bool {
        self.lock()
            .metas
            .get(&path.into())
            .map_or(false, |meta| meta.validating > 0)
    }

    /// Whether any of `paths` (every field when `None`) is validating.
    pub fn is_fields_validating(&self, paths: Option<Vec<Path>>) -> bool {
        let state = self.lock();
        match paths {
            None => state.metas.values().any(|meta| meta.validating > 0),
            Some(paths) => paths
                .iter()
                .any(|path| state.metas.get(path).map_or(false, |meta| meta.validating > 0)),
        }
    }

    pub fn snapshot(&self) -> FormSnapshot {
        self.lock().snapshot()
    }

    /// Number of committed changes to the value tree so far.
    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Apply externally supplied field states as given.
    ///
    /// Each entry updates only the attributes it carries. Meta attributes
    /// are kept only for paths a mounted field owns. No validation and no
    /// dependency revalidation runs.
    pub fn set_fields(&self, fields: Vec<FieldData>) {
        self.mutate(|state, outbox| {
            let mut changed = Vec::with_capacity(fields.len());
            for data in fields {
                let prev = state.values.clone();
                if let Some(value) = &data.value {
                    let next = set_at_path(&prev, &data.name, Node::from(value));
                    state.commit(next);
                }
                if state.registry.owns(&data.name) {
                    let meta = state.meta_mut(&data.name);
                    if let Some(touched) = data.touched {
                        meta.touched = touched;
                    }
                    if let Some(validating) = data.validating {
                        meta.validating = if validating { meta.validating.max(1) } else { 0 };
                    }
                    if let Some(errors) = &data.errors {
                        meta.errors = errors.clone();
                    }
                    if let Some(warnings) = &data.warnings {
                        meta.warnings = warnings.clone();
                    }
                }
                let name = data.name.clone();
                state.notify_matching(outbox, std::slice::from_ref(&name), NotifyInfo::SetField { data }, &prev);
                changed.push(name);
            }
            state.fields_change(outbox, &changed);
        });
    }

    /// Deep-merge `values` into the tree.
    ///
    /// Fields at changed paths and their dependents are notified. Nothing
    /// is validated.
    pub fn set_fields_value(&self, values: Value) {
        self.mutate(|state, outbox| {
            let partial = Node::from(values);
            let prev = state.values.clone();
            let next = merge(&prev, &partial);
            let changed: Vec<Path> = leaf_paths(&partial)
                .into_iter()
                .filter(|path| get_at_path(&prev, path) != get_at_path(&next, path))
                .collect();
            if changed.is_empty() {
                return;
            }
            state.commit(next);

            let closure = state.graph.closure(&changed, &state.registry);
            let mut recipients = state.matching_all(&changed);
            recipients.extend(closure.fields.iter().copied());
            let mut name_paths = changed;
            name_paths.extend(closure.paths);
            tracing::debug!(paths = name_paths.len(), "external value update");
            outbox.notify(
                state.subscribers(recipients),
                state.change(
                    NotifyInfo::ValueUpdate {
                        source: ValueSource::External,
                    },
                    &prev,
                    Some(name_paths),
                ),
            );
        });
    }

    /// Restore `paths` (every field when `None`) to their initial values and
    /// clear their meta.
    ///
    /// A path takes the initial value of a mounted field bound to it, else
    /// the form's initial value there, else it is removed.
    pub fn reset_fields(&self, paths: Option<Vec<Path>>) {
        self.mutate(|state, outbox| {
            let prev = state.values.clone();
            let next = match &paths {
                None => {
                    let mut next = state.initial_values.clone();
                    for entry in state.registry.entries() {
                        if let (Some(name), Some(initial)) = (entry.name(), &entry.props.initial_value) {
                            next = set_at_path(&next, name, Node::from(initial));
                        }
                    }
                    let registry = &state.registry;
                    state.metas.retain(|path, _| registry.owns(path));
                    let epoch = state.next_meta_epoch();
                    for meta in state.metas.values_mut() {
                        *meta = FieldMeta::fresh(epoch);
                    }
                    next
                }
                Some(paths) => {
                    let mut next = prev.clone();
                    for path in paths {
                        next = match state.initial_value_at(path) {
                            Some(initial) => set_at_path(&next, path, initial),
                            None => delete_at_path(&next, path),
                        };
                        let epoch = state.next_meta_epoch();
                        let below = state
                            .metas
                            .range_mut(path.clone()..)
                            .take_while(|(name, _)| path.is_prefix_of(name));
                        for (_, meta) in below {
                            *meta = FieldMeta::fresh(epoch);
                        }
                    }
                    next
                }
            };
            state.values = next;
            state.generation += 1;
            tracing::debug!(paths = ?paths, generation = state.generation, "fields reset");

            let changed = paths.clone().unwrap_or_else(|| state.registry.named_paths(false));
            let recipients: Vec<FieldId> = match &paths {
                None => state.registry.entries().map(|entry| entry.id).collect(),
                Some(paths) => state.matching_all(paths).into_iter().collect(),
            };
            outbox.notify(state.subscribers(recipients), state.change(NotifyInfo::Reset, &prev, paths));
            state.fields_change(outbox, &changed);
        });
    }

    // ========================================================================
    // Field lifecycle (reached through the internal hooks)
    // ========================================================================

    pub(crate) fn register_field(&self, props: FieldProps, subscriber: Arc<dyn FieldSubscriber>) -> FieldId {
        self.mutate(|state, outbox| {
            let name = props.name.clone();
            let initial = props.initial_value.clone();
            let dependencies = props.dependencies.clone();

            if let (Some(name), Some(initial)) = (&name, &initial) {
                if get_at_path(&state.initial_values, name).is_some() {
                    tracing::warn!(field = %name, "form initial values already cover this field; its own initial value is ignored");
                } else if state
                    .registry
                    .at(name)
                    .iter()
                    .filter_map(|id| state.registry.get(*id))
                    .filter_map(|entry| entry.props.initial_value.as_ref())
                    .any(|other| other != initial)
                {
                    tracing::warn!(field = %name, "fields bound to the same path declare different initial values");
                }
            }

            let id = state.registry.register(props, subscriber);
            state.graph.add(id, &dependencies);
            tracing::debug!(%id, field = ?name.as_ref().map(ToString::to_string), "field registered");

            if let Some(name) = name {
                state.meta_mut(&name);
                if let Some(initial) = initial {
                    if get_at_path(&state.values, &name).is_none() {
                        let prev = state.values.clone();
                        state.commit(set_at_path(&prev, &name, Node::from(initial)));
                        state.notify_matching(
                            outbox,
                            std::slice::from_ref(&name),
                            NotifyInfo::ValueUpdate {
                                source: ValueSource::Internal,
                            },
                            &prev,
                        );
                    }
                }
            }
            id
        })
    }

    pub(crate) fn unregister_field(&self, id: FieldId) {
        self.mutate(|state, outbox| {
            let Some(entry) = state.registry.unregister(id) else {
                return;
            };
            state.graph.remove(id, &entry.props.dependencies);
            tracing::debug!(%id, "field unregistered");

            let Some(name) = entry.name().cloned() else {
                return;
            };
            let owned = state.registry.owns(&name);
            if !owned {
                state.metas.remove(&name);
            }
            let preserve = entry.props.preserve.unwrap_or(state.preserve);
            if preserve || owned || entry.props.is_list_field {
                return;
            }

            let prev = state.values.clone();
            if !state.commit(delete_at_path(&prev, &name)) {
                return;
            }
            let origin = vec![name];
            let closure = state.graph.closure(&origin, &state.registry);
            let mut recipients = state.matching_all(&origin);
            recipients.extend(closure.fields.iter().copied());
            let mut name_paths = origin;
            name_paths.extend(closure.paths);
            outbox.notify(
                state.subscribers(recipients),
                state.change(NotifyInfo::Remove, &prev, Some(name_paths)),
            );
        });
    }

    pub(crate) fn dispatch(&self, action: FieldAction) -> BoxFuture<'static, ()> {
        let runs = self.mutate(|state, outbox| match action {
            FieldAction::UpdateValue { name, value, trigger } => {
                self.update_value(state, outbox, name, value, trigger)
            }
            FieldAction::ValidateField { name, trigger } => {
                tracing::debug!(field = %name, %trigger, "field validation dispatched");
                if state.triggers_on(&name, &trigger) {
                    vec![self.begin_validation(state, outbox, vec![name], Some(trigger))]
                } else {
                    Vec::new()
                }
            }
        });
        Box::pin(async move {
            join_all(runs).await;
        })
    }

    fn update_value(
        &self,
        state: &mut StoreState,
        outbox: &mut Outbox,
        name: Path,
        value: Value,
        trigger: Option<String>,
    ) -> Vec<ValidateFuture> {
        let prev = state.values.clone();
        state.commit(set_at_path(&prev, &name, Node::from(value)));
        if state.registry.owns(&name) {
            let meta = state.meta_mut(&name);
            meta.touched = true;
            meta.dirty = true;
        }
        tracing::debug!(field = %name, generation = state.generation, "value dispatched");

        let origin = std::slice::from_ref(&name);
        state.notify_matching(
            outbox,
            origin,
            NotifyInfo::ValueUpdate {
                source: ValueSource::Internal,
            },
            &prev,
        );
        let closure = state.graph.closure(origin, &state.registry);
        if !closure.is_empty() {
            let mut related = vec![name.clone()];
            related.extend(closure.paths.iter().cloned());
            outbox.notify(
                state.subscribers(closure.fields.iter().copied()),
                state.change(
                    NotifyInfo::DependenciesUpdate {
                        related_fields: related.clone(),
                    },
                    &prev,
                    Some(related),
                ),
            );
        }

        if let Some(callback) = state.callbacks.on_values_change.clone() {
            let changed = pick(&state.values, [&name]).to_value();
            let all = state.values.to_value();
            outbox.callback("on_values_change", move || callback(&changed, &all));
        }
        state.fields_change(outbox, origin);

        let trigger = trigger.unwrap_or_else(|| TRIGGER_ON_CHANGE.to_owned());
        let mut runs = Vec::new();
        if state.triggers_on(&name, &trigger) {
            runs.push(self.begin_validation(state, outbox, vec![name.clone()], Some(trigger)));
        }
        let dependents: Vec<Path> = closure
            .paths
            .into_iter()
            .filter(|path| {
                state.metas.get(path).map_or(false, |meta| meta.dirty)
                    && state.triggers_on(path, TRIGGER_DEPENDENCIES_UPDATE)
            })
            .collect();
        if !dependents.is_empty() {
            runs.push(self.begin_validation(state, outbox, dependents, None));
        }
        runs
    }

    pub(crate) fn set_initial_values(&self, values: Value, first_mount: bool) {
        self.mutate(|state, _| {
            state.initial_values = Node::from(values);
            if first_mount {
                let next = merge(&state.initial_values, &state.values);
                state.commit(next);
            }
        });
    }

    pub(crate) fn set_callbacks(&self, callbacks: Callbacks) {
        self.lock().callbacks = callbacks;
    }

    pub(crate) fn set_validate_messages(&self, messages: ValidateMessages) {
        self.lock().messages = Arc::new(messages);
    }

    pub(crate) fn set_preserve(&self, preserve: bool) {
        self.lock().preserve = preserve;
    }

    pub(crate) fn get_fields(&self) -> Vec<FieldState> {
        self.lock().all_field_states()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::NoOpSubscriber;
    use formwork_state::path;
    use serde_json::json;

    #[test]
    fn test_get_fields_value_selections() {
        let form = Form::new(FormConfig::default().with_initial_values(json!({
            "a": 1, "b": {"c": 2}, "list": [{"x": 1}], "orphan": true
        })));
        form.register_field(FieldProps::new("a"), NoOpSubscriber::arc());
        form.register_field(FieldProps::new(path!("b", "c")), NoOpSubscriber::arc());
        form.register_field(FieldProps::new(path!("list", 0)).list_field(), NoOpSubscriber::arc());

        assert_eq!(
            form.get_fields_value(FieldSelection::All, None),
            json!({"a": 1, "b": {"c": 2}, "list": [{"x": 1}], "orphan": true})
        );
        assert_eq!(
            form.get_fields_value(FieldSelection::Mounted, None),
            json!({"a": 1, "b": {"c": 2}})
        );
        assert_eq!(
            form.get_fields_value(FieldSelection::Paths(vec![path!("b")]), None),
            json!({"b": {"c": 2}})
        );

        form.set_fields(vec![FieldData::new("a").with_touched(true)]);
        let touched_only = |meta: &Meta| meta.touched;
        assert_eq!(
            form.get_fields_value(FieldSelection::All, Some(&touched_only)),
            json!({"a": 1})
        );
    }

    #[test]
    fn test_absent_reads() {
        let form = Form::default();
        assert_eq!(form.get_field_value(path!("nope", 3)), None);
        assert!(form.get_field_error("nope").is_empty());
        assert!(!form.is_field_touched("nope"));
        assert!(!form.is_field_validating("nope"));
    }

    #[test]
    fn test_set_fields_value_only_counts_real_changes() {
        let form = Form::new(FormConfig::default().with_initial_values(json!({"a": 1})));
        let before = form.generation();
        form.set_fields_value(json!({"a": 1}));
        assert_eq!(form.generation(), before);
        form.set_fields_value(json!({"a": 2, "b": {"c": 3}}));
        assert_eq!(form.generation(), before + 1);
        assert_eq!(form.get_field_value(path!("b", "c")), Some(json!(3)));
    }

    #[test]
    fn test_is_fields_touched_groups() {
        let form = Form::default();
        form.register_field(FieldProps::new(path!("user", "name")), NoOpSubscriber::arc());
        form.register_field(FieldProps::new(path!("user", "age")), NoOpSubscriber::arc());
        form.register_field(FieldProps::new("email"), NoOpSubscriber::arc());

        assert!(!form.is_fields_touched(None, false));
        form.set_fields(vec![FieldData::new(path!("user", "age")).with_touched(true)]);

        assert!(form.is_field_touched("user"));
        assert!(form.is_fields_touched(Some(vec![path!("user"), path!("email")]), false));
        assert!(!form.is_fields_touched(Some(vec![path!("user"), path!("email")]), true));
        assert!(!form.is_fields_touched(None, true));

        form.set_fields(vec![FieldData::new("email").with_touched(true)]);
        assert!(form.is_fields_touched(Some(vec![path!("user"), path!("email")]), true));
    }

    #[test]
    fn test_register_writes_initial_value_once() {
        let form = Form::default();
        form.register_field(
            FieldProps::new("name").with_initial_value(json!("alice")),
            NoOpSubscriber::arc(),
        );
        form.register_field(
            FieldProps::new("name").with_initial_value(json!("bob")),
            NoOpSubscriber::arc(),
        );
        assert_eq!(form.get_field_value("name"), Some(json!("alice")));
    }

    #[test]
    fn test_set_initial_values_keeps_current_values() {
        let form = Form::default();
        form.set_fields_value(json!({"a": "typed"}));
        form.set_initial_values(json!({"a": "init", "b": "init"}), true);
        assert_eq!(form.get_fields_value(FieldSelection::All, None), json!({"a": "typed", "b": "init"}));
    }

    #[test]
    fn test_unregister_unknown_is_noop() {
        let form = Form::default();
        let id = form.register_field(FieldProps::new("a"), NoOpSubscriber::arc());
        form.unregister_field(id);
        form.unregister_field(id);
        assert!(form.get_fields().is_empty());
    }
}
