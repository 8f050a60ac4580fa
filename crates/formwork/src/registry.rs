//! Bookkeeping of mounted fields.
//!
//! Fields are stored in registration order and indexed by name path. The
//! name index is a `BTreeMap<Path, _>`: every path below a prefix sorts into
//! one contiguous range after it, so prefix lookups are range scans.

use crate::field::{FieldId, FieldProps, FieldSubscriber};
use crate::messages::ValidateMessages;
use formwork_state::Path;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// A mounted field.
#[derive(Clone)]
pub(crate) struct FieldEntry {
    pub(crate) id: FieldId,
    pub(crate) props: FieldProps,
    pub(crate) subscriber: Arc<dyn FieldSubscriber>,
    pub(crate) messages: Option<Arc<ValidateMessages>>,
}

impl FieldEntry {
    pub(crate) fn name(&self) -> Option<&Path> {
        self.props.name.as_ref()
    }

    pub(crate) fn has_rules(&self) -> bool {
        !self.props.rules.is_empty()
    }
}

#[derive(Default)]
pub(crate) struct FieldRegistry {
    next_id: u64,
    entries: BTreeMap<FieldId, FieldEntry>,
    by_name: BTreeMap<Path, Vec<FieldId>>,
    lists: BTreeSet<FieldId>,
}

impl FieldRegistry {
    pub(crate) fn register(&mut self, mut props: FieldProps, subscriber: Arc<dyn FieldSubscriber>) -> FieldId {
        self.next_id += 1;
        let id = FieldId(self.next_id);
        if let Some(name) = &props.name {
            self.by_name.entry(name.clone()).or_default().push(id);
            if props.is_list {
                self.lists.insert(id);
            }
        }
        let messages = props.validate_messages.take().map(Arc::new);
        self.entries.insert(
            id,
            FieldEntry {
                id,
                props,
                subscriber,
                messages,
            },
        );
        id
    }

    pub(crate) fn unregister(&mut self, id: FieldId) -> Option<FieldEntry> {
        let entry = self.entries.remove(&id)?;
        self.lists.remove(&id);
        if let Some(name) = entry.name() {
            if let Some(ids) = self.by_name.get_mut(name) {
                ids.retain(|other| *other != id);
                if ids.is_empty() {
                    self.by_name.remove(name);
                }
            }
        }
        Some(entry)
    }

    pub(crate) fn get(&self, id: FieldId) -> Option<&FieldEntry> {
        self.entries.get(&id)
    }

    /// All mounted fields in registration order.
    pub(crate) fn entries(&self) -> impl Iterator<Item = &FieldEntry> {
        self.entries.values()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Fields bound to exactly `path`.
    pub(crate) fn at(&self, path: &Path) -> &[FieldId] {
        self.by_name.get(path).map(Vec::as_slice).unwrap_or_default()
    }

    /// Whether any mounted field is bound to exactly `path`.
    pub(crate) fn owns(&self, path: &Path) -> bool {
        self.by_name.contains_key(path)
    }

    /// The field that supplies rules and triggers for `path`: the first one
    /// with rules, else the first one.
    pub(crate) fn primary_at(&self, path: &Path) -> Option<&FieldEntry> {
        let mut fields = self.at(path).iter().filter_map(|id| self.entries.get(id));
        let first = fields.next()?;
        if first.has_rules() {
            return Some(first);
        }
        fields.find(|entry| entry.has_rules()).or(Some(first))
    }

    /// Distinct named paths in registration order.
    pub(crate) fn named_paths(&self, skip_list_fields: bool) -> Vec<Path> {
        let mut seen = BTreeSet::new();
        self.entries
            .values()
            .filter(|entry| !(skip_list_fields && entry.props.is_list_field))
            .filter_map(FieldEntry::name)
            .filter(|name| seen.insert((*name).clone()))
            .cloned()
            .collect()
    }

    /// Named paths at or below `prefix`.
    pub(crate) fn paths_under<'a>(&'a self, prefix: &'a Path) -> impl Iterator<Item = &'a Path> + 'a {
        self.by_name
            .range(prefix.clone()..)
            .map(|(path, _)| path)
            .take_while(move |path| prefix.is_prefix_of(path))
    }

    /// Fields whose own path a change at `changed` reaches.
    ///
    /// Covers exact matches, fields above and below `changed`, and list
    /// containers with the same shape at a different index. Result is in
    /// registration order.
    pub(crate) fn matching(&self, changed: &Path) -> Vec<FieldId> {
        let mut found = BTreeSet::new();
        for ancestor in changed.ancestors() {
            found.extend(self.at(&ancestor).iter().copied());
        }
        for path in self.paths_under(changed) {
            found.extend(self.at(path).iter().copied());
        }
        for id in &self.lists {
            let Some(name) = self.entries.get(id).and_then(FieldEntry::name) else {
                continue;
            };
            if Path::match_position(changed, name, true).affects() {
                found.insert(*id);
            }
        }
        found.into_iter().collect()
    }
}
