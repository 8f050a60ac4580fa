//! Dependency edges between fields.
//!
//! Edges are kept as `dependency path -> dependents`, updated as fields
//! mount and unmount. [`DependencyGraph::closure`] walks them breadth-first
//! from the paths a write touched.

use crate::field::FieldId;
use crate::registry::FieldRegistry;
use formwork_state::Path;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// Fields reached from a change, and the paths they live at.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct DependencyClosure {
    /// Every reached field, in discovery order. Includes nameless watchers.
    pub(crate) fields: Vec<FieldId>,
    /// Paths of the reached named fields, in discovery order.
    pub(crate) paths: Vec<Path>,
}

impl DependencyClosure {
    pub(crate) fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[derive(Debug, Default)]
pub(crate) struct DependencyGraph {
    edges: BTreeMap<Path, BTreeSet<FieldId>>,
}

impl DependencyGraph {
    pub(crate) fn add(&mut self, id: FieldId, dependencies: &[Path]) {
        for dependency in dependencies {
            self.edges.entry(dependency.clone()).or_default().insert(id);
        }
    }

    pub(crate) fn remove(&mut self, id: FieldId, dependencies: &[Path]) {
        for dependency in dependencies {
            if let Some(dependents) = self.edges.get_mut(dependency) {
                dependents.remove(&id);
                if dependents.is_empty() {
                    self.edges.remove(dependency);
                }
            }
        }
    }

    /// Fields with a dependency that intersects `changed`.
    fn dependents_of(&self, changed: &Path) -> BTreeSet<FieldId> {
        let mut found = BTreeSet::new();
        for ancestor in changed.ancestors() {
            if let Some(ids) = self.edges.get(&ancestor) {
                found.extend(ids.iter().copied());
            }
        }
        let below = self
            .edges
            .range(changed.clone()..)
            .take_while(|(path, _)| changed.is_prefix_of(path));
        for (_, ids) in below {
            found.extend(ids.iter().copied());
        }
        found
    }

    /// Breadth-first closure of the dependents of `origins`.
    ///
    /// Each field appears at most once. Fields bound to an origin path are
    /// never added, so a cycle leading back to the origin stops there.
    /// Shadow fields at a reached path come along with it. Watchers are
    /// recorded but not followed, since they own no path.
    pub(crate) fn closure(&self, origins: &[Path], registry: &FieldRegistry) -> DependencyClosure {
        let origin_set: BTreeSet<&Path> = origins.iter().collect();
        let mut visited: BTreeSet<Path> = origins.iter().cloned().collect();
        let mut queue: VecDeque<Path> = origins.iter().cloned().collect();
        let mut seen = BTreeSet::new();
        let mut closure = DependencyClosure::default();

        while let Some(path) = queue.pop_front() {
            for id in self.dependents_of(&path) {
                if seen.contains(&id) {
                    continue;
                }
                let Some(entry) = registry.get(id) else {
                    continue;
                };
                let Some(name) = entry.name() else {
                    seen.insert(id);
                    closure.fields.push(id);
                    continue;
                };
                if origin_set.contains(name) {
                    continue;
                }
                seen.insert(id);
                closure.fields.push(id);
                if visited.insert(name.clone()) {
                    closure.paths.push(name.clone());
                    queue.push_back(name.clone());
                    for shadow in registry.at(name) {
                        if seen.insert(*shadow) {
                            closure.fields.push(*shadow);
                        }
                    }
                }
            }
        }
        closure
    }
}
