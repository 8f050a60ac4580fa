//! Path-addressed reads and copy-on-write updates over [`Node`] trees.
//!
//! Every update is a pure function: it takes the previous root and returns a
//! new one. Only the containers on the path to the changed value are copied;
//! everything else is shared with the previous root.

use crate::{Node, NodeMap, Path, Seg};
use std::sync::Arc;

/// Read the value at `path`, or `None` when any segment is absent.
///
/// An index segment also addresses an object member named after the index,
/// matching how [`set_at_path`] writes through objects.
///
/// ```
/// use formwork_state::{get_at_path, path, Node};
/// use serde_json::json;
///
/// let root = Node::from(json!({"users": [{"name": "alice"}]}));
/// assert_eq!(get_at_path(&root, &path!("users", 0, "name")).unwrap().as_str(), Some("alice"));
/// assert!(get_at_path(&root, &path!("users", 1)).is_none());
/// ```
pub fn get_at_path<'a>(root: &'a Node, path: &Path) -> Option<&'a Node> {
    let mut current = root;
    for seg in path.segments() {
        current = match (current, seg) {
            (Node::Object(map), Seg::Key(key)) => map.get(key)?,
            (Node::Object(map), Seg::Index(index)) => map.get(&index.to_string())?,
            (Node::Array(items), Seg::Index(index)) => items.get(*index)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Return a new root with `value` stored at `path`.
///
/// Absent intermediate containers are created from the segment that indexes
/// them: an array for an index segment, an object for a key segment. Writing
/// past the end of an array pads it with nulls.
///
/// ```
/// use formwork_state::{get_at_path, path, set_at_path, Node};
/// use serde_json::json;
///
/// let root = Node::empty_object();
/// let next = set_at_path(&root, &path!("list", 1, "name"), Node::from(json!("bob")));
/// assert_eq!(next.to_value(), json!({"list": [null, {"name": "bob"}]}));
/// // The input tree is unchanged
/// assert_eq!(root.to_value(), json!({}));
/// ```
pub fn set_at_path(root: &Node, path: &Path, value: Node) -> Node {
    let mut next = root.clone();
    write(&mut next, path.segments(), value);
    next
}

fn write(current: &mut Node, segments: &[Seg], value: Node) {
    match segments.split_first() {
        None => *current = value,
        Some((Seg::Key(key), rest)) => write(object_entry(current, key.clone()), rest, value),
        Some((Seg::Index(index), rest)) => write(array_slot(current, *index), rest, value),
    }
}

fn object_entry(current: &mut Node, key: String) -> &mut Node {
    match current {
        Node::Object(map) => Arc::make_mut(map).entry(key).or_default(),
        Node::Array(items) => {
            let converted: NodeMap = items
                .iter()
                .enumerate()
                .map(|(i, item)| (i.to_string(), item.clone()))
                .collect();
            *current = Node::Object(Arc::new(converted));
            object_entry(current, key)
        }
        other => {
            *other = Node::empty_object();
            object_entry(other, key)
        }
    }
}

fn array_slot(current: &mut Node, index: usize) -> &mut Node {
    match current {
        Node::Array(items) => {
            let items = Arc::make_mut(items);
            if items.len() <= index {
                items.resize(index + 1, Node::Null);
            }
            &mut items[index]
        }
        Node::Object(_) => object_entry(current, index.to_string()),
        other => {
            *other = Node::Array(Arc::default());
            array_slot(other, index)
        }
    }
}

/// Return a new root without the value at `path`.
///
/// Object members are removed. Array slots are cleared to null so the
/// indices of their siblings never shift. Deleting an absent path, or the
/// root itself, returns the input root unchanged.
pub fn delete_at_path(root: &Node, path: &Path) -> Node {
    if path.is_empty() || get_at_path(root, path).is_none() {
        return root.clone();
    }
    let mut next = root.clone();
    remove(&mut next, path.segments());
    next
}

fn remove(current: &mut Node, segments: &[Seg]) {
    match segments {
        [] => {}
        [last] => match (current, last) {
            (Node::Object(map), Seg::Key(key)) => {
                Arc::make_mut(map).remove(key);
            }
            (Node::Object(map), Seg::Index(index)) => {
                Arc::make_mut(map).remove(&index.to_string());
            }
            (Node::Array(items), Seg::Index(index)) => {
                if let Some(slot) = Arc::make_mut(items).get_mut(*index) {
                    *slot = Node::Null;
                }
            }
            _ => {}
        },
        [head, rest @ ..] => {
            if let Some(child) = child_mut(current, head) {
                remove(child, rest);
            }
        }
    }
}

fn child_mut<'a>(current: &'a mut Node, seg: &Seg) -> Option<&'a mut Node> {
    match (current, seg) {
        (Node::Object(map), Seg::Key(key)) => Arc::make_mut(map).get_mut(key),
        (Node::Object(map), Seg::Index(index)) => Arc::make_mut(map).get_mut(&index.to_string()),
        (Node::Array(items), Seg::Index(index)) => Arc::make_mut(items).get_mut(*index),
        _ => None,
    }
}

/// Deep-merge `partial` into `root`.
///
/// Objects are merged member by member; arrays and scalars in `partial`
/// replace what was there wholesale. Members of `root` that `partial` does
/// not mention stay shared.
///
/// ```
/// use formwork_state::{merge, Node};
/// use serde_json::json;
///
/// let root = Node::from(json!({"user": {"name": "alice", "tags": [1, 2]}, "age": 3}));
/// let next = merge(&root, &Node::from(json!({"user": {"tags": [9]}})));
/// assert_eq!(next.to_value(), json!({"user": {"name": "alice", "tags": [9]}, "age": 3}));
/// ```
pub fn merge(root: &Node, partial: &Node) -> Node {
    match (root, partial) {
        (Node::Object(base), Node::Object(patch)) => {
            if patch.is_empty() {
                return root.clone();
            }
            let mut merged = Arc::clone(base);
            let map = Arc::make_mut(&mut merged);
            for (key, value) in patch.iter() {
                let next = match map.get(key) {
                    Some(existing) => merge(existing, value),
                    None => value.clone(),
                };
                map.insert(key.clone(), next);
            }
            Node::Object(merged)
        }
        _ => partial.clone(),
    }
}

/// Paths of the leaves of a partial tree, in key order.
///
/// Objects are descended into; arrays, scalars and empty objects are leaves.
/// A bulk write of `partial` can only have changed values at these paths.
pub fn leaf_paths(partial: &Node) -> Vec<Path> {
    let mut out = Vec::new();
    collect_leaves(partial, &Path::root(), &mut out);
    out
}

fn collect_leaves(node: &Node, prefix: &Path, out: &mut Vec<Path>) {
    match node {
        Node::Object(map) if !map.is_empty() => {
            for (key, child) in map.iter() {
                let mut next = prefix.clone();
                next.push(Seg::Key(key.clone()));
                collect_leaves(child, &next, out);
            }
        }
        _ => out.push(prefix.clone()),
    }
}

/// Build a tree that holds only the values found at `paths`.
///
/// Absent paths are skipped, so the result never contains invented values.
pub fn pick<'a>(root: &Node, paths: impl IntoIterator<Item = &'a Path>) -> Node {
    paths
        .into_iter()
        .fold(Node::empty_object(), |acc, path| match get_at_path(root, path) {
            Some(value) => set_at_path(&acc, path, value.clone()),
            None => acc,
        })
}
