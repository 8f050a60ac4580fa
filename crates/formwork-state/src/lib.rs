//! Name paths and persistent JSON trees for form state.
//!
//! `formwork-state` is the pure layer underneath the `formwork` engine:
//!
//! - [`Path`] / [`Seg`]: name paths with prefix, intersection and
//!   list-aware matching
//! - [`Node`]: a JSON value whose containers are shared behind `Arc`
//! - [`get_at_path`], [`set_at_path`], [`delete_at_path`], [`merge`]: pure
//!   tree transforms that copy only the spine they change
//!
//! # Structural sharing
//!
//! ```
//! use formwork_state::{get_at_path, path, set_at_path, Node};
//! use serde_json::json;
//!
//! let before = Node::from(json!({"profile": {"name": "alice"}, "tags": ["a", "b"]}));
//! let after = set_at_path(&before, &path!("profile", "name"), Node::from(json!("bob")));
//!
//! // The untouched subtree is the very same allocation.
//! let tags_before = get_at_path(&before, &path!("tags")).unwrap();
//! let tags_after = get_at_path(&after, &path!("tags")).unwrap();
//! assert!(tags_before.same(tags_after));
//! ```

mod error;
mod node;
mod path;
mod tree;

pub use error::{value_type_name, StateError, StateResult};
pub use node::{Node, NodeMap};
pub use path::{parse_path, Path, PathMatch, Seg};
pub use tree::{delete_at_path, get_at_path, leaf_paths, merge, pick, set_at_path};

// Re-export serde_json::Value for convenience
pub use serde_json::Value;
