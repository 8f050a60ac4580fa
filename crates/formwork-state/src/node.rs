//! Persistent JSON nodes.
//!
//! `Node` mirrors `serde_json::Value`, but containers sit behind `Arc` so a
//! clone is a pointer copy and an update only copies the spine leading to the
//! changed value. Subtrees an update did not touch stay pointer-identical,
//! which [`Node::same`] exposes as a cheap "did this change" check.

use crate::error::StateResult;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Number, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Object members of a [`Node`].
pub type NodeMap = BTreeMap<String, Node>;

/// A value in the form store.
#[derive(Clone, Debug, Default)]
pub enum Node {
    #[default]
    Null,
    Bool(bool),
    Number(Number),
    String(Arc<str>),
    Array(Arc<Vec<Node>>),
    Object(Arc<NodeMap>),
}

impl Node {
    /// An empty object, the shape of a fresh store.
    pub fn empty_object() -> Self {
        Node::Object(Arc::default())
    }

    /// Parse a node from JSON text.
    pub fn parse(text: &str) -> StateResult<Self> {
        let value: Value = serde_json::from_str(text)?;
        Ok(Node::from(value))
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Node::Null)
    }

    #[inline]
    pub fn is_object(&self) -> bool {
        matches!(self, Node::Object(_))
    }

    #[inline]
    pub fn is_array(&self) -> bool {
        matches!(self, Node::Array(_))
    }

    pub fn as_object(&self) -> Option<&NodeMap> {
        match self {
            Node::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Node]> {
        match self {
            Node::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Node::String(s) => Some(s),
            _ => None,
        }
    }

    /// Identity comparison.
    ///
    /// Containers compare by pointer, scalars by value. Two nodes that are
    /// `same` are always equal; equal nodes need not be `same`.
    pub fn same(&self, other: &Node) -> bool {
        match (self, other) {
            (Node::Array(a), Node::Array(b)) => Arc::ptr_eq(a, b),
            (Node::Object(a), Node::Object(b)) => Arc::ptr_eq(a, b),
            (Node::Array(_) | Node::Object(_), _) | (_, Node::Array(_) | Node::Object(_)) => false,
            (a, b) => a == b,
        }
    }

    /// Deep-convert into a `serde_json::Value`.
    pub fn to_value(&self) -> Value {
        Value::from(self)
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Node::Null, Node::Null) => true,
            (Node::Bool(a), Node::Bool(b)) => a == b,
            (Node::Number(a), Node::Number(b)) => a == b,
            (Node::String(a), Node::String(b)) => a == b,
            (Node::Array(a), Node::Array(b)) => Arc::ptr_eq(a, b) || a == b,
            (Node::Object(a), Node::Object(b)) => Arc::ptr_eq(a, b) || a == b,
            _ => false,
        }
    }
}

impl From<Value> for Node {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Node::Null,
            Value::Bool(b) => Node::Bool(b),
            Value::Number(n) => Node::Number(n),
            Value::String(s) => Node::String(Arc::from(s)),
            Value::Array(items) => Node::Array(Arc::new(items.into_iter().map(Node::from).collect())),
            Value::Object(map) => Node::Object(Arc::new(
                map.into_iter().map(|(k, v)| (k, Node::from(v))).collect(),
            )),
        }
    }
}

impl From<&Value> for Node {
    fn from(value: &Value) -> Self {
        Node::from(value.clone())
    }
}

impl From<&Node> for Value {
    fn from(node: &Node) -> Self {
        match node {
            Node::Null => Value::Null,
            Node::Bool(b) => Value::Bool(*b),
            Node::Number(n) => Value::Number(n.clone()),
            Node::String(s) => Value::String(s.to_string()),
            Node::Array(items) => Value::Array(items.iter().map(Value::from).collect()),
            Node::Object(map) => Value::Object(
                map.iter().map(|(k, v)| (k.clone(), Value::from(v))).collect(),
            ),
        }
    }
}

impl From<Node> for Value {
    fn from(node: Node) -> Self {
        Value::from(&node)
    }
}

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Node::Null => serializer.serialize_unit(),
            Node::Bool(b) => serializer.serialize_bool(*b),
            Node::Number(n) => n.serialize(serializer),
            Node::String(s) => serializer.serialize_str(s),
            Node::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items.iter() {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Node::Object(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (k, v) in map.iter() {
                    out.serialize_entry(k, v)?;
                }
                out.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for Node {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Node::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_value_round_trip() {
        let value = json!({"a": [1, "two", null, {"b": true}], "c": 1.5});
        let node = Node::from(value.clone());
        assert_eq!(node.to_value(), value);
        assert_eq!(serde_json::to_value(&node).unwrap(), value);
    }

    #[test]
    fn test_clone_is_same() {
        let node = Node::from(json!({"a": {"b": 1}}));
        let copy = node.clone();
        assert!(node.same(&copy));
    }

    #[test]
    fn test_equal_but_not_same() {
        let a = Node::from(json!({"x": 1}));
        let b = Node::from(json!({"x": 1}));
        assert_eq!(a, b);
        assert!(!a.same(&b));
        assert!(Node::from(json!(3)).same(&Node::from(json!(3))));
    }

    #[test]
    fn test_parse() {
        let node = Node::parse(r#"{"name": "alice"}"#).unwrap();
        assert_eq!(node.as_object().unwrap()["name"].as_str(), Some("alice"));
        assert!(Node::parse("{not json").is_err());
    }
}
