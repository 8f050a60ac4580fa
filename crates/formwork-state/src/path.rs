//! Name paths addressing values inside a nested form store.
//!
//! A path is a sequence of segments. Key segments address object members and
//! index segments address array positions, so `["users", 0, "name"]` reads the
//! `name` of the first user.

use crate::error::{StateError, StateResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// A single segment of a name path.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Seg {
    /// Array position.
    Index(usize),
    /// Object member.
    Key(String),
}

impl Seg {
    fn to_value(&self) -> Value {
        match self {
            Seg::Key(k) => Value::String(k.clone()),
            Seg::Index(i) => Value::from(*i),
        }
    }

    fn from_value(value: &Value) -> StateResult<Self> {
        match value {
            Value::String(s) => Ok(Seg::Key(s.clone())),
            Value::Number(n) => n
                .as_u64()
                .and_then(|i| usize::try_from(i).ok())
                .map(Seg::Index)
                .ok_or_else(|| {
                    StateError::malformed_path(format!("index segment must be a non-negative integer, got {n}"))
                }),
            other => Err(StateError::malformed_path(format!(
                "segment must be a string or an index, got {}",
                crate::value_type_name(other)
            ))),
        }
    }
}

impl fmt::Display for Seg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Seg::Key(k) => write!(f, ".{}", k),
            Seg::Index(i) => write!(f, "[{}]", i),
        }
    }
}

impl From<String> for Seg {
    fn from(s: String) -> Self {
        Seg::Key(s)
    }
}

impl From<&str> for Seg {
    fn from(s: &str) -> Self {
        Seg::Key(s.to_owned())
    }
}

impl From<usize> for Seg {
    fn from(i: usize) -> Self {
        Seg::Index(i)
    }
}

/// How a changed path relates to a path some field declared.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PathMatch {
    /// Both paths are the same.
    Exact,
    /// The changed path is an ancestor of the declared one (`a` vs `a.b`).
    Ancestor,
    /// The changed path lies beneath the declared one (`a.b` vs `a`).
    Descendant,
    /// Same shape once index segments are ignored; only reported for lists.
    ListItem,
    /// The paths address unrelated values.
    Disjoint,
}

impl PathMatch {
    /// Whether a change at one path must reach a field bound to the other.
    #[inline]
    pub fn affects(self) -> bool {
        !matches!(self, PathMatch::Disjoint)
    }
}

/// A complete name path.
///
/// # Examples
///
/// ```
/// use formwork_state::Path;
///
/// let path = Path::root().key("users").index(0).key("name");
/// assert_eq!(path.len(), 3);
/// assert_eq!(path.joined("."), "users.0.name");
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Path(Vec<Seg>);

impl Path {
    /// Create an empty path (the store root).
    #[inline]
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Append a key segment and return self (builder pattern).
    #[inline]
    pub fn key(mut self, k: impl Into<String>) -> Self {
        self.0.push(Seg::Key(k.into()));
        self
    }

    /// Append an index segment and return self (builder pattern).
    #[inline]
    pub fn index(mut self, i: usize) -> Self {
        self.0.push(Seg::Index(i));
        self
    }

    #[inline]
    pub fn push(&mut self, seg: Seg) {
        self.0.push(seg);
    }

    #[inline]
    pub fn segments(&self) -> &[Seg] {
        &self.0
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterate over every proper ancestor, shortest first, including the root.
    pub fn ancestors(&self) -> impl Iterator<Item = Path> + '_ {
        (0..self.0.len()).map(move |len| Path(self.0[..len].to_vec()))
    }

    /// Check if this path is a prefix of another path.
    ///
    /// A path is a prefix of itself.
    ///
    /// ```
    /// use formwork_state::path;
    ///
    /// assert!(path!("user").is_prefix_of(&path!("user", "name")));
    /// assert!(!path!("user", "name").is_prefix_of(&path!("user")));
    /// ```
    #[inline]
    pub fn is_prefix_of(&self, other: &Path) -> bool {
        other.0.starts_with(&self.0)
    }

    /// True when either path is a prefix of the other.
    #[inline]
    pub fn intersects(&self, other: &Path) -> bool {
        self.is_prefix_of(other) || other.is_prefix_of(self)
    }

    /// Equality that treats every index segment as a wildcard.
    ///
    /// `users.0.name` and `users.3.name` are equal under this comparison,
    /// `users.0.name` and `users.name.0` are not.
    pub fn eq_ignoring_indices(&self, other: &Path) -> bool {
        self.len() == other.len()
            && self.0.iter().zip(other.0.iter()).all(|(a, b)| match (a, b) {
                (Seg::Index(_), Seg::Index(_)) => true,
                _ => a == b,
            })
    }

    /// Classify how a `changed` path relates to a `declared` one.
    ///
    /// `is_list` marks the declared path as a list container, which is also
    /// matched by paths of the same shape at other indices.
    pub fn match_position(changed: &Path, declared: &Path, is_list: bool) -> PathMatch {
        if changed == declared {
            PathMatch::Exact
        } else if changed.is_prefix_of(declared) {
            PathMatch::Ancestor
        } else if declared.is_prefix_of(changed) {
            PathMatch::Descendant
        } else if is_list && changed.eq_ignoring_indices(declared) {
            PathMatch::ListItem
        } else {
            PathMatch::Disjoint
        }
    }

    /// Render the segments joined by `sep`, as used in validation messages.
    pub fn joined(&self, sep: &str) -> String {
        self.0
            .iter()
            .map(|seg| match seg {
                Seg::Key(k) => k.clone(),
                Seg::Index(i) => i.to_string(),
            })
            .collect::<Vec<_>>()
            .join(sep)
    }

    /// Encode as a JSON array of keys and indices.
    pub fn to_value(&self) -> Value {
        Value::Array(self.0.iter().map(Seg::to_value).collect())
    }

    /// Iterate over the segments.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Seg> {
        self.0.iter()
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "$")?;
        for seg in &self.0 {
            write!(f, "{}", seg)?;
        }
        Ok(())
    }
}

impl FromIterator<Seg> for Path {
    fn from_iter<I: IntoIterator<Item = Seg>>(iter: I) -> Self {
        Path(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Path {
    type Item = &'a Seg;
    type IntoIter = std::slice::Iter<'a, Seg>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl From<&str> for Path {
    fn from(key: &str) -> Self {
        Path(vec![Seg::from(key)])
    }
}

impl From<String> for Path {
    fn from(key: String) -> Self {
        Path(vec![Seg::Key(key)])
    }
}

impl From<usize> for Path {
    fn from(index: usize) -> Self {
        Path(vec![Seg::Index(index)])
    }
}

impl From<Vec<Seg>> for Path {
    fn from(segments: Vec<Seg>) -> Self {
        Path(segments)
    }
}

impl From<&Path> for Path {
    fn from(path: &Path) -> Self {
        path.clone()
    }
}

impl TryFrom<&Value> for Path {
    type Error = StateError;

    /// Decode a name path from its JSON form: a single key, a single index,
    /// or an array of keys and indices.
    fn try_from(value: &Value) -> StateResult<Self> {
        match value {
            Value::Array(items) => items.iter().map(Seg::from_value).collect(),
            Value::String(_) | Value::Number(_) => Ok(Path(vec![Seg::from_value(value)?])),
            other => Err(StateError::malformed_path(format!(
                "name path must be a string, an index or an array, got {}",
                crate::value_type_name(other)
            ))),
        }
    }
}

/// Parse a dot-separated path such as `"users.0.name"`.
///
/// Segments made only of ASCII digits become indices. An empty string is the
/// root path.
pub fn parse_path(path: &str) -> Path {
    if path.is_empty() {
        return Path::root();
    }
    path.split('.')
        .map(|part| match part.parse::<usize>() {
            Ok(i) if part.bytes().all(|b| b.is_ascii_digit()) => Seg::Index(i),
            _ => Seg::Key(part.to_owned()),
        })
        .collect()
}

/// Construct a `Path` from a sequence of segments.
///
/// ```
/// use formwork_state::path;
///
/// let p = path!("items", 0, "name");
/// assert_eq!(p.len(), 3);
/// ```
#[macro_export]
macro_rules! path {
    () => {
        $crate::Path::root()
    };
    ($($seg:expr),+ $(,)?) => {{
        let mut p = $crate::Path::root();
        $(
            p.push($crate::path!(@seg $seg));
        )+
        p
    }};
    (@seg $seg:expr) => {
        $crate::Seg::from($seg)
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_path_construction() {
        let path = Path::root().key("users").index(0).key("name");
        assert_eq!(path.len(), 3);
        assert_eq!(path.segments()[0], Seg::Key("users".into()));
        assert_eq!(path.segments()[1], Seg::Index(0));
        assert_eq!(path.segments()[2], Seg::Key("name".into()));
    }

    #[test]
    fn test_path_display() {
        let path = Path::root().key("users").index(0).key("name");
        assert_eq!(format!("{}", path), "$.users[0].name");
        assert_eq!(path.joined("."), "users.0.name");
    }

    #[test]
    fn test_prefix_and_intersection() {
        let list = path!("list");
        let item = path!("list", 0, "name");
        assert!(list.is_prefix_of(&item));
        assert!(list.is_prefix_of(&list));
        assert!(list.intersects(&item));
        assert!(item.intersects(&list));
        assert!(!path!("lists").intersects(&item));
    }

    #[test]
    fn test_match_position() {
        let changed = path!("list", 0);
        assert_eq!(
            Path::match_position(&changed, &path!("list", 0, "name"), false),
            PathMatch::Ancestor
        );
        assert_eq!(
            Path::match_position(&changed, &path!("list"), true),
            PathMatch::Descendant
        );
        assert_eq!(
            Path::match_position(&path!("list", 1), &path!("list", 0), true),
            PathMatch::ListItem
        );
        assert_eq!(
            Path::match_position(&path!("list", 1), &path!("list", 0), false),
            PathMatch::Disjoint
        );
        assert!(!PathMatch::Disjoint.affects());
        assert!(PathMatch::Exact.affects());
    }

    #[test]
    fn test_eq_ignoring_indices_respects_keys() {
        assert!(path!("a", 0, "b").eq_ignoring_indices(&path!("a", 7, "b")));
        assert!(!path!("a", 0, "b").eq_ignoring_indices(&path!("a", 0, "c")));
        assert!(!path!("a", 0).eq_ignoring_indices(&path!("a", "x")));
    }

    #[test]
    fn test_decode_from_value() {
        assert_eq!(Path::try_from(&json!("age")).unwrap(), path!("age"));
        assert_eq!(Path::try_from(&json!(2)).unwrap(), path!(2usize));
        assert_eq!(
            Path::try_from(&json!(["list", 0, "name"])).unwrap(),
            path!("list", 0usize, "name")
        );
        assert!(Path::try_from(&json!({"a": 1})).is_err());
        assert!(Path::try_from(&json!(["a", -1])).is_err());
        assert!(Path::try_from(&json!(["a", true])).is_err());
    }

    #[test]
    fn test_to_value_matches_serde() {
        let p = path!("users", 0usize, "name");
        assert_eq!(p.to_value(), serde_json::to_value(&p).unwrap());
        let parsed: Path = serde_json::from_value(p.to_value()).unwrap();
        assert_eq!(parsed, p);
    }

    #[test]
    fn test_parse_path() {
        assert_eq!(parse_path(""), Path::root());
        assert_eq!(parse_path("a.0.b"), path!("a", 0usize, "b"));
        assert_eq!(parse_path("a.+1"), path!("a", "+1"));
    }

    #[test]
    fn test_ancestors() {
        let all: Vec<Path> = path!("a", "b", "c").ancestors().collect();
        assert_eq!(all, vec![Path::root(), path!("a"), path!("a", "b")]);
    }
}
