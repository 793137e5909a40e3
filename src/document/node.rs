//! Order and comment preserving YAML node tree.

use serde::Serialize;
use serde_yaml::{Mapping, Number, Value};

/// A YAML node: mapping, sequence, or scalar, plus the comments attached to
/// it.
///
/// Comments on a mapping entry live on the entry's key node. Comments on a
/// sequence item live on the item node.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// The node content.
    pub kind: NodeKind,
    /// Full-line comments directly above the node, including the `#`.
    pub head_comment: Vec<String>,
    /// Trailing comment on the node's line, including the `#`.
    pub line_comment: Option<String>,
}

/// Content of a [`Node`].
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// Ordered key/value entries.
    Mapping(Vec<MapEntry>),
    /// Ordered items.
    Sequence(Vec<Node>),
    /// A single value.
    Scalar(Scalar),
}

/// One key/value pair of a mapping node.
#[derive(Debug, Clone, PartialEq)]
pub struct MapEntry {
    /// Key node; carries the entry's comments.
    pub key: Node,
    /// Value node.
    pub value: Node,
}

/// Scalar values.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    /// `null`.
    Null,
    /// `true` / `false`.
    Bool(bool),
    /// Integer or float.
    Number(Number),
    /// Any string.
    String(String),
}

impl Scalar {
    /// Returns the text used to match this scalar as a mapping key.
    #[must_use]
    pub fn key_text(&self) -> String {
        match self {
            Self::Null => String::from("null"),
            Self::Bool(b) => b.to_string(),
            Self::Number(n) => n.to_string(),
            Self::String(s) => s.clone(),
        }
    }
}

impl From<NodeKind> for Node {
    fn from(kind: NodeKind) -> Self {
        Self {
            kind,
            head_comment: Vec::new(),
            line_comment: None,
        }
    }
}

impl Node {
    /// Creates an empty mapping node.
    #[must_use]
    pub fn mapping() -> Self {
        NodeKind::Mapping(Vec::new()).into()
    }

    /// Creates an empty sequence node.
    #[must_use]
    pub fn sequence() -> Self {
        NodeKind::Sequence(Vec::new()).into()
    }

    /// Creates a string scalar node.
    #[must_use]
    pub fn string(value: impl Into<String>) -> Self {
        NodeKind::Scalar(Scalar::String(value.into())).into()
    }

    /// Converts any serializable value into a node tree.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be represented as YAML.
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Self, serde_yaml::Error> {
        serde_yaml::to_value(value).map(Self::from_value)
    }

    /// Converts a parsed YAML value into a node tree without comments.
    ///
    /// Tags are dropped and their inner value kept.
    #[must_use]
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Null => NodeKind::Scalar(Scalar::Null).into(),
            Value::Bool(b) => NodeKind::Scalar(Scalar::Bool(b)).into(),
            Value::Number(n) => NodeKind::Scalar(Scalar::Number(n)).into(),
            Value::String(s) => NodeKind::Scalar(Scalar::String(s)).into(),
            Value::Sequence(items) => {
                NodeKind::Sequence(items.into_iter().map(Self::from_value).collect()).into()
            }
            Value::Mapping(mapping) => NodeKind::Mapping(
                mapping
                    .into_iter()
                    .map(|(key, value)| MapEntry {
                        key: Self::from_value(key),
                        value: Self::from_value(value),
                    })
                    .collect(),
            )
            .into(),
            Value::Tagged(tagged) => Self::from_value(tagged.value),
        }
    }

    /// Converts the node tree back into a plain YAML value.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match &self.kind {
            NodeKind::Scalar(Scalar::Null) => Value::Null,
            NodeKind::Scalar(Scalar::Bool(b)) => Value::Bool(*b),
            NodeKind::Scalar(Scalar::Number(n)) => Value::Number(n.clone()),
            NodeKind::Scalar(Scalar::String(s)) => Value::String(s.clone()),
            NodeKind::Sequence(items) => Value::Sequence(items.iter().map(Self::to_value).collect()),
            NodeKind::Mapping(entries) => {
                let mut mapping = Mapping::with_capacity(entries.len());
                for entry in entries {
                    mapping.insert(entry.key.to_value(), entry.value.to_value());
                }
                Value::Mapping(mapping)
            }
        }
    }

    /// Returns true for mapping nodes.
    #[must_use]
    pub const fn is_mapping(&self) -> bool {
        matches!(self.kind, NodeKind::Mapping(_))
    }

    /// Returns the string value of a string scalar.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Scalar(Scalar::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Returns the text used to match this node as a mapping key.
    #[must_use]
    pub fn key_text(&self) -> Option<String> {
        match &self.kind {
            NodeKind::Scalar(scalar) => Some(scalar.key_text()),
            _ => None,
        }
    }

    /// Returns the mapping entries, if this is a mapping.
    #[must_use]
    pub fn entries(&self) -> Option<&[MapEntry]> {
        match &self.kind {
            NodeKind::Mapping(entries) => Some(entries),
            _ => None,
        }
    }

    /// Returns the sequence items, if this is a sequence.
    #[must_use]
    pub fn items(&self) -> Option<&[Self]> {
        match &self.kind {
            NodeKind::Sequence(items) => Some(items),
            _ => None,
        }
    }

    /// Returns the sequence items mutably, if this is a sequence.
    pub fn items_mut(&mut self) -> Option<&mut Vec<Self>> {
        match &mut self.kind {
            NodeKind::Sequence(items) => Some(items),
            _ => None,
        }
    }

    /// Returns the entry for `key`, if this is a mapping containing it.
    #[must_use]
    pub fn entry(&self, key: &str) -> Option<&MapEntry> {
        self.entries()?
            .iter()
            .find(|entry| entry.key.key_text().as_deref() == Some(key))
    }

    /// Returns the entry for `key` mutably.
    pub fn entry_mut(&mut self, key: &str) -> Option<&mut MapEntry> {
        match &mut self.kind {
            NodeKind::Mapping(entries) => entries
                .iter_mut()
                .find(|entry| entry.key.key_text().as_deref() == Some(key)),
            _ => None,
        }
    }

    /// Returns the value for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Self> {
        self.entry(key).map(|entry| &entry.value)
    }

    /// Returns the value for `key` mutably.
    pub fn get_mut(&mut self, key: &str) -> Option<&mut Self> {
        self.entry_mut(key).map(|entry| &mut entry.value)
    }

    /// Returns true if this is a mapping containing `key`.
    #[must_use]
    pub fn has_key(&self, key: &str) -> bool {
        self.entry(key).is_some()
    }

    /// Sets `key` to `value`.
    ///
    /// An existing entry keeps its position and comments; otherwise the entry
    /// is appended. Non-mapping nodes are left untouched and `false` is
    /// returned.
    pub fn insert(&mut self, key: &str, value: Self) -> bool {
        if let Some(entry) = self.entry_mut(key) {
            entry.value = value;
            return true;
        }
        match &mut self.kind {
            NodeKind::Mapping(entries) => {
                entries.push(MapEntry {
                    key: Self::string(key),
                    value,
                });
                true
            }
            _ => false,
        }
    }

    /// Appends an item to a sequence node. Returns `false` for other nodes.
    pub fn push(&mut self, item: Self) -> bool {
        if let Some(items) = self.items_mut() {
            items.push(item);
            true
        } else {
            false
        }
    }

    /// Sets the trailing comment, adding the `#` marker if missing.
    pub fn set_line_comment(&mut self, comment: impl Into<String>) {
        let comment = comment.into();
        self.line_comment = Some(if comment.starts_with('#') {
            comment
        } else {
            format!("# {comment}")
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_round_trip_preserves_order() {
        let value: Value = serde_yaml::from_str("zeta: 1\nalpha: [true, null, x]\n").unwrap();
        let node = Node::from_value(value.clone());

        let keys: Vec<String> = node
            .entries()
            .unwrap()
            .iter()
            .filter_map(|e| e.key.key_text())
            .collect();
        assert_eq!(keys, vec!["zeta", "alpha"]);
        assert_eq!(node.to_value(), value);
    }

    #[test]
    fn test_insert_keeps_position_and_comments() {
        let mut node = Node::from_value(serde_yaml::from_str("a: 1\nb: 2\n").unwrap());
        node.entry_mut("a").unwrap().key.head_comment.push(String::from("# keep"));

        node.insert("a", Node::string("x"));
        node.insert("c", Node::string("y"));

        let entries = node.entries().unwrap();
        assert_eq!(entries[0].value.as_str(), Some("x"));
        assert_eq!(entries[0].key.head_comment, vec!["# keep"]);
        assert_eq!(entries[2].key.key_text().as_deref(), Some("c"));
    }

    #[test]
    fn test_insert_on_scalar_is_rejected() {
        let mut node = Node::string("x");
        assert!(!node.insert("a", Node::mapping()));
        assert!(!node.push(Node::string("y")));
    }

    #[test]
    fn test_set_line_comment_adds_marker() {
        let mut node = Node::string("x");
        node.set_line_comment("myapp/test");
        assert_eq!(node.line_comment.as_deref(), Some("# myapp/test"));

        node.set_line_comment("#raw");
        assert_eq!(node.line_comment.as_deref(), Some("#raw"));
    }
}
