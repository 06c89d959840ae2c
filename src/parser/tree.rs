//! Position-aware YAML tree
//!
//! Nodes live in an arena owned by [`Tree`] and are addressed by [`NodeId`],
//! so side tables (like the validator's node-to-description index) can key on
//! node identity without touching the tree. A tree is never mutated after the
//! parse that produced it.

use lazy_static::lazy_static;
use regex::Regex;
use serde_yaml::{Mapping, Number, Value};

/// Identity of a node inside its [`Tree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

/// Half-open `[start, end)` range of UTF-16 offsets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Whether `offset` lies in the span or right after its last unit
    pub fn touches(&self, offset: usize) -> bool {
        self.start <= offset && offset <= self.end
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Resolved primitive of a scalar
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
}

/// How a scalar was written in the source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarStyle {
    Plain,
    SingleQuoted,
    DoubleQuoted,
    Literal,
    Folded,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScalarNode {
    /// The scalar's content after unquoting/folding
    pub text: String,
    pub value: ScalarValue,
    pub style: ScalarStyle,
    /// The value was omitted in the source (`key:` with nothing after it)
    pub empty: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapEntry {
    pub key: NodeId,
    pub value: NodeId,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Map(Vec<MapEntry>),
    Sequence(Vec<NodeId>),
    Scalar(ScalarNode),
    /// Alias to an anchored node, `None` when the anchor is unknown
    Alias(Option<NodeId>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub span: Span,
    /// Written in flow style (`{...}` or `[...]`)
    pub flow: bool,
}

impl Node {
    pub fn is_empty_scalar(&self) -> bool {
        matches!(&self.kind, NodeKind::Scalar(scalar) if scalar.empty)
    }

    pub fn shape(&self) -> Shape {
        match &self.kind {
            NodeKind::Map(_) => Shape::Mapping,
            NodeKind::Sequence(_) => Shape::Sequence,
            NodeKind::Scalar(scalar) if scalar.empty => Shape::Empty,
            NodeKind::Scalar(_) => Shape::Scalar,
            NodeKind::Alias(_) => Shape::Alias,
        }
    }
}

/// Coarse structural class of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Mapping,
    Sequence,
    Scalar,
    Empty,
    Alias,
}

/// Arena of nodes produced by one parse
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tree {
    pub(crate) nodes: Vec<Node>,
    pub(crate) root: Option<NodeId>,
}

impl Tree {
    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn span(&self, id: NodeId) -> Span {
        self.node(id).span
    }

    pub fn scalar(&self, id: NodeId) -> Option<&ScalarNode> {
        match &self.node(id).kind {
            NodeKind::Scalar(scalar) => Some(scalar),
            _ => None,
        }
    }

    /// Text of a scalar node, `None` for collections
    pub fn text(&self, id: NodeId) -> Option<&str> {
        self.scalar(id).map(|scalar| scalar.text.as_str())
    }

    pub fn entries(&self, id: NodeId) -> &[MapEntry] {
        match &self.node(id).kind {
            NodeKind::Map(entries) => entries,
            _ => &[],
        }
    }

    pub fn items(&self, id: NodeId) -> &[NodeId] {
        match &self.node(id).kind {
            NodeKind::Sequence(items) => items,
            _ => &[],
        }
    }

    /// Value of the entry with the given key text in a mapping
    pub fn get(&self, map: NodeId, key: &str) -> Option<NodeId> {
        self.entries(map)
            .iter()
            .find(|entry| self.text(entry.key) == Some(key))
            .map(|entry| entry.value)
    }

    /// Child reached by one path segment
    pub fn child(&self, id: NodeId, segment: &super::PathSegment) -> Option<NodeId> {
        match segment {
            super::PathSegment::Key(key) => self.get(id, key),
            super::PathSegment::Index(index) => self.items(id).get(*index).copied(),
        }
    }

    /// Node reached by following `path` from the root
    pub fn at_path(&self, path: &super::PropertyPath) -> Option<NodeId> {
        path.segments()
            .iter()
            .try_fold(self.root?, |id, segment| self.child(id, segment))
    }

    /// Every node reachable from the root, parents before children
    pub fn descendants(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.root.into_iter().collect();
        while let Some(id) = stack.pop() {
            out.push(id);
            match &self.node(id).kind {
                NodeKind::Map(entries) => {
                    for entry in entries.iter().rev() {
                        stack.push(entry.value);
                        stack.push(entry.key);
                    }
                }
                NodeKind::Sequence(items) => stack.extend(items.iter().rev()),
                _ => {}
            }
        }
        out
    }

    /// Project the tree into a plain YAML value
    pub fn to_value(&self) -> Value {
        match self.root {
            Some(root) => self.value_of(root, 0),
            None => Value::Null,
        }
    }

    fn value_of(&self, id: NodeId, depth: usize) -> Value {
        // Alias chains through anchors can loop in malformed input
        if depth > 64 {
            return Value::Null;
        }
        match &self.node(id).kind {
            NodeKind::Map(entries) => {
                let mut mapping = Mapping::new();
                for entry in entries {
                    mapping.insert(
                        self.value_of(entry.key, depth + 1),
                        self.value_of(entry.value, depth + 1),
                    );
                }
                Value::Mapping(mapping)
            }
            NodeKind::Sequence(items) => Value::Sequence(
                items
                    .iter()
                    .map(|item| self.value_of(*item, depth + 1))
                    .collect(),
            ),
            NodeKind::Scalar(scalar) => scalar_to_value(&scalar.value),
            NodeKind::Alias(Some(target)) => self.value_of(*target, depth + 1),
            NodeKind::Alias(None) => Value::Null,
        }
    }
}

fn scalar_to_value(value: &ScalarValue) -> Value {
    match value {
        ScalarValue::Null => Value::Null,
        ScalarValue::Bool(b) => Value::Bool(*b),
        ScalarValue::Number(n) if n.fract() == 0.0 && n.abs() < i64::MAX as f64 => {
            Value::Number(Number::from(*n as i64))
        }
        ScalarValue::Number(n) => Value::Number(Number::from(*n)),
        ScalarValue::String(s) => Value::String(s.clone()),
    }
}

/// Resolve a scalar's primitive using the YAML core schema rules
pub fn coerce_scalar(text: &str, style: ScalarStyle) -> ScalarValue {
    lazy_static! {
        static ref INT_RE: Regex = Regex::new(r"^[-+]?[0-9]+$").unwrap();
        static ref HEX_RE: Regex = Regex::new(r"^0x([0-9a-fA-F]+)$").unwrap();
        static ref OCT_RE: Regex = Regex::new(r"^0o([0-7]+)$").unwrap();
        static ref FLOAT_RE: Regex =
            Regex::new(r"^[-+]?(\.[0-9]+|[0-9]+(\.[0-9]*)?)([eE][-+]?[0-9]+)?$").unwrap();
    }

    if style != ScalarStyle::Plain {
        return ScalarValue::String(text.to_string());
    }

    match text {
        "" | "~" | "null" | "Null" | "NULL" => return ScalarValue::Null,
        "true" | "True" | "TRUE" => return ScalarValue::Bool(true),
        "false" | "False" | "FALSE" => return ScalarValue::Bool(false),
        ".inf" | ".Inf" | ".INF" | "+.inf" | "+.Inf" | "+.INF" => {
            return ScalarValue::Number(f64::INFINITY)
        }
        "-.inf" | "-.Inf" | "-.INF" => return ScalarValue::Number(f64::NEG_INFINITY),
        ".nan" | ".NaN" | ".NAN" => return ScalarValue::Number(f64::NAN),
        _ => {}
    }

    if INT_RE.is_match(text) {
        if let Ok(n) = text.parse::<i64>() {
            return ScalarValue::Number(n as f64);
        }
    }
    if let Some(caps) = HEX_RE.captures(text) {
        if let Ok(n) = i64::from_str_radix(&caps[1], 16) {
            return ScalarValue::Number(n as f64);
        }
    }
    if let Some(caps) = OCT_RE.captures(text) {
        if let Ok(n) = i64::from_str_radix(&caps[1], 8) {
            return ScalarValue::Number(n as f64);
        }
    }
    if FLOAT_RE.is_match(text) {
        if let Ok(n) = text.parse::<f64>() {
            return ScalarValue::Number(n);
        }
    }

    ScalarValue::String(text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coerce_plain_scalars() {
        assert_eq!(coerce_scalar("~", ScalarStyle::Plain), ScalarValue::Null);
        assert_eq!(coerce_scalar("True", ScalarStyle::Plain), ScalarValue::Bool(true));
        assert_eq!(coerce_scalar("42", ScalarStyle::Plain), ScalarValue::Number(42.0));
        assert_eq!(coerce_scalar("0x1F", ScalarStyle::Plain), ScalarValue::Number(31.0));
        assert_eq!(coerce_scalar("0o17", ScalarStyle::Plain), ScalarValue::Number(15.0));
        assert_eq!(coerce_scalar("1.5e3", ScalarStyle::Plain), ScalarValue::Number(1500.0));
        assert_eq!(
            coerce_scalar("ubuntu-latest", ScalarStyle::Plain),
            ScalarValue::String("ubuntu-latest".to_string())
        );
    }

    #[test]
    fn test_quoted_scalars_stay_strings() {
        assert_eq!(
            coerce_scalar("42", ScalarStyle::DoubleQuoted),
            ScalarValue::String("42".to_string())
        );
        assert_eq!(
            coerce_scalar("true", ScalarStyle::SingleQuoted),
            ScalarValue::String("true".to_string())
        );
    }

    #[test]
    fn test_span_touches_inclusive_end() {
        let span = Span::new(4, 9);
        assert!(span.touches(4));
        assert!(span.touches(9));
        assert!(!span.touches(10));
        assert!(!span.touches(3));
    }
}
