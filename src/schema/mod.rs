//! Schema descriptions for YAML documents
//!
//! A schema is a tree of [`NodeDesc`] values built once and shared read-only.
//! Self-reference goes through named definitions ([`DescKind::Ref`]) resolved
//! lazily by [`Schema::resolve`], so the structure itself never has cycles.

mod workflow;

use std::collections::HashMap;
use std::sync::Arc;

use regex::Regex;

use crate::parser::{PathSegment, PropertyPath, Shape};

pub use workflow::{events, workflow_schema, RUNNER_LABELS};

/// Maximum number of chained `Ref`s followed before giving up
const MAX_REF_DEPTH: usize = 16;

/// Describes what a node may contain, plus the text hover shows for it
#[derive(Debug, Clone)]
pub struct NodeDesc {
    pub description: Option<String>,
    pub kind: DescKind,
}

#[derive(Debug, Clone)]
pub enum DescKind {
    /// A scalar
    Value(ValueDesc),
    /// A mapping with declared properties
    Object(ObjectDesc),
    /// A sequence whose items all follow one description
    Array(Arc<NodeDesc>),
    /// The first alternative whose shape fits the node
    OneOf(Vec<Arc<NodeDesc>>),
    /// A named definition of the enclosing [`Schema`]
    Ref(String),
}

#[derive(Debug, Clone)]
pub struct ValueDesc {
    /// Literal values; empty means free text
    pub allowed: Vec<AllowedValue>,
    pub case_insensitive: bool,
    /// When false, `allowed` only feeds completion and any text is accepted
    pub enforce: bool,
    /// Dotted key handed to the context provider for extra valid values
    pub context: Option<String>,
    /// Whether `${{ ... }}` may stand in for a literal
    pub expressions: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowedValue {
    pub value: String,
    pub label: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ObjectDesc {
    /// Declared properties, in the order completion offers them
    pub properties: Vec<PropertyDesc>,
    /// Description for keys that are not declared
    pub pattern: Option<PatternDesc>,
}

#[derive(Debug, Clone)]
pub struct PropertyDesc {
    pub name: String,
    pub desc: Arc<NodeDesc>,
    pub required: bool,
}

#[derive(Debug, Clone)]
pub struct PatternDesc {
    /// Restricts which undeclared keys the pattern accepts
    pub key: Option<Regex>,
    pub desc: Arc<NodeDesc>,
}

impl NodeDesc {
    pub fn new(kind: DescKind) -> Self {
        Self {
            description: None,
            kind,
        }
    }

    pub fn value(value: ValueDesc) -> Self {
        Self::new(DescKind::Value(value))
    }

    /// Free text, expressions allowed
    pub fn string() -> Self {
        Self::value(ValueDesc::any())
    }

    pub fn object(object: ObjectDesc) -> Self {
        Self::new(DescKind::Object(object))
    }

    pub fn array(item: NodeDesc) -> Self {
        Self::new(DescKind::Array(Arc::new(item)))
    }

    pub fn one_of(alternatives: Vec<NodeDesc>) -> Self {
        Self::new(DescKind::OneOf(
            alternatives.into_iter().map(Arc::new).collect(),
        ))
    }

    pub fn reference(name: &str) -> Self {
        Self::new(DescKind::Ref(name.to_string()))
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    /// Literal values declared by a `Value` description
    pub fn allowed_values(&self) -> &[AllowedValue] {
        match &self.kind {
            DescKind::Value(value) => &value.allowed,
            _ => &[],
        }
    }
}

impl ValueDesc {
    /// Any scalar text
    pub fn any() -> Self {
        Self {
            allowed: Vec::new(),
            case_insensitive: false,
            enforce: true,
            context: None,
            expressions: true,
        }
    }

    /// One of a fixed set of literals
    pub fn literals(allowed: Vec<AllowedValue>) -> Self {
        Self {
            allowed,
            ..Self::any()
        }
    }

    pub fn case_insensitive(mut self) -> Self {
        self.case_insensitive = true;
        self
    }

    /// Keep the literals as suggestions without rejecting other text
    pub fn suggest_only(mut self) -> Self {
        self.enforce = false;
        self
    }

    pub fn from_context(mut self, key: &str) -> Self {
        self.context = Some(key.to_string());
        self
    }

    /// Whether `text` is one of the declared literals
    pub fn matches(&self, text: &str) -> bool {
        self.allowed.iter().any(|allowed| {
            if self.case_insensitive {
                allowed.value.eq_ignore_ascii_case(text)
            } else {
                allowed.value == text
            }
        })
    }

    /// The literal matching `text`, if any
    pub fn find(&self, text: &str) -> Option<&AllowedValue> {
        self.allowed.iter().find(|allowed| {
            allowed.value == text
                || (self.case_insensitive && allowed.value.eq_ignore_ascii_case(text))
        })
    }
}

impl AllowedValue {
    pub fn new(value: &str) -> Self {
        Self {
            value: value.to_string(),
            label: None,
            description: None,
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }
}

impl ObjectDesc {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn property(mut self, name: &str, desc: NodeDesc) -> Self {
        self.push(name, desc, false);
        self
    }

    pub fn required(mut self, name: &str, desc: NodeDesc) -> Self {
        self.push(name, desc, true);
        self
    }

    fn push(&mut self, name: &str, desc: NodeDesc, required: bool) {
        self.properties.push(PropertyDesc {
            name: name.to_string(),
            desc: Arc::new(desc),
            required,
        });
    }

    /// Accept undeclared keys (matching `key` when given) with `desc`
    pub fn pattern(mut self, key: Option<Regex>, desc: NodeDesc) -> Self {
        self.pattern = Some(PatternDesc {
            key,
            desc: Arc::new(desc),
        });
        self
    }

    /// Declared property by exact name
    pub fn get(&self, name: &str) -> Option<&PropertyDesc> {
        self.properties.iter().find(|property| property.name == name)
    }

    /// Description applying to the value of `key`: the declared property,
    /// otherwise the pattern fallback when it accepts the key
    pub fn lookup(&self, key: &str) -> Option<Arc<NodeDesc>> {
        if let Some(property) = self.get(key) {
            return Some(property.desc.clone());
        }
        self.pattern
            .as_ref()
            .filter(|pattern| pattern.key.as_ref().map_or(true, |re| re.is_match(key)))
            .map(|pattern| pattern.desc.clone())
    }
}

/// A root description plus the named definitions `Ref`s point at
#[derive(Debug, Clone)]
pub struct Schema {
    pub root: Arc<NodeDesc>,
    pub definitions: HashMap<String, Arc<NodeDesc>>,
}

impl Schema {
    pub fn new(root: NodeDesc) -> Self {
        Self {
            root: Arc::new(root),
            definitions: HashMap::new(),
        }
    }

    pub fn define(mut self, name: &str, desc: NodeDesc) -> Self {
        self.definitions.insert(name.to_string(), Arc::new(desc));
        self
    }

    /// Follow `Ref`s to a concrete description. A reference's own
    /// description wins over the target's when both are set.
    pub fn resolve(&self, desc: &Arc<NodeDesc>) -> Option<Arc<NodeDesc>> {
        let mut current = desc.clone();
        let mut description = desc.description.clone();

        for _ in 0..MAX_REF_DEPTH {
            let DescKind::Ref(name) = &current.kind else {
                if description.is_some() && description != current.description {
                    let mut resolved = (*current).clone();
                    resolved.description = description;
                    return Some(Arc::new(resolved));
                }
                return Some(current);
            };
            let Some(target) = self.definitions.get(name) else {
                tracing::warn!("Schema reference '{}' is not defined", name);
                return None;
            };
            if description.is_none() {
                description = target.description.clone();
            }
            current = target.clone();
        }

        tracing::warn!("Schema reference chain is too deep");
        None
    }

    /// Whether a node of `shape` can match `desc` without a shape error
    pub fn accepts_shape(&self, desc: &Arc<NodeDesc>, shape: Shape) -> bool {
        let Some(desc) = self.resolve(desc) else {
            return false;
        };
        match (&desc.kind, shape) {
            (_, Shape::Empty | Shape::Alias) => true,
            (DescKind::Value(_), Shape::Scalar) => true,
            (DescKind::Object(_), Shape::Mapping) => true,
            (DescKind::Array(_), Shape::Sequence) => true,
            (DescKind::OneOf(alternatives), shape) => alternatives
                .iter()
                .any(|alternative| self.accepts_shape(alternative, shape)),
            _ => false,
        }
    }

    /// Human-readable name of the shape(s) `desc` accepts
    pub fn shape_names(&self, desc: &Arc<NodeDesc>) -> Vec<&'static str> {
        let Some(desc) = self.resolve(desc) else {
            return Vec::new();
        };
        match &desc.kind {
            DescKind::Value(_) => vec!["scalar"],
            DescKind::Object(_) => vec!["mapping"],
            DescKind::Array(_) => vec!["sequence"],
            DescKind::OneOf(alternatives) => {
                let mut names = Vec::new();
                for alternative in alternatives {
                    for name in self.shape_names(alternative) {
                        if !names.contains(&name) {
                            names.push(name);
                        }
                    }
                }
                names
            }
            DescKind::Ref(_) => Vec::new(),
        }
    }

    /// Description at `path`, descending from the root
    pub fn at_path(&self, path: &PropertyPath) -> Option<Arc<NodeDesc>> {
        path.segments()
            .iter()
            .try_fold(self.root.clone(), |desc, segment| self.child(&desc, segment))
    }

    /// Description of the child reached by `segment`. For `OneOf` the first
    /// alternative that has such a child is taken.
    pub fn child(&self, desc: &Arc<NodeDesc>, segment: &PathSegment) -> Option<Arc<NodeDesc>> {
        let desc = self.resolve(desc)?;
        match (&desc.kind, segment) {
            (DescKind::Object(object), PathSegment::Key(key)) => object.lookup(key),
            (DescKind::Array(item), PathSegment::Index(_)) => Some(item.clone()),
            (DescKind::OneOf(alternatives), segment) => alternatives
                .iter()
                .find_map(|alternative| self.child(alternative, segment)),
            _ => None,
        }
    }
}
