//! Parser module for the position-aware YAML tree

mod location;
mod path;
mod tree;
mod yaml;

pub use location::{locate, Location, Region};
pub use path::{PathSegment, PropertyPath};
pub use tree::{
    coerce_scalar, MapEntry, Node, NodeId, NodeKind, ScalarNode, ScalarStyle, ScalarValue, Shape,
    Span, Tree,
};
pub use yaml::parse_document;
