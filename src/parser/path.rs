//! Property paths from the document root

use std::fmt;

/// One step from a container to a child
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// Value of a mapping entry
    Key(String),
    /// Element of a sequence
    Index(usize),
}

/// Keys and indices leading from the root to a node
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct PropertyPath(Vec<PathSegment>);

impl PropertyPath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// A new path extended by a key
    pub fn key(&self, key: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(PathSegment::Key(key.into()));
        Self(segments)
    }

    /// A new path extended by an index
    pub fn index(&self, index: usize) -> Self {
        let mut segments = self.0.clone();
        segments.push(PathSegment::Index(index));
        Self(segments)
    }

    /// The path without its last segment
    pub fn parent(&self) -> Option<Self> {
        let (_, rest) = self.0.split_last()?;
        Some(Self(rest.to_vec()))
    }

    pub fn last(&self) -> Option<&PathSegment> {
        self.0.last()
    }

    /// Key at a given depth, if that segment is a key
    pub fn key_at(&self, depth: usize) -> Option<&str> {
        match self.0.get(depth) {
            Some(PathSegment::Key(key)) => Some(key),
            _ => None,
        }
    }

    /// Index at a given depth, if that segment is an index
    pub fn index_at(&self, depth: usize) -> Option<usize> {
        match self.0.get(depth) {
            Some(PathSegment::Index(index)) => Some(*index),
            _ => None,
        }
    }
}

impl FromIterator<PathSegment> for PropertyPath {
    fn from_iter<T: IntoIterator<Item = PathSegment>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "$")?;
        for segment in &self.0 {
            match segment {
                PathSegment::Key(key) => write!(f, ".{}", key)?,
                PathSegment::Index(index) => write!(f, "[{}]", index)?,
            }
        }
        Ok(())
    }
}
