//! Cursor location resolution
//!
//! Maps a UTF-16 offset to the deepest node around it, the path of keys and
//! indices leading there, and whether the cursor sits on a key, on a value, or
//! at an insertion point with no content yet. Positions that fall between
//! nodes (trailing whitespace, a fresh indented line, a lone dash) are
//! attributed by indentation, since that is what decides where typed text
//! will land once the document parses again.

use super::path::PropertyPath;
use super::tree::{MapEntry, NodeId, NodeKind, Tree};
use crate::document::TextIndex;

/// What the cursor is on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    /// A mapping key
    Key,
    /// A scalar value
    Value,
    /// An insertion point: an omitted value, or a new key/element position
    Empty,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    /// For `Key`/`Value` the scalar under the cursor; for `Empty` either the
    /// omitted value or the container receiving the insertion. `None` only
    /// for documents without a root node.
    pub node: Option<NodeId>,
    /// Path to `node`, extended by the new element index for sequence insertions
    pub path: PropertyPath,
    pub region: Region,
}

impl Location {
    fn new(node: NodeId, path: PropertyPath, region: Region) -> Self {
        Self {
            node: Some(node),
            path,
            region,
        }
    }
}

/// Resolve the location of `offset`, `None` when it lies outside the text
pub fn locate(tree: &Tree, index: &TextIndex<'_>, offset: usize) -> Option<Location> {
    if offset > index.len_utf16() {
        return None;
    }

    let Some(root) = tree.root() else {
        return Some(Location {
            node: None,
            path: PropertyPath::root(),
            region: Region::Empty,
        });
    };

    let locator = Locator {
        tree,
        index,
        offset,
    };
    Some(locator.descend(root, PropertyPath::root()))
}

struct Locator<'a> {
    tree: &'a Tree,
    index: &'a TextIndex<'a>,
    offset: usize,
}

impl Locator<'_> {
    fn descend(&self, id: NodeId, path: PropertyPath) -> Location {
        match &self.tree.node(id).kind {
            NodeKind::Map(entries) => self.in_map(id, entries, path),
            NodeKind::Sequence(items) => self.in_sequence(id, items, path),
            NodeKind::Scalar(scalar) if scalar.empty => Location::new(id, path, Region::Empty),
            _ => Location::new(id, path, Region::Value),
        }
    }

    fn key_path(&self, path: &PropertyPath, entry: &MapEntry) -> PropertyPath {
        path.key(self.tree.text(entry.key).unwrap_or_default())
    }

    fn in_map(&self, id: NodeId, entries: &[MapEntry], path: PropertyPath) -> Location {
        for entry in entries {
            let key = self.tree.node(entry.key);
            if !key.is_empty_scalar() && key.span.touches(self.offset) {
                return Location::new(entry.key, self.key_path(&path, entry), Region::Key);
            }
            let value = self.tree.node(entry.value);
            if !value.is_empty_scalar() && value.span.touches(self.offset) {
                return self.descend(entry.value, self.key_path(&path, entry));
            }
        }

        // Between children: the last entry before the cursor owns it when the
        // cursor is on that key's line, or on a later line indented deeper
        let owner = entries
            .iter()
            .rev()
            .find(|entry| self.tree.span(entry.key).start < self.offset);
        let Some(entry) = owner else {
            return Location::new(id, path, Region::Empty);
        };

        let key_span = self.tree.span(entry.key);
        let (key_line, key_column) = self.index.position(key_span.start);
        let (line, _) = self.index.position(self.offset);
        let owns = if line == key_line {
            self.offset >= key_span.end
        } else {
            self.index.indent_at(self.offset) > key_column
        };

        if owns {
            self.descend(entry.value, self.key_path(&path, entry))
        } else {
            Location::new(id, path, Region::Empty)
        }
    }

    fn in_sequence(&self, id: NodeId, items: &[NodeId], path: PropertyPath) -> Location {
        for (i, item) in items.iter().enumerate() {
            let node = self.tree.node(*item);
            if !node.is_empty_scalar() && node.span.touches(self.offset) {
                return self.descend(*item, path.index(i));
            }
        }

        if self.tree.node(id).flow {
            let position = items
                .iter()
                .filter(|item| self.tree.span(**item).end <= self.offset)
                .count();
            return Location::new(id, path.index(position), Region::Empty);
        }

        let before = self.index.line_before(self.offset).trim_start();
        let dash_only = before
            .strip_prefix('-')
            .map(|rest| rest.trim().is_empty())
            .unwrap_or(false);
        if dash_only {
            let line_start = self.index.line_start(self.offset);
            let existing = items.iter().enumerate().find(|(_, item)| {
                let node = self.tree.node(**item);
                node.is_empty_scalar() && self.index.line_start(node.span.start) == line_start
            });
            return match existing {
                Some((i, item)) => Location::new(*item, path.index(i), Region::Empty),
                None => Location::new(id, path.index(items.len()), Region::Empty),
            };
        }

        let owner = items
            .iter()
            .enumerate()
            .rev()
            .find(|(_, item)| self.tree.span(**item).start < self.offset);
        if let Some((i, item)) = owner {
            let (item_line, item_column) = self.index.position(self.tree.span(*item).start);
            let (line, _) = self.index.position(self.offset);
            if line == item_line || self.index.indent_at(self.offset) >= item_column {
                return self.descend(*item, path.index(i));
            }
        }

        Location::new(id, path.index(items.len()), Region::Empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::DiagnosticCollector;
    use crate::parser::parse_document;
    use assert_matches::assert_matches;

    /// `|` in the input marks the cursor
    fn locate_at(input: &str) -> (Tree, Option<Location>) {
        let offset = input.find('|').expect("cursor marker");
        let text = input.replace('|', "");
        let tree = parse_document(&text, &mut DiagnosticCollector::new());
        let index = TextIndex::new(&text);
        let location = locate(&tree, &index, offset);
        (tree, location)
    }

    fn path_of(location: &Location) -> String {
        location.path.to_string()
    }

    #[test]
    fn test_empty_document() {
        let (_, location) = locate_at("|");
        let location = location.expect("location");
        assert_eq!(location.node, None);
        assert_eq!(location.region, Region::Empty);
        assert!(location.path.is_empty());
    }

    #[test]
    fn test_offset_outside_document() {
        let tree = parse_document("on: push", &mut DiagnosticCollector::new());
        let index = TextIndex::new("on: push");
        assert!(locate(&tree, &index, 42).is_none());
    }

    #[test]
    fn test_key_region() {
        let (tree, location) = locate_at("on: push\njobs:\n  build:\n    runs|-on: ubuntu-latest");
        let location = location.expect("location");
        assert_eq!(location.region, Region::Key);
        assert_eq!(path_of(&location), "$.jobs.build.runs-on");
        assert_eq!(tree.text(location.node.expect("node")), Some("runs-on"));
    }

    #[test]
    fn test_value_region_at_end_of_scalar() {
        let (_, location) = locate_at("on: check_r|");
        let location = location.expect("location");
        assert_eq!(location.region, Region::Value);
        assert_eq!(path_of(&location), "$.on");
    }

    #[test]
    fn test_omitted_value_on_same_line() {
        let (tree, location) = locate_at("on: |");
        let location = location.expect("location");
        assert_eq!(location.region, Region::Empty);
        assert_eq!(path_of(&location), "$.on");
        assert!(tree.node(location.node.expect("node")).is_empty_scalar());
    }

    #[test]
    fn test_indented_line_belongs_to_previous_key() {
        let (_, location) = locate_at("on:\n  |");
        let location = location.expect("location");
        assert_eq!(location.region, Region::Empty);
        assert_eq!(path_of(&location), "$.on");

        let (_, location) = locate_at("jobs:\n  build:\n    |");
        assert_eq!(path_of(&location.expect("location")), "$.jobs.build");
    }

    #[test]
    fn test_sibling_line_is_insertion_point() {
        let (tree, location) = locate_at("jobs:\n  build:\n    runs-on: ubuntu-latest\n    |");
        let location = location.expect("location");
        assert_eq!(location.region, Region::Empty);
        assert_eq!(path_of(&location), "$.jobs.build");
        assert_matches!(tree.node(location.node.expect("node")).kind, NodeKind::Map(_));

        let (_, location) = locate_at("name: workflow\n|");
        let location = location.expect("location");
        assert!(location.path.is_empty());
        assert_eq!(location.region, Region::Empty);
    }

    #[test]
    fn test_dash_marks_new_element() {
        let (_, location) = locate_at("on:\n  - |");
        let location = location.expect("location");
        assert_eq!(location.region, Region::Empty);
        assert_eq!(path_of(&location), "$.on[0]");

        let (_, location) = locate_at("on:\n  issues:\n    types:\n      - |");
        assert_eq!(path_of(&location.expect("location")), "$.on.issues.types[0]");
    }

    #[test]
    fn test_flow_sequence_insertion_index() {
        let (_, location) = locate_at("on: [push, |]");
        let location = location.expect("location");
        assert_eq!(location.region, Region::Empty);
        assert_eq!(path_of(&location), "$.on[1]");
    }

    #[test]
    fn test_flow_sequence_item() {
        let (_, location) = locate_at("on: [ push, check|_run ]");
        let location = location.expect("location");
        assert_eq!(location.region, Region::Value);
        assert_eq!(path_of(&location), "$.on[1]");
    }

    #[test]
    fn test_scalar_root_is_value() {
        let (_, location) = locate_at("n|");
        let location = location.expect("location");
        assert_eq!(location.region, Region::Value);
        assert!(location.path.is_empty());
    }

    #[test]
    fn test_step_item_map_continuation() {
        let (_, location) = locate_at("steps:\n  - run: echo\n    |");
        let location = location.expect("location");
        assert_eq!(location.region, Region::Empty);
        assert_eq!(path_of(&location), "$.steps[0]");
    }
}
