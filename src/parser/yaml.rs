//! YAML parsing with error recovery
//!
//! This module drives the `yaml-rust2` event parser and assembles its marked
//! events into a [`Tree`]. The scanner stops at the first syntax error; the
//! events received up to that point still form a usable partial tree, which
//! is what editor features need while the user is typing.

use std::collections::HashMap;

use yaml_rust2::parser::{Event, MarkedEventReceiver, Parser};
use yaml_rust2::scanner::{Marker, TScalarStyle};

use super::tree::{
    coerce_scalar, MapEntry, Node, NodeId, NodeKind, ScalarNode, ScalarStyle, Span, Tree,
};
use crate::diagnostics::DiagnosticCollector;
use crate::document::TextIndex;

/// Parse YAML text into a position-aware tree and collect any syntax errors
///
/// Never fails: malformed input yields the partial tree built before the
/// error plus a diagnostic at the error position. Only the first document of
/// a multi-document stream is kept.
pub fn parse_document(text: &str, collector: &mut DiagnosticCollector) -> Tree {
    let index = TextIndex::new(text);
    let mut builder = TreeBuilder::new(text);
    let mut parser = Parser::new(text.chars());

    if let Err(err) = parser.load(&mut builder, false) {
        let start = index.utf16_of_char(err.marker().index());
        let end = (start + 1).min(index.len_utf16());
        tracing::debug!("YAML syntax error at {}: {}", start, err.info());
        collector.add_yaml_error(err.info().to_string(), Span::new(start, end.max(start)));
        builder.close_all();
    }

    builder.finish(&index)
}

/// Container still receiving children
enum Frame {
    Map {
        id: NodeId,
        entries: Vec<MapEntry>,
        pending_key: Option<NodeId>,
    },
    Sequence {
        id: NodeId,
        items: Vec<NodeId>,
    },
}

/// Assembles marked events into nodes whose spans are char indices until
/// [`TreeBuilder::finish`] converts them to UTF-16 offsets
struct TreeBuilder {
    chars: Vec<char>,
    nodes: Vec<Node>,
    stack: Vec<Frame>,
    root: Option<NodeId>,
    anchors: HashMap<usize, NodeId>,
    /// End of the last completed token, used to place omitted values
    last_end: usize,
    done: bool,
}

impl MarkedEventReceiver for TreeBuilder {
    fn on_event(&mut self, event: Event, mark: Marker) {
        if self.done {
            return;
        }
        let at = mark.index().min(self.chars.len());

        match event {
            Event::Scalar(text, style, anchor, ..) => {
                let id = self.scalar(text, style, at);
                self.remember_anchor(anchor, id);
                self.attach(id);
            }
            Event::Alias(anchor) => {
                let target = self.anchors.get(&anchor).copied();
                let end = self.scan_while(at + 1, |c| !c.is_whitespace() && !",]}".contains(c));
                let id = self.push_node(NodeKind::Alias(target), Span::new(at, end), false);
                self.last_end = end;
                self.attach(id);
            }
            Event::MappingStart(anchor, ..) => {
                let flow = self.chars.get(at) == Some(&'{');
                let id = self.push_node(NodeKind::Map(Vec::new()), Span::new(at, at), flow);
                self.remember_anchor(anchor, id);
                self.stack.push(Frame::Map {
                    id,
                    entries: Vec::new(),
                    pending_key: None,
                });
                self.last_end = at;
            }
            Event::SequenceStart(anchor, ..) => {
                let flow = self.chars.get(at) == Some(&'[');
                let id = self.push_node(NodeKind::Sequence(Vec::new()), Span::new(at, at), flow);
                self.remember_anchor(anchor, id);
                self.stack.push(Frame::Sequence {
                    id,
                    items: Vec::new(),
                });
                self.last_end = at;
            }
            Event::MappingEnd | Event::SequenceEnd => self.close(Some(at)),
            Event::DocumentEnd => self.done = self.root.is_some(),
            _ => {}
        }
    }
}

impl TreeBuilder {
    fn new(text: &str) -> Self {
        Self {
            chars: text.chars().collect(),
            nodes: Vec::new(),
            stack: Vec::new(),
            root: None,
            anchors: HashMap::new(),
            last_end: 0,
            done: false,
        }
    }

    fn push_node(&mut self, kind: NodeKind, span: Span, flow: bool) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node { kind, span, flow });
        id
    }

    fn remember_anchor(&mut self, anchor: usize, id: NodeId) {
        if anchor > 0 {
            self.anchors.insert(anchor, id);
        }
    }

    fn scalar(&mut self, text: String, style: TScalarStyle, at: usize) -> NodeId {
        let style = match style {
            TScalarStyle::Plain => ScalarStyle::Plain,
            TScalarStyle::SingleQuoted => ScalarStyle::SingleQuoted,
            TScalarStyle::DoubleQuoted => ScalarStyle::DoubleQuoted,
            TScalarStyle::Literal => ScalarStyle::Literal,
            _ => ScalarStyle::Folded,
        };

        // The parser reports omitted values as a plain `~` that isn't in the source
        let empty = style == ScalarStyle::Plain && text == "~" && self.chars.get(at) != Some(&'~');
        let span = if empty {
            let indicator = match self.stack.last() {
                Some(Frame::Sequence { .. }) => '-',
                _ => ':',
            };
            let at = self.skip_indicator(self.last_end, indicator);
            Span::new(at, at)
        } else {
            Span::new(at, self.scalar_end(at, &text, style))
        };

        let value = if empty {
            coerce_scalar("", ScalarStyle::Plain)
        } else {
            coerce_scalar(&text, style)
        };
        let text = if empty { String::new() } else { text };
        let id = self.push_node(
            NodeKind::Scalar(ScalarNode {
                text,
                value,
                style,
                empty,
            }),
            span,
            false,
        );
        self.last_end = span.end;
        id
    }

    /// Hand a finished node to the open container, or make it the root
    fn attach(&mut self, id: NodeId) {
        let duplicate = match self.stack.last() {
            Some(Frame::Map {
                entries,
                pending_key: Some(key),
                ..
            }) => {
                let key_text = self.key_text(*key);
                entries
                    .iter()
                    .position(|entry| key_text.is_some() && self.key_text(entry.key) == key_text)
            }
            _ => None,
        };

        match self.stack.last_mut() {
            None => {
                if self.root.is_none() {
                    self.root = Some(id);
                }
            }
            Some(Frame::Map {
                entries,
                pending_key,
                ..
            }) => match pending_key.take() {
                None => *pending_key = Some(id),
                Some(key) => {
                    let entry = MapEntry { key, value: id };
                    match duplicate {
                        Some(position) => entries[position] = entry,
                        None => entries.push(entry),
                    }
                }
            },
            Some(Frame::Sequence { items, .. }) => items.push(id),
        }
    }

    fn key_text(&self, id: NodeId) -> Option<&str> {
        match &self.nodes[id.0].kind {
            NodeKind::Scalar(scalar) => Some(scalar.text.as_str()),
            _ => None,
        }
    }

    /// Finish the innermost open container
    fn close(&mut self, end_mark: Option<usize>) {
        let Some(frame) = self.stack.pop() else {
            return;
        };

        let (id, kind) = match frame {
            Frame::Map {
                id,
                mut entries,
                pending_key,
            } => {
                if let Some(key) = pending_key {
                    let at = self.skip_indicator(self.nodes[key.0].span.end, ':');
                    let value = self.push_node(
                        NodeKind::Scalar(ScalarNode {
                            text: String::new(),
                            value: coerce_scalar("", ScalarStyle::Plain),
                            style: ScalarStyle::Plain,
                            empty: true,
                        }),
                        Span::new(at, at),
                        false,
                    );
                    entries.push(MapEntry { key, value });
                }
                (id, NodeKind::Map(entries))
            }
            Frame::Sequence { id, items } => (id, NodeKind::Sequence(items)),
        };

        let children_end = match &kind {
            NodeKind::Map(entries) => entries
                .iter()
                .map(|entry| {
                    self.nodes[entry.key.0]
                        .span
                        .end
                        .max(self.nodes[entry.value.0].span.end)
                })
                .max(),
            NodeKind::Sequence(items) => items.iter().map(|item| self.nodes[item.0].span.end).max(),
            _ => None,
        };

        let node = &self.nodes[id.0];
        let start = node.span.start;
        let closing = match &kind {
            _ if !node.flow => None,
            NodeKind::Map(_) => Some('}'),
            _ => Some(']'),
        };
        let end = match (closing, end_mark) {
            (Some(bracket), Some(mark)) if self.chars.get(mark) == Some(&bracket) => mark + 1,
            _ => children_end.unwrap_or(start).max(start),
        };

        let node = &mut self.nodes[id.0];
        node.kind = kind;
        node.span.end = end;
        self.last_end = end;
        self.attach(id);
    }

    /// Close every open container after the scanner gave up
    fn close_all(&mut self) {
        while !self.stack.is_empty() {
            self.close(None);
        }
    }

    /// Skip blanks after `from` and then one `indicator`, if present
    fn skip_indicator(&self, from: usize, indicator: char) -> usize {
        let at = self.scan_while(from, |c| c == ' ' || c == '\t' || c == '\r' || c == '\n');
        if self.chars.get(at) == Some(&indicator) {
            at + 1
        } else {
            from
        }
    }

    fn scan_while(&self, from: usize, accept: impl Fn(char) -> bool) -> usize {
        let mut at = from;
        while at < self.chars.len() && accept(self.chars[at]) {
            at += 1;
        }
        at
    }

    /// End (exclusive char index) of a scalar starting at `start`
    fn scalar_end(&self, start: usize, text: &str, style: ScalarStyle) -> usize {
        let len = self.chars.len();
        match style {
            ScalarStyle::Plain => {
                let count = text.chars().count();
                let verbatim = start + count <= len
                    && self.chars[start..start + count].iter().copied().eq(text.chars());
                if verbatim {
                    return start + count;
                }
                // Folded multi-line plain scalar: stop at the end of the first line
                let mut end = self.scan_while(start, |c| c != '\n');
                while end > start && self.chars[end - 1].is_whitespace() {
                    end -= 1;
                }
                end
            }
            ScalarStyle::SingleQuoted => {
                let mut at = start + 1;
                while at < len {
                    if self.chars[at] == '\'' {
                        if self.chars.get(at + 1) == Some(&'\'') {
                            at += 2;
                            continue;
                        }
                        return at + 1;
                    }
                    at += 1;
                }
                len
            }
            ScalarStyle::DoubleQuoted => {
                let mut at = start + 1;
                while at < len {
                    match self.chars[at] {
                        '\\' => at += 2,
                        '"' => return at + 1,
                        _ => at += 1,
                    }
                }
                len
            }
            ScalarStyle::Literal | ScalarStyle::Folded => self.block_scalar_end(start),
        }
    }

    /// A block scalar runs over the following lines indented deeper than its header line
    fn block_scalar_end(&self, header: usize) -> usize {
        let len = self.chars.len();
        let mut line_start = header;
        while line_start > 0 && self.chars[line_start - 1] != '\n' {
            line_start -= 1;
        }
        let header_indent = self.scan_while(line_start, |c| c == ' ') - line_start;

        let mut end = self.scan_while(header, |c| c != '\n');
        let mut at = end;
        while at < len {
            let next_line = at + 1;
            let content = self.scan_while(next_line, |c| c == ' ');
            let line_end = self.scan_while(content, |c| c != '\n');
            let blank = self.chars[content..line_end].iter().all(|c| c.is_whitespace());
            if !blank {
                if content - next_line <= header_indent {
                    break;
                }
                end = line_end;
            }
            if line_end >= len {
                break;
            }
            at = line_end;
        }
        end
    }

    /// Convert char-index spans to UTF-16 offsets and hand over the tree
    fn finish(self, index: &TextIndex<'_>) -> Tree {
        let nodes = self
            .nodes
            .into_iter()
            .map(|mut node| {
                node.span = Span::new(
                    index.utf16_of_char(node.span.start),
                    index.utf16_of_char(node.span.end),
                );
                node
            })
            .collect();

        Tree {
            nodes,
            root: self.root,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::tree::ScalarValue;
    use assert_matches::assert_matches;

    fn parse(text: &str) -> (Tree, Vec<crate::diagnostics::Diagnostic>) {
        let mut collector = DiagnosticCollector::new();
        let tree = parse_document(text, &mut collector);
        (tree, collector.into_diagnostics())
    }

    #[test]
    fn test_parse_valid_yaml() {
        let (tree, diagnostics) = parse("key: value\nlist:\n  - item1\n  - item2");

        assert!(diagnostics.is_empty());
        let root = tree.root().expect("root");
        assert_eq!(tree.entries(root).len(), 2);
        let list = tree.get(root, "list").expect("list");
        assert_eq!(tree.items(list).len(), 2);
    }

    #[test]
    fn test_scalar_spans_match_source() {
        let text = "name: 'it''s'\nrun: \"a\\\"b\"\non: push";
        let (tree, _) = parse(text);
        let root = tree.root().expect("root");

        let name = tree.get(root, "name").expect("name");
        assert_eq!(tree.span(name), Span::new(6, 13));
        assert_eq!(tree.text(name), Some("it's"));

        let run = tree.get(root, "run").expect("run");
        assert_eq!(tree.span(run), Span::new(19, 25));

        let on = tree.get(root, "on").expect("on");
        assert_eq!(tree.span(on), Span::new(30, 34));
    }

    #[test]
    fn test_empty_value_is_marked() {
        let (tree, diagnostics) = parse("on:\n  push:\njobs:");
        assert!(diagnostics.is_empty());

        let root = tree.root().expect("root");
        let on = tree.get(root, "on").expect("on");
        let push = tree.get(on, "push").expect("push");
        assert!(tree.node(push).is_empty_scalar());
        assert_eq!(tree.span(push), Span::new(11, 11));

        let jobs = tree.get(root, "jobs").expect("jobs");
        assert!(tree.node(jobs).is_empty_scalar());
    }

    #[test]
    fn test_flow_sequence_span_includes_brackets() {
        let text = "on: [ push, check_run ]";
        let (tree, _) = parse(text);
        let root = tree.root().expect("root");
        let on = tree.get(root, "on").expect("on");

        assert!(tree.node(on).flow);
        assert_eq!(tree.span(on), Span::new(4, text.len()));
        let second = tree.items(on)[1];
        assert_eq!(tree.span(second), Span::new(12, 21));
    }

    #[test]
    fn test_block_collection_spans_cover_children() {
        let text = "jobs:\n  build:\n    runs-on: ubuntu-latest\n";
        let (tree, _) = parse(text);
        let root = tree.root().expect("root");
        let jobs = tree.get(root, "jobs").expect("jobs");

        assert_eq!(tree.span(jobs).start, 8);
        assert_eq!(tree.span(jobs).end, text.len() - 1);
        assert_eq!(tree.span(root), Span::new(0, text.len() - 1));
    }

    #[test]
    fn test_block_scalar_span() {
        let text = "run: |\n  echo one\n  echo two\nname: x";
        let (tree, _) = parse(text);
        let root = tree.root().expect("root");
        let run = tree.get(root, "run").expect("run");

        assert_eq!(tree.span(run), Span::new(5, 28));
        assert_eq!(tree.text(run), Some("echo one\necho two\n"));
    }

    #[test]
    fn test_duplicate_keys_last_wins() {
        let (tree, _) = parse("name: a\nname: b");
        let root = tree.root().expect("root");

        assert_eq!(tree.entries(root).len(), 1);
        let name = tree.get(root, "name").expect("name");
        assert_eq!(tree.text(name), Some("b"));
    }

    #[test]
    fn test_scalar_values_are_coerced() {
        let (tree, _) = parse("a: 42\nb: 'x'\nc: true\nd: ~");
        let root = tree.root().expect("root");

        let value = |key| {
            tree.scalar(tree.get(root, key).expect(key))
                .map(|scalar| scalar.value.clone())
        };
        assert_eq!(value("a"), Some(ScalarValue::Number(42.0)));
        assert_eq!(value("b"), Some(ScalarValue::String("x".to_string())));
        assert_eq!(value("c"), Some(ScalarValue::Bool(true)));
        assert_eq!(value("d"), Some(ScalarValue::Null));
    }

    #[test]
    fn test_alias_resolves_to_anchor() {
        let (tree, _) = parse("base: &b ubuntu-latest\nother: *b");
        let root = tree.root().expect("root");
        let base = tree.get(root, "base").expect("base");
        let other = tree.get(root, "other").expect("other");

        assert_matches!(tree.node(other).kind, NodeKind::Alias(Some(target)) if target == base);
        assert_eq!(tree.to_value()["other"], serde_yaml::Value::from("ubuntu-latest"));
    }

    #[test]
    fn test_parse_invalid_yaml_keeps_partial_tree() {
        let (tree, diagnostics) = parse("name: ok\non: push\n  bad: [indent");

        assert!(!diagnostics.is_empty());
        let root = tree.root().expect("partial root");
        assert!(tree.get(root, "name").is_some());
    }

    #[test]
    fn test_parse_invalid_yaml_unclosed_quote() {
        let (_, diagnostics) = parse("key: \"unclosed");
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn test_parse_empty_yaml() {
        let (tree, diagnostics) = parse("");
        assert!(diagnostics.is_empty());
        assert!(tree.root().is_none());
        assert_eq!(tree.to_value(), serde_yaml::Value::Null);
    }

    #[test]
    fn test_parse_yaml_comment_only() {
        let (tree, diagnostics) = parse("# This is a comment\n# Another comment");
        assert!(diagnostics.is_empty());
        assert!(tree.root().is_none());
    }

    #[test]
    fn test_only_first_document_is_kept() {
        let (tree, _) = parse("name: one\n---\nname: two\n");
        let root = tree.root().expect("root");
        assert_eq!(tree.text(tree.get(root, "name").expect("name")), Some("one"));
    }

    #[test]
    fn test_utf16_spans() {
        let (tree, _) = parse("name: 😀\non: push");
        let root = tree.root().expect("root");
        let on = tree.get(root, "on").expect("on");
        assert_eq!(tree.span(on), Span::new(13, 17));
    }
}
