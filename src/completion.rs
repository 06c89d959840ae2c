//! Completion
//!
//! Resolves the cursor location, looks up the description validation matched
//! there (walking the schema down the same path when validation rejected the
//! node) and offers what it allows: property names for mappings, literals for
//! values, and context members inside `${{ ... }}`.

use std::collections::HashSet;
use std::sync::Arc;

use crate::context::{ContextProvider, ContextProviderFactory};
use crate::document::TextIndex;
use crate::expressions::open_expression;
use crate::parser::{locate, Location, NodeId, NodeKind, PropertyPath, Region, Shape};
use crate::schema::{DescKind, NodeDesc, Schema};
use crate::WorkflowDocument;

/// Context namespaces offered at the start of an expression
const NAMESPACES: &[&str] = &["env", "github", "secrets", "runner", "job", "matrix"];

/// A completion candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suggestion {
    pub value: String,
    pub label: Option<String>,
    pub description: Option<String>,
}

impl Suggestion {
    pub fn new(value: &str) -> Self {
        Self {
            value: value.to_string(),
            label: None,
            description: None,
        }
    }
}

/// Candidate found while walking the schema; context lookups are deferred
/// so the walk itself stays synchronous
enum Candidate {
    Literal(Suggestion),
    Context(String),
}

/// Parse and validate `text`, then complete at `offset`
pub async fn complete(
    text: &str,
    offset: usize,
    schema: &Schema,
    factory: &dyn ContextProviderFactory,
) -> Vec<Suggestion> {
    let doc = crate::parse(text, schema, factory).await;
    complete_document(&doc, text, offset, schema, factory).await
}

/// Complete at `offset` in an already parsed document
pub async fn complete_document(
    doc: &WorkflowDocument,
    text: &str,
    offset: usize,
    schema: &Schema,
    factory: &dyn ContextProviderFactory,
) -> Vec<Suggestion> {
    let index = TextIndex::new(text);
    let Some(location) = locate(&doc.tree, &index, offset) else {
        return Vec::new();
    };
    let provider = factory.get(&doc.workflow, &location.path).await;

    if let Some(source) = open_expression(index.line_before(offset)) {
        let suggestions = complete_expression(source, provider.as_ref()).await;
        tracing::debug!("Expression completion: {} candidates", suggestions.len());
        return suggestions;
    }

    let Some((desc, shape, present)) = target(doc, schema, &location) else {
        tracing::debug!("No schema description at {}", location.path);
        return Vec::new();
    };
    let prefix = prefix(doc, &index, &location, offset);

    let mut candidates = Vec::new();
    collect(schema, &desc, shape, false, &present, &mut candidates);

    let mut suggestions = Vec::new();
    for candidate in candidates {
        match candidate {
            Candidate::Literal(suggestion) => suggestions.push(suggestion),
            Candidate::Context(key) => suggestions.extend(
                provider
                    .suggest_additional_values(&key)
                    .await
                    .iter()
                    .map(|value| Suggestion::new(value)),
            ),
        }
    }

    let mut seen = HashSet::new();
    suggestions.retain(|s| s.value.starts_with(prefix.as_str()) && seen.insert(s.value.clone()));

    tracing::debug!(
        "Completion at {} ({:?}): {} candidates",
        location.path,
        location.region,
        suggestions.len()
    );
    suggestions
}

/// Description to complete against, the node shape at the cursor, and the
/// keys already present when completing keys
fn target(
    doc: &WorkflowDocument,
    schema: &Schema,
    location: &Location,
) -> Option<(Arc<NodeDesc>, Shape, Vec<String>)> {
    let tree = &doc.tree;

    let Some(node) = location.node else {
        return Some((schema.root.clone(), Shape::Empty, Vec::new()));
    };

    match location.region {
        Region::Key => {
            let parent = location.path.parent()?;
            let map = tree.at_path(&parent)?;
            let editing = tree.text(node);
            let present = keys_of(doc, map)
                .into_iter()
                .filter(|key| Some(key.as_str()) != editing)
                .collect();
            Some((desc_of(doc, schema, map, &parent)?, Shape::Mapping, present))
        }
        Region::Value => Some((
            desc_of(doc, schema, node, &location.path)?,
            Shape::Scalar,
            Vec::new(),
        )),
        Region::Empty => match &tree.node(node).kind {
            NodeKind::Map(_) => Some((
                desc_of(doc, schema, node, &location.path)?,
                Shape::Mapping,
                keys_of(doc, node),
            )),
            // The path points at the new element, not at the sequence
            NodeKind::Sequence(_) => {
                Some((schema.at_path(&location.path)?, Shape::Empty, Vec::new()))
            }
            _ => Some((
                desc_of(doc, schema, node, &location.path)?,
                Shape::Empty,
                Vec::new(),
            )),
        },
    }
}

/// The description validation matched `node` against, or a fresh descent
/// when validation rejected it (a key typed where a mapping belongs)
fn desc_of(
    doc: &WorkflowDocument,
    schema: &Schema,
    node: NodeId,
    path: &PropertyPath,
) -> Option<Arc<NodeDesc>> {
    match doc.node_to_desc.get(&node) {
        Some(desc) => Some(desc.clone()),
        None => schema.at_path(path),
    }
}

fn keys_of(doc: &WorkflowDocument, map: NodeId) -> Vec<String> {
    doc.tree
        .entries(map)
        .iter()
        .filter_map(|entry| doc.tree.text(entry.key))
        .map(str::to_string)
        .collect()
}

/// Text already typed left of the cursor
fn prefix(
    doc: &WorkflowDocument,
    index: &TextIndex<'_>,
    location: &Location,
    offset: usize,
) -> String {
    let scalar_start = location
        .node
        .filter(|_| location.region != Region::Empty)
        .map(|node| doc.tree.span(node).start);

    match scalar_start {
        Some(start) if start <= offset => index
            .slice(start, offset)
            .trim_start_matches(|c: char| c == '\'' || c == '"')
            .to_string(),
        _ => {
            // Insertion point: the word in progress the parser could not place
            let line = index.line_before(offset);
            let start = word_start(line, |c| c.is_whitespace() || "-:[]{},".contains(c));
            line[start..].to_string()
        }
    }
}

fn collect(
    schema: &Schema,
    desc: &Arc<NodeDesc>,
    shape: Shape,
    values_only: bool,
    present: &[String],
    out: &mut Vec<Candidate>,
) {
    let Some(desc) = schema.resolve(desc) else {
        return;
    };

    match (&desc.kind, shape) {
        (DescKind::Value(value), Shape::Scalar | Shape::Empty) => {
            out.extend(value.allowed.iter().map(|allowed| {
                Candidate::Literal(Suggestion {
                    value: allowed.value.clone(),
                    label: allowed.label.clone(),
                    description: allowed.description.clone(),
                })
            }));
            if let Some(key) = &value.context {
                out.push(Candidate::Context(key.clone()));
            }
        }
        // A scalar where a mapping belongs is a key being typed
        (DescKind::Object(object), Shape::Scalar | Shape::Empty | Shape::Mapping)
            if !values_only =>
        {
            for property in &object.properties {
                if present.contains(&property.name) {
                    continue;
                }
                let description = schema
                    .resolve(&property.desc)
                    .and_then(|resolved| resolved.description.clone());
                out.push(Candidate::Literal(Suggestion {
                    value: property.name.clone(),
                    label: None,
                    description,
                }));
            }
        }
        (DescKind::Array(item), Shape::Empty) if !values_only => {
            collect(schema, item, Shape::Empty, true, present, out);
        }
        (DescKind::OneOf(alternatives), shape) => {
            for alternative in alternatives {
                collect(schema, alternative, shape, values_only, present, out);
            }
        }
        _ => {}
    }
}

/// Byte index just past the last char of `text` matching `is_boundary`
fn word_start(text: &str, is_boundary: impl Fn(char) -> bool) -> usize {
    text.char_indices()
        .rev()
        .find(|(_, c)| is_boundary(*c))
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(0)
}

/// Members of the context object addressed by the expression text left of
/// the cursor
async fn complete_expression(source: &str, provider: &dyn ContextProvider) -> Vec<Suggestion> {
    let start = word_start(source, |c| {
        !(c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
    });
    let word = &source[start..];

    let (object, partial) = match word.rfind('.') {
        Some(dot) => (&word[..dot], &word[dot + 1..]),
        None => ("", word),
    };

    let mut candidates = Vec::new();
    if object.is_empty() {
        for namespace in NAMESPACES {
            if provider.resolve(namespace).await.is_some() {
                candidates.push(namespace.to_string());
            }
        }
    } else if let Some(value) = provider.resolve(object).await {
        candidates.extend(value.keys().into_iter().map(str::to_string));
    }

    candidates
        .into_iter()
        .filter(|candidate| candidate.starts_with(partial))
        .map(|candidate| Suggestion::new(&candidate))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{StaticContextProvider, StaticContextProviderFactory};
    use crate::expressions::ExprValue;
    use crate::schema::workflow_schema;

    /// `|` in the input marks the cursor
    async fn values(input: &str, factory: &StaticContextProviderFactory) -> Vec<String> {
        let marker = input.find('|').expect("cursor marker");
        let offset = input[..marker].encode_utf16().count();
        let text = input.replace('|', "");
        complete(&text, offset, &workflow_schema(), factory)
            .await
            .into_iter()
            .map(|s| s.value)
            .collect()
    }

    #[tokio::test]
    async fn test_prefix_is_case_sensitive() {
        let factory = StaticContextProviderFactory::default();
        assert!(values("N|", &factory).await.is_empty());
        assert_eq!(values("j|", &factory).await, vec!["jobs"]);
    }

    #[tokio::test]
    async fn test_context_values_are_merged() {
        let factory = StaticContextProviderFactory::new(
            StaticContextProvider::new().with_suggestions("jobs", &["build", "lint"]),
        );
        let text = "on: push\njobs:\n  build:\n    runs-on: ubuntu-latest\n  test:\n    needs: |";
        assert_eq!(values(text, &factory).await, vec!["build", "lint"]);
    }

    #[tokio::test]
    async fn test_expression_namespaces_and_members() {
        let factory = StaticContextProviderFactory::new(
            StaticContextProvider::new()
                .with_value(
                    "env",
                    ExprValue::object([
                        ("WF_VALUE", ExprValue::Number(1.0)),
                        ("OTHER", ExprValue::Null),
                    ]),
                )
                .with_value("github", ExprValue::object([("ref", ExprValue::from("main"))])),
        );

        assert_eq!(
            values("on: push\nname: ${{ |", &factory).await,
            vec!["env", "github"]
        );
        assert_eq!(
            values("on: push\nname: ${{ env.W|", &factory).await,
            vec!["WF_VALUE"]
        );
        assert_eq!(
            values("on: push\nname: ${{ env.WF_VALUE == github.|", &factory).await,
            vec!["ref"]
        );
    }

    #[tokio::test]
    async fn test_non_ascii_before_cursor_in_expression() {
        let factory = StaticContextProviderFactory::new(
            StaticContextProvider::new()
                .with_value("env", ExprValue::object([("A", ExprValue::Null)])),
        );
        assert_eq!(values("on: push\nname: ${{ é|", &factory).await, vec!["env"]);
        assert_eq!(values("on: push\nname: ${{ éenv.|", &factory).await, vec!["A"]);
    }

    #[test]
    fn test_word_start_on_multibyte_boundary() {
        assert_eq!(word_start("a é", char::is_whitespace), 2);
        assert_eq!(word_start("x\u{3000}ab", char::is_whitespace), 4);
        assert_eq!(word_start("abc", char::is_whitespace), 0);
    }

    #[tokio::test]
    async fn test_no_completion_after_closed_expression() {
        let factory = StaticContextProviderFactory::default();
        assert!(values("on: push\nname: ${{ env.A }} x|", &factory).await.is_empty());
    }

    #[tokio::test]
    async fn test_offset_outside_document() {
        let factory = StaticContextProviderFactory::default();
        let suggestions = complete("on: push", 100, &workflow_schema(), &factory).await;
        assert!(suggestions.is_empty());
    }
}
