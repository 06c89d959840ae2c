//! Hover
//!
//! Shows the description of the key or value under the cursor. Inside a
//! `${{ ... }}` the scalar's template is evaluated instead.

use std::sync::Arc;

use crate::context::ContextProviderFactory;
use crate::document::TextIndex;
use crate::expressions::{evaluate_template, scan_expressions};
use crate::parser::{locate, Location, NodeId, Region};
use crate::schema::{DescKind, NodeDesc, Schema};
use crate::WorkflowDocument;

/// Text shown for the hovered position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoverResult {
    pub description: String,
}

/// Parse and validate `text`, then hover at `offset`
pub async fn hover(
    text: &str,
    offset: usize,
    schema: &Schema,
    factory: &dyn ContextProviderFactory,
) -> Option<HoverResult> {
    let doc = crate::parse(text, schema, factory).await;
    hover_document(&doc, text, offset, schema, factory).await
}

/// Hover at `offset` in an already parsed document
pub async fn hover_document(
    doc: &WorkflowDocument,
    text: &str,
    offset: usize,
    schema: &Schema,
    factory: &dyn ContextProviderFactory,
) -> Option<HoverResult> {
    let index = TextIndex::new(text);
    let location = locate(&doc.tree, &index, offset)?;
    let node = location.node?;
    tracing::debug!("Hover at {} ({:?})", location.path, location.region);

    match location.region {
        Region::Key => {
            let desc = description_of(doc, schema, &location, node)?;
            desc.description.clone().map(|description| HoverResult { description })
        }
        Region::Value => {
            // Blanks between a key's colon and its value
            if !doc.tree.span(node).touches(offset) {
                return None;
            }
            let scalar = doc.tree.scalar(node)?;

            if in_expression(doc, &index, node, offset) {
                let provider = factory.get(&doc.workflow, &location.path).await;
                let value = evaluate_template(&scalar.text, provider.as_ref()).await;
                return Some(HoverResult {
                    description: format!("Evaluates to: `{}`", value),
                });
            }

            let desc = description_of(doc, schema, &location, node)?;
            let literal = match &desc.kind {
                DescKind::Value(value) => value
                    .find(&scalar.text)
                    .and_then(|allowed| allowed.description.clone()),
                _ => None,
            };
            literal
                .or_else(|| desc.description.clone())
                .map(|description| HoverResult { description })
        }
        Region::Empty => None,
    }
}

/// The index entry for `node`, or a fresh descent when validation skipped it
fn description_of(
    doc: &WorkflowDocument,
    schema: &Schema,
    location: &Location,
    node: NodeId,
) -> Option<Arc<NodeDesc>> {
    if let Some(desc) = doc.node_to_desc.get(&node) {
        return Some(desc.clone());
    }
    let desc = schema.at_path(&location.path)?;
    schema.resolve(&desc)
}

/// Whether `offset` falls inside a `${{ ... }}` of the scalar's source text
fn in_expression(
    doc: &WorkflowDocument,
    index: &TextIndex<'_>,
    node: NodeId,
    offset: usize,
) -> bool {
    let span = doc.tree.span(node);
    let source = index.slice(span.start, span.end);
    let Some(cursor) = index
        .byte_of_utf16(offset)
        .checked_sub(index.byte_of_utf16(span.start))
    else {
        return false;
    };

    scan_expressions(source)
        .iter()
        .any(|expression| expression.range.start <= cursor && cursor <= expression.range.end)
}
