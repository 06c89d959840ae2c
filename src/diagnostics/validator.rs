//! Schema validation
//!
//! Walks the tree and the schema in lock-step. Every node that reaches a
//! matching description is recorded in the [`NodeDescIndex`], which completion
//! and hover consult afterwards. Mismatches become diagnostics and stop the
//! descent below the mismatched node only.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_yaml::Value;

use super::collector::{Diagnostic, DiagnosticCollector};
use crate::context::ContextProviderFactory;
use crate::expressions::{contains_expression, parse_expression, scan_expressions};
use crate::parser::{NodeId, NodeKind, PropertyPath, Tree};
use crate::schema::{DescKind, NodeDesc, ObjectDesc, Schema, ValueDesc};

/// Description each visited node was validated against
pub type NodeDescIndex = HashMap<NodeId, Arc<NodeDesc>>;

/// Output of one validation pass
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
    pub node_to_desc: NodeDescIndex,
}

/// Validate `tree` against `schema`.
///
/// `workflow` is the plain value projection of the tree, handed to the
/// factory when a context-resolved value needs a provider.
pub async fn validate(
    tree: &Tree,
    schema: &Schema,
    workflow: &Value,
    factory: &dyn ContextProviderFactory,
) -> ValidationResult {
    let mut validator = Validator {
        tree,
        schema,
        workflow,
        factory,
        collector: DiagnosticCollector::new(),
        index: NodeDescIndex::new(),
    };

    if let Some(root) = tree.root() {
        validator
            .visit(root, schema.root.clone(), PropertyPath::root())
            .await;
    }

    tracing::debug!(
        "Validation produced {} diagnostics, {} indexed nodes",
        validator.collector.len(),
        validator.index.len()
    );

    ValidationResult {
        diagnostics: validator.collector.into_diagnostics(),
        node_to_desc: validator.index,
    }
}

type VisitFuture<'b> = Pin<Box<dyn Future<Output = ()> + Send + 'b>>;

struct Validator<'a> {
    tree: &'a Tree,
    schema: &'a Schema,
    workflow: &'a Value,
    factory: &'a dyn ContextProviderFactory,
    collector: DiagnosticCollector,
    index: NodeDescIndex,
}

impl<'a> Validator<'a> {
    fn visit<'b>(
        &'b mut self,
        id: NodeId,
        desc: Arc<NodeDesc>,
        path: PropertyPath,
    ) -> VisitFuture<'b> {
        Box::pin(async move {
            let Some(desc) = self.schema.resolve(&desc) else {
                return;
            };
            let tree = self.tree;
            let node = tree.node(id);

            if let NodeKind::Alias(_) = node.kind {
                self.index.insert(id, desc);
                return;
            }

            match &desc.kind {
                DescKind::Object(object) => match &node.kind {
                    NodeKind::Map(_) => {
                        self.index.insert(id, desc.clone());
                        self.visit_object(id, object, path).await;
                    }
                    NodeKind::Scalar(scalar) if scalar.empty => {
                        self.index.insert(id, desc.clone());
                        self.report_missing(id, object, |_| false);
                    }
                    _ => self.error(id, "Expected a mapping".to_string()),
                },
                DescKind::Array(item) => match &node.kind {
                    NodeKind::Sequence(items) => {
                        self.index.insert(id, desc.clone());
                        for (i, child) in items.iter().enumerate() {
                            self.visit(*child, item.clone(), path.index(i)).await;
                        }
                    }
                    NodeKind::Scalar(scalar) if scalar.empty => {
                        self.index.insert(id, desc.clone());
                    }
                    _ => self.error(id, "Expected a sequence".to_string()),
                },
                DescKind::Value(value) => match &node.kind {
                    NodeKind::Scalar(_) => {
                        self.index.insert(id, desc.clone());
                        self.check_value(id, value, &path).await;
                    }
                    _ => self.error(id, "Expected a scalar value".to_string()),
                },
                DescKind::OneOf(alternatives) => {
                    let shape = node.shape();
                    let matched = alternatives
                        .iter()
                        .find(|alternative| self.schema.accepts_shape(alternative, shape));
                    match matched {
                        Some(alternative) => {
                            let alternative = inherit_description(alternative, &desc);
                            self.visit(id, alternative, path).await;
                        }
                        None => {
                            let expected = self.schema.shape_names(&desc).join(", ");
                            self.error(id, format!("Expected one of: {}", expected));
                        }
                    }
                }
                DescKind::Ref(_) => {}
            }
        })
    }

    async fn visit_object(&mut self, id: NodeId, object: &ObjectDesc, path: PropertyPath) {
        let tree = self.tree;
        let entries = tree.entries(id);

        self.report_missing(id, object, |name| tree.get(id, name).is_some());

        for entry in entries {
            let Some(key) = tree.text(entry.key) else {
                continue;
            };
            match object.lookup(key) {
                Some(child) => {
                    if let Some(resolved) = self.schema.resolve(&child) {
                        self.index.insert(entry.key, resolved);
                    }
                    self.visit(entry.value, child, path.key(key)).await;
                }
                None => self.error(entry.key, format!("Key '{}' is not allowed", key)),
            }
        }
    }

    fn report_missing(&mut self, id: NodeId, object: &ObjectDesc, present: impl Fn(&str) -> bool) {
        for property in object.properties.iter().filter(|p| p.required) {
            if !present(&property.name) {
                self.error(id, format!("Missing required key '{}'", property.name));
            }
        }
    }

    async fn check_value(&mut self, id: NodeId, value: &ValueDesc, path: &PropertyPath) {
        let tree = self.tree;
        let Some(scalar) = tree.scalar(id) else {
            return;
        };
        if scalar.empty {
            return;
        }
        let text = scalar.text.as_str();

        if value.expressions && contains_expression(text) {
            for expression in scan_expressions(text) {
                if let Err(err) = parse_expression(expression.source(text)) {
                    self.error(id, format!("Invalid expression: {}", err));
                }
            }
            return;
        }

        if !value.enforce || value.matches(text) {
            return;
        }

        let mut expected: Vec<String> = value.allowed.iter().map(|a| a.value.clone()).collect();
        if let Some(key) = &value.context {
            let provider = self.factory.get(self.workflow, path).await;
            let extra = provider.suggest_additional_values(key).await;
            // The provider can't tell, so accept
            if extra.is_empty() {
                return;
            }
            if extra.iter().any(|candidate| candidate == text) {
                return;
            }
            expected.extend(extra);
        }

        if !expected.is_empty() {
            self.error(
                id,
                format!(
                    "'{}' is not a valid value, expected one of: {}",
                    text,
                    expected.join(", ")
                ),
            );
        }
    }

    fn error(&mut self, id: NodeId, message: String) {
        self.collector.add_error(message, self.tree.span(id));
    }
}

/// An alternative without a description of its own shows its parent's
fn inherit_description(alternative: &Arc<NodeDesc>, parent: &NodeDesc) -> Arc<NodeDesc> {
    match (&alternative.description, &parent.description) {
        (None, Some(description)) => Arc::new(NodeDesc {
            description: Some(description.clone()),
            kind: alternative.kind.clone(),
        }),
        _ => alternative.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{StaticContextProvider, StaticContextProviderFactory};
    use crate::parser::parse_document;
    use crate::schema::workflow_schema;

    async fn run(text: &str, factory: StaticContextProviderFactory) -> (Tree, ValidationResult) {
        let mut collector = DiagnosticCollector::new();
        let tree = parse_document(text, &mut collector);
        assert!(collector.is_empty(), "unexpected syntax errors");
        let result = validate(&tree, &workflow_schema(), &tree.to_value(), &factory).await;
        (tree, result)
    }

    async fn messages(text: &str) -> Vec<String> {
        let (_, result) = run(text, StaticContextProviderFactory::default()).await;
        result.diagnostics.into_iter().map(|d| d.message).collect()
    }

    const JOB: &str = "on: push\njobs:\n  build:\n    runs-on: ubuntu-latest\n";

    const VALID: &str = r#"name: CI
on:
  push:
    branches: [main]
  pull_request:
    types: [opened, synchronize]
env:
  WF: 1
jobs:
  build:
    runs-on: ubuntu-latest
    steps:
      - uses: actions/checkout@v2
      - run: echo ${{ env.WF }}
        shell: bash
  test:
    needs: build
    runs-on: [self-hosted, linux]
    steps:
      - run: cargo test
"#;

    #[tokio::test]
    async fn test_valid_workflow_indexes_every_node() {
        let (tree, result) = run(VALID, StaticContextProviderFactory::default()).await;

        assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
        for id in tree.descendants() {
            assert!(result.node_to_desc.contains_key(&id), "{:?} not indexed", tree.node(id));
        }
    }

    #[tokio::test]
    async fn test_missing_required_keys() {
        let (tree, result) = run("name: CI", StaticContextProviderFactory::default()).await;
        let root_span = tree.span(tree.root().expect("root"));

        let messages: Vec<&str> = result.diagnostics.iter().map(|d| d.message.as_str()).collect();
        assert_eq!(messages, vec!["Missing required key 'jobs'", "Missing required key 'on'"]);
        assert!(result.diagnostics.iter().all(|d| d.pos == root_span));
    }

    #[tokio::test]
    async fn test_unknown_keys() {
        assert_eq!(
            messages("on: push\njobs: {}\nfoo: bar").await,
            vec!["Key 'foo' is not allowed"]
        );
        assert_eq!(
            messages("on: push\njobs:\n  1build:\n    runs-on: ubuntu-latest").await,
            vec!["Key '1build' is not allowed"]
        );
    }

    #[tokio::test]
    async fn test_invalid_literal() {
        let messages = messages("on: pushh\njobs: {}").await;
        assert_eq!(messages.len(), 1);
        assert!(messages[0]
            .starts_with("'pushh' is not a valid value, expected one of: check_run, check_suite,"));
    }

    #[tokio::test]
    async fn test_shape_mismatches() {
        assert_eq!(messages("on: push\njobs: [a]").await, vec!["Expected a mapping"]);
        assert_eq!(
            messages("on: push\njobs:\n  build:\n    runs-on: ubuntu-latest\n    steps: run").await,
            vec!["Expected a sequence"]
        );
        assert_eq!(
            messages("on: push\nname: [a]\njobs: {}").await,
            vec!["Expected a scalar value"]
        );
    }

    #[tokio::test]
    async fn test_no_alternative_fits_shape() {
        assert_eq!(
            messages(&format!("{}    needs:\n      a: b", JOB)).await,
            vec!["Expected one of: scalar, sequence"]
        );
    }

    #[tokio::test]
    async fn test_missing_required_key_in_job() {
        assert_eq!(
            messages("on: push\njobs:\n  build:\n    name: Build").await,
            vec!["Missing required key 'runs-on'"]
        );
        assert_eq!(
            messages("on: push\njobs:\n  build:").await,
            vec!["Missing required key 'runs-on'"]
        );
    }

    #[tokio::test]
    async fn test_invalid_expression() {
        assert_eq!(
            messages(&format!("{}    name: ${{{{ env. }}}}", JOB)).await,
            vec!["Invalid expression: unexpected end of expression"]
        );
    }

    #[tokio::test]
    async fn test_expression_skips_literal_check() {
        let text = format!("{}    continue-on-error: ${{{{ env.FLAKY }}}}", JOB);
        assert!(messages(&text).await.is_empty());
    }

    #[tokio::test]
    async fn test_context_resolved_values() {
        let text = format!(
            "{}  test:\n    runs-on: ubuntu-latest\n    needs: [build, deploy]",
            JOB
        );
        let factory = StaticContextProviderFactory::new(
            StaticContextProvider::new().with_suggestions("jobs", &["build"]),
        );
        let (_, result) = run(&text, factory).await;

        let messages: Vec<&str> = result.diagnostics.iter().map(|d| d.message.as_str()).collect();
        assert_eq!(messages, vec!["'deploy' is not a valid value, expected one of: build"]);
    }

    #[tokio::test]
    async fn test_validation_is_idempotent() {
        let (_, first) = run(VALID, StaticContextProviderFactory::default()).await;
        let (_, second) = run(VALID, StaticContextProviderFactory::default()).await;

        assert_eq!(first.diagnostics, second.diagnostics);
        let mut first_keys: Vec<_> = first.node_to_desc.keys().collect();
        let mut second_keys: Vec<_> = second.node_to_desc.keys().collect();
        first_keys.sort();
        second_keys.sort();
        assert_eq!(first_keys, second_keys);
    }
}
