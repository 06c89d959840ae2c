//! actions-yaml-lsp: schema-driven language support for GitHub Actions workflows
//!
//! This library provides the core functionality for the actions-yaml-lsp server:
//! - A position-aware YAML tree with cursor location resolution
//! - A schema model and the workflow schema built on it
//! - Validation producing diagnostics and a node-to-description index
//! - Completion and hover driven by the schema
//! - Evaluation of `${{ ... }}` expressions through pluggable context providers
//!
//! # Example
//!
//! ```
//! use actions_yaml_lsp::context::StaticContextProviderFactory;
//! use actions_yaml_lsp::schema::workflow_schema;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let text = "on: push\njobs:\n  build:\n    runs-on: ubuntu-latest";
//! let factory = StaticContextProviderFactory::default();
//! let doc = actions_yaml_lsp::parse(text, &workflow_schema(), &factory).await;
//! assert!(doc.diagnostics.is_empty());
//! # });
//! ```

pub mod completion;
pub mod context;
pub mod diagnostics;
pub mod document;
pub mod expressions;
pub mod hover;
pub mod parser;
pub mod schema;

mod backend;

pub use backend::Backend;

use serde_yaml::Value;

use context::ContextProviderFactory;
use diagnostics::{validate, Diagnostic, DiagnosticCollector, NodeDescIndex};
use parser::{parse_document, Tree};
use schema::Schema;

/// A parsed and validated document
#[derive(Debug, Clone)]
pub struct WorkflowDocument {
    /// Plain value projection of the tree, `Null` when nothing parsed
    pub workflow: Value,
    pub tree: Tree,
    pub node_to_desc: NodeDescIndex,
    /// Syntax errors followed by schema diagnostics
    pub diagnostics: Vec<Diagnostic>,
}

/// Parse `text` and validate it against `schema`
pub async fn parse(
    text: &str,
    schema: &Schema,
    factory: &dyn ContextProviderFactory,
) -> WorkflowDocument {
    let mut collector = DiagnosticCollector::new();
    let tree = parse_document(text, &mut collector);
    let workflow = tree.to_value();

    let result = validate(&tree, schema, &workflow, factory).await;
    let mut diagnostics = collector.into_diagnostics();
    diagnostics.extend(result.diagnostics);

    WorkflowDocument {
        workflow,
        tree,
        node_to_desc: result.node_to_desc,
        diagnostics,
    }
}
