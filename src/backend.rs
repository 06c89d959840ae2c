//! LSP Backend implementation

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer};

use crate::completion::{complete_document, Suggestion};
use crate::context::{ContextConfig, WorkflowContextProviderFactory};
use crate::document::{Document, TextIndex};
use crate::hover::hover_document;
use crate::schema::{workflow_schema, Schema};

/// The LSP backend that handles all language server requests
pub struct Backend {
    /// The LSP client for sending notifications
    client: Client,
    /// Map of document URIs to their state
    documents: Arc<RwLock<HashMap<Url, Document>>>,
    schema: Arc<Schema>,
    /// Replaced once the client's initialization options are known
    factory: Arc<RwLock<Arc<WorkflowContextProviderFactory>>>,
}

impl Backend {
    /// Create a new backend instance
    pub fn new(client: Client) -> Self {
        Self {
            client,
            documents: Arc::new(RwLock::new(HashMap::new())),
            schema: workflow_schema(),
            factory: Arc::new(RwLock::new(Arc::new(
                WorkflowContextProviderFactory::default(),
            ))),
        }
    }

    async fn factory(&self) -> Arc<WorkflowContextProviderFactory> {
        self.factory.read().await.clone()
    }

    /// Validate a document, store the result and publish diagnostics
    async fn validate_document(&self, uri: &Url, text: String, version: i32) {
        let factory = self.factory().await;
        let parsed = crate::parse(&text, &self.schema, factory.as_ref()).await;

        let diagnostics: Vec<_> = {
            let index = TextIndex::new(&text);
            parsed.diagnostics.iter().map(|d| d.to_lsp(&index)).collect()
        };
        tracing::debug!("{} diagnostics for {}", diagnostics.len(), uri);

        {
            let mut docs = self.documents.write().await;
            let mut document = Document::new(text, version);
            document.parsed = Some(parsed);
            docs.insert(uri.clone(), document);
        }

        self.client
            .publish_diagnostics(uri.clone(), diagnostics, Some(version))
            .await;
    }

    /// Snapshot of a stored document
    async fn document(&self, uri: &Url) -> Option<Document> {
        self.documents.read().await.get(uri).cloned()
    }
}

fn completion_item(suggestion: Suggestion) -> CompletionItem {
    CompletionItem {
        label: suggestion.label.unwrap_or_else(|| suggestion.value.clone()),
        insert_text: Some(suggestion.value),
        documentation: suggestion.description.map(|description| {
            Documentation::MarkupContent(MarkupContent {
                kind: MarkupKind::Markdown,
                value: description,
            })
        }),
        ..Default::default()
    }
}

#[tower_lsp::async_trait]
impl LanguageServer for Backend {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        let config = ContextConfig::from_initialization_options(params.initialization_options);
        tracing::info!(
            "Using repository {}/{} with {} configured secrets",
            config.owner,
            config.repository,
            config.secrets.len()
        );
        *self.factory.write().await = Arc::new(WorkflowContextProviderFactory::new(config));

        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Kind(
                    TextDocumentSyncKind::FULL,
                )),
                completion_provider: Some(CompletionOptions {
                    trigger_characters: Some(
                        [":", " ", "-", "."].iter().map(|c| c.to_string()).collect(),
                    ),
                    ..Default::default()
                }),
                hover_provider: Some(HoverProviderCapability::Simple(true)),
                ..Default::default()
            },
            server_info: Some(ServerInfo {
                name: "actions-yaml-lsp".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        tracing::info!("Server initialized");
    }

    async fn shutdown(&self) -> Result<()> {
        tracing::info!("Server shutting down");
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let uri = params.text_document.uri;
        tracing::debug!("Document opened: {}", uri);

        self.validate_document(&uri, params.text_document.text, params.text_document.version)
            .await;
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let uri = params.text_document.uri;
        let version = params.text_document.version;

        // Get the full text from the changes (we use FULL sync)
        if let Some(change) = params.content_changes.into_iter().next() {
            tracing::debug!("Document changed: {}", uri);
            self.validate_document(&uri, change.text, version).await;
        }
    }

    async fn did_save(&self, params: DidSaveTextDocumentParams) {
        tracing::debug!("Document saved: {}", params.text_document.uri);
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let uri = params.text_document.uri;
        tracing::debug!("Document closed: {}", uri);

        // Remove document from our state
        {
            let mut docs = self.documents.write().await;
            docs.remove(&uri);
        }

        // Clear diagnostics for this document
        self.client.publish_diagnostics(uri, vec![], None).await;
    }

    async fn completion(&self, params: CompletionParams) -> Result<Option<CompletionResponse>> {
        let position = params.text_document_position;
        let Some(document) = self.document(&position.text_document.uri).await else {
            return Ok(None);
        };
        let Some(parsed) = &document.parsed else {
            return Ok(None);
        };

        let offset = document.offset_at(position.position);
        let factory = self.factory().await;
        let suggestions =
            complete_document(parsed, &document.text, offset, &self.schema, factory.as_ref()).await;

        let items = suggestions.into_iter().map(completion_item).collect();
        Ok(Some(CompletionResponse::Array(items)))
    }

    async fn hover(&self, params: HoverParams) -> Result<Option<Hover>> {
        let position = params.text_document_position_params;
        let Some(document) = self.document(&position.text_document.uri).await else {
            return Ok(None);
        };
        let Some(parsed) = &document.parsed else {
            return Ok(None);
        };

        let offset = document.offset_at(position.position);
        let factory = self.factory().await;
        let result =
            hover_document(parsed, &document.text, offset, &self.schema, factory.as_ref()).await;

        Ok(result.map(|result| Hover {
            contents: HoverContents::Markup(MarkupContent {
                kind: MarkupKind::Markdown,
                value: result.description,
            }),
            range: None,
        }))
    }
}
