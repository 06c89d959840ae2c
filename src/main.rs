//! actions-yaml-lsp: LSP server for GitHub Actions workflow files

use tower_lsp::{LspService, Server};
use tracing_subscriber::EnvFilter;

use actions_yaml_lsp::Backend;

#[tokio::main]
async fn main() {
    // stdout carries the protocol, so logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    tracing::info!(
        "Starting actions-yaml-lsp server v{}",
        env!("CARGO_PKG_VERSION")
    );

    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();

    let (service, socket) = LspService::new(Backend::new);
    Server::new(stdin, stdout, socket).serve(service).await;
}
