use std::io;

use tracing_subscriber::EnvFilter;

fn main() -> io::Result<()> {
    // Diagnostics go to stderr; stdout carries the protocol.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_env("HQL_LOG").unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    tracing::info!("hql language server starting on stdio");
    hql_lsp::serve_stdio()
}
