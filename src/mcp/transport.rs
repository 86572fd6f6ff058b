//! Transports for serving ASTRID over MCP.
//!
//! stdio suits a single desktop client that spawns the binary. The HTTP
//! transport lets several clients share one loaded dataset: every session
//! gets its own server handle over the same [`Orchestrator`] and tables.
//!
//! [`Orchestrator`]: crate::agent::Orchestrator

use rmcp::ServiceExt;
use rmcp::transport::io::stdio;
use tracing::info;

use super::server::AstridMcpServer;

/// Serves one client over stdin/stdout until it disconnects.
///
/// # Errors
///
/// Returns an error if the server fails to start or encounters a runtime error.
pub async fn serve_stdio(server: AstridMcpServer) -> anyhow::Result<()> {
    info!(rows = server.orchestrator().scores().len(), "MCP stdio session starting");
    let service = server.serve(stdio()).await?;
    service.waiting().await?;
    info!("MCP stdio session ended");
    Ok(())
}

/// Serves streamable HTTP sessions at `http://{host}:{port}/mcp` until
/// Ctrl-C.
///
/// # Errors
///
/// Returns an error if the server fails to bind or encounters a runtime error.
pub async fn serve_http(server: AstridMcpServer, host: &str, port: u16) -> anyhow::Result<()> {
    use rmcp::transport::streamable_http_server::{
        StreamableHttpServerConfig, StreamableHttpService, session::local::LocalSessionManager,
    };
    use std::sync::Arc;

    let shutdown = tokio_util::sync::CancellationToken::new();

    let orchestrator = Arc::clone(server.orchestrator());
    let service = StreamableHttpService::new(
        move || Ok(AstridMcpServer::new(Arc::clone(&orchestrator))),
        Arc::new(LocalSessionManager::default()),
        StreamableHttpServerConfig {
            cancellation_token: shutdown.child_token(),
            ..Default::default()
        },
    );

    let router = axum::Router::new().nest_service("/mcp", service);
    let addr = format!("{host}:{port}");
    let tcp_listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(%addr, "MCP server listening");
    // stdout is reserved for MCP protocol messages
    #[allow(clippy::print_stderr)]
    {
        eprintln!("ASTRID MCP server listening on http://{addr}/mcp");
    }

    axum::serve(tcp_listener, router)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("MCP server shutting down");
            shutdown.cancel();
        })
        .await?;

    Ok(())
}
