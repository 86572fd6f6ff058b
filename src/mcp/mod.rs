//! MCP (Model Context Protocol) server for astrid-rs.
//!
//! Exposes the question-answering pipeline as an MCP tool and the loaded
//! dataset as MCP resources.
//!
//! # Feature Gate
//!
//! This module requires the `mcp` feature flag:
//! ```toml
//! [dependencies]
//! astrid-rs = { version = "...", features = ["mcp"] }
//! ```
//!
//! # Architecture
//!
//! ```text
//! MCP Client
//!   ↓ ask(question)
//! AstridMcpServer
//!   ↓
//! Orchestrator::invoke()
//!   ↓
//! FusedAnswer JSON → MCP Client
//! ```

pub mod params;
pub mod server;
pub mod transport;

pub use params::AskParams;
pub use server::AstridMcpServer;
pub use transport::{serve_http, serve_stdio};
