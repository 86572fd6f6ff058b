//! CLI layer for ASTRID.
//!
//! Provides the command-line interface using clap, with commands for
//! asking questions, interactive chat, feedback, and dataset inspection.

pub mod commands;
pub mod output;
pub mod parser;
pub mod session;

pub use commands::execute;
pub use output::OutputFormat;
#[cfg(feature = "mcp")]
pub use parser::McpCommands;
pub use parser::{Cli, Commands};
pub use session::Session;
