//! Command-line argument parsing.
//!
//! Defines the CLI structure using clap derive macros.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Default score table location.
pub const DEFAULT_DATA_PATH: &str = "data/stri.csv";

/// ASTRID: conversational analytics over the OECD Services Trade
/// Restrictiveness Index.
///
/// Answers natural-language questions about STRI scores and recorded
/// reforms using an OpenAI-compatible model.
#[derive(Parser, Debug)]
#[command(name = "astrid-rs")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the STRI score table (CSV, JSON, JSON Lines or `SQLite`).
    ///
    /// Defaults to `data/stri.csv` in the current directory.
    #[arg(short, long, env = "ASTRID_DATA", global = true)]
    pub data: Option<PathBuf>,

    /// Path to the reforms table. Reform questions find nothing without it.
    #[arg(long, env = "ASTRID_REFORMS", global = true)]
    pub reforms: Option<PathBuf>,

    /// Fraction of score rows to load, in (0, 1]. Sampling is seeded.
    #[arg(long, default_value = "1.0", global = true)]
    pub sample_fraction: f64,

    /// Directory containing prompt template files.
    #[arg(long, env = "ASTRID_PROMPT_DIR", global = true)]
    pub prompt_dir: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json, ndjson).
    #[arg(long, default_value = "text", global = true)]
    pub format: String,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Answer a single question.
    ///
    /// Runs the full pipeline: compliance gate, classification, and the
    /// branch for the question's intent. Requires an OpenAI-compatible
    /// API key.
    #[command(after_help = r#"Examples:
  astrid-rs ask "What is STRI?"
  astrid-rs ask "Compare France and Germany in telecom for 2022"
  astrid-rs --reforms data/reforms.csv ask "Give me a summary of Japan"
  astrid-rs --format json ask "Show me the trend of Italy's STRI" | jq '.figure'
"#)]
    Ask {
        /// The question to answer.
        question: String,

        /// Model for the pipeline stages.
        #[arg(long)]
        model: Option<String>,

        /// Model for answer-writing stages.
        #[arg(long)]
        answer_model: Option<String>,
    },

    /// Interactive session.
    ///
    /// Reads one question per line. `/rate <1-5>` records feedback on the
    /// last answer, `/history` prints the session transcript, `/quit`
    /// leaves.
    #[command(after_help = r"Examples:
  astrid-rs chat
  astrid-rs --data stri.sqlite --reforms reforms.csv chat --feedback-log ratings.jsonl
")]
    Chat {
        /// Feedback log path.
        #[arg(long)]
        feedback_log: Option<PathBuf>,
    },

    /// Record a rating for an answer.
    #[command(after_help = r#"Examples:
  astrid-rs feedback "What is STRI?" "The STRI measures..." 5
  astrid-rs feedback "q" "a" 2 --log ./ratings.jsonl
"#)]
    Feedback {
        /// The question that was asked.
        query: String,

        /// The answer that was rated.
        response: String,

        /// Rating from 1 to 5.
        score: u8,

        /// Feedback log path. Defaults to `feedback.jsonl`.
        #[arg(long)]
        log: Option<PathBuf>,
    },

    /// Show an overview of the score table.
    ///
    /// Row count, distinct countries, sectors, years and policy areas, and
    /// the score range.
    #[command(after_help = r"Examples:
  astrid-rs inspect
  astrid-rs --data stri.jsonl --format json inspect
")]
    Inspect,

    /// Write default prompt templates to disk for customization.
    ///
    /// Creates markdown template files in the prompt directory so prompts
    /// can be edited without recompiling.
    #[command(name = "init-prompts")]
    #[command(after_help = r"Examples:
  astrid-rs init-prompts                     # Write to ~/.config/astrid-rs/prompts/
  astrid-rs init-prompts --dir ./my-prompts  # Write to custom directory
")]
    InitPrompts {
        /// Target directory for prompt templates.
        ///
        /// Defaults to `~/.config/astrid-rs/prompts/`.
        #[arg(long)]
        dir: Option<PathBuf>,
    },

    /// Start MCP (Model Context Protocol) server.
    #[cfg(feature = "mcp")]
    #[command(subcommand)]
    Mcp(McpCommands),
}

/// MCP server subcommands.
#[cfg(feature = "mcp")]
#[derive(Subcommand, Debug)]
pub enum McpCommands {
    /// Start MCP server with stdio transport.
    ///
    /// Reads JSON-RPC messages from stdin, writes responses to stdout.
    #[command(after_help = r"Examples:
  astrid-rs mcp stdio
  OPENAI_API_KEY=sk-... astrid-rs --data stri.csv mcp stdio
")]
    Stdio,

    /// Start MCP server with streamable HTTP transport.
    #[command(alias = "sse")]
    #[command(after_help = r"Examples:
  astrid-rs mcp http                          # Listen on 127.0.0.1:3000
  astrid-rs mcp http --host 0.0.0.0 --port 8080
")]
    Http {
        /// Host to bind to.
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to.
        #[arg(long, default_value = "3000")]
        port: u16,
    },
}

impl Cli {
    /// Returns the score table path, using the default if not specified.
    #[must_use]
    pub fn data_path(&self) -> PathBuf {
        self.data
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_PATH))
    }
}
