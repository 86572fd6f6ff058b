//! Error types for ASTRID.
//!
//! Each layer owns an error enum: [`AgentError`] for the query pipeline,
//! [`TableError`] for dataset ingestion, [`CommandError`] for the CLI.
//! [`Error`] wraps all of them for the binary.

use std::path::PathBuf;

use thiserror::Error;

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Query pipeline failure.
    #[error(transparent)]
    Agent(#[from] AgentError),

    /// Dataset ingestion failure.
    #[error(transparent)]
    Table(#[from] TableError),

    /// CLI command failure.
    #[error(transparent)]
    Command(#[from] CommandError),

    /// I/O failure outside the table loader.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by pipeline stages and the LLM provider boundary.
#[derive(Debug, Error)]
pub enum AgentError {
    /// No API key configured.
    #[error("API key missing: set OPENAI_API_KEY or ASTRID_API_KEY")]
    ApiKeyMissing,

    /// Configured provider name is not known.
    #[error("unsupported provider: {name}")]
    UnsupportedProvider {
        /// Provider name from configuration.
        name: String,
    },

    /// Invalid configuration value.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid value.
        message: String,
    },

    /// The provider rejected or failed the request.
    #[error("API request failed: {message}")]
    ApiRequest {
        /// Provider error description.
        message: String,
        /// HTTP status, when the provider reports one.
        status: Option<u16>,
    },

    /// A capability call exceeded the configured timeout.
    #[error("{stage} timed out after {secs}s")]
    Timeout {
        /// Stage that issued the call.
        stage: &'static str,
        /// Timeout in seconds.
        secs: u64,
    },

    /// A stage could not interpret the capability response.
    #[error("{message}")]
    ResponseParse {
        /// What went wrong.
        message: String,
        /// Raw response content.
        content: String,
    },

    /// Structured extraction produced no parseable JSON object.
    #[error("structured extraction failed: {reason}")]
    ExtractionMalformed {
        /// Parse failure reason.
        reason: String,
        /// Raw response content.
        content: String,
    },

    /// Orchestration-level failure.
    #[error("orchestration error: {message}")]
    Orchestration {
        /// Description.
        message: String,
    },
}

/// Faults raised while parsing, validating or evaluating a query program.
///
/// The executor never propagates these; each becomes a message envelope
/// carrying [`ProgramError::category`] and the description.
#[derive(Debug, Error)]
pub enum ProgramError {
    /// Program text is not a valid program.
    #[error("{0}")]
    Parse(String),

    /// Program violates a structural rule.
    #[error("{0}")]
    Invalid(String),

    /// Program failed while running against the table.
    #[error("{0}")]
    Evaluation(String),
}

impl ProgramError {
    /// Short fault category for envelope messages.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self {
            Self::Parse(_) => "parse",
            Self::Invalid(_) => "validation",
            Self::Evaluation(_) => "evaluation",
        }
    }
}

/// Errors raised while loading score or reforms tables.
#[derive(Debug, Error)]
pub enum TableError {
    /// Source file does not exist.
    #[error("file not found at {}", path.display())]
    NotFound {
        /// Requested path.
        path: PathBuf,
    },

    /// File extension is not a supported table format.
    #[error("unsupported file format: {extension}")]
    UnsupportedFormat {
        /// Extension as found on the path.
        extension: String,
    },

    /// Sampling fraction outside (0, 1].
    #[error("sample fraction must be in (0, 1], got {fraction}")]
    InvalidFraction {
        /// Rejected fraction.
        fraction: f64,
    },

    /// Required column missing from the source.
    #[error("missing required columns: {}", columns.join(", "))]
    MissingColumns {
        /// Column names that could not be resolved.
        columns: Vec<String>,
    },

    /// A record could not be coerced to the table schema.
    #[error("invalid record at line {line}: {message}")]
    Schema {
        /// 1-based record number in the source.
        line: usize,
        /// Description.
        message: String,
    },

    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV reader failure.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON decode failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// SQLite read failure.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Errors raised by CLI commands.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Command could not complete.
    #[error("{0}")]
    ExecutionFailed(String),

    /// Output could not be rendered.
    #[error("output formatting failed: {0}")]
    OutputFormat(String),

    /// Invalid user input.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}
