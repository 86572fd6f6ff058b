//! CLI command implementations.
//!
//! Contains the business logic for each CLI command.

#![allow(clippy::uninlined_format_args)]

use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use crate::agent::client::create_provider;
use crate::agent::config::AgentConfig;
use crate::agent::orchestrator::Orchestrator;
use crate::agent::prompt::PromptSet;
use crate::cli::output::{OutputFormat, format_answer, format_overview};
#[cfg(feature = "mcp")]
use crate::cli::parser::McpCommands;
use crate::cli::parser::{Cli, Commands};
use crate::cli::session::Session;
use crate::core::feedback::{FeedbackRecord, FeedbackSink, JsonlFeedbackSink, record_feedback};
use crate::core::table::{ReformsTable, ScoreTable};
use crate::error::{CommandError, Result};

/// Model overrides for the pipeline.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModelOverrides<'a> {
    /// Model for structured stages.
    pub model: Option<&'a str>,
    /// Model for answer-writing stages.
    pub answer_model: Option<&'a str>,
}

/// Executes the CLI command.
///
/// # Arguments
///
/// * `cli` - Parsed CLI arguments.
///
/// # Returns
///
/// Result with output string on success.
///
/// # Errors
///
/// Returns an error if the command fails to execute.
pub fn execute(cli: &Cli) -> Result<String> {
    let format = OutputFormat::parse(&cli.format);

    match &cli.command {
        Commands::Ask {
            question,
            model,
            answer_model,
        } => {
            let overrides = ModelOverrides {
                model: model.as_deref(),
                answer_model: answer_model.as_deref(),
            };
            cmd_ask(cli, question, overrides, format)
        }
        Commands::Chat { feedback_log } => cmd_chat(cli, feedback_log.as_deref(), format),
        Commands::Feedback {
            query,
            response,
            score,
            log,
        } => cmd_feedback(query, response, *score, log.as_deref(), format),
        Commands::Inspect => cmd_inspect(&cli.data_path(), cli.sample_fraction, format),
        Commands::InitPrompts { dir } => cmd_init_prompts(dir.as_deref(), format),

        // ── MCP server ───────────────────────────────────────────
        #[cfg(feature = "mcp")]
        Commands::Mcp(sub) => cmd_mcp(sub, cli),
    }
}

/// Loads both tables named on the command line.
///
/// A missing `--reforms` yields an empty reforms table.
///
/// # Errors
///
/// Returns the loader's error for either table.
pub fn load_tables(cli: &Cli) -> Result<(Arc<ScoreTable>, Arc<ReformsTable>)> {
    let scores = ScoreTable::load(&cli.data_path(), cli.sample_fraction)?;
    let reforms = match &cli.reforms {
        Some(path) => ReformsTable::load(path)?,
        None => {
            warn!("no reforms table configured; reform questions will find nothing");
            ReformsTable::default()
        }
    };
    info!(
        score_rows = scores.len(),
        reform_rows = reforms.len(),
        "tables loaded"
    );
    Ok((Arc::new(scores), Arc::new(reforms)))
}

/// Builds an orchestrator from environment configuration and CLI flags.
///
/// # Errors
///
/// Returns an error if a table cannot be loaded, the configuration is
/// incomplete, or the provider cannot be created.
pub fn build_orchestrator(cli: &Cli, overrides: ModelOverrides<'_>) -> Result<Orchestrator> {
    let (scores, reforms) = load_tables(cli)?;

    let mut builder = AgentConfig::builder().from_env();
    if let Some(model) = overrides.model {
        builder = builder.model(model);
    }
    if let Some(model) = overrides.answer_model {
        builder = builder.answer_model(model);
    }
    if let Some(dir) = &cli.prompt_dir {
        builder = builder.prompt_dir(dir);
    }

    let config = builder.build().map_err(|e| {
        CommandError::ExecutionFailed(format!("Agent configuration error: {e}"))
    })?;

    let provider = create_provider(&config)
        .map_err(|e| CommandError::ExecutionFailed(format!("Provider creation failed: {e}")))?;

    Ok(Orchestrator::new(
        Arc::from(provider),
        config,
        scores,
        reforms,
    ))
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().map_err(|e| {
        CommandError::ExecutionFailed(format!("Failed to create async runtime: {e}")).into()
    })
}

fn cmd_ask(
    cli: &Cli,
    question: &str,
    overrides: ModelOverrides<'_>,
    format: OutputFormat,
) -> Result<String> {
    let orchestrator = build_orchestrator(cli, overrides)?;
    let rt = runtime()?;
    let answer = rt.block_on(orchestrator.invoke(question));
    Ok(format_answer(&answer, format, cli.verbose))
}

fn cmd_chat(cli: &Cli, feedback_log: Option<&Path>, format: OutputFormat) -> Result<String> {
    let orchestrator = build_orchestrator(cli, ModelOverrides::default())?;
    let rt = runtime()?;
    let sink = JsonlFeedbackSink::new(
        feedback_log.map_or_else(JsonlFeedbackSink::default_path, Path::to_path_buf),
    );
    let stdin = io::stdin();
    let stdout = io::stdout();
    let asked = run_chat(
        &orchestrator,
        &rt,
        &mut stdin.lock(),
        &mut stdout.lock(),
        &sink,
        ChatOptions {
            format,
            verbose: cli.verbose,
        },
    )?;
    info!(questions = asked, "chat session ended");
    Ok(String::new())
}

/// Rendering options for the chat loop.
#[derive(Debug, Clone, Copy)]
pub struct ChatOptions {
    /// Answer format.
    pub format: OutputFormat,
    /// Include summary and reform details.
    pub verbose: bool,
}

/// Runs the interactive loop until `/quit` or end of input.
///
/// Returns the number of questions answered.
///
/// # Errors
///
/// Returns an I/O error if reading input or writing output fails.
pub fn run_chat(
    orchestrator: &Orchestrator,
    rt: &tokio::runtime::Runtime,
    input: &mut dyn BufRead,
    output: &mut dyn Write,
    sink: &dyn FeedbackSink,
    options: ChatOptions,
) -> Result<usize> {
    let mut session = Session::new();
    let mut asked = 0;
    let mut line = String::new();

    writeln!(
        output,
        "Ask about the OECD STRI. /rate <1-5> rates the last answer, /history shows the session, /quit leaves."
    )?;
    loop {
        write!(output, "> ")?;
        output.flush()?;
        line.clear();
        if input.read_line(&mut line)? == 0 {
            break;
        }
        let text = line.trim();
        if text.is_empty() {
            continue;
        }

        match text.split_once(' ').map_or((text, ""), |(c, a)| (c, a.trim())) {
            ("/quit" | "/exit", _) => break,
            ("/history", _) => writeln!(output, "{}", session.transcript())?,
            ("/rate", arg) => {
                let note = rate_last(&session, arg, sink);
                writeln!(output, "{note}")?;
            }
            _ => {
                session.push_user(text);
                let answer = rt.block_on(orchestrator.invoke(text));
                session.push_assistant(&answer.message);
                asked += 1;
                writeln!(
                    output,
                    "{}\n",
                    format_answer(&answer, options.format, options.verbose)
                )?;
            }
        }
    }
    Ok(asked)
}

fn rate_last(session: &Session, arg: &str, sink: &dyn FeedbackSink) -> String {
    let Some((query, response)) = session.last_exchange() else {
        return "Nothing to rate yet.".to_string();
    };
    let Ok(score) = arg.parse::<u8>() else {
        return "Usage: /rate <1-5>".to_string();
    };
    match FeedbackRecord::new(query, response, score) {
        Ok(record) if record_feedback(sink, &record) => "Thanks, feedback recorded.".to_string(),
        Ok(_) => "Note: feedback could not be saved.".to_string(),
        Err(e) => e.to_string(),
    }
}

fn cmd_feedback(
    query: &str,
    response: &str,
    score: u8,
    log: Option<&Path>,
    format: OutputFormat,
) -> Result<String> {
    let record = FeedbackRecord::new(query, response, score)?;
    let sink = JsonlFeedbackSink::new(
        log.map_or_else(JsonlFeedbackSink::default_path, Path::to_path_buf),
    );
    let recorded = record_feedback(&sink, &record);

    match format {
        OutputFormat::Text => Ok(if recorded {
            format!("Feedback recorded in {}\n", sink.path().display())
        } else {
            format!(
                "Note: feedback could not be written to {}\n",
                sink.path().display()
            )
        }),
        OutputFormat::Json | OutputFormat::Ndjson => {
            let json = serde_json::json!({
                "recorded": recorded,
                "path": sink.path().to_string_lossy(),
                "score": record.score,
                "timestamp": record.timestamp.to_rfc3339(),
            });
            Ok(format.to_json(&json))
        }
    }
}

fn cmd_inspect(data: &Path, sample_fraction: f64, format: OutputFormat) -> Result<String> {
    let table = ScoreTable::load(data, sample_fraction)?;
    Ok(format_overview(&table.overview(), format))
}

fn cmd_init_prompts(dir: Option<&Path>, format: OutputFormat) -> Result<String> {
    let target_dir = dir
        .map(Path::to_path_buf)
        .or_else(PromptSet::default_dir)
        .ok_or_else(|| {
            CommandError::ExecutionFailed(
                "Could not determine home directory for default prompt path".to_string(),
            )
        })?;

    let written = PromptSet::write_defaults(&target_dir).map_err(|e| {
        CommandError::ExecutionFailed(format!("Failed to write prompt templates: {e}"))
    })?;

    match format {
        OutputFormat::Text => {
            if written.is_empty() {
                return Ok(format!(
                    "All prompt templates already exist in: {}\n",
                    target_dir.display()
                ));
            }
            let mut output = format!(
                "Wrote {} prompt template(s) to: {}\n",
                written.len(),
                target_dir.display()
            );
            for path in &written {
                let name = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or("unknown");
                output.push_str("  ");
                output.push_str(name);
                output.push('\n');
            }
            output.push_str("\nEdit these files to customize the pipeline prompts.\n");
            Ok(output)
        }
        OutputFormat::Json | OutputFormat::Ndjson => {
            let json = serde_json::json!({
                "directory": target_dir.to_string_lossy(),
                "written": written.iter().map(|p| p.to_string_lossy().into_owned()).collect::<Vec<_>>(),
                "count": written.len()
            });
            Ok(format.to_json(&json))
        }
    }
}

/// Starts the MCP server with the specified transport.
///
/// Runs until the client disconnects (stdio) or the server is stopped
/// (HTTP).
#[cfg(feature = "mcp")]
fn cmd_mcp(cmd: &McpCommands, cli: &Cli) -> Result<String> {
    use crate::mcp::{AstridMcpServer, serve_http, serve_stdio};

    let orchestrator = Arc::new(build_orchestrator(cli, ModelOverrides::default())?);
    let server = AstridMcpServer::new(orchestrator);
    let rt = runtime()?;

    rt.block_on(async {
        match cmd {
            McpCommands::Stdio => serve_stdio(server).await,
            McpCommands::Http { host, port } => serve_http(server, host, *port).await,
        }
    })
    .map_err(|e| CommandError::ExecutionFailed(format!("MCP server error: {e}")))?;

    Ok(String::new())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::agent::mock::ScriptedProvider;
    use crate::core::table::{ReformsRow, ScoreRow};
    use tempfile::TempDir;

    const CSV: &str = "country,sector,year,policy_area,score\n\
        FRA,ALLSEC,2024,STRI,0.20\n\
        DEU,ALLSEC,2024,STRI,0.15\n\
        FRA,TC,2023,STRI,0.25\n";

    fn write_csv(dir: &TempDir) -> std::path::PathBuf {
        let path = dir.path().join("stri.csv");
        std::fs::write(&path, CSV).unwrap_or_else(|_| unreachable!());
        path
    }

    fn chat_orchestrator() -> Orchestrator {
        let provider = ScriptedProvider::new()
            .route("compliance gate", "1")
            .route("Classify the user question", "4")
            .route(
                "query planner",
                r#"{"query_type": "definition", "terms": ["STRI"]}"#,
            )
            .route("STRI expert", "The STRI is an index of services trade restrictions.");
        let config = AgentConfig::builder()
            .api_key("test")
            .build()
            .unwrap_or_else(|_| unreachable!());
        let scores = ScoreTable::new(vec![ScoreRow {
            country: "FRA".into(),
            sector: "ALLSEC".into(),
            year: 2024,
            policy_area: "STRI".into(),
            score: 0.2,
        }]);
        let reforms = ReformsTable::new(vec![ReformsRow {
            country: "FRA".into(),
            sector: "TC".into(),
            year: 2024,
            reform_text: "Opened spectrum auctions.".into(),
        }]);
        Orchestrator::new(
            Arc::new(provider),
            config,
            Arc::new(scores),
            Arc::new(reforms),
        )
        .with_prompts(PromptSet::defaults())
    }

    #[test]
    fn test_cmd_inspect() {
        let dir = TempDir::new().unwrap_or_else(|_| unreachable!());
        let path = write_csv(&dir);
        let text = cmd_inspect(&path, 1.0, OutputFormat::Text).unwrap_or_else(|_| unreachable!());
        assert!(text.contains("Rows:          3"));
        assert!(text.contains("DEU, FRA"));

        let json = cmd_inspect(&path, 1.0, OutputFormat::Json).unwrap_or_else(|_| unreachable!());
        let value: serde_json::Value =
            serde_json::from_str(&json).unwrap_or_else(|_| unreachable!());
        assert_eq!(value["rows"], 3);
    }

    #[test]
    fn test_cmd_inspect_missing_file() {
        let dir = TempDir::new().unwrap_or_else(|_| unreachable!());
        let result = cmd_inspect(&dir.path().join("absent.csv"), 1.0, OutputFormat::Text);
        assert!(result.is_err());
    }

    #[test]
    fn test_cmd_feedback_appends() {
        let dir = TempDir::new().unwrap_or_else(|_| unreachable!());
        let log = dir.path().join("feedback.jsonl");
        cmd_feedback("q1", "a1", 5, Some(&log), OutputFormat::Text)
            .unwrap_or_else(|_| unreachable!());
        cmd_feedback("q2", "a2", 1, Some(&log), OutputFormat::Text)
            .unwrap_or_else(|_| unreachable!());
        let records = JsonlFeedbackSink::new(&log)
            .read_all()
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].query, "q2");
    }

    #[test]
    fn test_cmd_feedback_rejects_score() {
        let dir = TempDir::new().unwrap_or_else(|_| unreachable!());
        let log = dir.path().join("feedback.jsonl");
        let result = cmd_feedback("q", "a", 6, Some(&log), OutputFormat::Text);
        assert!(result.is_err());
        assert!(!log.exists());
    }

    #[test]
    fn test_cmd_init_prompts() {
        let dir = TempDir::new().unwrap_or_else(|_| unreachable!());
        let first = cmd_init_prompts(Some(dir.path()), OutputFormat::Text)
            .unwrap_or_else(|_| unreachable!());
        assert!(first.starts_with("Wrote"));
        let second = cmd_init_prompts(Some(dir.path()), OutputFormat::Text)
            .unwrap_or_else(|_| unreachable!());
        assert!(second.starts_with("All prompt templates already exist"));
    }

    #[test]
    fn test_run_chat_rates_last_answer() {
        let dir = TempDir::new().unwrap_or_else(|_| unreachable!());
        let sink = JsonlFeedbackSink::new(dir.path().join("feedback.jsonl"));
        let rt = tokio::runtime::Runtime::new().unwrap_or_else(|_| unreachable!());
        let orchestrator = chat_orchestrator();

        let mut input = Cursor::new("/rate 5\nWhat is STRI?\n/rate 4\n/history\n/quit\nignored\n");
        let mut output = Vec::new();
        let asked = run_chat(
            &orchestrator,
            &rt,
            &mut input,
            &mut output,
            &sink,
            ChatOptions {
                format: OutputFormat::Text,
                verbose: false,
            },
        )
        .unwrap_or_else(|_| unreachable!());
        assert_eq!(asked, 1);

        let text = String::from_utf8(output).unwrap_or_else(|_| unreachable!());
        assert!(text.contains("Nothing to rate yet."));
        assert!(text.contains("The STRI is an index of services trade restrictions."));
        assert!(text.contains("Thanks, feedback recorded."));
        assert!(text.contains("you> What is STRI?"));

        let records = sink.read_all().unwrap_or_else(|_| unreachable!());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].query, "What is STRI?");
        assert_eq!(records[0].score, 4);
    }

    #[test]
    fn test_rate_rejects_out_of_range() {
        let dir = TempDir::new().unwrap_or_else(|_| unreachable!());
        let sink = JsonlFeedbackSink::new(dir.path().join("feedback.jsonl"));
        let mut session = Session::new();
        session.push_user("q");
        session.push_assistant("a");
        assert!(rate_last(&session, "9", &sink).contains("between 1 and 5"));
        assert_eq!(rate_last(&session, "x", &sink), "Usage: /rate <1-5>");
    }
}
