//! ASTRID command-line entry point.

use std::io::{self, Write};
use std::process::ExitCode;

use astrid_rs::cli::{Cli, execute};
use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match execute(&cli) {
        Ok(output) => {
            if !output.is_empty() {
                let mut stdout = io::stdout().lock();
                let _ = write!(stdout, "{output}");
                if !output.ends_with('\n') {
                    let _ = writeln!(stdout);
                }
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            let _ = writeln!(io::stderr(), "Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Installs the stderr subscriber. `ASTRID_LOG` wins over `RUST_LOG`;
/// `--verbose` raises the default from `warn` to `debug`.
fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env("ASTRID_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}
