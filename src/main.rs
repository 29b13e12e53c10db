//! sql-export - Main entry point.
//!
//! Runs one SQL query and exports the result to an Excel spreadsheet.
//! Prompts go to stdout, logs to stderr.

use sql_export::config::{Config, EnvFileStatus};
use sql_export::prompt::Prompter;
use std::io::{self, IsTerminal};
use std::process::ExitCode;
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(io::stderr))
            .init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(io::stderr().is_terminal())
                    .with_writer(io::stderr),
            )
            .init();
    }
}

fn report_env_file(status: &EnvFileStatus) {
    match status {
        EnvFileStatus::Loaded(path) => info!(path = %path.display(), "Loaded env file"),
        EnvFileStatus::Missing(path) => debug!(path = %path.display(), "No env file found"),
        EnvFileStatus::Invalid(path, e) => {
            warn!(path = %path.display(), error = %e, "Could not load env file")
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Load env file, then parse configuration from command line and environment
    let (config, env_status) = Config::load();

    init_tracing(&config);
    report_env_file(&env_status);
    debug!(version = env!("CARGO_PKG_VERSION"), "Starting sql-export");

    let mut prompter = Prompter::new(io::stdin().lock(), io::stdout());
    match sql_export::run(config, &mut prompter).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            if let Some(suggestion) = e.suggestion() {
                eprintln!("Hint: {}", suggestion);
            }
            ExitCode::from(e.exit_code())
        }
    }
}
