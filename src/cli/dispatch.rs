//! CLI command dispatch
//!
//! - translate: print the expression and any advisories
//! - search: run one query through the executor and print the response

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::cli::{
    parse_time, Cli, Command, Error, Result, EXIT_CANCELLED, EXIT_CONFIG_ERROR, EXIT_FAILURE,
    EXIT_PARTIAL, EXIT_SUCCESS,
};
use crate::config::{ConfigLoader, LogscopeConfig};
use crate::error::ErrorKind;
use crate::executor::{QueryExecutor, QueryResponse};
use crate::logging;
use crate::query::{QueryModel, QueryRequest, TimeRange};

/// Exit code wrapper for CLI operations
pub type ExitCode = i32;

/// Load configuration, install logging and run the command
pub async fn run(cli: Cli) -> ExitCode {
    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return EXIT_CONFIG_ERROR;
        }
    };

    let _guard = match logging::init(&config.logging) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return EXIT_CONFIG_ERROR;
        }
    };

    match dispatch(cli.command, &config).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            EXIT_FAILURE
        }
    }
}

fn load_config(cli: &Cli) -> Result<LogscopeConfig> {
    let loader = match &cli.config {
        Some(path) => ConfigLoader::with_path(path),
        None => ConfigLoader::new(),
    };
    let mut config = loader.load().map_err(|e| Error::Config(format!("{e:#}")))?;
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    if cli.json_logs {
        config.logging.json = true;
    }
    Ok(config)
}

async fn dispatch(command: Command, config: &LogscopeConfig) -> Result<ExitCode> {
    match command {
        Command::Translate { query } => {
            let translation = logscope_core::translate_with_advisories(&query);
            println!("{}", translation.expression);
            for advisory in &translation.advisories {
                eprintln!("note: {}", advisory.message());
            }
            Ok(EXIT_SUCCESS)
        }
        Command::Search {
            query,
            from,
            to,
            kind,
            limit,
        } => {
            let now = Utc::now();
            let range = TimeRange::new(parse_time(&from, now)?, parse_time(&to, now)?);
            let mut model = QueryModel::new(query, kind);
            model.limit = limit;

            let executor = QueryExecutor::from_config(config)
                .map_err(|e| Error::Config(format!("{e:#}")))?;
            let cancel = CancellationToken::new();
            let watcher = spawn_interrupt_watcher(cancel.clone());

            let response = executor
                .execute(&QueryRequest::new("A", model, range), &cancel)
                .await;
            watcher.abort();

            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(exit_code_for(&response))
        }
    }
}

fn spawn_interrupt_watcher(cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                debug!("interrupt received, cancelling query");
                cancel.cancel();
            }
            Err(e) => warn!(error = %e, "could not listen for Ctrl-C"),
        }
    })
}

fn exit_code_for(response: &QueryResponse) -> ExitCode {
    if response.partial {
        return EXIT_PARTIAL;
    }
    match response.error_kind {
        None => EXIT_SUCCESS,
        Some(ErrorKind::Cancelled) => EXIT_CANCELLED,
        Some(_) => EXIT_FAILURE,
    }
}
