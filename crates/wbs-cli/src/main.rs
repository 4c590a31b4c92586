use clap::Parser;
use owo_colors::{OwoColorize, Style};
use tracing::{debug, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use wbs_core::db;
use wbs_core::error::{CoreError, ErrorKind};
use wbs_core::repository::SqliteRepository;

mod cli;
mod commands;
mod config;
mod parser;
mod util;
mod views;

use config::{Config, LogFormat};

#[tokio::main]
async fn main() {
    let (config, config_error) = match Config::new() {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e)),
    };
    init_logging(&config);
    if let Some(e) = config_error {
        warn!(error = %e, "Invalid configuration; using defaults");
    }

    let cli = cli::Cli::parse();
    debug!(database = %config.database_path, "Opening database");

    let db_pool = match db::establish_connection(&config.database_path).await {
        Ok(pool) => pool,
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            std::process::exit(1);
        }
    };
    let repository = SqliteRepository::new(db_pool, config.engine.clone());

    let result = match cli.command {
        cli::Commands::Add(command) => commands::add::add_task(&repository, command).await,
        cli::Commands::List(command) => commands::list::list_tasks(&repository, command).await,
        cli::Commands::Delete(command) => {
            commands::delete::delete_task(&repository, command).await
        }
        cli::Commands::Edit(command) => commands::edit::edit_task(&repository, command).await,
        cli::Commands::Project(command) => {
            commands::project::project_command(&repository, command).await
        }
        cli::Commands::Check(command) => {
            commands::check::check_project(&repository, command).await
        }
        cli::Commands::Recalc(command) => {
            commands::recalc::recalc_project(&repository, command).await
        }
    };

    if let Err(e) = result {
        std::process::exit(handle_error(e));
    }
}

fn init_logging(config: &Config) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    match config.log_format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn exit_code(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::Storage => 1,
        ErrorKind::Validation | ErrorKind::InvariantViolation => 2,
        ErrorKind::NotFound => 3,
        ErrorKind::Conflict => 4,
    }
}

/// Prints the error and returns the process exit code for it.
fn handle_error(err: anyhow::Error) -> i32 {
    let error_style = Style::new().red().bold();

    let Some(core_error) = err.downcast_ref::<CoreError>() else {
        eprintln!("{} {}", "Error:".style(error_style), err);
        return 1;
    };

    match core_error {
        CoreError::NotFound(s) => {
            eprintln!("{} Not found: {}", "Error:".style(error_style), s);
        }
        CoreError::AmbiguousId(tasks) => {
            eprintln!("{}", "Error: Ambiguous ID.".style(error_style));
            eprintln!("Did you mean one of these?");
            for (id, name) in tasks {
                eprintln!("  {} ({})", id.yellow(), name);
            }
        }
        CoreError::Validation { field, message } => {
            eprintln!(
                "{} Invalid {}: {}",
                "Error:".style(error_style),
                field.yellow(),
                message
            );
        }
        CoreError::SummaryReadOnly(_) => {
            eprintln!("{} {}", "Error:".style(error_style), core_error);
            eprintln!("Edit its children instead; their changes roll up automatically.");
        }
        CoreError::CycleDetected(task, parent) => {
            eprintln!(
                "{} Circular hierarchy: task '{}' cannot be placed under '{}'",
                "Error:".style(error_style),
                task.yellow(),
                parent.yellow()
            );
        }
        CoreError::Database(e) => {
            eprintln!("{} Database error: {}", "Error:".style(error_style), e);
        }
        CoreError::Migration(e) => {
            eprintln!("{} Migration error: {}", "Error:".style(error_style), e);
        }
        _ => eprintln!("{} {}", "Error:".style(error_style), core_error),
    }
    exit_code(core_error.kind())
}
