use std::path::PathBuf;

use clap::Parser;
use colored::*;
use taskflow_core::Status;
use tracing_subscriber::EnvFilter;

mod commands;

/// Environment variable holding the log filter, e.g. `TASKFLOW_LOG=debug`.
const LOG_ENV: &str = "TASKFLOW_LOG";

/// Taskflow - run tasks and their dependencies from a task file
///
/// Everything after the options is handed to the flow: task names, parameter
/// flags such as `--name=value` or `-v`, and `help`.
#[derive(Parser)]
#[command(name = "taskflow")]
#[command(about = "Run tasks and their dependencies from a task file")]
#[command(disable_help_flag = true, disable_version_flag = true)]
struct Cli {
    /// Path to the task file
    #[arg(long, default_value = "taskflow.yml")]
    taskfile: PathBuf,

    /// Print the JSON schema of the task file and exit
    #[arg(long)]
    print_schema: bool,

    /// Tasks and parameter flags
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    let result = if cli.print_schema {
        commands::schema::execute().map(|()| Status::Pass)
    } else {
        commands::run::execute(&cli.taskfile, cli.args).await
    };

    let status = match result {
        Ok(status) => status,
        Err(err) => {
            eprintln!("{} {:#}", "error:".red().bold(), err);
            Status::InvalidArgs
        }
    };
    std::process::exit(status.code());
}
