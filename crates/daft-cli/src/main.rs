use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use daft_errors::ErrorHandler;
use std::path::PathBuf;
use std::process::ExitCode;

mod commands;
mod context;
mod output;

use commands::ask::run_ask;
use commands::config::run_config;
use commands::history::run_history;
use context::CliContext;

#[derive(Parser)]
#[command(name = "daft")]
#[command(about = "DAFT: an AI assistant for your shell session", long_about = None)]
#[command(version)]
struct Cli {
    /// Machine-readable output for `history` and `config`.
    #[arg(long, global = true)]
    json: bool,

    /// Enable verbose logging to stderr.
    #[arg(short = 'v', long = "verbose", global = true)]
    verbose: bool,

    /// Extra settings file layered over ~/.daft/settings.json.
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask a question, optionally with shell history and a directory listing.
    Ask(AskArgs),
    /// Show the history context `ask --memory N` would send.
    History(HistoryArgs),
    /// Show the effective configuration with secrets redacted.
    Config,
}

#[derive(Args)]
pub(crate) struct AskArgs {
    /// Include the last N commands and their output from the session log.
    #[arg(short = 'm', long = "memory", value_name = "N")]
    pub memory: Option<usize>,

    /// Include the current directory and its file listing.
    #[arg(short = 'l', long = "list")]
    pub list: bool,

    /// The question. Words are joined with spaces.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub prompt: Vec<String>,
}

#[derive(Args)]
pub(crate) struct HistoryArgs {
    /// Number of prior commands to show.
    #[arg(short = 'n', long = "count", default_value_t = 1)]
    pub count: usize,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let verbose = cli.verbose;
    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprint!("{}", ErrorHandler::new().verbose(verbose).handle(&err));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let ctx = CliContext::load(cli.settings.as_deref(), cli.json, cli.verbose)?;
    match cli.command {
        Commands::Ask(args) => run_ask(&ctx, args),
        Commands::History(args) => run_history(&ctx, args),
        Commands::Config => run_config(&ctx),
    }
}
