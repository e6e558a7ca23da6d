//! Motiv CLI - goals, habits and streaks from the terminal

mod auth;
mod cli;
mod commands;
mod config_profiles;
mod error;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::auth_cmd::run_auth;
use crate::commands::completions::run_completions;
use crate::commands::config::run_config;
use crate::commands::goals::run_goals;
use crate::commands::habits::run_habits;
use crate::commands::profile::run_profile;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let profile = cli.profile.as_deref();

    match cli.command {
        Commands::Config { command } => run_config(command, profile).await,
        Commands::Auth { command } => run_auth(command, profile).await,
        Commands::Goals { command } => run_goals(command, profile).await,
        Commands::Habits { command } => run_habits(command, profile).await,
        Commands::Profile { command } => run_profile(command, profile).await,
        Commands::Completions { shell, output } => run_completions(shell, output.as_deref()),
    }
}

/// Logs go to stderr so `--json` output stays machine readable.
fn init_tracing() {
    let mut filter = EnvFilter::from_default_env();
    match "motiv=info".parse() {
        Ok(directive) => filter = filter.add_directive(directive),
        Err(error) => eprintln!("Ignoring log directive: {error}"),
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
