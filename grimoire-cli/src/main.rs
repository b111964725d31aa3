//! Grimoire CLI - enable and disable cached skills for AI coding agents.
//!
//! Commands:
//! - `grimoire init [--agent <tag>]`: Record the project's agent convention
//! - `grimoire skills list`: List cached skills
//! - `grimoire skills add <path>` / `remove <name>`: Manage the cache
//! - `grimoire skills check <name>`: Report whether a skill can be enabled
//! - `grimoire skills enable <name>...`: Enable skills in the project
//! - `grimoire skills disable <name>...`: Disable skills in the project
//! - `grimoire skills status`: Show enabled and injected skills
//! - `grimoire skills sync`: Re-apply enabled skills from the cache
//! - `grimoire doctor`: Diagnose the Grimoire home and the project
//!
//! Environment variables:
//! - GRIMOIRE_HOME: Override the Grimoire home directory
//!
//! Exit codes:
//! - 0: Success
//! - 1: Error (or any skill in a batch failed)
//! - 2: Warnings (doctor)

use clap::Parser;
use tracing_subscriber::EnvFilter;

use grimoire_cli::commands::{doctor, init, skills};
use grimoire_cli::context::{resolve_project, CliContext};
use grimoire_cli::error::{handle_cli_result, CliResult};
use grimoire_cli::{Cli, Commands, SkillsCommand};

async fn dispatch(cli: Cli) -> CliResult<i32> {
    let ctx = CliContext::from_env()?;
    let project = resolve_project(cli.project.as_deref())?;

    match cli.command {
        Commands::Init { agent } => init::run_init(&ctx, &project, agent.as_deref()).await,

        Commands::Skills { command } => match command {
            SkillsCommand::List { json } => skills::run_list(&ctx, &project, json).await,
            SkillsCommand::Add { path } => skills::run_add(&ctx, &path).await,
            SkillsCommand::Remove { name } => skills::run_remove(&ctx, &project, &name).await,
            SkillsCommand::Check { name } => skills::run_check(&ctx, &project, &name).await,
            SkillsCommand::Enable { names, skip_deps } => {
                skills::run_enable(&ctx, &project, &names, skip_deps).await
            }
            SkillsCommand::Disable { names, purge } => {
                skills::run_disable(&ctx, &project, &names, purge).await
            }
            SkillsCommand::Status { json } => skills::run_status(&ctx, &project, json).await,
            SkillsCommand::Sync => skills::run_sync(&ctx, &project).await,
        },

        Commands::Doctor { verbose } => Ok(doctor::run_doctor(&ctx, &project, verbose).await),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing with appropriate level
    let filter = if cli.debug {
        EnvFilter::new("grimoire=debug,grimoire_cli=debug,grimoire_skills=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(false)
        .with_writer(std::io::stderr)
        .init();

    let exit_code = handle_cli_result(dispatch(cli).await);
    std::process::exit(exit_code);
}
