//! CLI definition for the Grimoire command-line interface.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Grimoire - enable and disable cached skills for AI coding agents.
///
/// Skills are cached once under the Grimoire home and enabled per project.
/// Enabling copies the skill into the agent's skills directory, registers
/// any plugin or MCP server it declares, and adds a block to the managed
/// section of the agent's instruction file (CLAUDE.md or AGENTS.md).
#[derive(Parser, Debug)]
#[command(name = "grimoire")]
#[command(version)]
#[command(about = "Enable and disable cached skills for AI coding agents")]
#[command(
    long_about = "Grimoire enables cached skills in a project for a coding agent and keeps \
    the agent's instruction file, skills directory and MCP configuration consistent.\n\n\
    Environment variables:\n  \
    GRIMOIRE_HOME  Override the Grimoire home directory (default: ~/.grimoire)\n  \
    RUST_LOG       Log filter when --debug is not given"
)]
pub struct Cli {
    /// Enable debug output to stderr
    #[arg(short, long, global = true)]
    pub debug: bool,

    /// Project directory to operate on (defaults to the current directory)
    #[arg(long, global = true, value_name = "PATH")]
    pub project: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Record which agent convention the project uses
    Init {
        /// Agent tag (claude-code, opencode); detected from the project if omitted
        #[arg(long, value_name = "AGENT")]
        agent: Option<String>,
    },

    /// Manage cached skills and the skills enabled in the project
    Skills {
        #[command(subcommand)]
        command: SkillsCommand,
    },

    /// Check that enabled skills and project files agree
    Doctor {
        /// Show fix suggestions for every check
        #[arg(short, long)]
        verbose: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum SkillsCommand {
    /// List cached skills, marking those enabled in the project
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Add a skill package directory to the cache
    Add {
        /// Directory containing SKILL.md
        path: PathBuf,
    },

    /// Remove a skill from the cache
    Remove {
        /// Skill name
        name: String,
    },

    /// Report whether a skill can be enabled in the project
    Check {
        /// Skill name
        name: String,
    },

    /// Enable one or more cached skills
    Enable {
        /// Skill names
        #[arg(required = true)]
        names: Vec<String>,
        /// Do not check or install CLI tools the skills depend on
        #[arg(long)]
        skip_deps: bool,
    },

    /// Disable one or more enabled skills
    Disable {
        /// Skill names
        #[arg(required = true)]
        names: Vec<String>,
        /// Also delete project files the skill's tool creates (e.g. .beads)
        #[arg(long)]
        purge: bool,
    },

    /// Show the project's agent and enabled skills
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Re-apply enabled skills from the cache and drop stale blocks
    Sync,
}
