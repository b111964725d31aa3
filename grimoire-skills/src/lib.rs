//! Grimoire Skills
//!
//! Enables and disables cached skills in a project for a coding agent.
//!
//! ## Overview
//!
//! A skill is a directory with a `SKILL.md` (YAML frontmatter plus markdown
//! body). Enabling it in a project means:
//! 1. **Dependencies**: its CLI tool is installed if missing
//! 2. **Registration**: agent plugin and MCP server entries are added
//! 3. **Artifact**: the skill is copied into the agent's skills directory
//! 4. **Injection**: a block is added to the managed section of the agent's
//!    instruction file (`CLAUDE.md`, `AGENTS.md`)
//! 5. **State**: the skill is recorded as enabled for the project
//!
//! [`SkillEngine::enable`] records each completed step and rolls them back in
//! reverse if a later one fails. Installed tools and plugins are kept.

pub mod agents;
pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
mod fs_util;
pub mod injection;
pub mod lock;
pub mod mcp_config;
pub mod purge;
pub mod runner;
pub mod skill;
pub mod state;
pub mod steps;

// Re-export key types
pub use agents::{AgentAdapter, AgentRegistry, AgentType, ClaudeCodeAdapter, OpenCodeAdapter};
pub use cache::{CacheError, FsSkillCache, SkillCache};
pub use config::{ConfigError, GrimoireConfig, GrimoirePaths};
pub use engine::{
    CanEnable, DisableOptions, DisableReport, EnableOptions, EnableResult, Finding, ProjectStatus,
    Severity, SkillEngine, SyncReport,
};
pub use error::{Result, SkillError};
pub use injection::InjectionError;
pub use purge::PurgeOutcome;
pub use runner::{CommandOutput, CommandRunner, SystemRunner};
pub use skill::{CachedSkill, SkillManifest, SkillName};
pub use state::{JsonStateStore, ProjectState, StateError, StateStore};
pub use steps::{EnableStep, RollbackAction, StepFailure, StepLog};
