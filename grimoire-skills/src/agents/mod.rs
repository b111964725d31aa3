//! Agent conventions.
//!
//! Each supported coding agent has its own skills directory, instruction
//! file, MCP config file and plugin mechanism. [`AgentAdapter`] hides those
//! behind one interface, and [`AgentRegistry`] maps the closed set of
//! [`AgentType`] tags to adapters.

mod claude;
mod common;
mod opencode;

pub use claude::ClaudeCodeAdapter;
pub use common::render_block;
pub use opencode::OpenCodeAdapter;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::runner::CommandRunner;
use crate::skill::{CachedSkill, McpSpec, SkillName};
use crate::steps::{StepFailure, StepLog};

/// Supported agent conventions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AgentType {
    #[serde(rename = "claude-code")]
    ClaudeCode,
    #[serde(rename = "opencode")]
    OpenCode,
}

impl AgentType {
    pub const ALL: [AgentType; 2] = [AgentType::ClaudeCode, AgentType::OpenCode];

    /// Tag stored in project state and accepted on the command line.
    pub fn tag(&self) -> &'static str {
        match self {
            AgentType::ClaudeCode => "claude-code",
            AgentType::OpenCode => "opencode",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            AgentType::ClaudeCode => "Claude Code",
            AgentType::OpenCode => "OpenCode",
        }
    }

    /// Guess the agent a project already uses from marker files.
    pub fn detect(project: &Path) -> Option<AgentType> {
        if project.join(".claude").is_dir() || project.join("CLAUDE.md").is_file() {
            return Some(AgentType::ClaudeCode);
        }
        if project.join(".opencode").is_dir()
            || project.join("opencode.json").is_file()
            || project.join("AGENTS.md").is_file()
        {
            return Some(AgentType::OpenCode);
        }
        None
    }
}

impl fmt::Display for AgentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for AgentType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "claude-code" | "claude" => Ok(AgentType::ClaudeCode),
            "opencode" => Ok(AgentType::OpenCode),
            other => Err(format!(
                "unknown agent '{}' (expected one of: claude-code, opencode)",
                other
            )),
        }
    }
}

/// One agent convention.
#[async_trait]
pub trait AgentAdapter: Send + Sync {
    fn agent_type(&self) -> AgentType;

    /// Directory skill artifacts are written to.
    fn skills_dir(&self, project: &Path) -> PathBuf;

    /// Location of one skill's artifact (file or directory).
    fn skill_path(&self, project: &Path, name: &SkillName) -> PathBuf;

    /// The agent's top-level instruction file.
    fn instruction_file(&self, project: &Path) -> PathBuf;

    /// Register, copy and inject a skill, in that order.
    ///
    /// Each completed step is appended to `log`. On failure the returned
    /// [`StepFailure`] carries the log up to the failed step.
    async fn enable_skill(
        &self,
        project: &Path,
        skill: &CachedSkill,
        log: StepLog,
    ) -> std::result::Result<StepLog, StepFailure>;

    /// Undo agent registration. Best-effort: failures are logged, and tools
    /// and plugins stay installed.
    ///
    /// `mcp` is the skill's current MCP declaration; an MCP entry is removed
    /// only if it still matches it.
    async fn disable_skill(&self, project: &Path, name: &SkillName, mcp: Option<&McpSpec>);

    /// Remove the skill's block from the instruction file; no-op if absent.
    async fn remove_injection(&self, project: &Path, name: &SkillName) -> Result<()>;

    /// Rewrite the artifact and replace the injected block from the cache.
    async fn sync_skill(&self, project: &Path, skill: &CachedSkill) -> Result<()>;

    /// Remove the skill's MCP server entry. Returns true if one was removed.
    async fn unregister_mcp(&self, project: &Path, name: &SkillName) -> Result<bool>;
}

/// Lookup from agent tag to adapter over the closed set of agents.
#[derive(Clone)]
pub struct AgentRegistry {
    claude: Arc<dyn AgentAdapter>,
    opencode: Arc<dyn AgentAdapter>,
}

impl AgentRegistry {
    /// The built-in adapters, sharing one command runner.
    pub fn builtin(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            claude: Arc::new(ClaudeCodeAdapter::new(runner)),
            opencode: Arc::new(OpenCodeAdapter::new()),
        }
    }

    /// Replace the adapter registered for `adapter.agent_type()`.
    pub fn with_adapter(mut self, adapter: Arc<dyn AgentAdapter>) -> Self {
        match adapter.agent_type() {
            AgentType::ClaudeCode => self.claude = adapter,
            AgentType::OpenCode => self.opencode = adapter,
        }
        self
    }

    pub fn get(&self, agent: AgentType) -> Arc<dyn AgentAdapter> {
        match agent {
            AgentType::ClaudeCode => Arc::clone(&self.claude),
            AgentType::OpenCode => Arc::clone(&self.opencode),
        }
    }
}

impl fmt::Debug for AgentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentRegistry")
            .field("claude", &self.claude.agent_type())
            .field("opencode", &self.opencode.agent_type())
            .finish()
    }
}
