//! Claude Code: `.claude/skills/<name>/`, `CLAUDE.md`, `.mcp.json`, and
//! plugins installed through the `claude` CLI.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use super::common;
use super::{AgentAdapter, AgentType};
use crate::error::{Result, SkillError};
use crate::fs_util;
use crate::injection;
use crate::mcp_config::{self, McpConfigDef, McpEntryStyle, McpServerEntry};
use crate::runner::CommandRunner;
use crate::skill::{CachedSkill, McpSpec, PluginSpec, SkillName, SKILL_FILE};
use crate::steps::{EnableStep, StepFailure, StepLog};

const MCP: McpConfigDef = McpConfigDef {
    file_name: ".mcp.json",
    servers_key: "mcpServers",
    style: McpEntryStyle::CommandArgs,
};

const CLAUDE_BIN: &str = "claude";

/// Adapter for Claude Code projects.
pub struct ClaudeCodeAdapter {
    runner: Arc<dyn CommandRunner>,
}

impl ClaudeCodeAdapter {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    async fn install_plugin(&self, plugin: &PluginSpec) -> Result<()> {
        let spec = plugin.install_spec();
        let fail = |message: String| SkillError::PluginInstall {
            plugin: spec.clone(),
            message,
        };

        if !self.runner.is_available(CLAUDE_BIN) {
            return Err(fail(format!("'{}' is not on PATH", CLAUDE_BIN)));
        }

        let args = vec!["plugin".to_string(), "install".to_string(), spec.clone()];
        let output = self
            .runner
            .run(CLAUDE_BIN, &args)
            .await
            .map_err(|e| fail(e.to_string()))?;
        if !output.success {
            return Err(fail(output.failure_message()));
        }
        tracing::info!("Installed Claude plugin '{}'", spec);
        Ok(())
    }
}

#[async_trait]
impl AgentAdapter for ClaudeCodeAdapter {
    fn agent_type(&self) -> AgentType {
        AgentType::ClaudeCode
    }

    fn skills_dir(&self, project: &Path) -> PathBuf {
        project.join(".claude").join("skills")
    }

    fn skill_path(&self, project: &Path, name: &SkillName) -> PathBuf {
        self.skills_dir(project).join(name.as_str())
    }

    fn instruction_file(&self, project: &Path) -> PathBuf {
        project.join("CLAUDE.md")
    }

    async fn enable_skill(
        &self,
        project: &Path,
        skill: &CachedSkill,
        mut log: StepLog,
    ) -> std::result::Result<StepLog, StepFailure> {
        let name = skill.name();

        if let Some(plugin) = &skill.manifest.plugin {
            if let Err(e) = self.install_plugin(plugin).await {
                return Err(StepFailure::new(log, e));
            }
            log = log.record(EnableStep::PluginInstalled {
                plugin: plugin.install_spec(),
            });
        }

        log = common::register_mcp(project, &MCP, skill, log).await?;

        let dest = self.skill_path(project, name);
        let source = skill.dir.clone();
        log = common::write_artifact(dest.clone(), log, |dest| async move {
            fs_util::copy_dir(&source, &dest).await
        })
        .await?;

        let block = common::render_block(skill, &common::relative_to(project, &dest.join(SKILL_FILE)));
        common::inject(self.instruction_file(project), name, &block, log).await
    }

    async fn disable_skill(&self, project: &Path, name: &SkillName, mcp: Option<&McpSpec>) {
        common::unregister_mcp_best_effort(project, &MCP, name, mcp).await;
    }

    async fn remove_injection(&self, project: &Path, name: &SkillName) -> Result<()> {
        common::remove_injection(&self.instruction_file(project), name).await
    }

    async fn sync_skill(&self, project: &Path, skill: &CachedSkill) -> Result<()> {
        let name = skill.name();
        let dest = self.skill_path(project, name);

        fs_util::remove_if_exists(&dest)
            .await
            .map_err(|e| SkillError::io("remove skill artifact", &dest, e))?;
        fs_util::copy_dir(&skill.dir, &dest)
            .await
            .map_err(|e| SkillError::io("copy skill artifact to", &dest, e))?;

        if let Some(spec) = &skill.manifest.mcp {
            mcp_config::install_server(project, &MCP, &McpServerEntry::new(name.as_str(), spec.clone()))
                .await?;
        }

        let block = common::render_block(skill, &common::relative_to(project, &dest.join(SKILL_FILE)));
        injection::replace_in_file(&self.instruction_file(project), name, &block).await?;
        Ok(())
    }

    async fn unregister_mcp(&self, project: &Path, name: &SkillName) -> Result<bool> {
        common::unregister_mcp(project, &MCP, name).await
    }
}
