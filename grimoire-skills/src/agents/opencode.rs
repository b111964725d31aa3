//! OpenCode: `.opencode/skills/<name>.md`, `AGENTS.md`, and MCP servers in
//! `opencode.json`. OpenCode has no plugin mechanism.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::common;
use super::{AgentAdapter, AgentType};
use crate::error::{Result, SkillError};
use crate::fs_util;
use crate::injection;
use crate::mcp_config::{self, McpConfigDef, McpEntryStyle, McpServerEntry};
use crate::skill::{CachedSkill, McpSpec, SkillName};
use crate::steps::{StepFailure, StepLog};

const MCP: McpConfigDef = McpConfigDef {
    file_name: "opencode.json",
    servers_key: "mcp",
    style: McpEntryStyle::LocalCommand,
};

/// Adapter for OpenCode projects.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenCodeAdapter;

impl OpenCodeAdapter {
    pub fn new() -> Self {
        Self
    }
}

/// Copy the skill's SKILL.md to a single markdown file.
async fn copy_skill_file(source: PathBuf, dest: PathBuf) -> std::io::Result<()> {
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::copy(&source, &dest).await?;
    Ok(())
}

#[async_trait]
impl AgentAdapter for OpenCodeAdapter {
    fn agent_type(&self) -> AgentType {
        AgentType::OpenCode
    }

    fn skills_dir(&self, project: &Path) -> PathBuf {
        project.join(".opencode").join("skills")
    }

    fn skill_path(&self, project: &Path, name: &SkillName) -> PathBuf {
        self.skills_dir(project).join(format!("{}.md", name))
    }

    fn instruction_file(&self, project: &Path) -> PathBuf {
        project.join("AGENTS.md")
    }

    async fn enable_skill(
        &self,
        project: &Path,
        skill: &CachedSkill,
        mut log: StepLog,
    ) -> std::result::Result<StepLog, StepFailure> {
        let name = skill.name();

        if let Some(plugin) = &skill.manifest.plugin {
            tracing::debug!(
                "OpenCode has no plugin support; skipping plugin '{}'",
                plugin.install_spec()
            );
        }

        log = common::register_mcp(project, &MCP, skill, log).await?;

        let dest = self.skill_path(project, name);
        let source = skill.skill_file();
        log = common::write_artifact(dest.clone(), log, |dest| copy_skill_file(source, dest)).await?;

        let block = common::render_block(skill, &common::relative_to(project, &dest));
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
        copy_skill_file(skill.skill_file(), dest.clone())
            .await
            .map_err(|e| SkillError::io("copy skill artifact to", &dest, e))?;

        if let Some(spec) = &skill.manifest.mcp {
            mcp_config::install_server(project, &MCP, &McpServerEntry::new(name.as_str(), spec.clone()))
                .await?;
        }

        let block = common::render_block(skill, &common::relative_to(project, &dest));
        injection::replace_in_file(&self.instruction_file(project), name, &block).await?;
        Ok(())
    }

    async fn unregister_mcp(&self, project: &Path, name: &SkillName) -> Result<bool> {
        common::unregister_mcp(project, &MCP, name).await
    }
}
