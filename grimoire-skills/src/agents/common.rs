//! Steps shared by the agent adapters.

use std::path::{Path, PathBuf};

use crate::error::{Result, SkillError};
use crate::fs_util;
use crate::injection;
use crate::mcp_config::{self, McpConfigDef, McpServerEntry};
use crate::skill::{CachedSkill, McpSpec, SkillName};
use crate::steps::{EnableStep, StepFailure, StepLog};

/// The block injected into an instruction file for a skill.
///
/// `artifact` is the skill artifact's path relative to the project root.
pub fn render_block(skill: &CachedSkill, artifact: &Path) -> String {
    let manifest = &skill.manifest;
    let mut block = format!(
        "## Skill: {}\n\n{}\n\nFull instructions: `{}`",
        manifest.name,
        manifest.description.trim(),
        artifact.display()
    );
    if !manifest.capabilities.is_empty() {
        block.push_str(&format!("\nCapabilities: {}", manifest.capabilities.join(", ")));
    }
    if let Some(cli) = &manifest.cli {
        block.push_str(&format!("\nCLI: `{}`", cli.command));
    }
    block
}

/// Artifact path relative to the project, for display in the injected block.
pub fn relative_to(project: &Path, path: &Path) -> PathBuf {
    path.strip_prefix(project).unwrap_or(path).to_path_buf()
}

/// Add the skill's MCP server, if it declares one.
///
/// A step is recorded only when the config actually changed, so an entry the
/// user already had is never removed by rollback.
pub async fn register_mcp(
    project: &Path,
    def: &McpConfigDef,
    skill: &CachedSkill,
    log: StepLog,
) -> std::result::Result<StepLog, StepFailure> {
    let Some(spec) = &skill.manifest.mcp else {
        return Ok(log);
    };

    let entry = McpServerEntry::new(skill.name().as_str(), spec.clone());
    match mcp_config::install_server(project, def, &entry).await {
        Ok(true) => Ok(log.record(EnableStep::McpConfigured {
            config: project.join(def.file_name),
        })),
        Ok(false) => {
            tracing::debug!(
                "MCP server '{}' already present in {}",
                entry.name,
                def.file_name
            );
            Ok(log)
        }
        Err(e) => Err(StepFailure::new(log, e)),
    }
}

/// Remove the skill's MCP server entry.
pub async fn unregister_mcp(project: &Path, def: &McpConfigDef, name: &SkillName) -> Result<bool> {
    mcp_config::uninstall_server(project, def, name.as_str()).await
}

/// Write a skill artifact and record it. A partially written artifact is
/// removed before the failure is returned.
///
/// An existing path is never overwritten: the skill is not enabled, so
/// whatever is there belongs to the user.
pub async fn write_artifact<F, Fut>(
    dest: PathBuf,
    log: StepLog,
    write: F,
) -> std::result::Result<StepLog, StepFailure>
where
    F: FnOnce(PathBuf) -> Fut,
    Fut: std::future::Future<Output = std::io::Result<()>>,
{
    match fs_util::path_exists(&dest).await {
        Ok(false) => {}
        Ok(true) => return Err(StepFailure::new(log, SkillError::ArtifactExists { path: dest })),
        Err(e) => {
            return Err(StepFailure::new(
                log,
                SkillError::io("inspect skill artifact", dest, e),
            ))
        }
    }

    match write(dest.clone()).await {
        Ok(()) => Ok(log.record(EnableStep::SkillFileCopied { path: dest })),
        Err(e) => {
            let _ = fs_util::remove_if_exists(&dest).await;
            Err(StepFailure::new(
                log,
                SkillError::io("copy skill artifact to", dest, e),
            ))
        }
    }
}

/// Inject the skill block into an instruction file and record it.
pub async fn inject(
    file: PathBuf,
    name: &SkillName,
    block: &str,
    log: StepLog,
) -> std::result::Result<StepLog, StepFailure> {
    match injection::inject_into_file(&file, name, block).await {
        Ok(()) => Ok(log.record(EnableStep::Injected { file })),
        Err(e) => Err(StepFailure::new(log, e)),
    }
}

/// Remove an injected block; missing files and blocks are fine.
pub async fn remove_injection(file: &Path, name: &SkillName) -> Result<()> {
    if injection::remove_from_file(file, name.as_str()).await? {
        tracing::debug!("Removed '{}' block from {}", name, file.display());
    }
    Ok(())
}

/// Best-effort MCP removal used by disable.
///
/// Only an entry identical to the one this skill's `mcp` declaration
/// produces is removed; anything else under that name is the user's.
pub async fn unregister_mcp_best_effort(
    project: &Path,
    def: &McpConfigDef,
    name: &SkillName,
    mcp: Option<&McpSpec>,
) {
    let Some(spec) = mcp else {
        return;
    };
    let entry = McpServerEntry::new(name.as_str(), spec.clone());
    match mcp_config::uninstall_owned_server(project, def, &entry).await {
        Ok(true) => tracing::debug!("Unregistered MCP server '{}'", name),
        Ok(false) => {}
        Err(e) => tracing::warn!("Could not unregister MCP server '{}': {}", name, e),
    }
}
