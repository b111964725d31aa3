//! External command execution.
//!
//! CLI dependency checks and plugin installs shell out to other programs.
//! They go through [`CommandRunner`] so tests can substitute a recording fake.

use async_trait::async_trait;

use crate::error::{Result, SkillError};
use crate::skill::{CliDependency, SkillName};

/// Captured result of a finished command.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Short failure description, preferring stderr.
    pub fn failure_message(&self) -> String {
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            return stderr.to_string();
        }
        let stdout = self.stdout.trim();
        if !stdout.is_empty() {
            return stdout.to_string();
        }
        "command exited with a non-zero status".to_string()
    }
}

/// Runs external programs.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// True if `program` can be found on PATH.
    fn is_available(&self, program: &str) -> bool;

    /// Run `program` with `args` and capture its output.
    async fn run(&self, program: &str, args: &[String]) -> std::io::Result<CommandOutput>;
}

/// Runs real processes via `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

#[async_trait]
impl CommandRunner for SystemRunner {
    fn is_available(&self, program: &str) -> bool {
        which::which(program).is_ok()
    }

    async fn run(&self, program: &str, args: &[String]) -> std::io::Result<CommandOutput> {
        tracing::debug!("Running {} {}", program, args.join(" "));
        let output = tokio::process::Command::new(program)
            .args(args)
            .stdin(std::process::Stdio::null())
            .output()
            .await?;
        Ok(CommandOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Make sure a skill's CLI dependency is on PATH, installing it if needed.
///
/// Returns `Ok(true)` when an install actually ran.
pub async fn ensure_cli(
    runner: &dyn CommandRunner,
    skill: &SkillName,
    dep: &CliDependency,
) -> Result<bool> {
    if runner.is_available(&dep.command) {
        tracing::debug!("CLI dependency '{}' already available", dep.command);
        return Ok(false);
    }

    let fail = |message: String| SkillError::CliDependency {
        skill: skill.to_string(),
        tool: dep.command.clone(),
        message,
    };

    let Some((program, args)) = dep.install.split_first() else {
        return Err(fail("not found on PATH and no install command is declared".to_string()));
    };

    tracing::info!("Installing '{}' for skill '{}'", dep.command, skill);
    let output = runner
        .run(program, args)
        .await
        .map_err(|e| fail(format!("failed to run '{}': {}", program, e)))?;
    if !output.success {
        return Err(fail(output.failure_message()));
    }
    if !runner.is_available(&dep.command) {
        return Err(fail("install command succeeded but the tool is still not on PATH".to_string()));
    }
    Ok(true)
}
