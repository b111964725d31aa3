//! `grimoire init`

use std::fmt;
use std::path::Path;

use colored::Colorize;
use grimoire_skills::{AgentType, GrimoireConfig};

use crate::context::CliContext;
use crate::error::{CliError, CliResult};
use crate::exit_codes::{EXIT_ERROR, EXIT_SUCCESS};

/// Where the agent for `init` came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentSource {
    Flag,
    Config,
    Detected,
    Fallback,
}

impl fmt::Display for AgentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            AgentSource::Flag => "from --agent",
            AgentSource::Config => "from config.yaml",
            AgentSource::Detected => "detected",
            AgentSource::Fallback => "default",
        };
        f.write_str(text)
    }
}

/// `--agent`, then the configured default, then what the project already
/// contains, then Claude Code.
pub fn resolve_agent(
    flag: Option<&str>,
    config: &GrimoireConfig,
    project: &Path,
) -> CliResult<(AgentType, AgentSource)> {
    if let Some(tag) = flag {
        let agent = tag
            .parse::<AgentType>()
            .map_err(|e| CliError::new(e, EXIT_ERROR))?;
        return Ok((agent, AgentSource::Flag));
    }
    if let Some(agent) = config.default_agent {
        return Ok((agent, AgentSource::Config));
    }
    match AgentType::detect(project) {
        Some(agent) => Ok((agent, AgentSource::Detected)),
        None => Ok((AgentType::ClaudeCode, AgentSource::Fallback)),
    }
}

pub async fn run_init(ctx: &CliContext, project: &Path, agent: Option<&str>) -> CliResult<i32> {
    let (agent, source) = resolve_agent(agent, &ctx.config, project)?;
    tracing::debug!("Initializing {} for {} ({})", project.display(), agent, source);

    let state = ctx
        .engine
        .init_project(project, agent)
        .await
        .map_err(|e| CliError::with_source(format!("failed to initialize {}", project.display()), e))?;

    println!(
        "{} Initialized {} for {} ({})",
        "\u{2713}".green(),
        project.display(),
        agent.display_name().bold(),
        source
    );
    if !state.enabled.is_empty() {
        println!("  {} skill(s) already enabled", state.enabled.len());
    }
    Ok(EXIT_SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_wins() {
        let project = tempfile::tempdir().unwrap();
        let config = GrimoireConfig {
            default_agent: Some(AgentType::ClaudeCode),
            ..Default::default()
        };
        let resolved = resolve_agent(Some("opencode"), &config, project.path()).unwrap();
        assert_eq!(resolved, (AgentType::OpenCode, AgentSource::Flag));
    }

    #[test]
    fn test_unknown_flag_is_an_error() {
        let project = tempfile::tempdir().unwrap();
        let err = resolve_agent(Some("cursor"), &GrimoireConfig::default(), project.path())
            .unwrap_err();
        assert!(err.message.contains("unknown agent 'cursor'"));
        assert_eq!(err.exit_code, EXIT_ERROR);
    }

    #[test]
    fn test_config_default_before_detection() {
        let project = tempfile::tempdir().unwrap();
        std::fs::write(project.path().join("CLAUDE.md"), "# Project\n").unwrap();
        let config = GrimoireConfig {
            default_agent: Some(AgentType::OpenCode),
            ..Default::default()
        };
        let resolved = resolve_agent(None, &config, project.path()).unwrap();
        assert_eq!(resolved, (AgentType::OpenCode, AgentSource::Config));
    }

    #[test]
    fn test_detects_opencode_project() {
        let project = tempfile::tempdir().unwrap();
        std::fs::write(project.path().join("AGENTS.md"), "# Agents\n").unwrap();
        let resolved = resolve_agent(None, &GrimoireConfig::default(), project.path()).unwrap();
        assert_eq!(resolved, (AgentType::OpenCode, AgentSource::Detected));
    }

    #[test]
    fn test_empty_project_falls_back_to_claude() {
        let project = tempfile::tempdir().unwrap();
        let resolved = resolve_agent(None, &GrimoireConfig::default(), project.path()).unwrap();
        assert_eq!(resolved, (AgentType::ClaudeCode, AgentSource::Fallback));
    }
}
