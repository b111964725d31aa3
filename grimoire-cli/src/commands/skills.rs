//! `grimoire skills ...`
//!
//! Batch commands (`enable`, `disable`) report one line per skill and keep
//! going after a failure. Already-enabled and not-enabled skills are
//! reported as skipped and do not fail the batch.

use std::collections::BTreeSet;
use std::error::Error;
use std::path::Path;

use colored::Colorize;
use comfy_table::Cell;
use grimoire_skills::{
    DisableOptions, DisableReport, EnableOptions, EnableResult, SkillCache, SkillError, SkillName,
};
use serde::Serialize;

use crate::context::CliContext;
use crate::error::{CliError, CliResult};
use crate::exit_codes::{EXIT_ERROR, EXIT_SUCCESS};
use crate::table::{flag_cell, new_table, truncate_str};

/// What happened to one skill in a batch.
#[derive(Debug)]
pub enum SkillOutcome<T> {
    Done(T),
    Skipped(String),
    Failed(String),
}

impl<T> SkillOutcome<T> {
    pub fn from_result(result: grimoire_skills::Result<T>) -> Self {
        match result {
            Ok(value) => SkillOutcome::Done(value),
            Err(e) if e.is_state_guard() => SkillOutcome::Skipped(e.to_string()),
            Err(e) => SkillOutcome::Failed(error_chain(&e)),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, SkillOutcome::Failed(_))
    }
}

fn error_chain(error: &SkillError) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(err) = source {
        let text = err.to_string();
        if !message.contains(&text) {
            message.push_str(&format!(": {}", text));
        }
        source = err.source();
    }
    message
}

/// Exit code for a batch: any failure fails the command.
pub fn batch_exit_code<T>(outcomes: &[SkillOutcome<T>]) -> i32 {
    if outcomes.iter().any(SkillOutcome::is_failure) {
        EXIT_ERROR
    } else {
        EXIT_SUCCESS
    }
}

fn print_skipped(name: &str, reason: &str) {
    println!("{} Skipped {}: {}", "-".dimmed(), name, reason);
}

fn print_failed(verb: &str, name: &str, message: &str) {
    println!("{} Failed to {} {}: {}", "\u{2717}".red(), verb, name.bold(), message);
}

fn print_summary<T>(verb: &str, outcomes: &[SkillOutcome<T>]) {
    let failed = outcomes.iter().filter(|o| o.is_failure()).count();
    if outcomes.len() > 1 && failed > 0 {
        println!(
            "\n{} of {} skills failed to {}",
            failed.to_string().red(),
            outcomes.len(),
            verb
        );
    }
}

#[derive(Debug, Serialize)]
struct ListEntry {
    name: String,
    version: String,
    description: String,
    enabled: bool,
}

/// Enabled skills of the project, or none if it is not initialized.
async fn enabled_in(ctx: &CliContext, project: &Path) -> BTreeSet<String> {
    match ctx.engine.project_state(project).await {
        Ok(Some(state)) => state.enabled,
        Ok(None) => BTreeSet::new(),
        Err(e) => {
            tracing::warn!("Could not read project state: {}", e);
            BTreeSet::new()
        }
    }
}

pub async fn run_list(ctx: &CliContext, project: &Path, json: bool) -> CliResult<i32> {
    let skills = ctx
        .cache
        .list()
        .await
        .map_err(|e| CliError::with_source("failed to list cached skills", e))?;
    let enabled = enabled_in(ctx, project).await;

    let entries: Vec<ListEntry> = skills
        .iter()
        .map(|skill| ListEntry {
            name: skill.name().to_string(),
            version: skill.manifest.version.clone(),
            description: skill.manifest.description.clone(),
            enabled: enabled.contains(skill.name().as_str()),
        })
        .collect();

    if json {
        let out = serde_json::to_string_pretty(&entries)
            .map_err(|e| CliError::with_source("failed to serialize skill list", e))?;
        println!("{}", out);
        return Ok(EXIT_SUCCESS);
    }

    if entries.is_empty() {
        println!("No skills cached. Add one with `grimoire skills add <path>`.");
        return Ok(EXIT_SUCCESS);
    }

    let mut table = new_table(&["Skill", "Version", "Enabled", "Description"]);
    for entry in &entries {
        table.add_row(vec![
            Cell::new(&entry.name),
            Cell::new(&entry.version),
            flag_cell(entry.enabled),
            Cell::new(truncate_str(&entry.description, 60)),
        ]);
    }
    println!("{table}");
    Ok(EXIT_SUCCESS)
}

pub async fn run_add(ctx: &CliContext, path: &Path) -> CliResult<i32> {
    let skill = ctx
        .cache
        .add_from_path(path)
        .await
        .map_err(|e| CliError::with_source(format!("failed to add {}", path.display()), e))?;
    println!(
        "{} Cached {} {}",
        "\u{2713}".green(),
        skill.name().to_string().bold(),
        skill.manifest.version
    );
    Ok(EXIT_SUCCESS)
}

pub async fn run_remove(ctx: &CliContext, project: &Path, name: &str) -> CliResult<i32> {
    let name = SkillName::new(name).map_err(|e| CliError::new(e, EXIT_ERROR))?;
    ctx.cache
        .remove(&name)
        .await
        .map_err(|e| CliError::with_source(format!("failed to remove '{}'", name), e))?;
    println!("{} Removed {} from the cache", "\u{2713}".green(), name.to_string().bold());

    if enabled_in(ctx, project).await.contains(name.as_str()) {
        println!(
            "  {} still enabled in this project; run `grimoire skills disable {}`",
            name, name
        );
    }
    Ok(EXIT_SUCCESS)
}

pub async fn run_check(ctx: &CliContext, project: &Path, name: &str) -> CliResult<i32> {
    let check = ctx.engine.can_enable(project, name).await;
    if check.can_enable {
        println!("{} {} can be enabled", "\u{2713}".green(), name.bold());
        return Ok(EXIT_SUCCESS);
    }
    if check.is_enabled {
        println!("{} {} is already enabled", "\u{2713}".green(), name.bold());
        return Ok(EXIT_SUCCESS);
    }
    println!(
        "{} {} cannot be enabled: {}",
        "\u{2717}".red(),
        name.bold(),
        check.reason.unwrap_or_default()
    );
    Ok(EXIT_ERROR)
}

fn describe_enable(result: &EnableResult) -> String {
    let mut parts = Vec::new();
    if let Some(tool) = &result.cli_installed {
        parts.push(format!("installed {}", tool));
    }
    if result.plugin_installed {
        parts.push("plugin".to_string());
    }
    if result.mcp_configured {
        parts.push("MCP server".to_string());
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

pub async fn run_enable(
    ctx: &CliContext,
    project: &Path,
    names: &[String],
    skip_deps: bool,
) -> CliResult<i32> {
    let options = EnableOptions {
        skip_dependencies: skip_deps,
    };
    let mut outcomes = Vec::with_capacity(names.len());

    for name in names {
        let outcome = SkillOutcome::from_result(ctx.engine.enable(project, name, options).await);
        match &outcome {
            SkillOutcome::Done(result) => println!(
                "{} Enabled {} for {}{}",
                "\u{2713}".green(),
                name.bold(),
                result.agent.display_name(),
                describe_enable(result)
            ),
            SkillOutcome::Skipped(reason) => print_skipped(name, reason),
            SkillOutcome::Failed(message) => print_failed("enable", name, message),
        }
        outcomes.push(outcome);
    }

    print_summary("enable", &outcomes);
    Ok(batch_exit_code(&outcomes))
}

fn print_disabled(name: &str, report: &DisableReport) {
    println!("{} Disabled {}", "\u{2713}".green(), name.bold());
    let Some(purge) = &report.purge else {
        return;
    };
    for path in &purge.removed {
        println!("  removed {}", path.display());
    }
    for (path, error) in &purge.failed {
        println!("  {} could not remove {}: {}", "!".yellow(), path.display(), error);
    }
}

pub async fn run_disable(
    ctx: &CliContext,
    project: &Path,
    names: &[String],
    purge: bool,
) -> CliResult<i32> {
    let options = DisableOptions { purge };
    let mut outcomes = Vec::with_capacity(names.len());

    for name in names {
        let outcome = SkillOutcome::from_result(ctx.engine.disable(project, name, options).await);
        match &outcome {
            SkillOutcome::Done(report) => print_disabled(name, report),
            SkillOutcome::Skipped(reason) => print_skipped(name, reason),
            SkillOutcome::Failed(message) => print_failed("disable", name, message),
        }
        outcomes.push(outcome);
    }

    print_summary("disable", &outcomes);
    Ok(batch_exit_code(&outcomes))
}

pub async fn run_status(ctx: &CliContext, project: &Path, json: bool) -> CliResult<i32> {
    let status = ctx
        .engine
        .status(project)
        .await
        .map_err(|e| CliError::with_source("failed to read project status", e))?;

    if json {
        let out = serde_json::to_string_pretty(&status)
            .map_err(|e| CliError::with_source("failed to serialize status", e))?;
        println!("{}", out);
        return Ok(EXIT_SUCCESS);
    }

    println!("Project:     {}", status.project.display());
    println!("Agent:       {}", status.agent.display_name());
    println!("Instructions: {}", status.instruction_file.display());
    println!("Initialized: {}", status.initialized_at.to_rfc3339());
    match status.last_sync {
        Some(at) => println!("Last sync:   {}", at.to_rfc3339()),
        None => println!("Last sync:   never"),
    }

    let names: BTreeSet<&String> = status.enabled.iter().chain(status.injected.iter()).collect();
    if names.is_empty() {
        println!("\nNo skills enabled.");
        return Ok(EXIT_SUCCESS);
    }

    let mut table = new_table(&["Skill", "Enabled", "Injected"]);
    for name in names {
        table.add_row(vec![
            Cell::new(name),
            flag_cell(status.enabled.contains(name)),
            flag_cell(status.injected.contains(name)),
        ]);
    }
    println!("\n{table}");
    Ok(EXIT_SUCCESS)
}

pub async fn run_sync(ctx: &CliContext, project: &Path) -> CliResult<i32> {
    let report = ctx
        .engine
        .sync(project)
        .await
        .map_err(|e| CliError::with_source("failed to sync project", e))?;

    for name in &report.synced {
        println!("{} Synced {}", "\u{2713}".green(), name);
    }
    for name in &report.orphans_removed {
        println!("{} Removed stale block for {}", "\u{2713}".green(), name);
    }
    for name in &report.missing {
        println!(
            "{} {} is enabled but not cached; add it again or disable it",
            "!".yellow(),
            name.bold()
        );
    }
    for (name, error) in &report.failed {
        print_failed("sync", name, error);
    }
    if report.synced.is_empty() && report.orphans_removed.is_empty() && report.is_clean() {
        println!("Nothing to sync.");
    }

    Ok(if report.is_clean() {
        EXIT_SUCCESS
    } else {
        EXIT_ERROR
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_guards_are_skips() {
        let outcome: SkillOutcome<()> = SkillOutcome::from_result(Err(SkillError::SkillAlreadyEnabled {
            name: "beads".to_string(),
        }));
        assert!(matches!(outcome, SkillOutcome::Skipped(ref r) if r.contains("already enabled")));

        let outcome: SkillOutcome<()> = SkillOutcome::from_result(Err(SkillError::SkillNotEnabled {
            name: "beads".to_string(),
        }));
        assert!(!outcome.is_failure());
    }

    #[test]
    fn test_other_errors_fail_with_cause() {
        let outcome: SkillOutcome<()> = SkillOutcome::from_result(Err(SkillError::io(
            "copy skill artifact to",
            "/p/.claude/skills/beads",
            std::io::Error::other("no space left"),
        )));
        match outcome {
            SkillOutcome::Failed(message) => {
                assert!(message.contains("/p/.claude/skills/beads"));
                assert_eq!(message.matches("no space left").count(), 1);
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[test]
    fn test_batch_exit_code() {
        let ok: Vec<SkillOutcome<()>> = vec![
            SkillOutcome::Done(()),
            SkillOutcome::Skipped("already enabled".to_string()),
        ];
        assert_eq!(batch_exit_code(&ok), EXIT_SUCCESS);

        let failed: Vec<SkillOutcome<()>> = vec![
            SkillOutcome::Failed("boom".to_string()),
            SkillOutcome::Done(()),
        ];
        assert_eq!(batch_exit_code(&failed), EXIT_ERROR);
    }

    #[test]
    fn test_describe_enable() {
        let result = EnableResult {
            skill: SkillName::new("serena").unwrap(),
            agent: grimoire_skills::AgentType::ClaudeCode,
            cli_installed: Some("uvx".to_string()),
            plugin_installed: false,
            mcp_configured: true,
            skill_file_copied: true,
            injected: true,
        };
        assert_eq!(describe_enable(&result), " (installed uvx, MCP server)");
    }
}
