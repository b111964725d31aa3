//! Grimoire Doctor - diagnostic checks for the Grimoire home and the project.
//!
//! Checks:
//! 1. Grimoire home exists
//! 2. Skills are cached
//! 3. Project is initialized
//! 4. Agent CLI available (Claude Code plugins)
//! 5. CLI tools of enabled skills on PATH
//! 6. Enabled skills have their artifact and instruction block

use std::path::Path;
use std::sync::Arc;

use comfy_table::{Cell, Color};
use grimoire_skills::{
    AgentType, CommandRunner, ProjectState, Severity, SkillCache, SkillName, SystemRunner,
};

use crate::context::CliContext;
use crate::exit_codes::{EXIT_ERROR, EXIT_SUCCESS, EXIT_WARNING};
use crate::table::new_table;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    Ok,
    Warning,
    Error,
}

/// Result of one diagnostic.
#[derive(Debug, Clone)]
pub struct Check {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub fix: Option<String>,
}

impl Check {
    fn ok(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: CheckStatus::Ok,
            message: message.into(),
            fix: None,
        }
    }

    fn problem(
        name: impl Into<String>,
        status: CheckStatus,
        message: impl Into<String>,
        fix: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            status,
            message: message.into(),
            fix: Some(fix.into()),
        }
    }
}

/// Grimoire diagnostic runner.
pub struct GrimoireDoctor {
    checks: Vec<Check>,
    runner: Arc<dyn CommandRunner>,
}

impl GrimoireDoctor {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            checks: Vec::new(),
            runner,
        }
    }

    pub fn checks(&self) -> &[Check] {
        &self.checks
    }

    /// Run every check and return the exit code.
    pub async fn run_diagnostics(&mut self, ctx: &CliContext, project: &Path) -> i32 {
        self.check_home(ctx);
        self.check_cache(ctx).await;
        if let Some(state) = self.check_project(ctx, project).await {
            self.check_agent_cli(state.agent);
            self.check_skill_tools(ctx, &state).await;
            self.check_consistency(ctx, project, &state).await;
        }
        self.exit_code()
    }

    /// Error if any check failed, warning if any warned.
    pub fn exit_code(&self) -> i32 {
        if self.checks.iter().any(|c| c.status == CheckStatus::Error) {
            EXIT_ERROR
        } else if self.checks.iter().any(|c| c.status == CheckStatus::Warning) {
            EXIT_WARNING
        } else {
            EXIT_SUCCESS
        }
    }

    fn check_home(&mut self, ctx: &CliContext) {
        let root = &ctx.paths.root;
        if root.is_dir() {
            self.checks
                .push(Check::ok("Grimoire Home", root.display().to_string()));
        } else {
            self.checks.push(Check::problem(
                "Grimoire Home",
                CheckStatus::Warning,
                format!("{} does not exist yet", root.display()),
                "Run `grimoire skills add <path>` to create it",
            ));
        }
    }

    async fn check_cache(&mut self, ctx: &CliContext) {
        match ctx.cache.list().await {
            Ok(skills) if skills.is_empty() => self.checks.push(Check::problem(
                "Skill Cache",
                CheckStatus::Warning,
                "No skills cached",
                "Run `grimoire skills add <path>`",
            )),
            Ok(skills) => self
                .checks
                .push(Check::ok("Skill Cache", format!("{} skill(s) cached", skills.len()))),
            Err(e) => self.checks.push(Check::problem(
                "Skill Cache",
                CheckStatus::Error,
                format!("Failed to read cache: {}", e),
                format!("Check permissions on {}", ctx.paths.cache_dir.display()),
            )),
        }
    }

    async fn check_project(&mut self, ctx: &CliContext, project: &Path) -> Option<ProjectState> {
        match ctx.engine.project_state(project).await {
            Ok(Some(state)) => {
                self.checks.push(Check::ok(
                    "Project",
                    format!(
                        "{} ({} skill(s) enabled)",
                        state.agent.display_name(),
                        state.enabled.len()
                    ),
                ));
                Some(state)
            }
            Ok(None) => {
                self.checks.push(Check::problem(
                    "Project",
                    CheckStatus::Error,
                    format!("{} is not initialized", project.display()),
                    "Run `grimoire init`",
                ));
                None
            }
            Err(e) => {
                self.checks.push(Check::problem(
                    "Project",
                    CheckStatus::Error,
                    format!("Failed to read project state: {}", e),
                    "Re-run `grimoire init` or remove the corrupt state file",
                ));
                None
            }
        }
    }

    fn check_agent_cli(&mut self, agent: AgentType) {
        if agent != AgentType::ClaudeCode {
            return;
        }
        if self.runner.is_available("claude") {
            self.checks.push(Check::ok("Agent CLI", "claude found in PATH"));
        } else {
            self.checks.push(Check::problem(
                "Agent CLI",
                CheckStatus::Warning,
                "claude not found in PATH; skills with plugins cannot be enabled",
                "Install Claude Code",
            ));
        }
    }

    async fn check_skill_tools(&mut self, ctx: &CliContext, state: &ProjectState) {
        for raw in &state.enabled {
            let Ok(name) = SkillName::new(raw.as_str()) else {
                continue;
            };
            let Ok(skill) = ctx.cache.get_cached(&name).await else {
                continue;
            };
            let Some(dep) = &skill.manifest.cli else {
                continue;
            };
            if self.runner.is_available(&dep.command) {
                continue;
            }
            let fix = if dep.install.is_empty() {
                format!("Install {} manually", dep.command)
            } else {
                format!("Run `{}`", dep.install.join(" "))
            };
            self.checks.push(Check::problem(
                format!("Tool for {}", raw),
                CheckStatus::Warning,
                format!("{} not found in PATH", dep.command),
                fix,
            ));
        }
    }

    async fn check_consistency(&mut self, ctx: &CliContext, project: &Path, state: &ProjectState) {
        let findings = match ctx.engine.doctor(project).await {
            Ok(findings) => findings,
            Err(e) => {
                self.checks.push(Check::problem(
                    "Skill Consistency",
                    CheckStatus::Error,
                    format!("Failed to inspect project: {}", e),
                    "Run `grimoire skills status`",
                ));
                return;
            }
        };

        if findings.is_empty() {
            self.checks.push(Check::ok(
                "Skill Consistency",
                format!("{} enabled skill(s) consistent", state.enabled.len()),
            ));
            return;
        }
        for finding in findings {
            let status = match finding.severity() {
                Severity::Warning => CheckStatus::Warning,
                Severity::Error => CheckStatus::Error,
            };
            self.checks.push(Check::problem(
                format!("Skill {}", finding.skill()),
                status,
                finding.to_string(),
                finding.fix(),
            ));
        }
    }
}

fn status_cell(status: CheckStatus) -> Cell {
    match status {
        CheckStatus::Ok => Cell::new("\u{2713}").fg(Color::Green),
        CheckStatus::Warning => Cell::new("\u{26A0}").fg(Color::Yellow),
        CheckStatus::Error => Cell::new("\u{2717}").fg(Color::Red),
    }
}

/// Print checks; `verbose` adds the fix column.
pub fn print_checks(checks: &[Check], verbose: bool) {
    let mut table = if verbose {
        new_table(&["Status", "Check", "Result", "Fix"])
    } else {
        new_table(&["Status", "Check", "Result"])
    };
    for check in checks {
        let mut row = vec![
            status_cell(check.status),
            Cell::new(&check.name),
            Cell::new(&check.message),
        ];
        if verbose {
            row.push(Cell::new(check.fix.as_deref().unwrap_or("")));
        }
        table.add_row(row);
    }
    println!("{table}");

    if !verbose && checks.iter().any(|c| c.fix.is_some()) {
        println!("Run `grimoire doctor --verbose` for fix suggestions.");
    }
}

pub async fn run_doctor(ctx: &CliContext, project: &Path, verbose: bool) -> i32 {
    let mut doctor = GrimoireDoctor::new(Arc::new(SystemRunner));
    let code = doctor.run_diagnostics(ctx, project).await;
    print_checks(doctor.checks(), verbose);
    code
}

#[cfg(test)]
mod tests {
    use super::*;
    use grimoire_skills::{CommandOutput, GrimoireConfig, GrimoirePaths};
    use std::collections::HashSet;

    struct PathRunner(HashSet<&'static str>);

    #[async_trait::async_trait]
    impl CommandRunner for PathRunner {
        fn is_available(&self, program: &str) -> bool {
            self.0.contains(program)
        }

        async fn run(&self, _program: &str, _args: &[String]) -> std::io::Result<CommandOutput> {
            Ok(CommandOutput::default())
        }
    }

    fn cache_skill(ctx: &CliContext, name: &str, extra: &str) {
        let dir = ctx.paths.cache_dir.join(name);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("SKILL.md"),
            format!("---\nname: {}\ndescription: test\n{}---\nBody\n", name, extra),
        )
        .unwrap();
    }

    fn doctor(available: &[&'static str]) -> GrimoireDoctor {
        GrimoireDoctor::new(Arc::new(PathRunner(available.iter().copied().collect())))
    }

    fn status_of<'a>(doctor: &'a GrimoireDoctor, name: &str) -> Option<&'a Check> {
        doctor.checks().iter().find(|c| c.name == name)
    }

    #[tokio::test]
    async fn test_uninitialized_project_is_an_error() {
        let home = tempfile::tempdir().unwrap();
        let project = tempfile::tempdir().unwrap();
        let ctx = CliContext::new(GrimoirePaths::new(home.path()), GrimoireConfig::default());

        let mut doctor = doctor(&[]);
        let code = doctor.run_diagnostics(&ctx, project.path()).await;

        assert_eq!(code, EXIT_ERROR);
        assert_eq!(status_of(&doctor, "Project").unwrap().status, CheckStatus::Error);
        assert!(status_of(&doctor, "Skill Consistency").is_none());
    }

    #[tokio::test]
    async fn test_healthy_project_passes() {
        let home = tempfile::tempdir().unwrap();
        let project = tempfile::tempdir().unwrap();
        let ctx = CliContext::new(GrimoirePaths::new(home.path()), GrimoireConfig::default());
        cache_skill(&ctx, "beads", "cli:\n  command: bd\n");
        ctx.engine
            .init_project(project.path(), AgentType::OpenCode)
            .await
            .unwrap();
        ctx.engine
            .enable(
                project.path(),
                "beads",
                grimoire_skills::EnableOptions {
                    skip_dependencies: true,
                },
            )
            .await
            .unwrap();

        let mut doctor = doctor(&["bd"]);
        let code = doctor.run_diagnostics(&ctx, project.path()).await;
        assert_eq!(code, EXIT_SUCCESS, "{:?}", doctor.checks());
    }

    #[tokio::test]
    async fn test_missing_tool_and_drift_are_reported() {
        let home = tempfile::tempdir().unwrap();
        let project = tempfile::tempdir().unwrap();
        let ctx = CliContext::new(GrimoirePaths::new(home.path()), GrimoireConfig::default());
        cache_skill(&ctx, "beads", "cli:\n  command: bd\n");
        ctx.engine
            .init_project(project.path(), AgentType::OpenCode)
            .await
            .unwrap();
        ctx.engine
            .enable(
                project.path(),
                "beads",
                grimoire_skills::EnableOptions {
                    skip_dependencies: true,
                },
            )
            .await
            .unwrap();
        std::fs::remove_file(project.path().join(".opencode/skills/beads.md")).unwrap();

        let mut doctor = doctor(&[]);
        let code = doctor.run_diagnostics(&ctx, project.path()).await;

        assert_eq!(code, EXIT_ERROR);
        let tool = status_of(&doctor, "Tool for beads").unwrap();
        assert_eq!(tool.status, CheckStatus::Warning);
        assert_eq!(tool.fix.as_deref(), Some("Install bd manually"));
        let drift = status_of(&doctor, "Skill beads").unwrap();
        assert_eq!(drift.status, CheckStatus::Error);
        assert_eq!(drift.fix.as_deref(), Some("grimoire skills sync"));
    }

    #[test]
    fn test_exit_code_warning_only() {
        let mut doctor = doctor(&[]);
        doctor.checks.push(Check::ok("Grimoire Home", "/home/me/.grimoire"));
        doctor.checks.push(Check::problem(
            "Skill Cache",
            CheckStatus::Warning,
            "No skills cached",
            "Run `grimoire skills add <path>`",
        ));
        assert_eq!(doctor.exit_code(), EXIT_WARNING);
    }

    #[test]
    fn test_claude_cli_check_only_for_claude_projects() {
        let mut doctor = doctor(&[]);
        doctor.check_agent_cli(AgentType::OpenCode);
        assert!(doctor.checks().is_empty());

        doctor.check_agent_cli(AgentType::ClaudeCode);
        assert_eq!(doctor.checks()[0].status, CheckStatus::Warning);
    }

    #[test]
    fn test_print_checks_verbose() {
        let checks = vec![Check::problem(
            "Project",
            CheckStatus::Error,
            "/tmp/x is not initialized",
            "Run `grimoire init`",
        )];
        print_checks(&checks, true);
        print_checks(&checks, false);
    }
}
