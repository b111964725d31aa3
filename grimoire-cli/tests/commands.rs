//! Command handlers run against a temporary Grimoire home.

use std::path::{Path, PathBuf};

use grimoire_cli::commands::{init, skills};
use grimoire_cli::exit_codes::{EXIT_ERROR, EXIT_SUCCESS};
use grimoire_cli::CliContext;
use grimoire_skills::{AgentType, GrimoireConfig, GrimoirePaths, SkillCache, SkillName};
use tempfile::TempDir;

struct Env {
    _home: TempDir,
    _project: TempDir,
    _sources: TempDir,
    ctx: CliContext,
    project: PathBuf,
    sources: PathBuf,
}

impl Env {
    fn new() -> Self {
        let home = tempfile::tempdir().unwrap();
        let project = tempfile::tempdir().unwrap();
        let sources = tempfile::tempdir().unwrap();
        let ctx = CliContext::new(GrimoirePaths::new(home.path()), GrimoireConfig::default());
        Self {
            ctx,
            project: std::fs::canonicalize(project.path()).unwrap(),
            sources: sources.path().to_path_buf(),
            _home: home,
            _project: project,
            _sources: sources,
        }
    }

    /// Write a skill package outside the cache and return its directory.
    fn package(&self, name: &str) -> PathBuf {
        let dir = self.sources.join(name);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("SKILL.md"),
            format!("---\nname: {}\ndescription: The {} skill\n---\n# {}\n", name, name, name),
        )
        .unwrap();
        dir
    }

    async fn add(&self, name: &str) {
        let dir = self.package(name);
        assert_eq!(skills::run_add(&self.ctx, &dir).await.unwrap(), EXIT_SUCCESS);
    }

    async fn enabled(&self) -> Vec<String> {
        self.ctx
            .engine
            .project_state(&self.project)
            .await
            .unwrap()
            .map(|s| s.enabled.into_iter().collect())
            .unwrap_or_default()
    }

    fn read(&self, path: &Path) -> String {
        std::fs::read_to_string(self.project.join(path)).unwrap_or_default()
    }
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[test_log::test(tokio::test)]
async fn init_records_requested_agent() {
    let env = Env::new();
    let code = init::run_init(&env.ctx, &env.project, Some("opencode")).await.unwrap();
    assert_eq!(code, EXIT_SUCCESS);

    let state = env.ctx.engine.project_state(&env.project).await.unwrap().unwrap();
    assert_eq!(state.agent, AgentType::OpenCode);
}

#[test_log::test(tokio::test)]
async fn init_with_unknown_agent_fails() {
    let env = Env::new();
    let err = init::run_init(&env.ctx, &env.project, Some("vim")).await.unwrap_err();
    assert_eq!(err.exit_code, EXIT_ERROR);
    assert!(env.ctx.engine.project_state(&env.project).await.unwrap().is_none());
}

#[test_log::test(tokio::test)]
async fn batch_enable_continues_after_failure() {
    let env = Env::new();
    env.add("beads").await;
    env.add("serena").await;
    init::run_init(&env.ctx, &env.project, Some("claude-code")).await.unwrap();

    let code = skills::run_enable(&env.ctx, &env.project, &names(&["beads", "missing", "serena"]), false)
        .await
        .unwrap();

    assert_eq!(code, EXIT_ERROR);
    assert_eq!(env.enabled().await, vec!["beads", "serena"]);
    let claude_md = env.read(Path::new("CLAUDE.md"));
    assert!(claude_md.contains("<!-- grimoire:skill:beads:start -->"));
    assert!(claude_md.contains("<!-- grimoire:skill:serena:start -->"));
    assert!(!claude_md.contains("missing"));
}

#[test_log::test(tokio::test)]
async fn enabling_twice_is_a_skip_not_a_failure() {
    let env = Env::new();
    env.add("beads").await;
    init::run_init(&env.ctx, &env.project, Some("claude-code")).await.unwrap();

    let first = skills::run_enable(&env.ctx, &env.project, &names(&["beads"]), false).await.unwrap();
    let second = skills::run_enable(&env.ctx, &env.project, &names(&["beads"]), false).await.unwrap();

    assert_eq!(first, EXIT_SUCCESS);
    assert_eq!(second, EXIT_SUCCESS);
    let claude_md = env.read(Path::new("CLAUDE.md"));
    assert_eq!(claude_md.matches("<!-- grimoire:skill:beads:start -->").count(), 1);
}

#[test_log::test(tokio::test)]
async fn batch_disable_skips_skills_that_are_not_enabled() {
    let env = Env::new();
    env.add("beads").await;
    init::run_init(&env.ctx, &env.project, Some("opencode")).await.unwrap();
    skills::run_enable(&env.ctx, &env.project, &names(&["beads"]), false).await.unwrap();

    let code = skills::run_disable(&env.ctx, &env.project, &names(&["serena", "beads"]), false)
        .await
        .unwrap();

    assert_eq!(code, EXIT_SUCCESS);
    assert!(env.enabled().await.is_empty());
    assert!(!env.project.join(".opencode/skills/beads.md").exists());
}

#[test_log::test(tokio::test)]
async fn check_reports_uninitialized_project() {
    let env = Env::new();
    env.add("beads").await;

    let code = skills::run_check(&env.ctx, &env.project, "beads").await.unwrap();
    assert_eq!(code, EXIT_ERROR);

    init::run_init(&env.ctx, &env.project, None).await.unwrap();
    let code = skills::run_check(&env.ctx, &env.project, "beads").await.unwrap();
    assert_eq!(code, EXIT_SUCCESS);
}

#[test_log::test(tokio::test)]
async fn remove_evicts_from_cache() {
    let env = Env::new();
    env.add("beads").await;
    let name = SkillName::new("beads").unwrap();
    assert!(env.ctx.cache.is_cached(&name).await);

    let code = skills::run_remove(&env.ctx, &env.project, "beads").await.unwrap();
    assert_eq!(code, EXIT_SUCCESS);
    assert!(!env.ctx.cache.is_cached(&name).await);

    let err = skills::run_remove(&env.ctx, &env.project, "beads").await.unwrap_err();
    assert_eq!(err.exit_code, EXIT_ERROR);
}

#[test_log::test(tokio::test)]
async fn list_and_status_work_for_a_fresh_project() {
    let env = Env::new();
    env.add("beads").await;

    assert_eq!(skills::run_list(&env.ctx, &env.project, true).await.unwrap(), EXIT_SUCCESS);
    assert_eq!(skills::run_list(&env.ctx, &env.project, false).await.unwrap(), EXIT_SUCCESS);
    assert!(skills::run_status(&env.ctx, &env.project, false).await.is_err());

    init::run_init(&env.ctx, &env.project, Some("claude-code")).await.unwrap();
    assert_eq!(skills::run_status(&env.ctx, &env.project, true).await.unwrap(), EXIT_SUCCESS);
}

#[test_log::test(tokio::test)]
async fn sync_restores_deleted_artifact() {
    let env = Env::new();
    env.add("beads").await;
    init::run_init(&env.ctx, &env.project, Some("claude-code")).await.unwrap();
    skills::run_enable(&env.ctx, &env.project, &names(&["beads"]), false).await.unwrap();
    std::fs::remove_dir_all(env.project.join(".claude/skills/beads")).unwrap();

    let code = skills::run_sync(&env.ctx, &env.project).await.unwrap();

    assert_eq!(code, EXIT_SUCCESS);
    assert!(env.project.join(".claude/skills/beads/SKILL.md").is_file());
}
