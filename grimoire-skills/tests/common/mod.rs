//! Shared fixtures for engine tests.

#![allow(dead_code)]

use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use grimoire_skills::{
    AgentAdapter, AgentRegistry, AgentType, CommandOutput, CommandRunner, FsSkillCache, GrimoirePaths,
    JsonStateStore, ProjectState, SkillEngine, SkillName, StateError, StateStore,
};
use tempfile::TempDir;

/// Command runner that pretends installers work: running any command makes
/// `provides` available.
#[derive(Default)]
pub struct FakeRunner {
    available: Mutex<HashSet<String>>,
    provides: Mutex<Option<String>>,
    calls: Mutex<Vec<String>>,
}

impl FakeRunner {
    pub fn installing(tool: &str) -> Self {
        let runner = Self::default();
        *runner.provides.lock().unwrap() = Some(tool.to_string());
        runner
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandRunner for FakeRunner {
    fn is_available(&self, program: &str) -> bool {
        self.available.lock().unwrap().contains(program)
    }

    async fn run(&self, program: &str, args: &[String]) -> std::io::Result<CommandOutput> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("{} {}", program, args.join(" ")).trim().to_string());
        if let Some(tool) = self.provides.lock().unwrap().clone() {
            self.available.lock().unwrap().insert(tool);
        }
        Ok(CommandOutput {
            success: true,
            ..Default::default()
        })
    }
}

/// State store whose `add_enabled` always fails.
pub struct FailingAddState {
    pub inner: JsonStateStore,
}

#[async_trait]
impl StateStore for FailingAddState {
    async fn is_initialized(&self, project: &Path) -> Result<bool, StateError> {
        self.inner.is_initialized(project).await
    }

    async fn get_project_state(&self, project: &Path) -> Result<Option<ProjectState>, StateError> {
        self.inner.get_project_state(project).await
    }

    async fn get_enabled(&self, project: &Path) -> Result<BTreeSet<String>, StateError> {
        self.inner.get_enabled(project).await
    }

    async fn add_enabled(&self, project: &Path, _name: &SkillName) -> Result<(), StateError> {
        Err(StateError::Write {
            path: project.to_path_buf(),
            source: std::io::Error::other("disk full"),
        })
    }

    async fn remove_enabled(&self, project: &Path, name: &SkillName) -> Result<(), StateError> {
        self.inner.remove_enabled(project, name).await
    }

    async fn record_disable(&self, project: &Path, name: &SkillName) -> Result<(), StateError> {
        self.inner.record_disable(project, name).await
    }

    async fn init_project(&self, project: &Path, agent: AgentType) -> Result<ProjectState, StateError> {
        self.inner.init_project(project, agent).await
    }

    async fn touch_sync(&self, project: &Path) -> Result<(), StateError> {
        self.inner.touch_sync(project).await
    }

    async fn list_projects(&self) -> Result<Vec<(PathBuf, ProjectState)>, StateError> {
        self.inner.list_projects().await
    }
}

/// Isolated Grimoire home plus one project directory.
pub struct Harness {
    _home: TempDir,
    _project_dir: TempDir,
    pub paths: GrimoirePaths,
    pub project: PathBuf,
    pub runner: Arc<FakeRunner>,
    pub engine: SkillEngine,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_runner(FakeRunner::default())
    }

    pub fn with_runner(runner: FakeRunner) -> Self {
        Self::build(runner, false)
    }

    /// Harness whose state store cannot record enabled skills.
    pub fn with_failing_state() -> Self {
        Self::build(FakeRunner::default(), true)
    }

    fn build(runner: FakeRunner, failing_state: bool) -> Self {
        let home = tempfile::tempdir().unwrap();
        let project_dir = tempfile::tempdir().unwrap();
        let project = std::fs::canonicalize(project_dir.path()).unwrap();
        let paths = GrimoirePaths::new(home.path());
        let runner = Arc::new(runner);
        let command_runner: Arc<dyn CommandRunner> = runner.clone();

        let json_state = JsonStateStore::new(&paths.state_dir);
        let state: Arc<dyn StateStore> = if failing_state {
            Arc::new(FailingAddState { inner: json_state })
        } else {
            Arc::new(json_state)
        };

        let engine = SkillEngine::new(
            Arc::new(FsSkillCache::new(&paths.cache_dir)),
            state,
            AgentRegistry::builtin(Arc::clone(&command_runner)),
            command_runner,
            &paths.locks_dir,
        );

        Self {
            _home: home,
            _project_dir: project_dir,
            paths,
            project,
            runner,
            engine,
        }
    }

    /// Write a skill package straight into the cache.
    pub fn cache_skill(&self, name: &str, extra_frontmatter: &str) {
        let dir = self.paths.cache_dir.join(name);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("SKILL.md"),
            format!(
                "---\nname: {}\ndescription: The {} skill\n{}---\n# {}\n\nInstructions.\n",
                name, name, extra_frontmatter, name
            ),
        )
        .unwrap();
    }

    pub async fn init(&self, agent: AgentType) {
        self.engine.init_project(&self.project, agent).await.unwrap();
    }

    pub async fn enabled(&self) -> Vec<String> {
        self.engine
            .project_state(&self.project)
            .await
            .unwrap()
            .map(|s| s.enabled.into_iter().collect())
            .unwrap_or_default()
    }

    pub fn instruction_file(&self, agent: AgentType) -> PathBuf {
        self.engine.agents().get(agent).instruction_file(&self.project)
    }

    pub fn skill_path(&self, agent: AgentType, name: &str) -> PathBuf {
        self.engine
            .agents()
            .get(agent)
            .skill_path(&self.project, &SkillName::new(name).unwrap())
    }

    pub fn skills_dir(&self, agent: AgentType) -> PathBuf {
        self.engine.agents().get(agent).skills_dir(&self.project)
    }

    pub fn read(&self, path: &Path) -> String {
        std::fs::read_to_string(path).unwrap_or_default()
    }
}
