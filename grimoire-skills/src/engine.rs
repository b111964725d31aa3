//! The skill engine.
//!
//! Sequences the cache, state store and agent adapter for each operation and
//! owns the transaction boundary of `enable`: every completed side effect is
//! recorded in a [`StepLog`], and on failure the log's rollback plan is
//! executed before the original error is returned.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::agents::{AgentAdapter, AgentRegistry, AgentType};
use crate::cache::{CacheError, FsSkillCache, SkillCache};
use crate::config::GrimoirePaths;
use crate::error::{Result, SkillError};
use crate::fs_util;
use crate::injection;
use crate::lock::ProjectLock;
use crate::purge::{self, PurgeOutcome};
use crate::runner::{self, CommandRunner, SystemRunner};
use crate::skill::{CachedSkill, SkillName};
use crate::state::{JsonStateStore, ProjectState, StateStore};
use crate::steps::{EnableStep, RollbackAction, StepFailure, StepLog};

/// Options for [`SkillEngine::enable`].
#[derive(Debug, Clone, Copy, Default)]
pub struct EnableOptions {
    /// Do not check or install the skill's CLI dependency.
    pub skip_dependencies: bool,
}

/// Options for [`SkillEngine::disable`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DisableOptions {
    /// Also remove project artifacts the skill is known to create.
    pub purge: bool,
}

/// Result of the read-only enable precondition check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CanEnable {
    pub can_enable: bool,
    pub is_enabled: bool,
    pub reason: Option<String>,
}

impl CanEnable {
    fn no(reason: impl Into<String>) -> Self {
        Self {
            can_enable: false,
            is_enabled: false,
            reason: Some(reason.into()),
        }
    }
}

/// Side effects of a successful enable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnableResult {
    pub skill: SkillName,
    pub agent: AgentType,
    /// Tool installed for the skill, if any.
    pub cli_installed: Option<String>,
    pub plugin_installed: bool,
    pub mcp_configured: bool,
    pub skill_file_copied: bool,
    pub injected: bool,
}

impl EnableResult {
    fn from_log(skill: SkillName, agent: AgentType, log: &StepLog) -> Self {
        let mut result = Self {
            skill,
            agent,
            cli_installed: None,
            plugin_installed: false,
            mcp_configured: false,
            skill_file_copied: false,
            injected: false,
        };
        for step in log.steps() {
            match step {
                EnableStep::CliInstalled { tool } => result.cli_installed = Some(tool.clone()),
                EnableStep::PluginInstalled { .. } => result.plugin_installed = true,
                EnableStep::McpConfigured { .. } => result.mcp_configured = true,
                EnableStep::SkillFileCopied { .. } => result.skill_file_copied = true,
                EnableStep::Injected { .. } => result.injected = true,
                EnableStep::StateUpdated => {}
            }
        }
        result
    }
}

/// What a disable did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisableReport {
    pub skill: SkillName,
    pub agent: AgentType,
    /// Present when a purge was requested.
    pub purge: Option<PurgeOutcome>,
}

/// Snapshot of a project's skills.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectStatus {
    pub project: PathBuf,
    pub agent: AgentType,
    pub instruction_file: PathBuf,
    pub enabled: Vec<String>,
    /// Skill blocks found in the instruction file.
    pub injected: Vec<String>,
    pub initialized_at: DateTime<Utc>,
    pub last_sync: Option<DateTime<Utc>>,
}

/// Outcome of a sync.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub synced: Vec<String>,
    /// Enabled skills no longer in the cache.
    pub missing: Vec<String>,
    pub failed: Vec<(String, String)>,
    /// Injected blocks removed because their skill is not enabled.
    pub orphans_removed: Vec<String>,
}

impl SyncReport {
    pub fn is_clean(&self) -> bool {
        self.missing.is_empty() && self.failed.is_empty()
    }
}

/// How serious a consistency finding is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Severity {
    Warning,
    Error,
}

/// A violation of "enabled iff artifact and block both exist".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Finding {
    MissingSkillFile { skill: String, path: PathBuf },
    MissingInjection { skill: String, file: PathBuf },
    OrphanInjection { skill: String, file: PathBuf },
    NotCached { skill: String },
}

impl Finding {
    pub fn severity(&self) -> Severity {
        match self {
            Finding::MissingSkillFile { .. } | Finding::MissingInjection { .. } => Severity::Error,
            Finding::OrphanInjection { .. } | Finding::NotCached { .. } => Severity::Warning,
        }
    }

    pub fn skill(&self) -> &str {
        match self {
            Finding::MissingSkillFile { skill, .. }
            | Finding::MissingInjection { skill, .. }
            | Finding::OrphanInjection { skill, .. }
            | Finding::NotCached { skill } => skill,
        }
    }

    /// Command that repairs the finding.
    pub fn fix(&self) -> String {
        match self {
            Finding::MissingSkillFile { .. }
            | Finding::MissingInjection { .. }
            | Finding::OrphanInjection { .. } => "grimoire skills sync".to_string(),
            Finding::NotCached { skill } => {
                format!("grimoire skills add <path> or grimoire skills disable {}", skill)
            }
        }
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Finding::MissingSkillFile { skill, path } => write!(
                f,
                "skill '{}' is enabled but {} is missing",
                skill,
                path.display()
            ),
            Finding::MissingInjection { skill, file } => write!(
                f,
                "skill '{}' is enabled but has no block in {}",
                skill,
                file.display()
            ),
            Finding::OrphanInjection { skill, file } => write!(
                f,
                "{} has a block for '{}', which is not enabled",
                file.display(),
                skill
            ),
            Finding::NotCached { skill } => {
                write!(f, "skill '{}' is enabled but no longer cached", skill)
            }
        }
    }
}

fn parse_name(name: &str) -> Result<SkillName> {
    SkillName::new(name).map_err(SkillError::InvalidSkillName)
}

async fn resolve_project(project: &Path) -> Result<PathBuf> {
    tokio::fs::canonicalize(project)
        .await
        .map_err(|e| SkillError::io("resolve project directory", project, e))
}

/// Orchestrates enable/disable across the cache, state store and adapters.
pub struct SkillEngine {
    cache: Arc<dyn SkillCache>,
    state: Arc<dyn StateStore>,
    agents: AgentRegistry,
    runner: Arc<dyn CommandRunner>,
    locks_dir: PathBuf,
}

impl SkillEngine {
    pub fn new(
        cache: Arc<dyn SkillCache>,
        state: Arc<dyn StateStore>,
        agents: AgentRegistry,
        runner: Arc<dyn CommandRunner>,
        locks_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            cache,
            state,
            agents,
            runner,
            locks_dir: locks_dir.into(),
        }
    }

    /// Production engine over the filesystem collaborators under `paths`.
    pub fn from_paths(paths: &GrimoirePaths) -> Self {
        let runner: Arc<dyn CommandRunner> = Arc::new(SystemRunner);
        Self::new(
            Arc::new(FsSkillCache::new(&paths.cache_dir)),
            Arc::new(JsonStateStore::new(&paths.state_dir)),
            AgentRegistry::builtin(Arc::clone(&runner)),
            runner,
            &paths.locks_dir,
        )
    }

    pub fn cache(&self) -> &dyn SkillCache {
        self.cache.as_ref()
    }

    pub fn agents(&self) -> &AgentRegistry {
        &self.agents
    }

    async fn lock(&self, project: &Path) -> Result<ProjectLock> {
        ProjectLock::acquire(&self.locks_dir, project).await
    }

    async fn require_state(&self, project: &Path) -> Result<ProjectState> {
        self.state
            .get_project_state(project)
            .await?
            .ok_or_else(|| SkillError::ProjectNotInitialized {
                path: project.to_path_buf(),
            })
    }

    /// Record `agent` as the project's convention.
    pub async fn init_project(&self, project: &Path, agent: AgentType) -> Result<ProjectState> {
        let project = resolve_project(project).await?;
        let _lock = self.lock(&project).await?;
        Ok(self.state.init_project(&project, agent).await?)
    }

    /// The project's stored state, if initialized.
    pub async fn project_state(&self, project: &Path) -> Result<Option<ProjectState>> {
        let project = resolve_project(project).await?;
        Ok(self.state.get_project_state(&project).await?)
    }

    /// Read-only precondition check for [`enable`](Self::enable). Never fails;
    /// problems are reported through `reason`.
    pub async fn can_enable(&self, project: &Path, name: &str) -> CanEnable {
        let name = match parse_name(name) {
            Ok(name) => name,
            Err(e) => return CanEnable::no(e.to_string()),
        };
        let project = match resolve_project(project).await {
            Ok(project) => project,
            Err(e) => return CanEnable::no(e.to_string()),
        };

        if !self.cache.is_cached(&name).await {
            return CanEnable::no(
                SkillError::SkillNotCached {
                    name: name.to_string(),
                }
                .to_string(),
            );
        }

        match self.state.get_project_state(&project).await {
            Err(e) => CanEnable::no(e.to_string()),
            Ok(None) => CanEnable::no(
                SkillError::ProjectNotInitialized {
                    path: project.clone(),
                }
                .to_string(),
            ),
            Ok(Some(state)) if state.is_enabled(name.as_str()) => CanEnable {
                can_enable: false,
                is_enabled: true,
                reason: Some(
                    SkillError::SkillAlreadyEnabled {
                        name: name.to_string(),
                    }
                    .to_string(),
                ),
            },
            Ok(Some(state)) => {
                let artifact = self.agents.get(state.agent).skill_path(&project, &name);
                match fs_util::path_exists(&artifact).await {
                    Ok(false) => CanEnable {
                        can_enable: true,
                        is_enabled: false,
                        reason: None,
                    },
                    Ok(true) => CanEnable::no(SkillError::ArtifactExists { path: artifact }.to_string()),
                    Err(e) => CanEnable::no(SkillError::io("inspect skill artifact", artifact, e).to_string()),
                }
            }
        }
    }

    /// Enable a cached skill in a project, all or nothing.
    pub async fn enable(&self, project: &Path, name: &str, options: EnableOptions) -> Result<EnableResult> {
        let name = parse_name(name)?;
        let project = resolve_project(project).await?;
        let _lock = self.lock(&project).await?;

        tracing::debug!("Enabling '{}' in {}", name, project.display());
        let skill = self.cache.get_cached(&name).await?;
        let state = self.require_state(&project).await?;
        if state.is_enabled(name.as_str()) {
            return Err(SkillError::SkillAlreadyEnabled {
                name: name.to_string(),
            });
        }

        let adapter = self.agents.get(state.agent);
        match self
            .run_enable(&project, &skill, adapter.as_ref(), options)
            .await
        {
            Ok(log) => {
                tracing::info!("Enabled '{}' for {}", name, state.agent);
                Ok(EnableResult::from_log(name, state.agent, &log))
            }
            Err(StepFailure { log, error }) => {
                tracing::debug!("Enable of '{}' failed: {}", name, error);
                self.rollback_with(&project, &name, adapter.as_ref(), &log)
                    .await;
                Err(error)
            }
        }
    }

    async fn run_enable(
        &self,
        project: &Path,
        skill: &CachedSkill,
        adapter: &dyn AgentAdapter,
        options: EnableOptions,
    ) -> std::result::Result<StepLog, StepFailure> {
        let name = skill.name();
        let mut log = StepLog::new();

        match &skill.manifest.cli {
            Some(dep) if !options.skip_dependencies => {
                match runner::ensure_cli(self.runner.as_ref(), name, dep).await {
                    Ok(true) => {
                        log = log.record(EnableStep::CliInstalled {
                            tool: dep.command.clone(),
                        })
                    }
                    Ok(false) => {}
                    Err(e) => return Err(StepFailure::new(log, e)),
                }
            }
            Some(dep) => tracing::debug!("Skipping CLI dependency check for '{}'", dep.command),
            None => {}
        }

        log = adapter.enable_skill(project, skill, log).await?;
        tracing::debug!("Adapter steps for '{}': {:?}", name, log.steps());

        if let Err(e) = self.state.add_enabled(project, name).await {
            return Err(StepFailure::new(log, e));
        }
        Ok(log.record(EnableStep::StateUpdated))
    }

    /// Undo the recorded steps of a failed enable, newest first.
    ///
    /// Best-effort: a failing undo step is logged and the rest still run.
    pub async fn rollback(&self, project: &Path, name: &SkillName, agent: AgentType, log: &StepLog) {
        let adapter = self.agents.get(agent);
        self.rollback_with(project, name, adapter.as_ref(), log).await;
    }

    async fn rollback_with(
        &self,
        project: &Path,
        name: &SkillName,
        adapter: &dyn AgentAdapter,
        log: &StepLog,
    ) {
        let plan = log.rollback_plan();
        if plan.is_empty() {
            return;
        }
        tracing::warn!("Rolling back enable of '{}' ({} steps)", name, plan.len());

        for action in plan {
            let outcome = match &action {
                RollbackAction::RemoveFromState => self
                    .state
                    .remove_enabled(project, name)
                    .await
                    .map_err(SkillError::from),
                RollbackAction::RemoveInjection => adapter.remove_injection(project, name).await,
                RollbackAction::RemoveSkillFile { path } => fs_util::remove_if_exists(path)
                    .await
                    .map(|_| ())
                    .map_err(|e| SkillError::io("remove skill artifact", path, e)),
                RollbackAction::UnregisterMcp => adapter.unregister_mcp(project, name).await.map(|_| ()),
            };
            if let Err(e) = outcome {
                tracing::warn!("Rollback step {:?} for '{}' failed: {}", action, name, e);
            }
        }
    }

    /// Disable an enabled skill. Every step is idempotent, so a failed
    /// disable is retried by running it again.
    pub async fn disable(&self, project: &Path, name: &str, options: DisableOptions) -> Result<DisableReport> {
        let name = parse_name(name)?;
        let project = resolve_project(project).await?;
        let _lock = self.lock(&project).await?;

        let state = self.require_state(&project).await?;
        if !state.is_enabled(name.as_str()) {
            return Err(SkillError::SkillNotEnabled {
                name: name.to_string(),
            });
        }

        tracing::debug!("Disabling '{}' in {}", name, project.display());
        let adapter = self.agents.get(state.agent);
        let cached = match self.cache.get_cached(&name).await {
            Ok(skill) => Some(skill),
            Err(e) => {
                tracing::debug!("Leaving MCP config alone for '{}': {}", name, e);
                None
            }
        };
        let mcp = cached.as_ref().and_then(|skill| skill.manifest.mcp.as_ref());
        adapter.disable_skill(&project, &name, mcp).await;
        adapter.remove_injection(&project, &name).await?;

        let artifact = adapter.skill_path(&project, &name);
        fs_util::remove_if_exists(&artifact)
            .await
            .map_err(|e| SkillError::io("remove skill artifact", &artifact, e))?;

        self.state.remove_enabled(&project, &name).await?;
        self.state.record_disable(&project, &name).await?;
        tracing::info!("Disabled '{}'", name);

        let purge = if options.purge {
            Some(purge::purge_artifacts(&project, name.as_str()).await)
        } else {
            None
        };

        Ok(DisableReport {
            skill: name,
            agent: state.agent,
            purge,
        })
    }

    pub async fn status(&self, project: &Path) -> Result<ProjectStatus> {
        let project = resolve_project(project).await?;
        let state = self.require_state(&project).await?;
        let adapter = self.agents.get(state.agent);
        let instruction_file = adapter.instruction_file(&project);
        let injected = injection::list_file_injections(&instruction_file).await?;

        Ok(ProjectStatus {
            agent: state.agent,
            enabled: state.enabled.into_iter().collect(),
            injected,
            initialized_at: state.initialized_at,
            last_sync: state.last_sync,
            instruction_file,
            project,
        })
    }

    /// Re-apply every enabled skill from the cache and drop blocks for skills
    /// that are no longer enabled.
    pub async fn sync(&self, project: &Path) -> Result<SyncReport> {
        let project = resolve_project(project).await?;
        let _lock = self.lock(&project).await?;
        let state = self.require_state(&project).await?;
        let adapter = self.agents.get(state.agent);
        let mut report = SyncReport::default();

        for raw in &state.enabled {
            let name = match SkillName::new(raw.as_str()) {
                Ok(name) => name,
                Err(e) => {
                    report.failed.push((raw.clone(), e));
                    continue;
                }
            };
            let skill = match self.cache.get_cached(&name).await {
                Ok(skill) => skill,
                Err(CacheError::NotCached { .. }) => {
                    tracing::warn!("Enabled skill '{}' is not cached", name);
                    report.missing.push(raw.clone());
                    continue;
                }
                Err(e) => {
                    report.failed.push((raw.clone(), e.to_string()));
                    continue;
                }
            };
            match adapter.sync_skill(&project, &skill).await {
                Ok(()) => report.synced.push(raw.clone()),
                Err(e) => {
                    tracing::warn!("Failed to sync '{}': {}", name, e);
                    report.failed.push((raw.clone(), e.to_string()));
                }
            }
        }

        let instruction_file = adapter.instruction_file(&project);
        for injected in injection::list_file_injections(&instruction_file).await? {
            if state.enabled.contains(&injected) {
                continue;
            }
            let Ok(name) = SkillName::new(injected.as_str()) else {
                continue;
            };
            adapter.remove_injection(&project, &name).await?;
            report.orphans_removed.push(injected);
        }

        self.state.touch_sync(&project).await?;
        tracing::info!(
            "Synced {} skills ({} missing, {} failed)",
            report.synced.len(),
            report.missing.len(),
            report.failed.len()
        );
        Ok(report)
    }

    /// Check that enabled skills and the project's artifacts agree.
    pub async fn doctor(&self, project: &Path) -> Result<Vec<Finding>> {
        let project = resolve_project(project).await?;
        let state = self.require_state(&project).await?;
        let adapter = self.agents.get(state.agent);
        let instruction_file = adapter.instruction_file(&project);
        let injected: BTreeSet<String> = injection::list_file_injections(&instruction_file)
            .await?
            .into_iter()
            .collect();

        let mut findings = Vec::new();
        for raw in &state.enabled {
            let Ok(name) = SkillName::new(raw.as_str()) else {
                continue;
            };
            if !self.cache.is_cached(&name).await {
                findings.push(Finding::NotCached { skill: raw.clone() });
            }
            let path = adapter.skill_path(&project, &name);
            let present = fs_util::path_exists(&path)
                .await
                .map_err(|e| SkillError::io("inspect skill artifact", &path, e))?;
            if !present {
                findings.push(Finding::MissingSkillFile {
                    skill: raw.clone(),
                    path,
                });
            }
            if !injected.contains(raw) {
                findings.push(Finding::MissingInjection {
                    skill: raw.clone(),
                    file: instruction_file.clone(),
                });
            }
        }
        for orphan in injected.difference(&state.enabled) {
            findings.push(Finding::OrphanInjection {
                skill: orphan.clone(),
                file: instruction_file.clone(),
            });
        }
        Ok(findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> SkillName {
        SkillName::new(s).unwrap()
    }

    #[test]
    fn test_enable_result_from_log() {
        let log = StepLog::new()
            .record(EnableStep::CliInstalled {
                tool: "bd".to_string(),
            })
            .record(EnableStep::SkillFileCopied {
                path: PathBuf::from("/p/x"),
            })
            .record(EnableStep::Injected {
                file: PathBuf::from("/p/CLAUDE.md"),
            })
            .record(EnableStep::StateUpdated);
        let result = EnableResult::from_log(name("beads"), AgentType::ClaudeCode, &log);
        assert_eq!(result.cli_installed.as_deref(), Some("bd"));
        assert!(!result.plugin_installed);
        assert!(!result.mcp_configured);
        assert!(result.skill_file_copied);
        assert!(result.injected);
    }

    #[test]
    fn test_finding_severity_and_display() {
        let missing = Finding::MissingInjection {
            skill: "foo".to_string(),
            file: PathBuf::from("/p/AGENTS.md"),
        };
        assert_eq!(missing.severity(), Severity::Error);
        assert!(missing.to_string().contains("no block in /p/AGENTS.md"));

        let orphan = Finding::OrphanInjection {
            skill: "bar".to_string(),
            file: PathBuf::from("/p/AGENTS.md"),
        };
        assert_eq!(orphan.severity(), Severity::Warning);
        assert_eq!(orphan.skill(), "bar");
        assert!(Finding::NotCached {
            skill: "baz".to_string()
        }
        .fix()
        .contains("disable baz"));
    }

    #[test]
    fn test_sync_report_clean() {
        let mut report = SyncReport::default();
        assert!(report.is_clean());
        report.missing.push("gone".to_string());
        assert!(!report.is_clean());
    }
}
