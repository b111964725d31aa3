//! Per-project skill state.
//!
//! Each initialized project has one JSON record holding its agent convention,
//! the set of enabled skills, and sync/disable timestamps. Records are keyed by
//! a SHA-256 of the canonical project path, the same key used for the
//! project's lock file.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::agents::AgentType;
use crate::fs_util;
use crate::skill::SkillName;

/// Current on-disk record version.
const STATE_VERSION: u32 = 1;

/// Errors from the state store.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to read project state '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("project state '{}' is corrupt: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to write project state '{}': {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "project '{}' is configured for {existing} with skills enabled; disable them before switching to {requested}",
        path.display()
    )]
    AgentConflict {
        path: PathBuf,
        existing: AgentType,
        requested: AgentType,
    },

    #[error("project '{}' has no recorded state", path.display())]
    NotInitialized { path: PathBuf },

    #[error("state record '{}' belongs to '{}', not '{}'", file.display(), recorded.display(), path.display())]
    KeyMismatch {
        file: PathBuf,
        recorded: PathBuf,
        path: PathBuf,
    },
}

/// Persisted state of one project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectState {
    pub agent: AgentType,
    #[serde(default)]
    pub enabled: BTreeSet<String>,
    pub initialized_at: DateTime<Utc>,
    #[serde(default)]
    pub last_sync: Option<DateTime<Utc>>,
    /// Last disable time per skill.
    #[serde(default)]
    pub disabled: BTreeMap<String, DateTime<Utc>>,
}

impl ProjectState {
    pub fn new(agent: AgentType) -> Self {
        Self {
            agent,
            enabled: BTreeSet::new(),
            initialized_at: Utc::now(),
            last_sync: None,
            disabled: BTreeMap::new(),
        }
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.enabled.contains(name)
    }
}

/// Stable key for a project path, used for state and lock file names.
pub fn project_key(project: &Path) -> String {
    format!("{:x}", Sha256::digest(project.as_os_str().as_encoded_bytes()))
}

/// Read/write access to per-project state.
///
/// Paths passed in are expected to be canonical; the engine canonicalizes at
/// its boundary.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn is_initialized(&self, project: &Path) -> Result<bool, StateError>;

    async fn get_project_state(&self, project: &Path) -> Result<Option<ProjectState>, StateError>;

    async fn get_enabled(&self, project: &Path) -> Result<BTreeSet<String>, StateError>;

    async fn add_enabled(&self, project: &Path, name: &SkillName) -> Result<(), StateError>;

    async fn remove_enabled(&self, project: &Path, name: &SkillName) -> Result<(), StateError>;

    /// Record when a skill was last disabled.
    async fn record_disable(&self, project: &Path, name: &SkillName) -> Result<(), StateError>;

    /// Create the project record, or return the existing one.
    async fn init_project(&self, project: &Path, agent: AgentType) -> Result<ProjectState, StateError>;

    async fn touch_sync(&self, project: &Path) -> Result<(), StateError>;

    async fn list_projects(&self) -> Result<Vec<(PathBuf, ProjectState)>, StateError>;
}

#[derive(Debug, Serialize, Deserialize)]
struct StateRecord {
    version: u32,
    path: PathBuf,
    state: ProjectState,
}

/// JSON-file state store rooted at an explicit directory.
#[derive(Debug, Clone)]
pub struct JsonStateStore {
    dir: PathBuf,
}

impl JsonStateStore {
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: state_dir.into(),
        }
    }

    fn projects_dir(&self) -> PathBuf {
        self.dir.join("projects")
    }

    /// Location of a project's record.
    pub fn record_path(&self, project: &Path) -> PathBuf {
        self.projects_dir()
            .join(format!("{}.json", project_key(project)))
    }

    async fn load_record(file: &Path) -> Result<Option<StateRecord>, StateError> {
        let content = match tokio::fs::read_to_string(file).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(StateError::Read {
                    path: file.to_path_buf(),
                    source,
                })
            }
        };
        let record = serde_json::from_str(&content).map_err(|source| StateError::Parse {
            path: file.to_path_buf(),
            source,
        })?;
        Ok(Some(record))
    }

    async fn load(&self, project: &Path) -> Result<Option<ProjectState>, StateError> {
        let file = self.record_path(project);
        let Some(record) = Self::load_record(&file).await? else {
            return Ok(None);
        };
        if record.path != project {
            return Err(StateError::KeyMismatch {
                file,
                recorded: record.path,
                path: project.to_path_buf(),
            });
        }
        Ok(Some(record.state))
    }

    async fn save(&self, project: &Path, state: &ProjectState) -> Result<(), StateError> {
        let file = self.record_path(project);
        let record = StateRecord {
            version: STATE_VERSION,
            path: project.to_path_buf(),
            state: state.clone(),
        };
        let content = serde_json::to_string_pretty(&record).map_err(|source| StateError::Parse {
            path: file.clone(),
            source,
        })?;
        fs_util::write_atomic(&file, content.as_bytes())
            .await
            .map_err(|source| StateError::Write { path: file, source })
    }

    async fn update<F>(&self, project: &Path, change: F) -> Result<(), StateError>
    where
        F: FnOnce(&mut ProjectState) -> bool + Send,
    {
        let mut state = self
            .load(project)
            .await?
            .ok_or_else(|| StateError::NotInitialized {
                path: project.to_path_buf(),
            })?;
        if change(&mut state) {
            self.save(project, &state).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl StateStore for JsonStateStore {
    async fn is_initialized(&self, project: &Path) -> Result<bool, StateError> {
        Ok(self.load(project).await?.is_some())
    }

    async fn get_project_state(&self, project: &Path) -> Result<Option<ProjectState>, StateError> {
        self.load(project).await
    }

    async fn get_enabled(&self, project: &Path) -> Result<BTreeSet<String>, StateError> {
        Ok(self
            .load(project)
            .await?
            .map(|state| state.enabled)
            .unwrap_or_default())
    }

    async fn add_enabled(&self, project: &Path, name: &SkillName) -> Result<(), StateError> {
        let name = name.to_string();
        self.update(project, move |state| state.enabled.insert(name))
            .await
    }

    async fn remove_enabled(&self, project: &Path, name: &SkillName) -> Result<(), StateError> {
        let name = name.as_str();
        self.update(project, |state| state.enabled.remove(name)).await
    }

    async fn record_disable(&self, project: &Path, name: &SkillName) -> Result<(), StateError> {
        let name = name.to_string();
        self.update(project, move |state| {
            state.disabled.insert(name, Utc::now());
            true
        })
        .await
    }

    async fn init_project(&self, project: &Path, agent: AgentType) -> Result<ProjectState, StateError> {
        match self.load(project).await? {
            Some(existing) if existing.agent == agent => Ok(existing),
            Some(existing) if !existing.enabled.is_empty() => Err(StateError::AgentConflict {
                path: project.to_path_buf(),
                existing: existing.agent,
                requested: agent,
            }),
            Some(mut existing) => {
                tracing::info!(
                    "Switching project {} from {} to {}",
                    project.display(),
                    existing.agent,
                    agent
                );
                existing.agent = agent;
                self.save(project, &existing).await?;
                Ok(existing)
            }
            None => {
                let state = ProjectState::new(agent);
                self.save(project, &state).await?;
                tracing::info!("Initialized project {} for {}", project.display(), agent);
                Ok(state)
            }
        }
    }

    async fn touch_sync(&self, project: &Path) -> Result<(), StateError> {
        self.update(project, |state| {
            state.last_sync = Some(Utc::now());
            true
        })
        .await
    }

    async fn list_projects(&self) -> Result<Vec<(PathBuf, ProjectState)>, StateError> {
        let dir = self.projects_dir();
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(StateError::Read { path: dir, source }),
        };

        let mut projects = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|source| StateError::Read {
                path: dir.clone(),
                source,
            })?
        {
            let file = entry.path();
            if file.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match Self::load_record(&file).await {
                Ok(Some(record)) => {
                    let expected = project_key(&record.path);
                    if file.file_stem().and_then(|s| s.to_str()) != Some(expected.as_str()) {
                        tracing::warn!(
                            "Skipping state record {}: it belongs to {}",
                            file.display(),
                            record.path.display()
                        );
                        continue;
                    }
                    projects.push((record.path, record.state));
                }
                Ok(None) => {}
                Err(e) => tracing::warn!("Skipping state record: {}", e),
            }
        }

        projects.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(projects)
    }
}
