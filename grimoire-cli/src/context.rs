//! Shared state for command handlers.

use std::path::{Path, PathBuf};

use anyhow::Context;
use grimoire_skills::{FsSkillCache, GrimoireConfig, GrimoirePaths, SkillEngine};

/// Resolved Grimoire home, configuration and the engine built over it.
pub struct CliContext {
    pub paths: GrimoirePaths,
    pub config: GrimoireConfig,
    pub cache: FsSkillCache,
    pub engine: SkillEngine,
}

impl CliContext {
    pub fn new(paths: GrimoirePaths, config: GrimoireConfig) -> Self {
        let engine = SkillEngine::from_paths(&paths);
        Self::with_engine(paths, config, engine)
    }

    /// Context over a caller-built engine.
    pub fn with_engine(paths: GrimoirePaths, config: GrimoireConfig, engine: SkillEngine) -> Self {
        Self {
            cache: FsSkillCache::new(&paths.cache_dir),
            paths,
            config,
            engine,
        }
    }

    /// Context for the Grimoire home named by `GRIMOIRE_HOME` or `~/.grimoire`.
    pub fn from_env() -> anyhow::Result<Self> {
        let (paths, config) =
            GrimoirePaths::from_env().context("failed to load Grimoire configuration")?;
        Ok(Self::new(paths, config))
    }
}

/// The `--project` argument, or the current directory.
pub fn resolve_project(project: Option<&Path>) -> anyhow::Result<PathBuf> {
    match project {
        Some(path) => Ok(path.to_path_buf()),
        None => std::env::current_dir().context("failed to determine current directory"),
    }
}
