//! Local skill cache.
//!
//! Cached packages live at `<cache_dir>/<name>/` and are resolved by name.
//! The engine only reads through [`SkillCache`]; adding and evicting entries
//! are inherent operations of [`FsSkillCache`] used by the CLI.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

use crate::fs_util;
use crate::skill::{load_skill_dir, CachedSkill, SkillName, SKILL_FILE};

/// Errors from the skill cache.
#[derive(Debug, Error)]
pub enum CacheError {
    /// No package with this name is cached.
    #[error("skill '{name}' is not cached")]
    NotCached { name: String },

    /// A package directory exists but its SKILL.md is missing or invalid.
    #[error("invalid skill package '{}': {message}", path.display())]
    InvalidPackage { path: PathBuf, message: String },

    /// Reading or writing the cache directory failed.
    #[error("skill cache I/O error at '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CacheError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Read-only lookup of cached skill packages.
#[async_trait]
pub trait SkillCache: Send + Sync {
    /// True if a package with this name is cached.
    async fn is_cached(&self, name: &SkillName) -> bool;

    /// Resolve a cached package; fails with [`CacheError::NotCached`] if absent.
    async fn get_cached(&self, name: &SkillName) -> Result<CachedSkill, CacheError>;

    /// All valid cached packages, sorted by name.
    async fn list(&self) -> Result<Vec<CachedSkill>, CacheError>;
}

/// Filesystem-backed skill cache rooted at an explicit directory.
#[derive(Debug, Clone)]
pub struct FsSkillCache {
    root: PathBuf,
}

impl FsSkillCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_dir(&self, name: &SkillName) -> PathBuf {
        self.root.join(name.as_str())
    }

    /// Copy a skill package from a local directory into the cache.
    ///
    /// An existing entry with the same name is replaced.
    pub async fn add_from_path(&self, source: &Path) -> Result<CachedSkill, CacheError> {
        let skill = load_blocking(source.to_path_buf()).await?;
        let name = skill.name().clone();
        let dest = self.entry_dir(&name);
        let staging = self
            .root
            .join(format!(".{}.{}.staging", name, std::process::id()));

        fs_util::remove_if_exists(&staging)
            .await
            .map_err(|e| CacheError::io(&staging, e))?;
        if let Err(e) = fs_util::copy_dir(source, &staging).await {
            let _ = fs_util::remove_if_exists(&staging).await;
            return Err(CacheError::io(&staging, e));
        }

        let replaced = fs_util::remove_if_exists(&dest)
            .await
            .map_err(|e| CacheError::io(&dest, e))?;
        tokio::fs::rename(&staging, &dest)
            .await
            .map_err(|e| CacheError::io(&dest, e))?;

        if replaced {
            tracing::info!("Replaced cached skill '{}'", name);
        } else {
            tracing::info!("Cached skill '{}' from {}", name, source.display());
        }
        self.get_cached(&name).await
    }

    /// Evict a cached package.
    pub async fn remove(&self, name: &SkillName) -> Result<(), CacheError> {
        if !self.is_cached(name).await {
            return Err(CacheError::NotCached {
                name: name.to_string(),
            });
        }
        let dir = self.entry_dir(name);
        fs_util::remove_if_exists(&dir)
            .await
            .map_err(|e| CacheError::io(&dir, e))?;
        tracing::info!("Removed cached skill '{}'", name);
        Ok(())
    }
}

async fn load_blocking(dir: PathBuf) -> Result<CachedSkill, CacheError> {
    let path = dir.clone();
    tokio::task::spawn_blocking(move || load_skill_dir(&dir))
        .await
        .map_err(|e| CacheError::io(&path, std::io::Error::other(e)))?
        .map_err(|message| CacheError::InvalidPackage { path, message })
}

#[async_trait]
impl SkillCache for FsSkillCache {
    async fn is_cached(&self, name: &SkillName) -> bool {
        tokio::fs::metadata(self.entry_dir(name).join(SKILL_FILE))
            .await
            .map(|m| m.is_file())
            .unwrap_or(false)
    }

    async fn get_cached(&self, name: &SkillName) -> Result<CachedSkill, CacheError> {
        if !self.is_cached(name).await {
            return Err(CacheError::NotCached {
                name: name.to_string(),
            });
        }

        let dir = self.entry_dir(name);
        let skill = load_blocking(dir.clone()).await?;
        if skill.name() != name {
            return Err(CacheError::InvalidPackage {
                path: dir,
                message: format!(
                    "manifest name '{}' does not match cache entry '{}'",
                    skill.name(),
                    name
                ),
            });
        }
        Ok(skill)
    }

    async fn list(&self) -> Result<Vec<CachedSkill>, CacheError> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(CacheError::io(&self.root, e)),
        };

        let mut skills = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| CacheError::io(&self.root, e))?
        {
            let file_name = entry.file_name();
            let file_name = file_name.to_string_lossy();
            if file_name.starts_with('.') {
                continue;
            }
            let Ok(name) = SkillName::new(file_name.as_ref()) else {
                tracing::warn!("Skipping cache entry with invalid name: {}", file_name);
                continue;
            };
            match self.get_cached(&name).await {
                Ok(skill) => skills.push(skill),
                Err(e) => tracing::warn!("Skipping cache entry '{}': {}", name, e),
            }
        }

        skills.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(skills)
    }
}
