//! Per-project advisory lock.
//!
//! Mutating engine operations hold an exclusive `fs2` lock on
//! `<locks_dir>/<project key>.lock` while they run, so two processes
//! enabling or disabling skills in the same project serialize.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::error::{Result, SkillError};
use crate::state::project_key;

/// RAII lock guard - releases on drop
#[derive(Debug)]
pub struct ProjectLock {
    file: File,
    path: PathBuf,
}

impl ProjectLock {
    /// Path of the lock file for a project.
    pub fn lock_path(locks_dir: &Path, project: &Path) -> PathBuf {
        locks_dir.join(format!("{}.lock", project_key(project)))
    }

    /// Block (on the blocking pool) until the project's lock is held.
    pub async fn acquire(locks_dir: &Path, project: &Path) -> Result<Self> {
        let path = Self::lock_path(locks_dir, project);
        let lock_err = |path: &Path, source: std::io::Error| SkillError::Lock {
            path: path.to_path_buf(),
            source,
        };

        tokio::fs::create_dir_all(locks_dir)
            .await
            .map_err(|e| lock_err(&path, e))?;

        let open_path = path.clone();
        let file = tokio::task::spawn_blocking(move || -> std::io::Result<File> {
            let file = OpenOptions::new()
                .create(true)
                .truncate(false)
                .write(true)
                .open(&open_path)?;
            file.lock_exclusive()?;
            Ok(file)
        })
        .await
        .map_err(|e| lock_err(&path, std::io::Error::other(e)))?
        .map_err(|e| lock_err(&path, e))?;

        tracing::trace!("Acquired project lock {}", path.display());
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ProjectLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
        tracing::trace!("Released project lock {}", self.path.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lock_file_is_keyed_by_project() {
        let dir = tempfile::tempdir().unwrap();
        let lock = ProjectLock::acquire(dir.path(), Path::new("/work/app"))
            .await
            .unwrap();
        assert!(lock.path().exists());
        assert_eq!(
            lock.path(),
            ProjectLock::lock_path(dir.path(), Path::new("/work/app"))
        );
        assert_ne!(
            lock.path(),
            ProjectLock::lock_path(dir.path(), Path::new("/work/other"))
        );
    }

    #[tokio::test]
    async fn test_lock_is_exclusive_until_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let project = Path::new("/work/app");
        let lock = ProjectLock::acquire(dir.path(), project).await.unwrap();

        let probe = OpenOptions::new()
            .write(true)
            .open(ProjectLock::lock_path(dir.path(), project))
            .unwrap();
        assert!(probe.try_lock_exclusive().is_err());

        drop(lock);
        assert!(probe.try_lock_exclusive().is_ok());
        FileExt::unlock(&probe).unwrap();
    }

    #[tokio::test]
    async fn test_different_projects_do_not_contend() {
        let dir = tempfile::tempdir().unwrap();
        let _a = ProjectLock::acquire(dir.path(), Path::new("/work/a"))
            .await
            .unwrap();
        let _b = ProjectLock::acquire(dir.path(), Path::new("/work/b"))
            .await
            .unwrap();
    }
}
