//! Removal of project artifacts created by well-known skills.
//!
//! Some skills leave data directories in the project (an issue database,
//! an index). `disable --purge` removes them. The mapping is fixed: only the
//! skills listed here have known artifacts.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::fs_util;

/// Skill name to project-relative artifact paths.
const PURGE_ARTIFACTS: &[(&str, &[&str])] = &[
    ("beads", &[".beads"]),
    ("serena", &[".serena"]),
    ("spec-kit", &[".specify"]),
    ("openspec", &["openspec"]),
];

/// Project-relative artifacts known for a skill.
pub fn artifacts_for(skill: &str) -> &'static [&'static str] {
    PURGE_ARTIFACTS
        .iter()
        .find(|(name, _)| *name == skill)
        .map(|(_, paths)| *paths)
        .unwrap_or(&[])
}

/// What a purge removed and what it could not.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PurgeOutcome {
    pub removed: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, String)>,
}

impl PurgeOutcome {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Remove a skill's known artifacts from a project. Never fails; problems are
/// collected in the outcome.
pub async fn purge_artifacts(project: &Path, skill: &str) -> PurgeOutcome {
    let mut outcome = PurgeOutcome::default();
    for relative in artifacts_for(skill) {
        let path = project.join(relative);
        match fs_util::remove_if_exists(&path).await {
            Ok(true) => {
                tracing::info!("Purged {}", path.display());
                outcome.removed.push(path);
            }
            Ok(false) => {}
            Err(e) => {
                tracing::warn!("Failed to purge {}: {}", path.display(), e);
                outcome.failed.push((path, e.to_string()));
            }
        }
    }
    outcome
}
