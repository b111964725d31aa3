//! Error types for skill orchestration.
//!
//! `SkillError` is the closed set of failures the engine reports to callers.
//! Collaborator errors (cache, state store, injection) convert into it so a
//! failure is always wrapped with its cause, never flattened into a string.

use std::path::PathBuf;

use thiserror::Error;

use crate::cache::CacheError;
use crate::injection::InjectionError;
use crate::state::StateError;

/// Result type alias using SkillError.
pub type Result<T> = std::result::Result<T, SkillError>;

/// Errors raised by the skill engine and the agent adapters.
#[derive(Debug, Error)]
pub enum SkillError {
    /// The skill is not present in the local cache.
    #[error("skill '{name}' is not cached; add it with `grimoire skills add <path>` first")]
    SkillNotCached { name: String },

    /// The project has no recorded agent or state.
    #[error("project '{}' is not initialized; run `grimoire init` first", path.display())]
    ProjectNotInitialized { path: PathBuf },

    /// The skill is already in the project's enabled set.
    #[error("skill '{name}' is already enabled")]
    SkillAlreadyEnabled { name: String },

    /// The skill is not in the project's enabled set.
    #[error("skill '{name}' is not enabled")]
    SkillNotEnabled { name: String },

    /// Managed-section text manipulation failed.
    #[error(transparent)]
    Injection(#[from] InjectionError),

    /// A CLI tool the skill depends on is missing and could not be installed.
    #[error("CLI dependency '{tool}' for skill '{skill}' could not be installed: {message}")]
    CliDependency {
        skill: String,
        tool: String,
        message: String,
    },

    /// Agent-specific plugin installation failed.
    #[error("plugin '{plugin}' could not be installed: {message}")]
    PluginInstall { plugin: String, message: String },

    /// An agent MCP configuration file could not be read or updated.
    #[error("MCP configuration '{}' could not be updated: {message}", path.display())]
    McpConfig { path: PathBuf, message: String },

    /// Project state could not be read or written.
    #[error(transparent)]
    State(#[from] StateError),

    /// The skill cache could not be read.
    #[error(transparent)]
    Cache(CacheError),

    /// The skill name is not a valid identifier.
    #[error("invalid skill name: {0}")]
    InvalidSkillName(String),

    /// Filesystem operation on a skill artifact failed.
    #[error("failed to {action} '{}': {source}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Something Grimoire did not create already occupies the skill's artifact path.
    #[error("'{}' already exists; move or remove it before enabling this skill", path.display())]
    ArtifactExists { path: PathBuf },

    /// The per-project advisory lock could not be taken.
    #[error("failed to lock project state '{}': {source}", path.display())]
    Lock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SkillError {
    /// Create an Io error for a skill artifact operation.
    pub fn io(action: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            action,
            path: path.into(),
            source,
        }
    }

    /// True for the two state-consistency guards that batch commands report
    /// as a skip rather than a failure.
    pub fn is_state_guard(&self) -> bool {
        matches!(
            self,
            SkillError::SkillAlreadyEnabled { .. } | SkillError::SkillNotEnabled { .. }
        )
    }
}

impl From<CacheError> for SkillError {
    fn from(error: CacheError) -> Self {
        match error {
            CacheError::NotCached { name } => SkillError::SkillNotCached { name },
            other => SkillError::Cache(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_cached_message_mentions_cache() {
        let err = SkillError::SkillNotCached {
            name: "missing-skill".to_string(),
        };
        assert!(err.to_string().contains("not cached"));
        assert!(err.to_string().contains("missing-skill"));
    }

    #[test]
    fn test_cache_not_cached_converts_to_engine_error() {
        let err: SkillError = CacheError::NotCached {
            name: "foo".to_string(),
        }
        .into();
        assert!(matches!(err, SkillError::SkillNotCached { ref name } if name == "foo"));
    }

    #[test]
    fn test_state_guards() {
        assert!(SkillError::SkillAlreadyEnabled {
            name: "a".to_string()
        }
        .is_state_guard());
        assert!(SkillError::SkillNotEnabled {
            name: "a".to_string()
        }
        .is_state_guard());
        assert!(!SkillError::InvalidSkillName("A".to_string()).is_state_guard());
        assert!(!SkillError::ArtifactExists {
            path: PathBuf::from("/p/.claude/skills/a")
        }
        .is_state_guard());
    }
}
