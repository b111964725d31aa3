//! Filesystem locations and user configuration.
//!
//! Collaborators never look up the home directory themselves: the caller
//! builds a [`GrimoirePaths`] once and hands the relevant directories to the
//! cache, state store and lock. Only [`GrimoirePaths::from_env`] reads the
//! process environment, and only the CLI calls it.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::agents::AgentType;

/// Environment variable overriding the Grimoire home directory.
pub const HOME_ENV: &str = "GRIMOIRE_HOME";

/// Default home directory name under the user's home.
pub const DEFAULT_DIR_NAME: &str = ".grimoire";

/// Name of the optional configuration file in the Grimoire home.
pub const CONFIG_FILE: &str = "config.yaml";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not determine the home directory; set GRIMOIRE_HOME")]
    NoHomeDir,

    #[error("failed to read config '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml_ng::Error,
    },
}

/// Contents of `config.yaml`. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GrimoireConfig {
    /// Agent used by `grimoire init` when none is given.
    #[serde(default)]
    pub default_agent: Option<AgentType>,
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
    #[serde(default)]
    pub state_dir: Option<PathBuf>,
}

impl GrimoireConfig {
    /// Load `config.yaml` from a Grimoire home; a missing file yields defaults.
    pub fn load(root: &Path) -> Result<Self, ConfigError> {
        let path = root.join(CONFIG_FILE);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => return Err(ConfigError::Read { path, source }),
        };
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml_ng::from_str(&content).map_err(|source| ConfigError::Parse { path, source })
    }
}

/// Resolved directories Grimoire reads and writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrimoirePaths {
    pub root: PathBuf,
    pub cache_dir: PathBuf,
    pub state_dir: PathBuf,
    pub locks_dir: PathBuf,
}

impl GrimoirePaths {
    /// Default layout under `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            cache_dir: root.join("cache").join("skills"),
            state_dir: root.join("state"),
            locks_dir: root.join("locks"),
            root,
        }
    }

    /// Apply overrides from a config file. Relative overrides are resolved
    /// against the root.
    pub fn with_config(mut self, config: &GrimoireConfig) -> Self {
        if let Some(cache_dir) = &config.cache_dir {
            self.cache_dir = self.root.join(cache_dir);
        }
        if let Some(state_dir) = &config.state_dir {
            self.state_dir = self.root.join(state_dir);
        }
        self
    }

    /// Home directory from `GRIMOIRE_HOME`, else `~/.grimoire`.
    pub fn home_from_env() -> Result<PathBuf, ConfigError> {
        match std::env::var_os(HOME_ENV) {
            Some(home) if !home.is_empty() => Ok(PathBuf::from(home)),
            _ => dirs::home_dir()
                .map(|home| home.join(DEFAULT_DIR_NAME))
                .ok_or(ConfigError::NoHomeDir),
        }
    }

    /// Resolve paths and config from the process environment.
    pub fn from_env() -> Result<(Self, GrimoireConfig), ConfigError> {
        let root = Self::home_from_env()?;
        let config = GrimoireConfig::load(&root)?;
        let paths = Self::new(root).with_config(&config);
        tracing::debug!("Using Grimoire home {}", paths.root.display());
        Ok((paths, config))
    }
}
