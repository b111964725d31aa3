//! Core skill types and SKILL.md parsing

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Primary content document of every skill package.
pub const SKILL_FILE: &str = "SKILL.md";

/// Longest accepted skill name.
const MAX_NAME_LEN: usize = 64;

/// A validated skill name (lowercase, alphanumeric with hyphens)
///
/// The name is the injection key and the artifact basename, so it must never
/// contain characters that could break a marker line or escape a directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SkillName(String);

impl SkillName {
    /// Create a new SkillName, validating the format
    pub fn new(name: impl Into<String>) -> Result<Self, String> {
        let name = name.into();
        if name.is_empty() {
            return Err("skill name cannot be empty".to_string());
        }
        if name.len() > MAX_NAME_LEN {
            return Err(format!(
                "skill name '{}' is longer than {} characters",
                name, MAX_NAME_LEN
            ));
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            return Err(format!(
                "skill name '{}' must be lowercase alphanumeric with hyphens only",
                name
            ));
        }
        if name.starts_with('-') || name.ends_with('-') {
            return Err(format!(
                "skill name '{}' cannot start or end with a hyphen",
                name
            ));
        }
        Ok(Self(name))
    }

    /// Get the name as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SkillName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SkillName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for SkillName {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SkillName> for String {
    fn from(name: SkillName) -> Self {
        name.0
    }
}

impl AsRef<str> for SkillName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A CLI tool a skill needs on PATH.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CliDependency {
    /// Executable name checked with `which`.
    pub command: String,
    /// Installer argv, run when the command is missing.
    #[serde(default)]
    pub install: Vec<String>,
}

/// An agent plugin the skill registers on enable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginSpec {
    pub name: String,
    #[serde(default)]
    pub marketplace: Option<String>,
}

impl PluginSpec {
    /// `name@marketplace`, or just `name`.
    pub fn install_spec(&self) -> String {
        match &self.marketplace {
            Some(marketplace) => format!("{}@{}", self.name, marketplace),
            None => self.name.clone(),
        }
    }
}

/// MCP server the skill wires into the agent configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct McpSpec {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

/// Immutable descriptor of a skill package, read from SKILL.md frontmatter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillManifest {
    pub name: SkillName,
    #[serde(default = "default_version")]
    pub version: String,
    pub description: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub cli: Option<CliDependency>,
    #[serde(default)]
    pub plugin: Option<PluginSpec>,
    #[serde(default)]
    pub mcp: Option<McpSpec>,
}

fn default_version() -> String {
    "0.0.0".to_string()
}

/// A skill package resolved from the cache.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedSkill {
    pub manifest: SkillManifest,
    /// Package directory inside the cache.
    pub dir: PathBuf,
    /// SKILL.md body without frontmatter.
    pub content: String,
    /// Auxiliary files, relative to `dir`.
    pub aux_files: Vec<PathBuf>,
}

impl CachedSkill {
    pub fn name(&self) -> &SkillName {
        &self.manifest.name
    }

    /// Path of the primary content document.
    pub fn skill_file(&self) -> PathBuf {
        self.dir.join(SKILL_FILE)
    }
}

/// Parse SKILL.md content into its manifest and body.
pub fn parse_skill_md(content: &str) -> Result<(SkillManifest, String), String> {
    let (frontmatter, body) = split_frontmatter(content)?;

    let manifest: SkillManifest = serde_yaml_ng::from_str(&frontmatter)
        .map_err(|e| format!("failed to parse SKILL.md frontmatter: {}", e))?;

    if manifest.description.trim().is_empty() {
        return Err("SKILL.md frontmatter 'description' cannot be empty".to_string());
    }
    if let Some(cli) = &manifest.cli {
        if cli.command.trim().is_empty() {
            return Err("SKILL.md 'cli.command' cannot be empty".to_string());
        }
    }

    Ok((manifest, body.trim().to_string()))
}

/// Load a skill package from a directory containing SKILL.md.
pub fn load_skill_dir(dir: &Path) -> Result<CachedSkill, String> {
    let skill_md = dir.join(SKILL_FILE);
    if !skill_md.is_file() {
        return Err(format!("no {} found in {}", SKILL_FILE, dir.display()));
    }

    let raw = std::fs::read_to_string(&skill_md)
        .map_err(|e| format!("failed to read {}: {}", skill_md.display(), e))?;
    let (manifest, content) = parse_skill_md(&raw)?;

    let mut aux_files = Vec::new();
    for entry in walkdir::WalkDir::new(dir).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| format!("failed to scan {}: {}", dir.display(), e))?;
        if !entry.file_type().is_file() {
            continue;
        }
        if let Ok(relative) = entry.path().strip_prefix(dir) {
            if relative != Path::new(SKILL_FILE) {
                aux_files.push(relative.to_path_buf());
            }
        }
    }

    Ok(CachedSkill {
        manifest,
        dir: dir.to_path_buf(),
        content,
        aux_files,
    })
}

/// Split YAML frontmatter from markdown body
fn split_frontmatter(content: &str) -> Result<(String, String), String> {
    let content = content.trim_start();

    let Some(after_first) = content.strip_prefix("---") else {
        return Err("SKILL.md must start with YAML frontmatter (---)".to_string());
    };

    let end_pos = after_first
        .find("\n---")
        .ok_or_else(|| "SKILL.md frontmatter not terminated (missing closing ---)".to_string())?;

    let frontmatter = after_first[..end_pos].trim().to_string();
    let rest = &after_first[end_pos + 4..];
    let body = rest.strip_prefix('\n').unwrap_or(rest).to_string();

    Ok((frontmatter, body))
}
