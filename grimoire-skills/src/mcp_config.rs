//! MCP server configuration management for agent config files.
//!
//! Agents keep their MCP servers under a single top-level key of a JSON
//! config file. Grimoire only ever adds entries that are not already present
//! and removes entries it is asked to remove; every other key in the file is
//! carried through untouched.

use std::path::Path;

use serde_json::{json, Map, Value};

use crate::error::{Result, SkillError};
use crate::fs_util;
use crate::skill::McpSpec;

/// How an agent lays out a single MCP server entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum McpEntryStyle {
    /// `{ "command": "x", "args": [..], "env": {..} }`
    CommandArgs,
    /// `{ "type": "local", "command": ["x", ..], "environment": {..}, "enabled": true }`
    LocalCommand,
}

/// Where and how an agent stores MCP servers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct McpConfigDef {
    /// Config file name relative to the project root.
    pub file_name: &'static str,
    /// Key of the servers object (e.g. `mcpServers`).
    pub servers_key: &'static str,
    pub style: McpEntryStyle,
}

/// An MCP server entry to install into an agent config file.
#[derive(Debug, Clone, PartialEq)]
pub struct McpServerEntry {
    /// Key in the servers object; always the skill name.
    pub name: String,
    pub spec: McpSpec,
}

impl McpServerEntry {
    pub fn new(name: impl Into<String>, spec: McpSpec) -> Self {
        Self {
            name: name.into(),
            spec,
        }
    }

    /// Convert to the JSON value written into the config file.
    pub fn to_json(&self, style: McpEntryStyle) -> Value {
        let mut entry = Map::new();
        match style {
            McpEntryStyle::CommandArgs => {
                entry.insert("command".to_string(), json!(self.spec.command));
                entry.insert("args".to_string(), json!(self.spec.args));
                if !self.spec.env.is_empty() {
                    entry.insert("env".to_string(), json!(self.spec.env));
                }
            }
            McpEntryStyle::LocalCommand => {
                let mut command = Vec::with_capacity(self.spec.args.len() + 1);
                command.push(self.spec.command.clone());
                command.extend(self.spec.args.iter().cloned());
                entry.insert("type".to_string(), json!("local"));
                entry.insert("command".to_string(), json!(command));
                if !self.spec.env.is_empty() {
                    entry.insert("environment".to_string(), json!(self.spec.env));
                }
                entry.insert("enabled".to_string(), json!(true));
            }
        }
        Value::Object(entry)
    }
}

fn config_error(path: &Path, message: impl Into<String>) -> SkillError {
    SkillError::McpConfig {
        path: path.to_path_buf(),
        message: message.into(),
    }
}

/// Read a JSON config file, returning an empty object if it doesn't exist.
pub async fn read_config(path: &Path) -> Result<Value> {
    let content = fs_util::read_or_empty(path)
        .await
        .map_err(|e| config_error(path, e.to_string()))?;
    if content.trim().is_empty() {
        return Ok(json!({}));
    }
    let value: Value = serde_json::from_str(&content)
        .map_err(|e| config_error(path, format!("invalid JSON: {}", e)))?;
    if !value.is_object() {
        return Err(config_error(path, "top-level value is not an object"));
    }
    Ok(value)
}

/// Write a JSON config file with pretty formatting.
pub async fn write_config(path: &Path, settings: &Value) -> Result<()> {
    let mut content =
        serde_json::to_string_pretty(settings).map_err(|e| config_error(path, e.to_string()))?;
    content.push('\n');
    fs_util::write_atomic(path, content.as_bytes())
        .await
        .map_err(|e| config_error(path, e.to_string()))
}

/// Merge an MCP server entry into a settings value.
///
/// Returns `Ok(true)` if the entry was added. An existing entry with the same
/// name is never overwritten.
pub fn merge_server(settings: &mut Value, def: &McpConfigDef, entry: &McpServerEntry) -> std::result::Result<bool, String> {
    let root = settings
        .as_object_mut()
        .ok_or_else(|| "top-level value is not an object".to_string())?;
    let servers = root
        .entry(def.servers_key.to_string())
        .or_insert_with(|| json!({}))
        .as_object_mut()
        .ok_or_else(|| format!("'{}' is not an object", def.servers_key))?;

    if servers.contains_key(&entry.name) {
        return Ok(false);
    }
    servers.insert(entry.name.clone(), entry.to_json(def.style));
    Ok(true)
}

/// Remove an MCP server entry by name, dropping the servers object when it
/// becomes empty. Returns true if a change was made.
pub fn remove_server(settings: &mut Value, servers_key: &str, name: &str) -> bool {
    let Some(root) = settings.as_object_mut() else {
        return false;
    };
    let Some(servers) = root.get_mut(servers_key).and_then(Value::as_object_mut) else {
        return false;
    };
    if servers.remove(name).is_none() {
        return false;
    }
    if servers.is_empty() {
        root.remove(servers_key);
    }
    true
}

/// Install an MCP server into the project's agent config.
///
/// Returns true if the config file was changed.
pub async fn install_server(project: &Path, def: &McpConfigDef, entry: &McpServerEntry) -> Result<bool> {
    let path = project.join(def.file_name);
    let mut settings = read_config(&path).await?;
    let changed = merge_server(&mut settings, def, entry).map_err(|m| config_error(&path, m))?;
    if changed {
        write_config(&path, &settings).await?;
        tracing::debug!("Added MCP server '{}' to {}", entry.name, path.display());
    }
    Ok(changed)
}

/// Remove an MCP server from the project's agent config.
///
/// The file is deleted when nothing else is left in it. Returns true if the
/// config file was changed; a missing file is not an error.
pub async fn uninstall_server(project: &Path, def: &McpConfigDef, name: &str) -> Result<bool> {
    remove_matching(project, def, name, |_| true).await
}

/// Remove `entry` only if the config still holds exactly what
/// [`install_server`] would have written for it.
pub async fn uninstall_owned_server(
    project: &Path,
    def: &McpConfigDef,
    entry: &McpServerEntry,
) -> Result<bool> {
    let expected = entry.to_json(def.style);
    remove_matching(project, def, &entry.name, |current| *current == expected).await
}

async fn remove_matching(
    project: &Path,
    def: &McpConfigDef,
    name: &str,
    matches: impl Fn(&Value) -> bool,
) -> Result<bool> {
    let path = project.join(def.file_name);
    let mut settings = read_config(&path).await?;

    match settings.get(def.servers_key).and_then(|servers| servers.get(name)) {
        None => return Ok(false),
        Some(current) if !matches(current) => {
            tracing::debug!(
                "Leaving MCP server '{}' in {}: it was not written by Grimoire",
                name,
                path.display()
            );
            return Ok(false);
        }
        Some(_) => {}
    }
    if !remove_server(&mut settings, def.servers_key, name) {
        return Ok(false);
    }

    if settings == json!({}) {
        fs_util::remove_if_exists(&path)
            .await
            .map_err(|e| config_error(&path, e.to_string()))?;
    } else {
        write_config(&path, &settings).await?;
    }
    tracing::debug!("Removed MCP server '{}' from {}", name, path.display());
    Ok(true)
}
