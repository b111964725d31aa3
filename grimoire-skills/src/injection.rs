//! Managed-section injection for agent instruction files.
//!
//! Grimoire owns exactly one delimited region of a user's `CLAUDE.md` /
//! `AGENTS.md`. Inside that region each enabled skill gets its own block,
//! bracketed by marker lines tagged with the skill name:
//!
//! ```text
//! <!-- grimoire:managed:start -->
//! <!-- grimoire:skill:beads:start -->
//! ...block content...
//! <!-- grimoire:skill:beads:end -->
//! <!-- grimoire:managed:end -->
//! ```
//!
//! Markers are matched as whole (trimmed) lines. Every transformation leaves
//! the bytes outside the managed section untouched, and all of them are safe
//! to repeat.

use std::ops::Range;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::fs_util;
use crate::skill::SkillName;

/// Opening marker of the managed section.
pub const MANAGED_START: &str = "<!-- grimoire:managed:start -->";
/// Closing marker of the managed section.
pub const MANAGED_END: &str = "<!-- grimoire:managed:end -->";

/// Common prefix of every marker line.
const MARKER_PREFIX: &str = "<!-- grimoire:";
const SKILL_MARKER_PREFIX: &str = "<!-- grimoire:skill:";
const SKILL_START_SUFFIX: &str = ":start -->";
const SKILL_END_SUFFIX: &str = ":end -->";

/// Errors from managed-section manipulation.
#[derive(Debug, Error)]
pub enum InjectionError {
    /// A block for this skill already exists; callers must replace instead.
    #[error("skill '{skill}' is already injected")]
    AlreadyInjected { skill: String },

    /// The managed section could not be located after creating it.
    #[error("managed section is malformed: {message}")]
    Malformed { message: String },

    /// Reading or writing the instruction file failed.
    #[error("failed to update instruction file '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Start marker line for a skill block.
pub fn skill_start_marker(skill: &str) -> String {
    format!("{}{}{}", SKILL_MARKER_PREFIX, skill, SKILL_START_SUFFIX)
}

/// End marker line for a skill block.
pub fn skill_end_marker(skill: &str) -> String {
    format!("{}{}{}", SKILL_MARKER_PREFIX, skill, SKILL_END_SUFFIX)
}

/// One line with its byte span; `end` includes the line terminator.
struct Line<'a> {
    start: usize,
    end: usize,
    text: &'a str,
}

fn lines(content: &str) -> impl Iterator<Item = Line<'_>> {
    let mut offset = 0;
    content.split_inclusive('\n').map(move |raw| {
        let start = offset;
        offset += raw.len();
        Line {
            start,
            end: offset,
            text: raw.trim(),
        }
    })
}

/// Byte range of the managed section's body (between the marker lines).
fn managed_body(content: &str) -> Option<Range<usize>> {
    let mut body_start = None;
    for line in lines(content) {
        match body_start {
            None if line.text == MANAGED_START => body_start = Some(line.end),
            Some(start) if line.text == MANAGED_END => return Some(start..line.start),
            _ => {}
        }
    }
    None
}

/// Byte range of a skill block, marker lines included.
fn skill_block(content: &str, skill: &str) -> Option<Range<usize>> {
    let body = managed_body(content)?;
    let start_marker = skill_start_marker(skill);
    let end_marker = skill_end_marker(skill);

    let mut block_start = None;
    for line in lines(&content[body.clone()]) {
        match block_start {
            None if line.text == start_marker => block_start = Some(line.start),
            Some(start) if line.text == end_marker => {
                return Some(body.start + start..body.start + line.end)
            }
            _ => {}
        }
    }
    None
}

/// True iff both managed-section markers are present, start before end.
pub fn has_managed_section(content: &str) -> bool {
    managed_body(content).is_some()
}

/// Append an empty managed section unless one is already present.
pub fn add_managed_section(content: &str) -> String {
    if has_managed_section(content) {
        return content.to_string();
    }

    let mut out = String::with_capacity(content.len() + MANAGED_START.len() + MANAGED_END.len() + 4);
    out.push_str(content);
    if !content.is_empty() {
        if !content.ends_with('\n') {
            out.push('\n');
        }
        out.push('\n');
    }
    out.push_str(MANAGED_START);
    out.push('\n');
    out.push_str(MANAGED_END);
    out.push('\n');
    out
}

/// True iff a complete block tagged `skill` exists inside the managed section.
pub fn has_skill_injection(content: &str, skill: &str) -> bool {
    skill_block(content, skill).is_some()
}

/// Insert a new block for `skill` just before the managed-section end marker.
///
/// Fails with [`InjectionError::AlreadyInjected`] if the skill already has a
/// block. The managed section is created first when absent.
pub fn add_skill_injection(
    content: &str,
    skill: &SkillName,
    block: &str,
) -> Result<String, InjectionError> {
    if has_skill_injection(content, skill.as_str()) {
        return Err(InjectionError::AlreadyInjected {
            skill: skill.to_string(),
        });
    }

    let content = add_managed_section(content);
    let body = managed_body(&content).ok_or_else(|| InjectionError::Malformed {
        message: "end marker not found after creating the section".to_string(),
    })?;

    let rendered = render_block(skill.as_str(), block);
    let insert_at = body.end;

    let mut out = String::with_capacity(content.len() + rendered.len());
    out.push_str(&content[..insert_at]);
    out.push_str(&rendered);
    out.push_str(&content[insert_at..]);
    Ok(out)
}

/// Remove the block for `skill`. No-op when absent; the section markers stay.
pub fn remove_skill_injection(content: &str, skill: &str) -> String {
    match skill_block(content, skill) {
        Some(range) => {
            let mut out = String::with_capacity(content.len() - range.len());
            out.push_str(&content[..range.start]);
            out.push_str(&content[range.end..]);
            out
        }
        None => content.to_string(),
    }
}

/// Remove-then-add; succeeds whether or not a block existed.
pub fn replace_skill_injection(
    content: &str,
    skill: &SkillName,
    block: &str,
) -> Result<String, InjectionError> {
    let without = remove_skill_injection(content, skill.as_str());
    add_skill_injection(&without, skill, block)
}

/// Names of all complete skill blocks in the managed section, in document order.
pub fn list_injected_skills(content: &str) -> Vec<String> {
    let Some(body) = managed_body(content) else {
        return Vec::new();
    };

    let mut found = Vec::new();
    let mut open: Option<&str> = None;
    for line in lines(&content[body]) {
        let Some(rest) = line.text.strip_prefix(SKILL_MARKER_PREFIX) else {
            continue;
        };
        match open {
            None => {
                if let Some(name) = rest.strip_suffix(SKILL_START_SUFFIX) {
                    open = Some(name);
                }
            }
            Some(name) => {
                if rest.strip_suffix(SKILL_END_SUFFIX) == Some(name) {
                    found.push(name.to_string());
                    open = None;
                }
            }
        }
    }
    found
}

/// Escape block lines that would read as Grimoire markers, so block content
/// can never end the section or its block early.
fn escape_marker_lines(block: &str) -> String {
    block
        .split_inclusive('\n')
        .map(|line| {
            if line.trim_start().starts_with(MARKER_PREFIX) {
                line.replacen("<!--", "&lt;!--", 1)
            } else {
                line.to_string()
            }
        })
        .collect()
}

fn render_block(skill: &str, block: &str) -> String {
    let block = escape_marker_lines(block.trim_end_matches(['\n', '\r']));
    let mut out = String::with_capacity(block.len() + 2 * (SKILL_MARKER_PREFIX.len() + skill.len() + 12));
    out.push_str(&skill_start_marker(skill));
    out.push('\n');
    if !block.is_empty() {
        out.push_str(&block);
        out.push('\n');
    }
    out.push_str(&skill_end_marker(skill));
    out.push('\n');
    out
}

async fn read_file(path: &Path) -> Result<String, InjectionError> {
    fs_util::read_or_empty(path)
        .await
        .map_err(|source| InjectionError::Io {
            path: path.to_path_buf(),
            source,
        })
}

async fn write_file(path: &Path, content: &str) -> Result<(), InjectionError> {
    fs_util::write_atomic(path, content.as_bytes())
        .await
        .map_err(|source| InjectionError::Io {
            path: path.to_path_buf(),
            source,
        })
}

/// Add a skill block to an instruction file, creating the file if needed.
pub async fn inject_into_file(
    path: &Path,
    skill: &SkillName,
    block: &str,
) -> Result<(), InjectionError> {
    let content = read_file(path).await?;
    let updated = add_skill_injection(&content, skill, block)?;
    write_file(path, &updated).await
}

/// Replace (or add) a skill block in an instruction file.
pub async fn replace_in_file(
    path: &Path,
    skill: &SkillName,
    block: &str,
) -> Result<(), InjectionError> {
    let content = read_file(path).await?;
    let updated = replace_skill_injection(&content, skill, block)?;
    if updated != content {
        write_file(path, &updated).await?;
    }
    Ok(())
}

/// Remove a skill block from an instruction file. Returns whether it changed.
///
/// A missing file is left missing.
pub async fn remove_from_file(path: &Path, skill: &str) -> Result<bool, InjectionError> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(source) => {
            return Err(InjectionError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    let updated = remove_skill_injection(&content, skill);
    if updated == content {
        return Ok(false);
    }
    write_file(path, &updated).await?;
    Ok(true)
}

/// Skills injected into an instruction file; empty when the file is missing.
pub async fn list_file_injections(path: &Path) -> Result<Vec<String>, InjectionError> {
    let content = read_file(path).await?;
    Ok(list_injected_skills(&content))
}
