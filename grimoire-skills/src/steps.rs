//! Step log for enable operations and the rollback plan derived from it.
//!
//! Every side effect of an enable is recorded in a [`StepLog`] as soon as it
//! has happened. The log is a value: each step returns a new log, and the
//! rollback plan is computed from it without touching anything.

use std::path::PathBuf;

use crate::error::SkillError;

/// One completed side effect of an enable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnableStep {
    /// A CLI tool was installed. Never undone.
    CliInstalled { tool: String },
    /// An agent plugin was installed. Never undone.
    PluginInstalled { plugin: String },
    /// An MCP server entry was added to this config file.
    McpConfigured { config: PathBuf },
    /// The skill artifact was written here.
    SkillFileCopied { path: PathBuf },
    /// A block was injected into this instruction file.
    Injected { file: PathBuf },
    /// The skill was added to the project's enabled set.
    StateUpdated,
}

/// Undo action for a recorded step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RollbackAction {
    RemoveFromState,
    RemoveInjection,
    RemoveSkillFile { path: PathBuf },
    UnregisterMcp,
}

/// Ordered record of completed enable steps.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepLog {
    steps: Vec<EnableStep>,
}

impl StepLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a log with `step` appended.
    #[must_use]
    pub fn record(mut self, step: EnableStep) -> Self {
        self.steps.push(step);
        self
    }

    pub fn steps(&self) -> &[EnableStep] {
        &self.steps
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn contains(&self, predicate: impl Fn(&EnableStep) -> bool) -> bool {
        self.steps.iter().any(predicate)
    }

    /// Undo actions in reverse order of recording. Tool and plugin installs
    /// have no undo.
    pub fn rollback_plan(&self) -> Vec<RollbackAction> {
        self.steps
            .iter()
            .rev()
            .filter_map(|step| match step {
                EnableStep::StateUpdated => Some(RollbackAction::RemoveFromState),
                EnableStep::Injected { .. } => Some(RollbackAction::RemoveInjection),
                EnableStep::SkillFileCopied { path } => {
                    Some(RollbackAction::RemoveSkillFile { path: path.clone() })
                }
                EnableStep::McpConfigured { .. } => Some(RollbackAction::UnregisterMcp),
                EnableStep::CliInstalled { .. } | EnableStep::PluginInstalled { .. } => None,
            })
            .collect()
    }
}

/// An adapter step failed; `log` holds what completed before it.
#[derive(Debug)]
pub struct StepFailure {
    pub log: StepLog,
    pub error: SkillError,
}

impl StepFailure {
    pub fn new(log: StepLog, error: impl Into<SkillError>) -> Self {
        Self {
            log,
            error: error.into(),
        }
    }
}
