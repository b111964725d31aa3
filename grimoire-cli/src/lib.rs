//! Grimoire CLI library
//!
//! Command definitions and handlers for the `grimoire` binary. Handlers take
//! a [`CliContext`] and the project directory so they can run against any
//! Grimoire home.

pub mod cli;
pub mod commands;
pub mod context;
pub mod error;
pub mod exit_codes;
pub mod table;

pub use cli::{Cli, Commands, SkillsCommand};
pub use context::CliContext;
pub use error::{CliError, CliResult};
