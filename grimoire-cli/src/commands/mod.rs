//! Command handlers. Each returns the process exit code.

pub mod doctor;
pub mod init;
pub mod skills;
