//! Process exit codes.

/// Command completed successfully.
pub const EXIT_SUCCESS: i32 = 0;

/// Command failed, or at least one skill in a batch failed.
pub const EXIT_ERROR: i32 = 1;

/// Command completed but reported warnings.
pub const EXIT_WARNING: i32 = 2;
