//! Command implementations for the appcontainer CLI

pub mod check;
pub mod completions;
pub mod helpers;
pub mod paths;
pub mod run;
pub mod version;

/// The application was started (or the command succeeded)
pub const EXIT_SUCCESS: i32 = 0;

/// The run failed and nothing was started
pub const EXIT_FAILED: i32 = 1;

/// The user closed the launcher
pub const EXIT_CLOSED: i32 = 2;
