//! CLI definitions using clap derive API
//!
//! This module is organized into submodules for each command's argument types:
//! - run: Run command arguments
//! - check: Check command arguments
//! - completions: Completions command arguments

use clap::builder::{Styles, styling::AnsiColor};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod check;
pub mod completions;
pub mod run;

pub use check::CheckArgs;
pub use completions::CompletionsArgs;
pub use run::RunArgs;

/// appcontainer - self-updating application launcher
///
/// Keep an application's resources in sync with a remote server, then start it.
#[derive(Parser, Debug)]
#[command(
    name = "appcontainer",
    author,
    version,
    color = clap::ColorChoice::Always,
    styles = Styles::styled()
        .header(AnsiColor::Green.on_default().bold())
        .usage(AnsiColor::Green.on_default().bold())
        .literal(AnsiColor::Cyan.on_default().bold())
        .placeholder(AnsiColor::Cyan.on_default()),
    about = "Self-updating application launcher",
    long_about = "appcontainer pings the hosting server, compares the installed resource versions \
                  with the server's MANIFEST.MF, downloads and extracts what changed, and then \
                  loads and starts the application.",
    after_help = "\x1b[1m\x1b[32mExamples:\x1b[0m\n   \
                  appcontainer run                      \x1b[90m# Update if needed, then start\x1b[0m\n   \
                  appcontainer run --yes -- --safe-mode \x1b[90m# Unattended, with app parameters\x1b[0m\n   \
                  appcontainer check --json             \x1b[90m# Report the update plan only\x1b[0m\n   \
                  appcontainer paths                    \x1b[90m# Show runtime directories\x1b[0m\n\n\
                  "
)]
pub struct Cli {
    /// Base directory (`APPCONTAINER_HOME` takes precedence)
    #[arg(long, global = true)]
    pub home: Option<PathBuf>,

    /// Enable verbose output
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Update the application if needed, then start it
    Run(RunArgs),

    /// Check for updates without changing anything
    Check(CheckArgs),

    /// Show the runtime directories and files
    Paths,

    /// Show version information
    #[command(hide = true)]
    Version,

    /// Generate shell completions
    Completions(CompletionsArgs),
}
