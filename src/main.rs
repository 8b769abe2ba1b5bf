//! appcontainer - self-updating application launcher
//!
//! Keeps an application's resources in sync with a remote server, then loads
//! and starts the application.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use clap::Parser;
use miette::Diagnostic;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
mod commands;

use appcontainer::context::{self, LOG_FILE};
use appcontainer::error::{LauncherError, Result};
use cli::{Cli, Commands};
use commands::{EXIT_FAILED, EXIT_SUCCESS};

/// Terminal filter: `--debug` > `-v` > `RUST_LOG` > warn
fn terminal_filter(verbose: bool, debug: bool) -> EnvFilter {
    if debug {
        EnvFilter::new("debug,ureq=info,rustls=warn")
    } else if verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    }
}

/// Log to stderr and, when a base directory is known, to its log file
fn init_logging(verbose: bool, debug: bool, base: Option<&Path>) {
    let terminal_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(terminal_filter(verbose, debug));

    let log_file = base.and_then(|base| {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(base.join(LOG_FILE))
            .ok()
    });

    if let Some(file) = log_file {
        // File layer: independent filter, ANSI disabled
        let file_layer = fmt::layer()
            .with_target(false)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .with_filter(EnvFilter::new(if debug { "debug" } else { "info" }));

        tracing_subscriber::registry()
            .with(terminal_layer)
            .with(file_layer)
            .init();
    } else {
        tracing_subscriber::registry().with(terminal_layer).init();
    }
}

/// Resolve the base directory and start logging into it
fn open_base(home: Option<PathBuf>, verbose: bool, debug: bool) -> Result<PathBuf> {
    let base = context::resolve_base_dir(home)?;
    fs::create_dir_all(&base).map_err(|e| appcontainer::error::file_write_failed(&base, e))?;
    // Paths handed to the launched application must be absolute
    let base =
        dunce::canonicalize(&base).map_err(|e| appcontainer::error::file_read_failed(&base, e))?;
    init_logging(verbose, debug, Some(&base));
    tracing::debug!(base = %base.display(), "Resolved base directory");
    Ok(base)
}

fn report(error: &LauncherError) {
    tracing::error!(class = %error.class(), "{error}");
    eprintln!("Error: {error}");
    if let Some(help) = error.help() {
        eprintln!("  help: {help}");
    }
}

fn main() {
    let Cli {
        home,
        verbose,
        debug,
        command,
    } = Cli::parse();

    let result = match command {
        Commands::Run(args) => {
            open_base(home, verbose, debug).and_then(|base| commands::run::run(&base, args))
        }
        Commands::Check(args) => open_base(home, verbose, debug)
            .and_then(|base| commands::check::run(&base, &args))
            .map(|()| EXIT_SUCCESS),
        Commands::Paths => open_base(home, verbose, debug)
            .and_then(|base| commands::paths::run(&base))
            .map(|()| EXIT_SUCCESS),
        Commands::Version => commands::version::run().map(|()| EXIT_SUCCESS),
        Commands::Completions(args) => commands::completions::run(&args).map(|()| EXIT_SUCCESS),
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            report(&e);
            std::process::exit(EXIT_FAILED);
        }
    }
}
