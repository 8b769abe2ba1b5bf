//! appcontainer - self-updating application launcher
//!
//! A run pings the hosting server, reconciles the installed resource versions
//! with the server's metadata file, purges, downloads and extracts whatever is
//! stale, and finally loads and starts the application.
//!
//! The core is presentation-agnostic: progress and questions go through the
//! [`orchestrator::PipelineObserver`] and [`orchestrator::DecisionMaker`]
//! traits, with terminal implementations in [`ui`].

pub mod config;
pub mod context;
pub mod error;
pub mod loader;
pub mod manifest;
pub mod orchestrator;
pub mod reconcile;
pub mod sync;
pub mod transport;
pub mod ui;

#[cfg(test)]
mod test_fixtures;

pub use error::{LauncherError, Result};
