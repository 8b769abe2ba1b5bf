//! Error types and handling for appcontainer
//!
//! Uses `thiserror` for error definitions and `miette` for pretty diagnostics.
//!
//! This module is organized into sub-modules by error domain:
//! - [`transport`]: host reachability, authentication and transfer errors
//! - [`metadata`]: unreadable metadata (never fatal, see [`crate::manifest`])
//! - [`sync`]: purge/download/extract errors
//! - [`load`]: artifact and entry point errors
//! - [`config`]: settings errors
//! - [`fs`]: file system errors

#![allow(dead_code, unused_assignments)]

pub mod config;
pub mod fs;
pub mod load;
pub mod metadata;
pub mod sync;
pub mod transport;

#[allow(unused_imports)]
pub use config::{
    invalid as config_invalid, parse_failed as config_parse_failed,
    read_failed as config_read_failed,
};
#[allow(unused_imports)]
pub use fs::{io_error, read_failed as file_read_failed, write_failed as file_write_failed};
#[allow(unused_imports)]
pub use load::{
    artifact_ambiguous, artifact_missing, entry_point_missing, instantiation_failed,
    lifecycle_failed, unknown_entry_point,
};
#[allow(unused_imports)]
pub use metadata::unreadable as metadata_unreadable;
#[allow(unused_imports)]
pub use sync::{extract_failed, install_failed, purge_failed, unsafe_archive_entry};
#[allow(unused_imports)]
pub use transport::{
    auth_failed, remote_metadata_unavailable, remote_not_found, transfer_failed, unreachable,
};

use miette::Diagnostic;
use thiserror::Error;

/// Error taxonomy used for failure routing and reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorClass {
    Transport,
    Metadata,
    Sync,
    Load,
    Config,
    Pipeline,
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorClass::Transport => "transport",
            ErrorClass::Metadata => "metadata",
            ErrorClass::Sync => "sync",
            ErrorClass::Load => "load",
            ErrorClass::Config => "config",
            ErrorClass::Pipeline => "pipeline",
        };
        f.write_str(name)
    }
}

/// Main error type for appcontainer operations
#[derive(Error, Diagnostic, Debug)]
pub enum LauncherError {
    // Transport errors
    #[error("Host '{host}' is not reachable: {reason}")]
    #[diagnostic(
        code(appcontainer::transport::unreachable),
        help("Check the network connection and the hosting settings")
    )]
    HostUnreachable { host: String, reason: String },

    #[error("Authentication failed for '{user}@{host}': {reason}")]
    #[diagnostic(
        code(appcontainer::transport::auth_failed),
        help("Check the SFTP username and password in the settings file")
    )]
    AuthenticationFailed {
        host: String,
        user: String,
        reason: String,
    },

    #[error("Remote file not found: {location}")]
    #[diagnostic(code(appcontainer::transport::not_found))]
    RemoteNotFound { location: String },

    #[error("Failed to transfer '{location}': {reason}")]
    #[diagnostic(code(appcontainer::transport::transfer_failed))]
    TransferFailed { location: String, reason: String },

    #[error("Remote metadata is unavailable: {location}")]
    #[diagnostic(
        code(appcontainer::transport::metadata_unavailable),
        help("No local installation exists yet, so the remote metadata is required")
    )]
    RemoteMetadataUnavailable { location: String },

    // Metadata errors
    #[error("Failed to read metadata from '{path}': {reason}")]
    #[diagnostic(code(appcontainer::metadata::unreadable))]
    MetadataUnreadable { path: String, reason: String },

    // Sync errors
    #[error("Failed to delete '{path}': {reason}")]
    #[diagnostic(code(appcontainer::sync::purge_failed))]
    PurgeFailed { path: String, reason: String },

    #[error("Failed to extract archive '{archive}': {reason}")]
    #[diagnostic(code(appcontainer::sync::extract_failed))]
    ExtractFailed { archive: String, reason: String },

    #[error("Archive '{archive}' contains an entry outside the destination: {entry}")]
    #[diagnostic(
        code(appcontainer::sync::unsafe_entry),
        help("The archive on the server is malformed or has been tampered with")
    )]
    UnsafeArchiveEntry { archive: String, entry: String },

    #[error("Failed to install '{path}': {reason}")]
    #[diagnostic(code(appcontainer::sync::install_failed))]
    InstallFailed { path: String, reason: String },

    // Load errors
    #[error("Cannot find application artifact (*.{extension}) in '{dir}'")]
    #[diagnostic(
        code(appcontainer::load::artifact_missing),
        help("Run the launcher with network access so the application can be installed")
    )]
    ArtifactMissing { dir: String, extension: String },

    #[error("Multiple application artifacts found in '{dir}': {candidates}")]
    #[diagnostic(code(appcontainer::load::artifact_ambiguous))]
    ArtifactAmbiguous { dir: String, candidates: String },

    #[error("Artifact '{artifact}' does not declare '{attribute}'")]
    #[diagnostic(code(appcontainer::load::entry_point_missing))]
    EntryPointMissing { artifact: String, attribute: String },

    #[error("Unknown entry point '{id}'")]
    #[diagnostic(
        code(appcontainer::load::unknown_entry_point),
        help("Register a factory for this identifier in the entry point registry")
    )]
    UnknownEntryPoint { id: String },

    #[error("Failed to instantiate entry point '{id}': {reason}")]
    #[diagnostic(code(appcontainer::load::instantiation_failed))]
    InstantiationFailed { id: String, reason: String },

    #[error("Application {phase} failed: {reason}")]
    #[diagnostic(code(appcontainer::load::lifecycle_failed))]
    LifecycleFailed { phase: String, reason: String },

    // Configuration errors
    #[error("Failed to parse settings file: {path}")]
    #[diagnostic(code(appcontainer::config::parse_failed))]
    ConfigParseFailed { path: String, reason: String },

    #[error("Failed to read settings file: {path}")]
    #[diagnostic(code(appcontainer::config::read_failed))]
    ConfigReadFailed { path: String, reason: String },

    #[error("Invalid settings: {message}")]
    #[diagnostic(code(appcontainer::config::invalid))]
    ConfigInvalid { message: String },

    // File system errors
    #[error("Failed to read file: {path}")]
    #[diagnostic(code(appcontainer::fs::read_failed))]
    FileReadFailed { path: String, reason: String },

    #[error("Failed to write file: {path}")]
    #[diagnostic(code(appcontainer::fs::write_failed))]
    FileWriteFailed { path: String, reason: String },

    #[error("IO error: {message}")]
    #[diagnostic(code(appcontainer::fs::io_error))]
    IoError { message: String },

    // Pipeline errors
    #[error("An update run is already in progress")]
    #[diagnostic(
        code(appcontainer::pipeline::run_in_progress),
        help("Wait for the current run to finish before starting another one")
    )]
    RunInProgress,

    #[error("Pipeline worker stopped unexpectedly: {message}")]
    #[diagnostic(code(appcontainer::pipeline::worker_failed))]
    WorkerFailed { message: String },

    #[error("Cannot {decision} while the pipeline is {stage}")]
    #[diagnostic(code(appcontainer::pipeline::unexpected_decision))]
    UnexpectedDecision { decision: String, stage: String },
}

impl LauncherError {
    /// Returns the taxonomy class of this error
    pub fn class(&self) -> ErrorClass {
        match self {
            LauncherError::HostUnreachable { .. }
            | LauncherError::AuthenticationFailed { .. }
            | LauncherError::RemoteNotFound { .. }
            | LauncherError::TransferFailed { .. }
            | LauncherError::RemoteMetadataUnavailable { .. } => ErrorClass::Transport,
            LauncherError::MetadataUnreadable { .. } => ErrorClass::Metadata,
            LauncherError::PurgeFailed { .. }
            | LauncherError::ExtractFailed { .. }
            | LauncherError::UnsafeArchiveEntry { .. }
            | LauncherError::InstallFailed { .. }
            | LauncherError::FileReadFailed { .. }
            | LauncherError::FileWriteFailed { .. }
            | LauncherError::IoError { .. } => ErrorClass::Sync,
            LauncherError::ArtifactMissing { .. }
            | LauncherError::ArtifactAmbiguous { .. }
            | LauncherError::EntryPointMissing { .. }
            | LauncherError::UnknownEntryPoint { .. }
            | LauncherError::InstantiationFailed { .. }
            | LauncherError::LifecycleFailed { .. } => ErrorClass::Load,
            LauncherError::ConfigParseFailed { .. }
            | LauncherError::ConfigReadFailed { .. }
            | LauncherError::ConfigInvalid { .. } => ErrorClass::Config,
            LauncherError::RunInProgress
            | LauncherError::WorkerFailed { .. }
            | LauncherError::UnexpectedDecision { .. } => ErrorClass::Pipeline,
        }
    }
}

impl From<std::io::Error> for LauncherError {
    fn from(err: std::io::Error) -> Self {
        LauncherError::IoError {
            message: err.to_string(),
        }
    }
}

impl From<serde_yaml::Error> for LauncherError {
    fn from(err: serde_yaml::Error) -> Self {
        LauncherError::ConfigParseFailed {
            path: "unknown".to_string(),
            reason: err.to_string(),
        }
    }
}

impl From<walkdir::Error> for LauncherError {
    fn from(err: walkdir::Error) -> Self {
        LauncherError::PurgeFailed {
            path: err
                .path()
                .map_or_else(|| "unknown".to_string(), |p| p.display().to_string()),
            reason: err.to_string(),
        }
    }
}

/// Result type alias using miette for error handling
pub type Result<T> = miette::Result<T, LauncherError>;
