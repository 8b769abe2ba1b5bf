//! Resource sync errors

use super::LauncherError;

/// Creates a purge failed error
pub fn purge_failed(path: impl Into<String>, reason: impl Into<String>) -> LauncherError {
    LauncherError::PurgeFailed {
        path: path.into(),
        reason: reason.into(),
    }
}

/// Creates an extract failed error
pub fn extract_failed(archive: impl Into<String>, reason: impl Into<String>) -> LauncherError {
    LauncherError::ExtractFailed {
        archive: archive.into(),
        reason: reason.into(),
    }
}

/// Creates an unsafe archive entry error
pub fn unsafe_archive_entry(archive: impl Into<String>, entry: impl Into<String>) -> LauncherError {
    LauncherError::UnsafeArchiveEntry {
        archive: archive.into(),
        entry: entry.into(),
    }
}

/// Creates an install failed error
pub fn install_failed(path: impl Into<String>, reason: impl Into<String>) -> LauncherError {
    LauncherError::InstallFailed {
        path: path.into(),
        reason: reason.into(),
    }
}
