//! File system errors

use std::path::Path;

use super::LauncherError;

/// Creates a file read failed error
pub fn read_failed(path: &Path, reason: impl ToString) -> LauncherError {
    LauncherError::FileReadFailed {
        path: path.display().to_string(),
        reason: reason.to_string(),
    }
}

/// Creates a file write failed error
pub fn write_failed(path: &Path, reason: impl ToString) -> LauncherError {
    LauncherError::FileWriteFailed {
        path: path.display().to_string(),
        reason: reason.to_string(),
    }
}

/// Creates an IO error
pub fn io_error(message: impl Into<String>) -> LauncherError {
    LauncherError::IoError {
        message: message.into(),
    }
}
