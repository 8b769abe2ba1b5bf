//! Metadata errors

use super::LauncherError;

/// Creates a metadata unreadable error
pub fn unreadable(path: impl Into<String>, reason: impl Into<String>) -> LauncherError {
    LauncherError::MetadataUnreadable {
        path: path.into(),
        reason: reason.into(),
    }
}
