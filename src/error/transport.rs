//! Transport errors

use super::LauncherError;

/// Creates a host unreachable error
pub fn unreachable(host: impl Into<String>, reason: impl Into<String>) -> LauncherError {
    LauncherError::HostUnreachable {
        host: host.into(),
        reason: reason.into(),
    }
}

/// Creates an authentication failed error
pub fn auth_failed(
    host: impl Into<String>,
    user: impl Into<String>,
    reason: impl Into<String>,
) -> LauncherError {
    LauncherError::AuthenticationFailed {
        host: host.into(),
        user: user.into(),
        reason: reason.into(),
    }
}

/// Creates a remote not found error
pub fn remote_not_found(location: impl Into<String>) -> LauncherError {
    LauncherError::RemoteNotFound {
        location: location.into(),
    }
}

/// Creates a transfer failed error
pub fn transfer_failed(location: impl Into<String>, reason: impl Into<String>) -> LauncherError {
    LauncherError::TransferFailed {
        location: location.into(),
        reason: reason.into(),
    }
}

/// Creates a remote metadata unavailable error
pub fn remote_metadata_unavailable(location: impl Into<String>) -> LauncherError {
    LauncherError::RemoteMetadataUnavailable {
        location: location.into(),
    }
}
