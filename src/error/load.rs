//! Application loading errors

use super::LauncherError;

/// Creates an artifact missing error
pub fn artifact_missing(dir: impl Into<String>, extension: impl Into<String>) -> LauncherError {
    LauncherError::ArtifactMissing {
        dir: dir.into(),
        extension: extension.into(),
    }
}

/// Creates an artifact ambiguous error
pub fn artifact_ambiguous(dir: impl Into<String>, candidates: &[String]) -> LauncherError {
    LauncherError::ArtifactAmbiguous {
        dir: dir.into(),
        candidates: candidates.join(", "),
    }
}

/// Creates an entry point missing error
pub fn entry_point_missing(
    artifact: impl Into<String>,
    attribute: impl Into<String>,
) -> LauncherError {
    LauncherError::EntryPointMissing {
        artifact: artifact.into(),
        attribute: attribute.into(),
    }
}

/// Creates an unknown entry point error
pub fn unknown_entry_point(id: impl Into<String>) -> LauncherError {
    LauncherError::UnknownEntryPoint { id: id.into() }
}

/// Creates an instantiation failed error
pub fn instantiation_failed(id: impl Into<String>, reason: impl Into<String>) -> LauncherError {
    LauncherError::InstantiationFailed {
        id: id.into(),
        reason: reason.into(),
    }
}

/// Creates a lifecycle failed error
pub fn lifecycle_failed(phase: impl Into<String>, reason: impl Into<String>) -> LauncherError {
    LauncherError::LifecycleFailed {
        phase: phase.into(),
        reason: reason.into(),
    }
}
