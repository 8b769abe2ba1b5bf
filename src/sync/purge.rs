//! Purge stage: delete stale resource files before the update lands

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::{StageProgress, fraction, resource_target};
use crate::config::ResourceDescriptor;
use crate::context::RuntimeContext;
use crate::error::Result;

/// Delete the files of every stale resource plus the installed metadata file
///
/// Paths in `keep` are left alone. Returns the number of top-level targets processed.
pub fn purge(
    ctx: &RuntimeContext,
    stale: &[ResourceDescriptor],
    keep: &[PathBuf],
    progress: &mut dyn StageProgress,
) -> Result<usize> {
    let mut targets = Vec::new();
    for resource in stale {
        for file in resource.files() {
            targets.push(resource_target(ctx, file)?);
        }
    }
    targets.push(
        ctx.find_installed_manifest()
            .unwrap_or_else(|| ctx.installed_manifest()),
    );

    let total = targets.len();
    for (i, target) in targets.iter().enumerate() {
        let name = target
            .strip_prefix(&ctx.app_dir)
            .unwrap_or(target)
            .display()
            .to_string();
        progress.message(&format!("Deleting {name}"));
        delete_recursive(target, keep, &mut |deleted| {
            tracing::debug!(path = %deleted.display(), "Deleted");
        })?;
        progress.progress(fraction(i + 1, total));
    }

    tracing::info!(targets = total, "Purged stale resources");
    Ok(total)
}

/// Delete `path` and everything below it, except paths listed in `keep`
///
/// `keep` matches exact paths. A directory that still has content because
/// something inside it was kept is left in place without error. A missing
/// `path` is not an error.
pub fn delete_recursive(
    path: &Path,
    keep: &[PathBuf],
    on_delete: &mut dyn FnMut(&Path),
) -> Result<()> {
    let Ok(metadata) = fs::symlink_metadata(path) else {
        return Ok(());
    };

    if !metadata.is_dir() {
        if !is_kept(path, keep) {
            remove(path, false)?;
            on_delete(path);
        }
        return Ok(());
    }

    for entry in WalkDir::new(path).contents_first(true) {
        let entry = entry?;
        let entry_path = entry.path();
        if is_kept(entry_path, keep) {
            continue;
        }
        let is_dir = entry.file_type().is_dir();
        if remove(entry_path, is_dir)? {
            on_delete(entry_path);
        }
    }
    Ok(())
}

fn is_kept(path: &Path, keep: &[PathBuf]) -> bool {
    keep.iter().any(|k| k == path)
}

/// Returns whether something was removed
fn remove(path: &Path, is_dir: bool) -> Result<bool> {
    let result = if is_dir {
        fs::remove_dir(path)
    } else {
        fs::remove_file(path)
    };

    match result {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) if is_dir && e.kind() == io::ErrorKind::DirectoryNotEmpty => {
            tracing::debug!(path = %path.display(), "Directory not empty, leaving it");
            Ok(false)
        }
        Err(e) => Err(crate::error::purge_failed(
            path.display().to_string(),
            e.to_string(),
        )),
    }
}
