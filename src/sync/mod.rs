//! File sync engine
//!
//! Three ordered stages, each retryable by re-running the whole pipeline:
//! 1. [`purge`]: delete the stale resources' files and the installed metadata
//! 2. [`download`]: stage stale resources (and the remote metadata) in the temp directory
//! 3. [`extract`]: unpack or copy staged resources into the application directory,
//!    installing the metadata file last
//!
//! Stages report a fraction over the items they process plus a message naming
//! the current item.

pub mod download;
pub mod extract;
pub mod purge;

use std::path::{Component, Path, PathBuf};

use crate::config::ResourceDescriptor;
use crate::context::RuntimeContext;
use crate::error::Result;

/// Progress receiver for one sync stage
pub trait StageProgress {
    /// Fraction of the stage completed, 0.0..=1.0
    fn progress(&mut self, fraction: f64);

    /// Human-readable description of the current item
    fn message(&mut self, text: &str);
}

/// Stage progress receiver that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoStageProgress;

impl StageProgress for NoStageProgress {
    fn progress(&mut self, _fraction: f64) {}
    fn message(&mut self, _text: &str) {}
}

/// Where a resource is staged before extraction
pub fn staged_path(ctx: &RuntimeContext, resource: &ResourceDescriptor) -> PathBuf {
    ctx.temp_dir.join(resource.display_name())
}

/// Join a relative path onto `base`, refusing anything that would leave it
pub(crate) fn confined_join(base: &Path, relative: &Path) -> Option<PathBuf> {
    let mut joined = base.to_path_buf();
    let mut depth = 0usize;
    for component in relative.components() {
        match component {
            Component::Normal(part) => {
                joined.push(part);
                depth += 1;
            }
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    (depth > 0).then_some(joined)
}

/// Whether an archive entry names the archive root itself (`./`, `.`)
pub(crate) fn is_root_entry(relative: &Path) -> bool {
    relative
        .components()
        .all(|c| matches!(c, Component::CurDir))
}

/// Whether any component of a relative path is hidden (starts with a dot)
pub(crate) fn is_hidden(relative: &Path) -> bool {
    relative.components().any(|c| match c {
        Component::Normal(part) => part.to_string_lossy().starts_with('.'),
        _ => false,
    })
}

/// Ratio helper for item-count progress
#[allow(clippy::cast_precision_loss)]
pub(crate) fn fraction(done: usize, total: usize) -> f64 {
    if total == 0 {
        1.0
    } else {
        (done as f64 / total as f64).clamp(0.0, 1.0)
    }
}

/// Fail early when a stage is asked to act on files outside the application directory
pub(crate) fn resource_target(ctx: &RuntimeContext, file: &str) -> Result<PathBuf> {
    confined_join(&ctx.app_dir, Path::new(file)).ok_or_else(|| {
        crate::error::purge_failed(file, "path is outside the application directory")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confined_join() {
        let base = Path::new("/app");
        assert_eq!(
            confined_join(base, Path::new("libs/a.so")),
            Some(PathBuf::from("/app/libs/a.so"))
        );
        assert_eq!(
            confined_join(base, Path::new("./x")),
            Some(PathBuf::from("/app/x"))
        );
        assert_eq!(confined_join(base, Path::new("../etc/passwd")), None);
        assert_eq!(confined_join(base, Path::new("/etc/passwd")), None);
        assert_eq!(confined_join(base, Path::new(".")), None);
    }

    #[test]
    fn test_is_root_entry() {
        assert!(is_root_entry(Path::new("./")));
        assert!(is_root_entry(Path::new(".")));
        assert!(is_root_entry(Path::new("")));
        assert!(!is_root_entry(Path::new("./libs")));
        assert!(!is_root_entry(Path::new("/")));
        assert!(!is_root_entry(Path::new("..")));
    }

    #[test]
    fn test_is_hidden() {
        assert!(is_hidden(Path::new(".DS_Store")));
        assert!(is_hidden(Path::new("libs/.cache/x")));
        assert!(!is_hidden(Path::new("libs/a.so")));
    }

    #[test]
    fn test_fraction() {
        assert!((fraction(1, 4) - 0.25).abs() < f64::EPSILON);
        assert!((fraction(0, 0) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_staged_path_uses_display_name() {
        let ctx = RuntimeContext::new("/base", "App");
        let resource = ResourceDescriptor::new(
            "http://host/files/libs.zip?v=2",
            "Lib-Version",
            vec!["libs".to_string()],
        );
        assert_eq!(
            staged_path(&ctx, &resource),
            PathBuf::from("/base/tempdir/libs.zip")
        );
    }
}
