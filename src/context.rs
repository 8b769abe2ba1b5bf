//! Runtime paths for one launcher process
//!
//! Everything the launcher touches on disk hangs off a single base directory:
//!
//! ```text
//! <base>/
//! ├── appcontainer.yaml   settings
//! ├── appcontainer.log    log file
//! ├── <app name>.cfg      launch configuration handed to the application
//! ├── appdir/             installed application resources + MANIFEST.MF
//! └── tempdir/            staging area for downloads
//! ```
//!
//! The base defaults to the platform's local data directory and can be
//! overridden with the `APPCONTAINER_HOME` environment variable.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{LauncherError, Result};

/// Default base directory name under the user's local data directory
const BASE_DIR: &str = "appcontainer";

/// Settings file name
pub const SETTINGS_FILE: &str = "appcontainer.yaml";

/// Log file name
pub const LOG_FILE: &str = "appcontainer.log";

/// Application directory name
pub const APP_DIR: &str = "appdir";

/// Staging directory name
pub const TEMP_DIR: &str = "tempdir";

/// File name of the metadata file, both staged and installed
pub const MANIFEST_FILE: &str = "MANIFEST.MF";

/// Environment variable overriding the base directory
pub const HOME_ENV: &str = "APPCONTAINER_HOME";

/// Resolve the base directory: `APPCONTAINER_HOME`, then `explicit`, then the default
pub fn resolve_base_dir(explicit: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(home) = std::env::var_os(HOME_ENV).filter(|h| !h.is_empty()) {
        return Ok(PathBuf::from(home));
    }
    match explicit {
        Some(dir) => Ok(dir),
        None => default_base_dir(),
    }
}

/// Base directory under the platform's local data directory
pub fn default_base_dir() -> Result<PathBuf> {
    let base = dirs::data_local_dir().ok_or_else(|| LauncherError::ConfigInvalid {
        message: "Could not determine local data directory".to_string(),
    })?;

    Ok(base.join(BASE_DIR))
}

/// Paths and process-wide flags shared by every component of a run
///
/// Constructed once at process start and passed by reference.
#[derive(Debug, Clone)]
pub struct RuntimeContext {
    pub base_dir: PathBuf,
    pub app_dir: PathBuf,
    pub temp_dir: PathBuf,
    pub log_file: PathBuf,
    pub settings_file: PathBuf,
    pub config_file: PathBuf,
    busy: Arc<AtomicBool>,
}

impl RuntimeContext {
    /// Build a context rooted at `base_dir` for the application `app_name`
    ///
    /// Does not touch the file system; see [`RuntimeContext::prepare`].
    pub fn new(base_dir: impl Into<PathBuf>, app_name: &str) -> Self {
        let base_dir = base_dir.into();
        Self {
            app_dir: base_dir.join(APP_DIR),
            temp_dir: base_dir.join(TEMP_DIR),
            log_file: base_dir.join(LOG_FILE),
            settings_file: base_dir.join(SETTINGS_FILE),
            config_file: base_dir.join(format!("{app_name}.cfg")),
            base_dir,
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Create the application and staging directories, then empty the staging directory
    pub fn prepare(&self) -> Result<()> {
        for dir in [&self.base_dir, &self.app_dir, &self.temp_dir] {
            fs::create_dir_all(dir).map_err(|e| LauncherError::FileWriteFailed {
                path: dir.display().to_string(),
                reason: e.to_string(),
            })?;
        }
        self.clean_temp_dir()?;
        tracing::debug!(base = %self.base_dir.display(), "Runtime directories prepared");
        Ok(())
    }

    /// Remove everything below the staging directory, keeping the directory itself
    pub fn clean_temp_dir(&self) -> Result<()> {
        if !self.temp_dir.is_dir() {
            return Ok(());
        }
        crate::sync::purge::delete_recursive(&self.temp_dir, &[self.temp_dir.clone()], &mut |_| {})
    }

    /// Path of the staged (remote) metadata file
    pub fn staged_manifest(&self) -> PathBuf {
        self.temp_dir.join(MANIFEST_FILE)
    }

    /// Path the metadata file is installed to
    pub fn installed_manifest(&self) -> PathBuf {
        self.app_dir.join(MANIFEST_FILE)
    }

    /// Find the metadata file currently present in the application directory
    ///
    /// Any `*.mf` file counts, matched case-insensitively.
    pub fn find_installed_manifest(&self) -> Option<PathBuf> {
        find_by_extension(&self.app_dir, "mf").into_iter().next()
    }

    /// Mark a run as active; fails if another run already holds the context
    pub fn begin_run(&self) -> Result<RunGuard> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(LauncherError::RunInProgress);
        }
        Ok(RunGuard {
            busy: Arc::clone(&self.busy),
        })
    }

    /// Whether a run currently holds the context
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Releases the run flag of a [`RuntimeContext`] when dropped
#[derive(Debug)]
pub struct RunGuard {
    busy: Arc<AtomicBool>,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

/// List regular files directly inside `dir` whose extension matches, sorted by name
pub fn find_by_extension(dir: &Path, extension: &str) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut found: Vec<PathBuf> = entries
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
        })
        .collect();
    found.sort();
    found
}
