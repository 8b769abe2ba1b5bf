//! Locating and starting the installed application
//!
//! The application directory holds exactly one launch artifact (a zip package
//! with the configured extension). Its embedded `META-INF/MANIFEST.MF` names an
//! entry point, which is resolved through an [`EntryPointRegistry`] to a
//! factory producing an [`EmbeddedApplication`].
//!
//! The built-in `process` entry point runs the application as a child process:
//! it inherits the launcher's environment, the launcher never sees the child's.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command};

use crate::config::LaunchSettings;
use crate::context::find_by_extension;
use crate::error::{ErrorClass, LauncherError, Result};
use crate::manifest::{MetadataSnapshot, MetadataSource, try_read_metadata};

/// Identifier of the built-in child process entry point
pub const PROCESS_ENTRY_POINT: &str = "process";

/// Artifact attribute naming the executable of the `process` entry point
pub const EXEC_PATH_ATTRIBUTE: &str = "Exec-Path";

/// Environment passed to applications started by the `process` entry point
pub const ENV_APP_NAME: &str = "APPCONTAINER_APP_NAME";
pub const ENV_APP_DIR: &str = "APPCONTAINER_APP_DIR";
pub const ENV_CONFIG_FILE: &str = "APPCONTAINER_CONFIG_FILE";

/// Everything an entry point factory is given
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchContext {
    pub app_name: String,
    pub app_dir: PathBuf,
    pub config_file: PathBuf,
    pub artifact: PathBuf,
    pub params: Vec<String>,
}

/// Lifecycle of a started application
pub trait EmbeddedApplication: Send {
    fn initialize(&mut self) -> Result<()>;

    fn start(&mut self, params: &[String]) -> Result<()>;

    /// Block until the application finishes; returns its exit code
    fn wait(&mut self) -> Result<i32> {
        Ok(0)
    }
}

type Factory =
    dyn Fn(&LaunchContext, &MetadataSnapshot) -> Result<Box<dyn EmbeddedApplication>> + Send + Sync;

/// Entry point identifier -> factory
pub struct EntryPointRegistry {
    factories: BTreeMap<String, Box<Factory>>,
}

impl EntryPointRegistry {
    /// Registry without any entry points
    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Registry with the built-in `process` entry point
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register(PROCESS_ENTRY_POINT, ProcessApplication::create);
        registry
    }

    /// Register (or replace) a factory
    pub fn register<F>(&mut self, id: impl Into<String>, factory: F)
    where
        F: Fn(&LaunchContext, &MetadataSnapshot) -> Result<Box<dyn EmbeddedApplication>>
            + Send
            + Sync
            + 'static,
    {
        self.factories.insert(id.into(), Box::new(factory));
    }

    pub fn contains(&self, id: &str) -> bool {
        self.factories.contains_key(id)
    }

    fn instantiate(
        &self,
        id: &str,
        launch: &LaunchContext,
        metadata: &MetadataSnapshot,
    ) -> Result<Box<dyn EmbeddedApplication>> {
        let factory = self
            .factories
            .get(id)
            .ok_or_else(|| crate::error::unknown_entry_point(id))?;
        factory(launch, metadata).map_err(|e| match e.class() {
            ErrorClass::Load => e,
            _ => crate::error::instantiation_failed(id, e.to_string()),
        })
    }
}

impl Default for EntryPointRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl fmt::Debug for EntryPointRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.factories.keys()).finish()
    }
}

/// A started application
pub struct ApplicationHandle {
    entry_point: String,
    artifact: PathBuf,
    app: Box<dyn EmbeddedApplication>,
}

impl ApplicationHandle {
    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }

    pub fn artifact(&self) -> &Path {
        &self.artifact
    }

    /// Block until the application finishes; returns its exit code
    pub fn wait(mut self) -> Result<i32> {
        self.app.wait().map_err(|e| lifecycle_error("wait", e))
    }
}

impl fmt::Debug for ApplicationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApplicationHandle")
            .field("entry_point", &self.entry_point)
            .field("artifact", &self.artifact)
            .finish_non_exhaustive()
    }
}

/// Finds, instantiates and starts the installed application
#[derive(Debug)]
pub struct Loader {
    settings: LaunchSettings,
    registry: EntryPointRegistry,
}

impl Loader {
    pub fn new(settings: LaunchSettings, registry: EntryPointRegistry) -> Self {
        Self { settings, registry }
    }

    /// Locate the single launch artifact in `app_dir`
    pub fn locate_artifact(&self, app_dir: &Path) -> Result<PathBuf> {
        let extension = self.settings.artifact_extension.trim_start_matches('.');
        let mut found = find_by_extension(app_dir, extension);
        match found.len() {
            0 => Err(crate::error::artifact_missing(
                app_dir.display().to_string(),
                extension,
            )),
            1 => Ok(found.remove(0)),
            _ => {
                let names: Vec<String> = found
                    .iter()
                    .filter_map(|p| p.file_name())
                    .map(|n| n.to_string_lossy().into_owned())
                    .collect();
                Err(crate::error::artifact_ambiguous(
                    app_dir.display().to_string(),
                    &names,
                ))
            }
        }
    }

    /// Locate the artifact, resolve its entry point, then initialize and start it
    pub fn load_and_start(
        &self,
        app_name: &str,
        app_dir: &Path,
        config_file: &Path,
        params: &[String],
    ) -> Result<ApplicationHandle> {
        let artifact = self.locate_artifact(app_dir)?;
        let artifact_name = artifact.display().to_string();

        let metadata = try_read_metadata(&MetadataSource::Archive(artifact.clone()))
            .map_err(|e| crate::error::instantiation_failed(&artifact_name, e.to_string()))?;
        let attribute = &self.settings.entry_point_attribute;
        let entry_point = metadata
            .get(attribute)
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| crate::error::entry_point_missing(&artifact_name, attribute))?
            .to_string();

        tracing::info!(artifact = %artifact_name, entry_point = %entry_point, "Loading application");

        let launch = LaunchContext {
            app_name: app_name.to_string(),
            app_dir: app_dir.to_path_buf(),
            config_file: config_file.to_path_buf(),
            artifact: artifact.clone(),
            params: params.to_vec(),
        };
        let mut app = self.registry.instantiate(&entry_point, &launch, &metadata)?;

        app.initialize()
            .map_err(|e| lifecycle_error("initialization", e))?;
        app.start(params).map_err(|e| lifecycle_error("start", e))?;

        tracing::info!(entry_point = %entry_point, "Application started");
        Ok(ApplicationHandle {
            entry_point,
            artifact,
            app,
        })
    }
}

fn lifecycle_error(phase: &str, err: LauncherError) -> LauncherError {
    match err {
        LauncherError::LifecycleFailed { .. } => err,
        other => crate::error::lifecycle_failed(phase, other.to_string()),
    }
}

/// The `process` entry point: the application runs as a child process
struct ProcessApplication {
    launch: LaunchContext,
    executable: PathBuf,
    child: Option<Child>,
}

impl ProcessApplication {
    fn create(
        launch: &LaunchContext,
        metadata: &MetadataSnapshot,
    ) -> Result<Box<dyn EmbeddedApplication>> {
        let exec_path = metadata
            .get(EXEC_PATH_ATTRIBUTE)
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| {
                crate::error::instantiation_failed(
                    PROCESS_ENTRY_POINT,
                    format!("artifact does not declare '{EXEC_PATH_ATTRIBUTE}'"),
                )
            })?;
        let executable = crate::sync::confined_join(&launch.app_dir, Path::new(exec_path))
            .ok_or_else(|| {
                crate::error::instantiation_failed(
                    PROCESS_ENTRY_POINT,
                    format!("'{exec_path}' is outside the application directory"),
                )
            })?;

        Ok(Box::new(Self {
            launch: launch.clone(),
            executable,
            child: None,
        }))
    }
}

impl EmbeddedApplication for ProcessApplication {
    fn initialize(&mut self) -> Result<()> {
        if !self.executable.is_file() {
            return Err(crate::error::lifecycle_failed(
                "initialization",
                format!("executable not found: {}", self.executable.display()),
            ));
        }
        Ok(())
    }

    fn start(&mut self, params: &[String]) -> Result<()> {
        let child = Command::new(&self.executable)
            .args(params)
            .current_dir(&self.launch.app_dir)
            .env(ENV_APP_NAME, &self.launch.app_name)
            .env(ENV_APP_DIR, &self.launch.app_dir)
            .env(ENV_CONFIG_FILE, &self.launch.config_file)
            .spawn()
            .map_err(|e| {
                crate::error::lifecycle_failed(
                    "start",
                    format!("{}: {e}", self.executable.display()),
                )
            })?;
        tracing::debug!(pid = child.id(), "Application process spawned");
        self.child = Some(child);
        Ok(())
    }

    fn wait(&mut self) -> Result<i32> {
        let child = self
            .child
            .as_mut()
            .ok_or_else(|| crate::error::lifecycle_failed("wait", "application was not started"))?;
        let status = child
            .wait()
            .map_err(|e| crate::error::lifecycle_failed("wait", e.to_string()))?;
        Ok(status.code().unwrap_or(-1))
    }
}
