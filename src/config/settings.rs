//! Launcher settings (`appcontainer.yaml`)
//!
//! Settings are read-only for the core. A missing file yields the built-in
//! defaults; a malformed file is an error.

use std::fs;
use std::path::{Component, Path};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::resource::{ResourceDescriptor, ResourceRegistry};
use crate::context::MANIFEST_FILE;
use crate::error::{LauncherError, Result};

const DEFAULT_ROOT: &str = "http://www.equinox-digital-twin.com/files/";

/// Transport used to reach the update server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostingMode {
    /// Plain HTTP(S) web server
    #[default]
    Web,
    /// SFTP server
    Sftp,
}

impl std::fmt::Display for HostingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HostingMode::Web => f.write_str("Web Hosting"),
            HostingMode::Sftp => f.write_str("SFTP Hosting"),
        }
    }
}

/// Connection settings for SFTP hosting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SftpSettings {
    pub hostname: String,
    #[serde(default = "default_sftp_port")]
    pub port: u16,
    pub username: String,
    #[serde(default)]
    pub password: String,
}

fn default_sftp_port() -> u16 {
    22
}

/// How the installed application is located and started
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LaunchSettings {
    /// Extension of the launch artifact inside the application directory
    pub artifact_extension: String,

    /// Artifact metadata attribute naming the entry point
    pub entry_point_attribute: String,
}

impl Default for LaunchSettings {
    fn default() -> Self {
        Self {
            artifact_extension: "app".to_string(),
            entry_point_attribute: "Entry-Point".to_string(),
        }
    }
}

/// Launcher settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Application name, used in messages and for the launch configuration file
    pub app_name: String,

    /// Transport backend
    pub hosting: HostingMode,

    /// Remote location of the metadata file
    pub manifest_location: String,

    /// Page describing the latest version (informational only)
    pub version_description_url: Option<String>,

    /// Connection and read timeout in milliseconds
    pub connection_timeout_ms: u64,

    /// Remote metadata attribute: notify the user before updating
    pub notify_attribute: String,

    /// Remote metadata attribute: the user may skip the update
    pub skip_attribute: String,

    /// Required when `hosting` is `sftp`
    pub sftp: Option<SftpSettings>,

    /// Resources kept in sync
    pub resources: Vec<ResourceDescriptor>,

    /// Paths, relative to the application directory, that updates never delete
    pub keep_paths: Vec<String>,

    pub launch: LaunchSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            app_name: "Equinox Digital Twin".to_string(),
            hosting: HostingMode::Web,
            manifest_location: format!("{DEFAULT_ROOT}MANIFEST.MF"),
            version_description_url: Some(format!("{DEFAULT_ROOT}versionDescription.html")),
            connection_timeout_ms: 3000,
            notify_attribute: "Notify-Update".to_string(),
            skip_attribute: "Allow-Ignore-Update".to_string(),
            sftp: None,
            resources: vec![
                ResourceDescriptor::new(
                    format!("{DEFAULT_ROOT}jar.zip"),
                    "Jar-Version",
                    vec!["Equinox.app".to_string()],
                ),
                ResourceDescriptor::new(
                    format!("{DEFAULT_ROOT}libs.zip"),
                    "Lib-Version",
                    vec!["libs".to_string()],
                ),
                ResourceDescriptor::new(
                    format!("{DEFAULT_ROOT}resources.zip"),
                    "Resource-Version",
                    vec!["resources".to_string()],
                ),
            ],
            keep_paths: Vec::new(),
            launch: LaunchSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings from `path`, falling back to defaults when the file does not exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!(path = %path.display(), "No settings file, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| LauncherError::ConfigReadFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let settings = Self::from_yaml(&content).map_err(|e| match e {
            LauncherError::ConfigParseFailed { reason, .. } => LauncherError::ConfigParseFailed {
                path: path.display().to_string(),
                reason,
            },
            other => other,
        })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Parse settings from YAML text
    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Serialize settings to YAML text
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Reject settings the pipeline cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.manifest_location.trim().is_empty() {
            return Err(crate::error::config_invalid(
                "manifest_location must not be empty",
            ));
        }
        if self.hosting == HostingMode::Sftp && self.sftp.is_none() {
            return Err(crate::error::config_invalid(
                "hosting is 'sftp' but no 'sftp' connection block is configured",
            ));
        }
        if self.connection_timeout_ms == 0 {
            return Err(crate::error::config_invalid(
                "connection_timeout_ms must be greater than zero",
            ));
        }
        if self.resources.is_empty() {
            return Err(crate::error::config_invalid("resources must not be empty"));
        }
        for resource in &self.resources {
            if resource.files().is_empty() {
                return Err(crate::error::config_invalid(format!(
                    "resource '{}' lists no file names",
                    resource.location()
                )));
            }
            if resource.metadata_key().trim().is_empty() {
                return Err(crate::error::config_invalid(format!(
                    "resource '{}' has no metadata key",
                    resource.location()
                )));
            }
        }
        for (i, resource) in self.resources.iter().enumerate() {
            if self.resources[..i].contains(resource) {
                return Err(crate::error::config_invalid(format!(
                    "resource '{}' is listed twice",
                    resource.location()
                )));
            }
        }
        // Downloads are staged under their file name
        let mut staged: Vec<&str> = vec![MANIFEST_FILE];
        for resource in &self.resources {
            let name = resource.display_name();
            if staged.iter().any(|taken| taken.eq_ignore_ascii_case(name)) {
                return Err(crate::error::config_invalid(format!(
                    "resource '{}' would be staged as '{name}', which is already taken",
                    resource.location()
                )));
            }
            staged.push(name);
        }
        for keep in &self.keep_paths {
            let path = Path::new(keep);
            let confined = path.components().any(|c| matches!(c, Component::Normal(_)))
                && path
                    .components()
                    .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
            if !confined {
                return Err(crate::error::config_invalid(format!(
                    "keep path '{keep}' must be relative to the application directory"
                )));
            }
        }
        if self.launch.artifact_extension.trim().is_empty() {
            return Err(crate::error::config_invalid(
                "launch.artifact_extension must not be empty",
            ));
        }
        Ok(())
    }

    /// Connection timeout as a duration
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_timeout_ms)
    }

    /// Resource registry built from the configured resources
    pub fn registry(&self) -> ResourceRegistry {
        ResourceRegistry::new(self.resources.clone())
    }
}
