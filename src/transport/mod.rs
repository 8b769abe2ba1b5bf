//! Transport abstraction over the update server
//!
//! Two backends share one contract:
//! - [`http::HttpTransport`]: plain HTTP(S) via `ureq`
//! - [`sftp::SftpTransport`]: SFTP via `ssh2`
//!
//! A [`Transport`] is long-lived configuration; a [`TransportSession`] is a
//! scoped connection opened by one stage and closed when dropped, on every
//! exit path. Nothing is retried at this layer.

pub mod http;
pub mod progress;
pub mod sftp;

use std::fs;
use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

pub use progress::{FetchProgress, NoProgress, PercentTracker, ProgressSink, copy_with_progress};

use crate::config::{HostingMode, Settings};
use crate::error::{LauncherError, Result};

/// A configured way of reaching the update server
pub trait Transport: Send {
    /// Human-readable backend name, e.g. "Web Hosting"
    fn name(&self) -> String;

    /// Check that the server answers; `location` is the remote metadata location
    fn ping(&self, location: &str) -> Result<()>;

    /// Open a session for a sequence of fetches
    fn open_session(&self) -> Result<Box<dyn TransportSession + '_>>;
}

/// A single-use connection to the server
pub trait TransportSession {
    /// Fetch `remote` into `dest`, replacing it; returns the number of bytes written
    fn fetch(&mut self, remote: &str, dest: &Path, progress: &mut dyn ProgressSink) -> Result<u64>;
}

/// Build the transport selected by the hosting mode
pub fn open_transport(settings: &Settings) -> Result<Box<dyn Transport>> {
    match settings.hosting {
        HostingMode::Web => Ok(Box::new(http::HttpTransport::new(
            settings.connection_timeout(),
        ))),
        HostingMode::Sftp => {
            let sftp = settings.sftp.clone().ok_or_else(|| {
                crate::error::config_invalid("hosting is 'sftp' but no 'sftp' block is configured")
            })?;
            Ok(Box::new(sftp::SftpTransport::new(
                sftp,
                settings.connection_timeout(),
            )))
        }
    }
}

/// Write `dest` through a temporary file in the same directory
///
/// `dest` is only replaced once `write` succeeds, so a failed fetch never
/// leaves a truncated file behind.
pub fn write_atomically<F>(dest: &Path, write: F) -> Result<u64>
where
    F: FnOnce(&mut fs::File) -> Result<u64>,
{
    let parent = dest
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).map_err(|e| crate::error::file_write_failed(parent, e))?;

    let mut staged =
        NamedTempFile::new_in(parent).map_err(|e| crate::error::file_write_failed(parent, e))?;
    let written = write(staged.as_file_mut())?;
    staged
        .as_file_mut()
        .flush()
        .map_err(|e| crate::error::file_write_failed(dest, e))?;
    staged
        .persist(dest)
        .map_err(|e| crate::error::file_write_failed(dest, e.error))?;

    tracing::debug!(dest = %dest.display(), bytes = written, "Fetched file");
    Ok(written)
}

/// Map an I/O error during a transfer
pub(crate) fn transfer_error(location: &str, err: &std::io::Error) -> LauncherError {
    crate::error::transfer_failed(location, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_transport_by_hosting_mode() {
        let web = open_transport(&Settings::default()).unwrap();
        assert_eq!(web.name(), "Web Hosting");

        let settings = Settings {
            hosting: HostingMode::Sftp,
            sftp: Some(crate::config::SftpSettings {
                hostname: "localhost".to_string(),
                port: 22,
                username: "demo".to_string(),
                password: String::new(),
            }),
            ..Settings::default()
        };
        assert_eq!(open_transport(&settings).unwrap().name(), "SFTP Hosting");
    }

    #[test]
    fn test_open_transport_sftp_without_block() {
        let settings = Settings {
            hosting: HostingMode::Sftp,
            ..Settings::default()
        };
        assert!(matches!(
            open_transport(&settings),
            Err(LauncherError::ConfigInvalid { .. })
        ));
    }

    #[test]
    fn test_write_atomically_replaces_on_success() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("nested/libs.zip");

        let written = write_atomically(&dest, |file| {
            file.write_all(b"new").unwrap();
            Ok(3)
        })
        .unwrap();

        assert_eq!(written, 3);
        assert_eq!(fs::read_to_string(&dest).unwrap(), "new");
    }

    #[test]
    fn test_write_atomically_keeps_old_file_on_failure() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("libs.zip");
        fs::write(&dest, "old").unwrap();

        let result = write_atomically(&dest, |file| {
            file.write_all(b"partial").unwrap();
            Err(crate::error::transfer_failed("libs.zip", "connection reset"))
        });

        assert!(result.is_err());
        assert_eq!(fs::read_to_string(&dest).unwrap(), "old");
        assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 1);
    }
}
