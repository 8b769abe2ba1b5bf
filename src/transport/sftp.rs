//! SFTP hosting backend
//!
//! Every session performs TCP connect, SSH handshake and password
//! authentication, and is disconnected when dropped. Remote paths are
//! `stat`ed before transfer so a missing file is reported as not found
//! rather than as a failed read.

use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;
use std::time::Duration;

use ssh2::{ErrorCode, Session, Sftp};

use super::{ProgressSink, Transport, TransportSession, copy_with_progress, write_atomically};
use crate::config::SftpSettings;
use crate::error::{LauncherError, Result};

/// `LIBSSH2_FX_NO_SUCH_FILE`
const SFTP_NO_SUCH_FILE: i32 = 2;

/// SFTP hosting
pub struct SftpTransport {
    settings: SftpSettings,
    timeout: Duration,
}

impl SftpTransport {
    pub fn new(settings: SftpSettings, timeout: Duration) -> Self {
        Self { settings, timeout }
    }

    fn host(&self) -> String {
        format!("{}:{}", self.settings.hostname, self.settings.port)
    }

    /// Connect, handshake and authenticate
    fn connect(&self) -> Result<Session> {
        let host = self.host();
        let addr = (self.settings.hostname.as_str(), self.settings.port)
            .to_socket_addrs()
            .map_err(|e| crate::error::unreachable(&host, e.to_string()))?
            .next()
            .ok_or_else(|| crate::error::unreachable(&host, "no address resolved"))?;

        let tcp = TcpStream::connect_timeout(&addr, self.timeout)
            .map_err(|e| crate::error::unreachable(&host, e.to_string()))?;

        let mut session =
            Session::new().map_err(|e| crate::error::unreachable(&host, e.message()))?;
        session.set_tcp_stream(tcp);
        session.set_timeout(u32::try_from(self.timeout.as_millis()).unwrap_or(u32::MAX));
        session
            .handshake()
            .map_err(|e| crate::error::unreachable(&host, e.message()))?;

        session
            .userauth_password(&self.settings.username, &self.settings.password)
            .map_err(|e| crate::error::auth_failed(&host, &self.settings.username, e.message()))?;
        if !session.authenticated() {
            return Err(crate::error::auth_failed(
                &host,
                &self.settings.username,
                "server did not accept the credentials",
            ));
        }

        tracing::debug!(host = %host, "SFTP session established");
        Ok(session)
    }
}

impl Transport for SftpTransport {
    fn name(&self) -> String {
        crate::config::HostingMode::Sftp.to_string()
    }

    fn ping(&self, _location: &str) -> Result<()> {
        let session = self.connect()?;
        disconnect(&session);
        Ok(())
    }

    fn open_session(&self) -> Result<Box<dyn TransportSession + '_>> {
        let session = self.connect()?;
        let sftp = match session.sftp() {
            Ok(sftp) => sftp,
            Err(e) => {
                disconnect(&session);
                return Err(crate::error::transfer_failed(self.host(), e.message()));
            }
        };
        Ok(Box::new(SftpSession {
            session,
            sftp: Some(sftp),
        }))
    }
}

struct SftpSession {
    session: Session,
    sftp: Option<Sftp>,
}

impl TransportSession for SftpSession {
    fn fetch(&mut self, remote: &str, dest: &Path, progress: &mut dyn ProgressSink) -> Result<u64> {
        let sftp = self
            .sftp
            .as_ref()
            .ok_or_else(|| crate::error::transfer_failed(remote, "session already closed"))?;
        let remote_path = Path::new(remote);

        let stat = sftp
            .stat(remote_path)
            .map_err(|e| map_sftp_error(remote, &e))?;
        let total = stat.size;
        tracing::debug!(remote, size = ?total, "Downloading over SFTP");

        let mut file = sftp
            .open(remote_path)
            .map_err(|e| map_sftp_error(remote, &e))?;

        write_atomically(dest, |out| {
            copy_with_progress(&mut file, out, total, progress)
                .map_err(|e| super::transfer_error(remote, &e))
        })
    }
}

impl Drop for SftpSession {
    fn drop(&mut self) {
        drop(self.sftp.take());
        disconnect(&self.session);
    }
}

fn disconnect(session: &Session) {
    if let Err(e) = session.disconnect(None, "closing session", None) {
        tracing::debug!(error = %e, "SFTP disconnect failed");
    }
}

fn map_sftp_error(remote: &str, err: &ssh2::Error) -> LauncherError {
    if err.code() == ErrorCode::SFTP(SFTP_NO_SUCH_FILE) {
        crate::error::remote_not_found(remote)
    } else {
        crate::error::transfer_failed(remote, err.message())
    }
}
