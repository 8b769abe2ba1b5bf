//! HTTP(S) hosting backend
//!
//! Ping is a HEAD on the metadata location (any status below 400 counts as
//! reachable). A fetch issues HEAD for the content length, then streams the
//! GET body; a missing or non-positive length degrades to indeterminate
//! progress.

use std::path::Path;
use std::time::Duration;

use super::{ProgressSink, Transport, TransportSession, copy_with_progress, write_atomically};
use crate::error::{LauncherError, Result};

/// Web hosting over HTTP(S)
pub struct HttpTransport {
    agent: ureq::Agent,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build();
        let agent = ureq::Agent::new_with_config(config);
        Self { agent, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Transport for HttpTransport {
    fn name(&self) -> String {
        crate::config::HostingMode::Web.to_string()
    }

    fn ping(&self, location: &str) -> Result<()> {
        tracing::debug!(location, "Pinging web host");
        match self.agent.head(location).call() {
            Ok(resp) => {
                let status = resp.status().as_u16();
                if (200..400).contains(&status) {
                    Ok(())
                } else {
                    Err(crate::error::unreachable(
                        host_of(location),
                        format!("HTTP status {status}"),
                    ))
                }
            }
            Err(ureq::Error::StatusCode(status)) => Err(crate::error::unreachable(
                host_of(location),
                format!("HTTP status {status}"),
            )),
            Err(e) => Err(crate::error::unreachable(host_of(location), e.to_string())),
        }
    }

    fn open_session(&self) -> Result<Box<dyn TransportSession + '_>> {
        Ok(Box::new(HttpSession { agent: &self.agent }))
    }
}

/// HTTP is connectionless from the caller's point of view; the session only borrows the agent
struct HttpSession<'a> {
    agent: &'a ureq::Agent,
}

impl HttpSession<'_> {
    fn content_length(&self, remote: &str) -> Result<Option<u64>> {
        match self.agent.head(remote).call() {
            Ok(resp) => Ok(resp
                .headers()
                .get("content-length")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<i64>().ok())
                .and_then(|len| u64::try_from(len).ok())
                .filter(|len| *len > 0)),
            Err(ureq::Error::StatusCode(404)) => Err(crate::error::remote_not_found(remote)),
            Err(e) => {
                tracing::warn!(remote, error = %e, "HEAD failed, progress will be indeterminate");
                Ok(None)
            }
        }
    }
}

impl TransportSession for HttpSession<'_> {
    fn fetch(&mut self, remote: &str, dest: &Path, progress: &mut dyn ProgressSink) -> Result<u64> {
        let total = self.content_length(remote)?;
        tracing::debug!(remote, length = ?total, "Downloading over HTTP");

        let resp = self
            .agent
            .get(remote)
            .call()
            .map_err(|e| map_get_error(remote, e))?;
        let mut reader = resp.into_body().into_reader();

        write_atomically(dest, |file| {
            copy_with_progress(&mut reader, file, total, progress)
                .map_err(|e| super::transfer_error(remote, &e))
        })
    }
}

fn map_get_error(remote: &str, err: ureq::Error) -> LauncherError {
    match err {
        ureq::Error::StatusCode(404) => crate::error::remote_not_found(remote),
        ureq::Error::StatusCode(status) => {
            crate::error::transfer_failed(remote, format!("HTTP status {status}"))
        }
        other => crate::error::unreachable(host_of(remote), other.to_string()),
    }
}

/// Host part of a URL, or the URL itself when it cannot be parsed
fn host_of(location: &str) -> String {
    location
        .parse::<ureq::http::Uri>()
        .ok()
        .and_then(|uri| uri.host().map(str::to_string))
        .unwrap_or_else(|| location.to_string())
}
