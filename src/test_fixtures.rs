//! Test fixtures shared by the unit tests
//!
//! - [`DirectoryTransport`]: a transport serving files from a local directory
//! - [`write_zip`], [`write_tar_gz`], [`write_app_artifact`]: archive builders

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::Result;
use crate::manifest::ARCHIVE_MANIFEST_ENTRY;
use crate::transport::{
    ProgressSink, Transport, TransportSession, copy_with_progress, write_atomically,
};

/// Transport that resolves a location by its last path segment inside `root`
#[derive(Debug, Clone)]
pub struct DirectoryTransport {
    root: PathBuf,
    reachable: bool,
    opened: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
}

impl DirectoryTransport {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            reachable: true,
            opened: Arc::new(AtomicUsize::new(0)),
            closed: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn unreachable(mut self) -> Self {
        self.reachable = false;
        self
    }

    pub fn sessions_opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn sessions_closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Transport for DirectoryTransport {
    fn name(&self) -> String {
        "Directory".to_string()
    }

    fn ping(&self, location: &str) -> Result<()> {
        if self.reachable {
            Ok(())
        } else {
            Err(crate::error::unreachable(location, "connection refused"))
        }
    }

    fn open_session(&self) -> Result<Box<dyn TransportSession + '_>> {
        if !self.reachable {
            return Err(crate::error::unreachable("directory", "connection refused"));
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(DirectorySession { transport: self }))
    }
}

struct DirectorySession<'a> {
    transport: &'a DirectoryTransport,
}

impl TransportSession for DirectorySession<'_> {
    fn fetch(&mut self, remote: &str, dest: &Path, progress: &mut dyn ProgressSink) -> Result<u64> {
        let name = remote.rsplit('/').next().unwrap_or(remote);
        let source = self.transport.root.join(name);
        if !source.is_file() {
            return Err(crate::error::remote_not_found(remote));
        }
        let total = fs::metadata(&source).ok().map(|m| m.len());
        let mut reader = File::open(&source).unwrap();
        write_atomically(dest, |out| {
            Ok(copy_with_progress(&mut reader, out, total, progress).unwrap())
        })
    }
}

impl Drop for DirectorySession<'_> {
    fn drop(&mut self) {
        self.transport.closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Write a zip archive; names ending in `/` become directories
pub fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    let mut writer = zip::ZipWriter::new(File::create(path).unwrap());
    let options = zip::write::SimpleFileOptions::default();
    for (name, content) in entries {
        if name.ends_with('/') {
            writer.add_directory(*name, options).unwrap();
        } else {
            writer.start_file(*name, options).unwrap();
            writer.write_all(content).unwrap();
        }
    }
    writer.finish().unwrap();
}

/// Write a gzip-compressed tar archive; names ending in `/` become directories
///
/// Names are stored verbatim, leading `./` included, the way `tar -C dir .` writes them.
pub fn write_tar_gz(path: &Path, entries: &[(&str, &[u8])]) {
    use flate2::Compression;
    use flate2::write::GzEncoder;

    let encoder = GzEncoder::new(File::create(path).unwrap(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (name, content) in entries {
        let mut header = tar::Header::new_gnu();
        let raw = name.as_bytes();
        header.as_old_mut().name[..raw.len()].copy_from_slice(raw);
        if name.ends_with('/') {
            header.set_size(0);
            header.set_mode(0o755);
            header.set_entry_type(tar::EntryType::Directory);
        } else {
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_entry_type(tar::EntryType::Regular);
        }
        header.set_cksum();
        builder.append(&header, *content).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap();
}

/// Write a launch artifact carrying the given manifest text
pub fn write_app_artifact(path: &Path, manifest: &str) {
    write_zip(path, &[(ARCHIVE_MANIFEST_ENTRY, manifest.as_bytes())]);
}
