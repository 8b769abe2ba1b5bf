//! Common test utilities for appcontainer integration tests

#![allow(dead_code)]

use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;

use appcontainer::config::{ResourceDescriptor, Settings};
use appcontainer::context::{RuntimeContext, SETTINGS_FILE};
use appcontainer::error::Result;
use appcontainer::loader::{EmbeddedApplication, EntryPointRegistry, LaunchContext, Loader};
use appcontainer::manifest::{ARCHIVE_MANIFEST_ENTRY, MetadataSnapshot};
use appcontainer::transport::{
    ProgressSink, Transport, TransportSession, copy_with_progress, write_atomically,
};
use tempfile::TempDir;

/// Entry point registered by [`recording_loader`]
pub const RECORDING_ENTRY_POINT: &str = "recording";

/// A launcher base directory plus a directory standing in for the update server
pub struct TestWorkspace {
    /// Temporary directory
    pub temp: TempDir,
    /// Launcher base directory
    pub base: PathBuf,
    /// Files served by the update server
    pub server: PathBuf,
}

impl TestWorkspace {
    /// Create a new test workspace
    pub fn new() -> Self {
        let temp = TempDir::new().expect("Failed to create temp directory");
        let base = temp.path().join("base");
        let server = temp.path().join("server");
        fs::create_dir_all(&base).expect("Failed to create base directory");
        fs::create_dir_all(&server).expect("Failed to create server directory");
        Self { temp, base, server }
    }

    /// Settings with an application resource and a library resource under `root`
    ///
    /// `root` ends with a slash, e.g. `http://127.0.0.1:8080/`.
    pub fn settings(root: &str) -> Settings {
        Settings {
            app_name: "Demo".to_string(),
            manifest_location: format!("{root}MANIFEST.MF"),
            version_description_url: None,
            resources: vec![
                ResourceDescriptor::new(
                    format!("{root}app.zip"),
                    "App-Version",
                    vec!["Demo.app".to_string(), "docs".to_string()],
                ),
                ResourceDescriptor::new(
                    format!("{root}libs.tar.gz"),
                    "Lib-Version",
                    vec!["libs".to_string()],
                ),
            ],
            ..Settings::default()
        }
    }

    /// Prepared runtime context for the `Demo` application
    pub fn context(&self) -> RuntimeContext {
        let ctx = RuntimeContext::new(&self.base, "Demo");
        ctx.prepare().expect("Failed to prepare runtime context");
        ctx
    }

    /// Write `appcontainer.yaml` into the base directory
    pub fn write_settings(&self, settings: &Settings) {
        let yaml = settings.to_yaml().expect("Failed to serialize settings");
        fs::write(self.base.join(SETTINGS_FILE), yaml).expect("Failed to write settings");
    }

    /// Publish both resources and the metadata file on the server
    pub fn publish(&self, app_version: &str, lib_version: &str, flags: &str) {
        self.publish_app(app_version);
        self.publish_libs(lib_version);
        self.publish_manifest(&format!(
            "Manifest-Version: 1.0\nApp-Version: {app_version}\nLib-Version: {lib_version}\n{flags}"
        ));
    }

    /// Publish `app.zip` holding the launch artifact and its documentation
    pub fn publish_app(&self, version: &str) {
        let artifact = artifact_bytes(&format!("Entry-Point: {RECORDING_ENTRY_POINT}\n"));
        let readme = format!("Demo {version}\n");
        write_zip(
            &self.server.join("app.zip"),
            &[
                ("Demo.app", &artifact),
                ("docs/", b""),
                ("docs/README.txt", readme.as_bytes()),
                ("docs/.DS_Store", b"hidden"),
                ("docs/EMPTY.txt", b""),
            ],
        );
    }

    /// Publish `libs.tar.gz`
    pub fn publish_libs(&self, version: &str) {
        let lib = format!("core library {version}\n");
        write_tar_gz(
            &self.server.join("libs.tar.gz"),
            &[("libs/core.lib", lib.as_bytes())],
        );
    }

    pub fn publish_manifest(&self, content: &str) {
        fs::write(self.server.join("MANIFEST.MF"), content).expect("Failed to write manifest");
    }

    /// Lay out an installed copy without going through the pipeline
    pub fn install(&self, app_version: &str, lib_version: &str) {
        let app_dir = self.base.join("appdir");
        fs::create_dir_all(app_dir.join("libs")).expect("Failed to create app dir");
        fs::write(
            app_dir.join("Demo.app"),
            artifact_bytes(&format!("Entry-Point: {RECORDING_ENTRY_POINT}\n")),
        )
        .expect("Failed to write artifact");
        fs::write(app_dir.join("libs/core.lib"), lib_version).expect("Failed to write lib");
        fs::write(
            app_dir.join("MANIFEST.MF"),
            format!("App-Version: {app_version}\nLib-Version: {lib_version}\n"),
        )
        .expect("Failed to write installed manifest");
    }

    /// Read a file below the application directory
    pub fn read_installed(&self, path: &str) -> String {
        fs::read_to_string(self.base.join("appdir").join(path)).expect("Failed to read file")
    }

    pub fn installed_exists(&self, path: &str) -> bool {
        self.base.join("appdir").join(path).exists()
    }
}

impl Default for TestWorkspace {
    fn default() -> Self {
        Self::new()
    }
}

/// Launches recorded by [`RecordingApplication`]
pub type Launches = Arc<Mutex<Vec<LaunchContext>>>;

/// Application that records its launch instead of running anything
pub struct RecordingApplication {
    launch: LaunchContext,
    launches: Launches,
}

impl EmbeddedApplication for RecordingApplication {
    fn initialize(&mut self) -> Result<()> {
        Ok(())
    }

    fn start(&mut self, params: &[String]) -> Result<()> {
        let mut launch = self.launch.clone();
        launch.params = params.to_vec();
        self.launches.lock().unwrap().push(launch);
        Ok(())
    }
}

/// Loader whose only entry point is [`RECORDING_ENTRY_POINT`]
pub fn recording_loader() -> (Loader, Launches) {
    let launches: Launches = Arc::new(Mutex::new(Vec::new()));
    let recorded = Arc::clone(&launches);
    let mut registry = EntryPointRegistry::empty();
    registry.register(
        RECORDING_ENTRY_POINT,
        move |launch: &LaunchContext, _: &MetadataSnapshot| {
            Ok(Box::new(RecordingApplication {
                launch: launch.clone(),
                launches: Arc::clone(&recorded),
            }) as Box<dyn EmbeddedApplication>)
        },
    );
    (Loader::new(Settings::default().launch, registry), launches)
}

/// Transport resolving locations by their last path segment inside a directory
#[derive(Debug, Clone)]
pub struct DirectoryTransport {
    root: PathBuf,
    reachable: bool,
}

impl DirectoryTransport {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            reachable: true,
        }
    }

    pub fn unreachable(mut self) -> Self {
        self.reachable = false;
        self
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
            Err(appcontainer::error::unreachable(location, "connection refused"))
        }
    }

    fn open_session(&self) -> Result<Box<dyn TransportSession + '_>> {
        if !self.reachable {
            return Err(appcontainer::error::unreachable("directory", "connection refused"));
        }
        Ok(Box::new(DirectorySession { root: &self.root }))
    }
}

struct DirectorySession<'a> {
    root: &'a Path,
}

impl TransportSession for DirectorySession<'_> {
    fn fetch(&mut self, remote: &str, dest: &Path, progress: &mut dyn ProgressSink) -> Result<u64> {
        let name = remote.rsplit('/').next().unwrap_or(remote);
        let source = self.root.join(name);
        if !source.is_file() {
            return Err(appcontainer::error::remote_not_found(remote));
        }
        let total = fs::metadata(&source).ok().map(|m| m.len());
        let mut reader = File::open(&source).unwrap();
        write_atomically(dest, |out| {
            Ok(copy_with_progress(&mut reader, out, total, progress).unwrap())
        })
    }
}

/// Minimal HTTP/1.1 file server answering HEAD and GET from a directory
pub struct FileServer {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<String>>>,
}

impl FileServer {
    /// Serve `root` on an ephemeral local port until the test process exits
    pub fn start(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind test server");
        let addr = listener.local_addr().expect("Failed to read server address");
        let requests = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&requests);

        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                let _ = serve(&root, stream, &log);
            }
        });

        Self { addr, requests }
    }

    /// Root URL ending in a slash
    pub fn root(&self) -> String {
        format!("http://{}/", self.addr)
    }

    /// Request lines received so far, e.g. `HEAD /MANIFEST.MF`
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

fn serve(root: &Path, mut stream: TcpStream, log: &Mutex<Vec<String>>) -> io::Result<()> {
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut request_line = String::new();
    reader.read_line(&mut request_line)?;
    loop {
        let mut header = String::new();
        if reader.read_line(&mut header)? == 0 || header.trim().is_empty() {
            break;
        }
    }

    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let path = parts.next().unwrap_or_default().to_string();
    log.lock().unwrap().push(format!("{method} {path}"));

    let name = path.trim_start_matches('/');
    let file = root.join(name);
    if name.is_empty() || !file.is_file() {
        stream.write_all(
            b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        )?;
        return stream.flush();
    }

    let body = fs::read(&file)?;
    write!(
        stream,
        "HTTP/1.1 200 OK\r\nContent-Type: application/octet-stream\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    )?;
    if method != "HEAD" {
        stream.write_all(&body)?;
    }
    stream.flush()
}

/// A local URL nobody listens on
pub fn closed_port_root() -> String {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    format!("http://127.0.0.1:{port}/")
}

/// Bytes of a launch artifact carrying the given manifest text
pub fn artifact_bytes(manifest: &str) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(io::Cursor::new(Vec::new()));
    writer
        .start_file(ARCHIVE_MANIFEST_ENTRY, zip::write::SimpleFileOptions::default())
        .unwrap();
    writer.write_all(manifest.as_bytes()).unwrap();
    writer.finish().unwrap().into_inner()
}

/// Write a zip archive; names ending in `/` become directories
pub fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
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

/// Write a gzip-compressed tar archive
pub fn write_tar_gz(path: &Path, entries: &[(&str, &[u8])]) {
    let encoder = flate2::write::GzEncoder::new(
        File::create(path).unwrap(),
        flate2::Compression::default(),
    );
    let mut builder = tar::Builder::new(encoder);
    for (name, content) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_entry_type(tar::EntryType::Regular);
        header.set_cksum();
        builder.append_data(&mut header, name, *content).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap();
}
