//! Resource metadata (`MANIFEST.MF`) reading
//!
//! The metadata document is a plain attribute file:
//!
//! ```text
//! Manifest-Version: 1.0
//! Jar-Version: 4.2.1
//! Notify-Update: true
//! ```
//!
//! Continuation lines start with a single space. Only the main section (up to
//! the first blank line) carries resource versions; per-entry sections are
//! ignored. Attribute names compare case-insensitively.
//!
//! Reading never fails: a missing source, a missing entry or unreadable content
//! all yield an empty [`MetadataSnapshot`].

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::error::{LauncherError, Result};

/// Path of the metadata entry inside a packaged archive
pub const ARCHIVE_MANIFEST_ENTRY: &str = "META-INF/MANIFEST.MF";

/// Mapping from metadata attribute to value
///
/// An absent key means "version unknown".
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct MetadataSnapshot {
    attributes: BTreeMap<String, String>,
}

impl MetadataSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the main section of a manifest document
    pub fn parse(content: &str) -> Self {
        let mut attributes = BTreeMap::new();
        let mut current: Option<(String, String)> = None;

        for raw in content.lines() {
            let line = raw.strip_suffix('\r').unwrap_or(raw);

            if line.is_empty() {
                break;
            }

            if let Some(continuation) = line.strip_prefix(' ') {
                if let Some((_, value)) = current.as_mut() {
                    value.push_str(continuation);
                }
                continue;
            }

            if let Some((name, value)) = current.take() {
                attributes.insert(name, value);
            }

            match line.split_once(':') {
                Some((name, value)) if !name.trim().is_empty() => {
                    let value = value.strip_prefix(' ').unwrap_or(value);
                    current = Some((name.trim().to_string(), value.trim_end().to_string()));
                }
                _ => tracing::debug!(line, "Skipping malformed manifest line"),
            }
        }

        if let Some((name, value)) = current {
            attributes.insert(name, value);
        }

        Self { attributes }
    }

    /// Look up an attribute, falling back to a case-insensitive match
    pub fn get(&self, key: &str) -> Option<&str> {
        self.attributes
            .get(key)
            .or_else(|| {
                self.attributes
                    .iter()
                    .find(|(name, _)| name.eq_ignore_ascii_case(key))
                    .map(|(_, value)| value)
            })
            .map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(key.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Keep only the given attributes
    ///
    /// Used to reduce a snapshot to the registry's version keys.
    pub fn restricted_to<'a>(&self, keys: impl IntoIterator<Item = &'a str>) -> Self {
        let mut restricted = Self::new();
        for key in keys {
            if let Some(value) = self.get(key) {
                restricted.insert(key, value);
            }
        }
        restricted
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MetadataSnapshot {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut snapshot = Self::new();
        for (k, v) in iter {
            snapshot.insert(k, v);
        }
        snapshot
    }
}

/// Where metadata is read from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataSource {
    /// A standalone metadata file
    File(PathBuf),
    /// The metadata entry embedded in a packaged (zip) archive
    Archive(PathBuf),
}

impl MetadataSource {
    pub fn path(&self) -> &Path {
        match self {
            MetadataSource::File(path) | MetadataSource::Archive(path) => path,
        }
    }
}

/// Read metadata, degrading to an empty snapshot on any problem
pub fn read_metadata(source: &MetadataSource) -> MetadataSnapshot {
    if !source.path().is_file() {
        tracing::debug!(path = %source.path().display(), "Metadata source not present");
        return MetadataSnapshot::new();
    }

    match try_read_metadata(source) {
        Ok(snapshot) => snapshot,
        Err(e) => {
            tracing::warn!(error = %e, "Treating unreadable metadata as empty");
            MetadataSnapshot::new()
        }
    }
}

/// Read metadata, reporting why it could not be read
pub fn try_read_metadata(source: &MetadataSource) -> Result<MetadataSnapshot> {
    let path = source.path();
    let unreadable = |reason: String| LauncherError::MetadataUnreadable {
        path: path.display().to_string(),
        reason,
    };

    let content = match source {
        MetadataSource::File(path) => {
            std::fs::read_to_string(path).map_err(|e| unreadable(e.to_string()))?
        }
        MetadataSource::Archive(path) => {
            let file = File::open(path).map_err(|e| unreadable(e.to_string()))?;
            let mut archive =
                zip::ZipArchive::new(file).map_err(|e| unreadable(e.to_string()))?;
            let mut entry = archive
                .by_name(ARCHIVE_MANIFEST_ENTRY)
                .map_err(|e| unreadable(format!("{ARCHIVE_MANIFEST_ENTRY}: {e}")))?;
            let mut content = String::new();
            entry
                .read_to_string(&mut content)
                .map_err(|e| unreadable(e.to_string()))?;
            content
        }
    };

    Ok(MetadataSnapshot::parse(&content))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_parse_main_section() {
        let snapshot = MetadataSnapshot::parse(
            "Manifest-Version: 1.0\r\nJar-Version: 4.2\r\nLib-Version: 7\r\n\r\nName: x\r\nJar-Version: 9\r\n",
        );
        assert_eq!(snapshot.get("Jar-Version"), Some("4.2"));
        assert_eq!(snapshot.get("Lib-Version"), Some("7"));
        assert_eq!(snapshot.len(), 3);
    }

    #[test]
    fn test_parse_continuation_lines() {
        let snapshot = MetadataSnapshot::parse("Class-Path: libs/a.app\n  libs/b.app\nX: y\n");
        assert_eq!(snapshot.get("Class-Path"), Some("libs/a.app libs/b.app"));
        assert_eq!(snapshot.get("X"), Some("y"));
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let snapshot = MetadataSnapshot::parse("notify-update: TRUE\n");
        assert_eq!(snapshot.get("Notify-Update"), Some("TRUE"));
        assert!(!snapshot.contains("Allow-Ignore-Update"));
    }

    #[test]
    fn test_parse_skips_garbage() {
        let snapshot = MetadataSnapshot::parse("this is not an attribute\nA: 1\n: nameless\n");
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.get("A"), Some("1"));
    }

    #[test]
    fn test_restricted_to_registry_keys() {
        let snapshot: MetadataSnapshot =
            [("A", "1"), ("B", "2"), ("Manifest-Version", "1.0")].into_iter().collect();
        let restricted = snapshot.restricted_to(["A", "C"]);
        assert_eq!(restricted.len(), 1);
        assert_eq!(restricted.get("A"), Some("1"));
    }

    #[test]
    fn test_read_missing_file_is_empty() {
        let temp = TempDir::new().unwrap();
        let snapshot = read_metadata(&MetadataSource::File(temp.path().join("MANIFEST.MF")));
        assert!(snapshot.is_empty());
    }

    #[test]
    fn test_read_standalone_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("MANIFEST.MF");
        std::fs::write(&path, "Jar-Version: 2\n").unwrap();
        let snapshot = read_metadata(&MetadataSource::File(path));
        assert_eq!(snapshot.get("Jar-Version"), Some("2"));
    }

    #[test]
    fn test_read_non_utf8_file_is_empty() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("MANIFEST.MF");
        std::fs::write(&path, [0xff, 0xfe, 0x00, 0x41]).unwrap();
        assert!(read_metadata(&MetadataSource::File(path.clone())).is_empty());
        assert!(matches!(
            try_read_metadata(&MetadataSource::File(path)),
            Err(LauncherError::MetadataUnreadable { .. })
        ));
    }

    #[test]
    fn test_read_embedded_archive_entry() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("Demo.app");
        let mut writer = zip::ZipWriter::new(File::create(&path).unwrap());
        let options = zip::write::SimpleFileOptions::default();
        writer.start_file(ARCHIVE_MANIFEST_ENTRY, options).unwrap();
        writer
            .write_all(b"Entry-Point: process\nExec-Path: bin/demo\n")
            .unwrap();
        writer.finish().unwrap();

        let snapshot = read_metadata(&MetadataSource::Archive(path));
        assert_eq!(snapshot.get("Entry-Point"), Some("process"));
        assert_eq!(snapshot.get("Exec-Path"), Some("bin/demo"));
    }

    #[test]
    fn test_archive_without_manifest_entry_is_empty() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("Demo.app");
        let mut writer = zip::ZipWriter::new(File::create(&path).unwrap());
        writer
            .start_file("readme.txt", zip::write::SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"hello").unwrap();
        writer.finish().unwrap();

        assert!(read_metadata(&MetadataSource::Archive(path)).is_empty());
    }

    #[test]
    fn test_non_archive_is_empty() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("Demo.app");
        std::fs::write(&path, "not a zip").unwrap();
        assert!(read_metadata(&MetadataSource::Archive(path)).is_empty());
    }
}
