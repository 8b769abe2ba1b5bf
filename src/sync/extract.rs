//! Extract stage: install staged resources into the application directory
//!
//! `.zip`, `.tar.gz` and `.tgz` files are unpacked; anything else is copied
//! verbatim, replacing an existing file of the same name. Zero-length and
//! hidden entries are skipped. The staged metadata file is installed last.

use std::fs::{self, File};
use std::io;
use std::path::Path;

use flate2::read::GzDecoder;

use super::{StageProgress, confined_join, fraction, is_hidden, is_root_entry};
use crate::context::RuntimeContext;
use crate::error::Result;
use crate::transport::write_atomically;

/// Staged file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Zip,
    TarGz,
    /// Not an archive: copied as-is
    Plain,
}

impl ArchiveKind {
    pub fn detect(path: &Path) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        if name.ends_with(".zip") {
            ArchiveKind::Zip
        } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            ArchiveKind::TarGz
        } else {
            ArchiveKind::Plain
        }
    }
}

/// Install every staged file, then the staged metadata
pub fn extract(
    ctx: &RuntimeContext,
    staged: &[impl AsRef<Path>],
    progress: &mut dyn StageProgress,
) -> Result<()> {
    let total = staged.len();
    for (i, file) in staged.iter().enumerate() {
        let file = file.as_ref();
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        progress.message(&format!("Extracting {name} ({}/{total})", i + 1));

        let mut entry_progress = |done: usize, entries: usize| {
            #[allow(clippy::cast_precision_loss)]
            let overall = (i as f64 + fraction(done, entries)) / total as f64;
            progress.progress(overall);
        };

        let installed = match ArchiveKind::detect(file) {
            ArchiveKind::Zip => extract_zip(file, &ctx.app_dir, &mut entry_progress)?,
            ArchiveKind::TarGz => extract_tar_gz(file, &ctx.app_dir, &mut entry_progress)?,
            ArchiveKind::Plain => {
                install_file(file, &ctx.app_dir.join(&name))?;
                entry_progress(1, 1);
                1
            }
        };
        tracing::info!(resource = %name, entries = installed, "Installed resource");
    }

    install_manifest(ctx)?;
    progress.progress(1.0);
    Ok(())
}

/// Copy the staged metadata into the application directory
pub fn install_manifest(ctx: &RuntimeContext) -> Result<()> {
    let staged = ctx.staged_manifest();
    let installed = ctx.installed_manifest();
    if !staged.is_file() {
        return Err(crate::error::install_failed(
            installed.display().to_string(),
            "no staged metadata file",
        ));
    }
    install_file(&staged, &installed)?;
    tracing::debug!(path = %installed.display(), "Installed metadata");
    Ok(())
}

fn install_file(source: &Path, dest: &Path) -> Result<()> {
    let install_failed = |e: &dyn std::fmt::Display| {
        crate::error::install_failed(dest.display().to_string(), e.to_string())
    };
    let mut reader = File::open(source).map_err(|e| install_failed(&e))?;
    write_atomically(dest, |out| io::copy(&mut reader, out).map_err(|e| install_failed(&e)))?;
    Ok(())
}

/// Unpack a zip archive into `dest`; returns the number of installed entries
pub fn extract_zip(
    archive: &Path,
    dest: &Path,
    on_entry: &mut dyn FnMut(usize, usize),
) -> Result<usize> {
    let archive_name = archive.display().to_string();
    let failed = |e: &dyn std::fmt::Display| crate::error::extract_failed(&archive_name, e.to_string());

    let file = File::open(archive).map_err(|e| failed(&e))?;
    let mut zip = zip::ZipArchive::new(file).map_err(|e| failed(&e))?;
    let total = zip.len();
    let mut installed = 0;

    for i in 0..total {
        let mut entry = zip.by_index(i).map_err(|e| failed(&e))?;
        let raw_name = entry.name().to_string();
        let relative = entry
            .enclosed_name()
            .ok_or_else(|| crate::error::unsafe_archive_entry(&archive_name, &raw_name))?;
        if is_root_entry(&relative) {
            on_entry(i + 1, total);
            continue;
        }
        let target = confined_join(dest, &relative)
            .ok_or_else(|| crate::error::unsafe_archive_entry(&archive_name, &raw_name))?;

        if is_hidden(&relative) {
            tracing::debug!(entry = %raw_name, "Skipping hidden entry");
        } else if entry.is_dir() {
            fs::create_dir_all(&target).map_err(|e| failed(&e))?;
        } else if entry.size() == 0 {
            tracing::debug!(entry = %raw_name, "Skipping empty entry");
        } else {
            write_entry(&target, &mut entry).map_err(|e| failed(&e))?;
            installed += 1;
        }
        on_entry(i + 1, total);
    }

    Ok(installed)
}

/// Unpack a gzip-compressed tar archive into `dest`; returns the number of installed entries
pub fn extract_tar_gz(
    archive: &Path,
    dest: &Path,
    on_entry: &mut dyn FnMut(usize, usize),
) -> Result<usize> {
    let archive_name = archive.display().to_string();
    let failed = |e: &dyn std::fmt::Display| crate::error::extract_failed(&archive_name, e.to_string());

    let open = || -> Result<tar::Archive<GzDecoder<File>>> {
        let file = File::open(archive).map_err(|e| failed(&e))?;
        Ok(tar::Archive::new(GzDecoder::new(file)))
    };

    // Entry count is only known after a full pass
    let total = open()?.entries().map_err(|e| failed(&e))?.count();

    let mut tar = open()?;
    let mut installed = 0;
    for (i, entry) in tar.entries().map_err(|e| failed(&e))?.enumerate() {
        let mut entry = entry.map_err(|e| failed(&e))?;
        let relative = entry.path().map_err(|e| failed(&e))?.into_owned();
        let raw_name = relative.display().to_string();
        if is_root_entry(&relative) {
            on_entry(i + 1, total);
            continue;
        }
        let target = confined_join(dest, &relative)
            .ok_or_else(|| crate::error::unsafe_archive_entry(&archive_name, &raw_name))?;
        let kind = entry.header().entry_type();

        if is_hidden(&relative) {
            tracing::debug!(entry = %raw_name, "Skipping hidden entry");
        } else if kind.is_dir() {
            fs::create_dir_all(&target).map_err(|e| failed(&e))?;
        } else if !kind.is_file() {
            tracing::debug!(entry = %raw_name, "Skipping non-regular entry");
        } else if entry.size() == 0 {
            tracing::debug!(entry = %raw_name, "Skipping empty entry");
        } else {
            write_entry(&target, &mut entry).map_err(|e| failed(&e))?;
            installed += 1;
        }
        on_entry(i + 1, total);
    }

    Ok(installed)
}

fn write_entry(target: &Path, reader: &mut dyn io::Read) -> io::Result<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut out = File::create(target)?;
    io::copy(reader, &mut out)?;
    tracing::debug!(path = %target.display(), "Extracted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LauncherError;
    use crate::sync::NoStageProgress;
    use crate::test_fixtures::{write_tar_gz, write_zip};
    use tempfile::TempDir;

    fn setup() -> (TempDir, RuntimeContext) {
        let temp = TempDir::new().unwrap();
        let ctx = RuntimeContext::new(temp.path(), "App");
        ctx.prepare().unwrap();
        fs::write(ctx.staged_manifest(), "Lib-Version: 2\n").unwrap();
        (temp, ctx)
    }

    #[test]
    fn test_detect_kind() {
        assert_eq!(ArchiveKind::detect(Path::new("libs.ZIP")), ArchiveKind::Zip);
        assert_eq!(ArchiveKind::detect(Path::new("a.tar.gz")), ArchiveKind::TarGz);
        assert_eq!(ArchiveKind::detect(Path::new("a.tgz")), ArchiveKind::TarGz);
        assert_eq!(ArchiveKind::detect(Path::new("App.app")), ArchiveKind::Plain);
    }

    #[test]
    fn test_extract_zip_creates_dirs_and_skips_empty_and_hidden() {
        let (_temp, ctx) = setup();
        let staged = ctx.temp_dir.join("libs.zip");
        write_zip(
            &staged,
            &[
                ("libs/", b""),
                ("libs/a.so", b"a"),
                ("libs/deep/b.so", b"b"),
                ("libs/empty.txt", b""),
                ("libs/.hidden", b"secret"),
                (".git/config", b"x"),
            ],
        );

        extract(&ctx, &[&staged], &mut NoStageProgress).unwrap();

        assert_eq!(fs::read_to_string(ctx.app_dir.join("libs/a.so")).unwrap(), "a");
        assert_eq!(
            fs::read_to_string(ctx.app_dir.join("libs/deep/b.so")).unwrap(),
            "b"
        );
        assert!(!ctx.app_dir.join("libs/empty.txt").exists());
        assert!(!ctx.app_dir.join("libs/.hidden").exists());
        assert!(!ctx.app_dir.join(".git").exists());
        assert!(ctx.installed_manifest().is_file());
    }

    #[test]
    fn test_extract_tar_gz() {
        let (_temp, ctx) = setup();
        let staged = ctx.temp_dir.join("resources.tar.gz");
        write_tar_gz(
            &staged,
            &[("resources/icon.png", b"png"), ("resources/none", b"")],
        );

        extract(&ctx, &[&staged], &mut NoStageProgress).unwrap();

        assert_eq!(
            fs::read_to_string(ctx.app_dir.join("resources/icon.png")).unwrap(),
            "png"
        );
        assert!(!ctx.app_dir.join("resources/none").exists());
    }

    #[test]
    fn test_extract_tar_gz_with_leading_dot_entries() {
        let (_temp, ctx) = setup();
        let staged = ctx.temp_dir.join("libs.tar.gz");
        write_tar_gz(
            &staged,
            &[("./", b""), ("./libs/", b""), ("./libs/a.so", b"a")],
        );

        let installed = extract(&ctx, &[&staged], &mut NoStageProgress);

        assert!(installed.is_ok(), "{installed:?}");
        assert_eq!(fs::read_to_string(ctx.app_dir.join("libs/a.so")).unwrap(), "a");
        assert!(ctx.installed_manifest().is_file());
    }

    #[test]
    fn test_tar_gz_parent_entry_is_rejected() {
        let (_temp, ctx) = setup();
        let staged = ctx.temp_dir.join("evil.tar.gz");
        write_tar_gz(&staged, &[("../escape.txt", b"boom")]);

        let err = extract(&ctx, &[&staged], &mut NoStageProgress).unwrap_err();

        assert!(matches!(err, LauncherError::UnsafeArchiveEntry { .. }));
    }

    #[test]
    fn test_plain_file_is_copied_over_existing() {
        let (_temp, ctx) = setup();
        fs::write(ctx.app_dir.join("App.app"), "old").unwrap();
        let staged = ctx.temp_dir.join("App.app");
        fs::write(&staged, "new").unwrap();

        extract(&ctx, &[&staged], &mut NoStageProgress).unwrap();

        assert_eq!(fs::read_to_string(ctx.app_dir.join("App.app")).unwrap(), "new");
    }

    #[test]
    fn test_zip_slip_is_rejected() {
        let (_temp, ctx) = setup();
        let staged = ctx.temp_dir.join("evil.zip");
        write_zip(&staged, &[("../../escape.txt", b"boom")]);

        let err = extract(&ctx, &[&staged], &mut NoStageProgress).unwrap_err();

        assert!(matches!(err, LauncherError::UnsafeArchiveEntry { .. }));
        assert!(!ctx.installed_manifest().exists());
    }

    #[test]
    fn test_corrupt_zip_is_extract_error() {
        let (_temp, ctx) = setup();
        let staged = ctx.temp_dir.join("broken.zip");
        fs::write(&staged, "not a zip").unwrap();

        let err = extract(&ctx, &[&staged], &mut NoStageProgress).unwrap_err();
        assert!(matches!(err, LauncherError::ExtractFailed { .. }));
    }

    #[test]
    fn test_missing_staged_manifest_fails_install() {
        let temp = TempDir::new().unwrap();
        let ctx = RuntimeContext::new(temp.path(), "App");
        ctx.prepare().unwrap();

        let err = extract(&ctx, &[] as &[&Path], &mut NoStageProgress).unwrap_err();
        assert!(matches!(err, LauncherError::InstallFailed { .. }));
    }

    #[test]
    fn test_extract_progress_is_monotonic_and_complete() {
        struct Recorder(Vec<f64>);
        impl StageProgress for Recorder {
            fn progress(&mut self, fraction: f64) {
                self.0.push(fraction);
            }
            fn message(&mut self, _text: &str) {}
        }

        let (_temp, ctx) = setup();
        let first = ctx.temp_dir.join("a.zip");
        let second = ctx.temp_dir.join("b.zip");
        write_zip(&first, &[("a/1", b"1"), ("a/2", b"2")]);
        write_zip(&second, &[("b/1", b"1")]);

        let mut recorder = Recorder(Vec::new());
        extract(&ctx, &[&first, &second], &mut recorder).unwrap();

        assert!(recorder.0.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(recorder.0.last().copied(), Some(1.0));
    }
}
