//! Unpacking of zip and jar archives.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;
use zip::result::ZipError;
use zip::ZipArchive;

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("zip error: {0}")]
    Zip(#[from] ZipError),

    #[error("archive entry '{entry}' would be written outside the destination")]
    UnsafePath { entry: String },
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> ArchiveError + '_ {
    move |source| ArchiveError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractSummary {
    pub files: usize,
    pub directories: usize,
}

/// Unpacks `archive` into `destination`, creating directories as needed and
/// overwriting existing files.
pub fn extract(
    archive: impl AsRef<Path>,
    destination: impl AsRef<Path>,
) -> Result<ExtractSummary, ArchiveError> {
    let archive = archive.as_ref();
    let destination = destination.as_ref();

    let file = File::open(archive).map_err(io_error(archive))?;
    let mut zip = ZipArchive::new(file)?;
    fs::create_dir_all(destination).map_err(io_error(destination))?;

    let mut summary = ExtractSummary::default();
    for i in 0..zip.len() {
        let mut entry = zip.by_index(i)?;
        let relative = entry
            .enclosed_name()
            .map(Path::to_path_buf)
            .ok_or_else(|| ArchiveError::UnsafePath {
                entry: entry.name().to_string(),
            })?;
        let target = destination.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&target).map_err(io_error(&target))?;
            summary.directories += 1;
            continue;
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(io_error(parent))?;
        }
        debug!(entry = entry.name(), "extracting");
        let mut out = File::create(&target).map_err(io_error(&target))?;
        io::copy(&mut entry, &mut out).map_err(io_error(&target))?;
        summary.files += 1;
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::FileOptions;

    fn write_jar(path: &Path, entries: &[(&str, &[u8])]) {
        let file = File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options = FileOptions::default().compression_method(zip::CompressionMethod::Deflated);
        for (name, content) in entries {
            if name.ends_with('/') {
                zip.add_directory(*name, options).unwrap();
            } else {
                zip.start_file(*name, options).unwrap();
                zip.write_all(content).unwrap();
            }
        }
        zip.finish().unwrap();
    }

    #[test]
    fn extracts_nested_entries_and_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let jar = dir.path().join("app.jar");
        write_jar(
            &jar,
            &[
                ("META-INF/", b""),
                ("META-INF/MANIFEST.MF", b"Manifest-Version: 1.0\n"),
                ("com/sun/glass/ui/Application.class", b"\xca\xfe\xba\xbe"),
            ],
        );

        let dest = dir.path().join("out");
        fs::create_dir_all(dest.join("com/sun/glass/ui")).unwrap();
        fs::write(dest.join("com/sun/glass/ui/Application.class"), b"stale").unwrap();

        let summary = extract(&jar, &dest).unwrap();
        assert_eq!(summary.files, 2);
        assert_eq!(summary.directories, 1);
        assert_eq!(
            fs::read(dest.join("com/sun/glass/ui/Application.class")).unwrap(),
            b"\xca\xfe\xba\xbe"
        );
    }

    #[test]
    fn rejects_entries_escaping_the_destination() {
        let dir = tempfile::tempdir().unwrap();
        let jar = dir.path().join("evil.zip");
        write_jar(&jar, &[("../escape.txt", b"nope")]);

        let err = extract(&jar, dir.path().join("out")).unwrap_err();
        assert!(matches!(err, ArchiveError::UnsafePath { .. }));
        assert!(!dir.path().join("escape.txt").exists());
    }

    #[test]
    fn missing_archive_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = extract(dir.path().join("absent.jar"), dir.path()).unwrap_err();
        assert!(matches!(err, ArchiveError::Io { .. }));
    }
}
