//! Unpacking an uploaded archive into a working directory.

use std::fs::File;
use std::path::Path;

use tracing::{debug, info, instrument};

use contentflow_shared::{ContentFlowError, Result};

/// What an extraction wrote to disk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractSummary {
    pub files: usize,
    pub directories: usize,
    pub bytes: u64,
}

/// Unpack `archive` into `destination`, creating directories as needed.
///
/// Entries are written under their enclosed (sanitized) names; an entry that
/// would escape `destination` aborts the extraction. Every failure is an
/// `Extraction` error for `archive`.
#[instrument(skip_all, fields(archive = %archive.display(), dest = %destination.display()))]
pub fn extract(archive: &Path, destination: &Path) -> Result<ExtractSummary> {
    let fail = |msg: String| ContentFlowError::extraction(archive, msg);

    let file = File::open(archive).map_err(|e| fail(format!("cannot open archive: {e}")))?;
    let mut zip = zip::ZipArchive::new(file).map_err(|e| fail(e.to_string()))?;

    std::fs::create_dir_all(destination)
        .map_err(|e| fail(format!("cannot create {}: {e}", destination.display())))?;

    let mut summary = ExtractSummary::default();

    for i in 0..zip.len() {
        let mut entry = zip.by_index(i).map_err(|e| fail(e.to_string()))?;
        let relative = entry
            .enclosed_name()
            .ok_or_else(|| fail(format!("unsafe entry path `{}`", entry.name())))?;
        let target = destination.join(&relative);

        if entry.is_dir() {
            std::fs::create_dir_all(&target)
                .map_err(|e| fail(format!("cannot create {}: {e}", target.display())))?;
            summary.directories += 1;
            continue;
        }

        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| fail(format!("cannot create {}: {e}", parent.display())))?;
        }

        let mut out = File::create(&target)
            .map_err(|e| fail(format!("cannot create {}: {e}", target.display())))?;
        let written = std::io::copy(&mut entry, &mut out)
            .map_err(|e| fail(format!("cannot write {}: {e}", target.display())))?;

        debug!(entry = %relative.display(), bytes = written, "extracted entry");
        summary.files += 1;
        summary.bytes += written;
    }

    info!(
        files = summary.files,
        directories = summary.directories,
        bytes = summary.bytes,
        "archive extracted"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::write_zip;

    #[test]
    fn extracts_files_and_directories() {
        let dir = tempfile::tempdir().unwrap();
        let zip = write_zip(
            dir.path(),
            "pkg.zip",
            &[
                ("index.ecml", "<theme/>"),
                ("assets/", ""),
                ("assets/img/bg.png", "png-bytes"),
            ],
        );
        let dest = dir.path().join("work");

        let summary = extract(&zip, &dest).unwrap();

        assert_eq!(summary.files, 2);
        assert_eq!(summary.directories, 1);
        assert_eq!(summary.bytes, ("<theme/>".len() + "png-bytes".len()) as u64);
        assert_eq!(
            std::fs::read_to_string(dest.join("assets/img/bg.png")).unwrap(),
            "png-bytes"
        );
        assert!(dest.join("index.ecml").is_file());
    }

    #[test]
    fn corrupt_archive_is_extraction_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.zip");
        std::fs::write(&path, b"PK\x03\x04 truncated").unwrap();

        let err = extract(&path, &dir.path().join("out")).unwrap_err();
        assert_eq!(err.code(), "ZIP_EXTRACTION");
        assert!(!err.is_client_error());
    }

    #[test]
    fn escaping_entry_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let zip = write_zip(dir.path(), "slip.zip", &[("../../escape.txt", "x")]);

        let err = extract(&zip, &dir.path().join("out")).unwrap_err();
        assert!(matches!(err, ContentFlowError::Extraction { .. }));
        assert!(!dir.path().join("escape.txt").exists());
    }
}
