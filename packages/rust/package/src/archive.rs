//! Building output archives atomically.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use contentflow_shared::{ContentFlowError, Result};

/// Metadata of a finished archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveMeta {
    pub path: PathBuf,
    pub sha256: String,
    pub size_bytes: u64,
    pub entries: usize,
}

/// Writes a ZIP archive to a temporary sibling file and renames it into
/// place on [`finish`](ArchiveBuilder::finish).
///
/// Dropping an unfinished builder, or a failed `finish`, removes the
/// temporary file.
pub struct ArchiveBuilder {
    target: PathBuf,
    temp: PathBuf,
    writer: Option<ZipWriter<File>>,
    options: SimpleFileOptions,
    entries: usize,
}

impl ArchiveBuilder {
    /// Start an archive that will end up at `target`.
    pub fn create(target: &Path) -> Result<Self> {
        let file_name = target
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                ContentFlowError::Packaging(format!("invalid archive path {}", target.display()))
            })?;
        let parent = target.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent).map_err(|e| ContentFlowError::io(parent, e))?;

        let temp = parent.join(format!(".{file_name}.tmp"));
        let file = File::create(&temp).map_err(|e| ContentFlowError::io(&temp, e))?;

        Ok(Self {
            target: target.to_path_buf(),
            temp,
            writer: Some(ZipWriter::new(file)),
            options: SimpleFileOptions::default(),
            entries: 0,
        })
    }

    /// Add an entry with in-memory contents.
    pub fn add_bytes(&mut self, name: &str, bytes: &[u8]) -> Result<()> {
        check_entry_name(name)?;
        let options = self.options;
        let writer = self.writer_mut()?;
        writer
            .start_file(name, options)
            .map_err(|e| packaging(name, e))?;
        writer.write_all(bytes).map_err(|e| packaging(name, e))?;
        self.entries += 1;
        debug!(entry = name, bytes = bytes.len(), "added archive entry");
        Ok(())
    }

    /// Add an entry copied from a file on disk.
    pub fn add_file(&mut self, name: &str, source: &Path) -> Result<()> {
        check_entry_name(name)?;
        let mut input = File::open(source).map_err(|e| ContentFlowError::io(source, e))?;
        let options = self.options;
        let writer = self.writer_mut()?;
        writer
            .start_file(name, options)
            .map_err(|e| packaging(name, e))?;
        let copied =
            std::io::copy(&mut input, writer).map_err(|e| ContentFlowError::io(source, e))?;
        self.entries += 1;
        debug!(entry = name, bytes = copied, "added archive entry");
        Ok(())
    }

    /// Number of entries added so far.
    pub fn entries(&self) -> usize {
        self.entries
    }

    /// Finish the archive, move it into place and checksum it.
    pub fn finish(mut self) -> Result<ArchiveMeta> {
        let writer = self
            .writer
            .take()
            .ok_or_else(|| ContentFlowError::Packaging("archive already finished".into()))?;

        let file = writer
            .finish()
            .map_err(|e| ContentFlowError::Packaging(format!("failed to finish archive: {e}")))?;
        file.sync_all().map_err(|e| ContentFlowError::io(&self.temp, e))?;
        drop(file);

        std::fs::rename(&self.temp, &self.target)
            .map_err(|e| ContentFlowError::io(&self.target, e))?;

        let (sha256, size_bytes) = sha256_file(&self.target)?;
        info!(path = %self.target.display(), entries = self.entries, size_bytes, "archive written");

        Ok(ArchiveMeta {
            path: self.target.clone(),
            sha256,
            size_bytes,
            entries: self.entries,
        })
    }

    fn writer_mut(&mut self) -> Result<&mut ZipWriter<File>> {
        self.writer
            .as_mut()
            .ok_or_else(|| ContentFlowError::Packaging("archive already finished".into()))
    }
}

impl Drop for ArchiveBuilder {
    fn drop(&mut self) {
        drop(self.writer.take());
        match std::fs::remove_file(&self.temp) {
            Ok(()) => debug!(path = %self.temp.display(), "removed unfinished archive"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.temp.display(), error = %e, "failed to remove unfinished archive"),
        }
    }
}

/// Hex SHA-256 digest and size of the file at `path`.
pub fn sha256_file(path: &Path) -> Result<(String, u64)> {
    let mut file = File::open(path).map_err(|e| ContentFlowError::io(path, e))?;
    let mut hasher = Sha256::new();
    let size = std::io::copy(&mut file, &mut hasher).map_err(|e| ContentFlowError::io(path, e))?;
    Ok((format!("{:x}", hasher.finalize()), size))
}

fn check_entry_name(name: &str) -> Result<()> {
    let unsafe_name = name.is_empty()
        || name.starts_with('/')
        || name.contains('\\')
        || name.split('/').any(|part| part == "..");
    if unsafe_name {
        return Err(ContentFlowError::Packaging(format!(
            "refusing to write archive entry `{name}`"
        )));
    }
    Ok(())
}

fn packaging(name: &str, e: impl std::fmt::Display) -> ContentFlowError {
    ContentFlowError::Packaging(format!("failed to write entry `{name}`: {e}"))
}
