//! Content package handling: structural validation of uploaded archives,
//! extraction into a working directory, and building output archives.

pub mod archive;
pub mod extract;
pub mod validator;

pub use archive::{ArchiveBuilder, ArchiveMeta, sha256_file};
pub use extract::{ExtractSummary, extract};
pub use validator::{PackageRules, PackageValidator, PackageViolation};

#[cfg(test)]
pub(crate) mod test_support {
    use std::io::Write;
    use std::path::{Path, PathBuf};

    use zip::write::SimpleFileOptions;

    /// Write a ZIP archive at `dir/name` with the given `(entry, contents)` pairs.
    /// Entry names ending in `/` become directories.
    pub fn write_zip(dir: &Path, name: &str, entries: &[(&str, &str)]) -> PathBuf {
        let path = dir.join(name);
        let file = std::fs::File::create(&path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        let options = SimpleFileOptions::default();
        for (entry, contents) in entries {
            if entry.ends_with('/') {
                writer.add_directory(*entry, options).unwrap();
            } else {
                writer.start_file(*entry, options).unwrap();
                writer.write_all(contents.as_bytes()).unwrap();
            }
        }
        writer.finish().unwrap();
        path
    }
}
