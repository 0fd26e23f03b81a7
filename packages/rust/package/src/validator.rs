//! Structural validation of uploaded content packages.
//!
//! The pipeline only branches on [`PackageValidator::is_valid_package`];
//! [`PackageValidator::inspect`] reports which rule was broken.

use std::fs::File;
use std::path::Path;

use tracing::{debug, instrument, warn};

use contentflow_shared::{JSON_MARKUP_FILE, PipelineConfig, XML_MARKUP_FILE};

/// Archive extensions treated as nested packages.
const NESTED_ARCHIVE_EXTENSIONS: [&str; 2] = ["zip", "ecar"];

/// Limits applied to an uploaded package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRules {
    pub max_size_bytes: u64,
    pub max_entries: usize,
    pub allow_nested_archives: bool,
}

impl Default for PackageRules {
    fn default() -> Self {
        Self::from(&PipelineConfig::default())
    }
}

impl From<&PipelineConfig> for PackageRules {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            max_size_bytes: config.max_package_bytes,
            max_entries: config.max_package_entries,
            allow_nested_archives: config.allow_nested_archives,
        }
    }
}

/// The first rule an archive breaks.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PackageViolation {
    #[error("not a readable ZIP archive: {0}")]
    NotAnArchive(String),

    #[error("archive is {size} bytes, limit is {limit}")]
    TooLarge { size: u64, limit: u64 },

    #[error("archive has no entries")]
    Empty,

    #[error("archive has {count} entries, limit is {limit}")]
    TooManyEntries { count: usize, limit: usize },

    #[error("entry `{0}` escapes the extraction root")]
    UnsafePath(String),

    #[error("nested archive entry `{0}`")]
    NestedArchive(String),

    #[error("no markup file (index.json or index.ecml) in the archive")]
    MissingMarkup,

    #[error("archive contains both index.json and index.ecml")]
    MultipleMarkup,

    #[error("markup file `{0}` is not at the archive root")]
    MarkupNotAtRoot(String),
}

/// Checks uploaded archives against [`PackageRules`].
#[derive(Debug, Clone, Default)]
pub struct PackageValidator {
    rules: PackageRules,
}

impl PackageValidator {
    pub fn new(rules: PackageRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &PackageRules {
        &self.rules
    }

    /// True if `archive` satisfies every rule. A violation is logged at `warn`.
    pub fn is_valid_package(&self, archive: &Path) -> bool {
        match self.inspect(archive) {
            Ok(()) => true,
            Err(violation) => {
                warn!(archive = %archive.display(), %violation, "invalid content package");
                false
            }
        }
    }

    /// Check `archive` and return the first violated rule.
    #[instrument(skip_all, fields(archive = %archive.display()))]
    pub fn inspect(&self, archive: &Path) -> Result<(), PackageViolation> {
        let file = File::open(archive).map_err(|e| PackageViolation::NotAnArchive(e.to_string()))?;
        let size = file
            .metadata()
            .map_err(|e| PackageViolation::NotAnArchive(e.to_string()))?
            .len();
        let mut zip =
            zip::ZipArchive::new(file).map_err(|e| PackageViolation::NotAnArchive(e.to_string()))?;

        if size > self.rules.max_size_bytes {
            return Err(PackageViolation::TooLarge {
                size,
                limit: self.rules.max_size_bytes,
            });
        }

        let count = zip.len();
        if count == 0 {
            return Err(PackageViolation::Empty);
        }
        if count > self.rules.max_entries {
            return Err(PackageViolation::TooManyEntries {
                count,
                limit: self.rules.max_entries,
            });
        }

        let mut root_markup = Vec::new();
        let mut nested_markup: Option<String> = None;

        for i in 0..count {
            let entry = zip
                .by_index(i)
                .map_err(|e| PackageViolation::NotAnArchive(e.to_string()))?;
            let name = entry.name().to_string();
            let path = entry
                .enclosed_name()
                .ok_or_else(|| PackageViolation::UnsafePath(name.clone()))?;

            if entry.is_dir() {
                continue;
            }

            if !self.rules.allow_nested_archives && is_nested_archive(&path) {
                return Err(PackageViolation::NestedArchive(name));
            }

            match markup_location(&path) {
                Some(MarkupLocation::Root) => root_markup.push(name),
                Some(MarkupLocation::Nested) => {
                    nested_markup.get_or_insert(name);
                }
                None => {}
            }
        }

        match (root_markup.len(), nested_markup) {
            (1, _) => {
                debug!(markup = %root_markup[0], entries = count, "package is valid");
                Ok(())
            }
            (0, Some(nested)) => Err(PackageViolation::MarkupNotAtRoot(nested)),
            (0, None) => Err(PackageViolation::MissingMarkup),
            _ => Err(PackageViolation::MultipleMarkup),
        }
    }
}

enum MarkupLocation {
    Root,
    Nested,
}

fn markup_location(path: &Path) -> Option<MarkupLocation> {
    let file_name = path.file_name()?.to_str()?;
    if file_name != JSON_MARKUP_FILE && file_name != XML_MARKUP_FILE {
        return None;
    }
    if path.components().count() == 1 {
        Some(MarkupLocation::Root)
    } else {
        Some(MarkupLocation::Nested)
    }
}

fn is_nested_archive(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            NESTED_ARCHIVE_EXTENSIONS
                .iter()
                .any(|nested| ext.eq_ignore_ascii_case(nested))
        })
}
