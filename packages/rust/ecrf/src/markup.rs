//! Markup file detection and loading inside a working directory.

use std::path::Path;

use tracing::{debug, info, instrument};

use contentflow_shared::{ContentFlowError, JSON_MARKUP_FILE, MarkupType, Result, XML_MARKUP_FILE};

/// Markup text together with its detected dialect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkupDocument {
    /// `None` when neither markup file exists.
    pub markup_type: Option<MarkupType>,
    pub text: String,
}

/// Determine the dialect of the markup file in `dir`.
///
/// Returns `None` when neither `index.json` nor `index.ecml` is present and
/// fails with `MultipleMarkupFiles` when both are.
#[instrument(skip_all, fields(dir = %dir.display()))]
pub fn detect_markup_type(dir: &Path) -> Result<Option<MarkupType>> {
    let has_json = dir.join(JSON_MARKUP_FILE).is_file();
    let has_xml = dir.join(XML_MARKUP_FILE).is_file();

    let detected = match (has_json, has_xml) {
        (true, true) => {
            return Err(ContentFlowError::MultipleMarkupFiles {
                dir: dir.to_path_buf(),
            });
        }
        (true, false) => Some(MarkupType::Json),
        (false, true) => Some(MarkupType::Xml),
        (false, false) => None,
    };

    match detected {
        Some(markup_type) => info!(%markup_type, "detected markup type"),
        None => info!("no markup file found"),
    }
    Ok(detected)
}

/// Read the markup file in `dir`.
///
/// Returns an empty string when neither file exists and fails with
/// `MultipleMarkupFiles` when both are.
pub fn load_markup_text(dir: &Path) -> Result<String> {
    match detect_markup_type(dir)? {
        Some(markup_type) => read_markup(dir, markup_type),
        None => Ok(String::new()),
    }
}

fn read_markup(dir: &Path, markup_type: MarkupType) -> Result<String> {
    let path = dir.join(markup_type.file_name());
    debug!(path = %path.display(), "reading markup file");
    std::fs::read_to_string(&path).map_err(|source| ContentFlowError::MarkupRead { path, source })
}

/// Detect and read the markup of `dir` in one step.
pub fn load_markup(dir: &Path) -> Result<MarkupDocument> {
    let markup_type = detect_markup_type(dir)?;
    let text = match markup_type {
        Some(markup_type) => read_markup(dir, markup_type)?,
        None => String::new(),
    };
    Ok(MarkupDocument { markup_type, text })
}
