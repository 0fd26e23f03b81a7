//! Built-in processing stages.

mod assets;
mod controllers;
mod package;

pub use assets::{NormalizeAssetPaths, ValidateMissingAssets};
pub use controllers::EmbedControllers;
pub use package::PackageArtifact;

use contentflow_shared::{ContentFlowError, Result};

/// Node kind of asset declarations.
pub const MEDIA_KIND: &str = "media";

/// Node kind of controller declarations.
pub const CONTROLLER_KIND: &str = "controller";

/// True for `http://` and `https://` sources, which are never resolved locally.
pub fn is_remote(src: &str) -> bool {
    let lower = src.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Forward-slash path relative to the working directory.
///
/// `None` when the path has a `..` component.
pub fn normalize_src(src: &str) -> Option<String> {
    let mut path = src.trim().replace('\\', "/");
    loop {
        if let Some(rest) = path.strip_prefix("./") {
            path = rest.to_string();
        } else if let Some(rest) = path.strip_prefix('/') {
            path = rest.to_string();
        } else {
            break;
        }
    }
    if path.split('/').any(|segment| segment == "..") {
        return None;
    }
    Some(path)
}

/// [`normalize_src`], failing with `Validation` for paths leaving the
/// working directory.
pub(crate) fn local_source(src: &str) -> Result<String> {
    normalize_src(src).ok_or_else(|| {
        ContentFlowError::validation(format!("source `{src}` escapes the working directory"))
    })
}
