use std::path::PathBuf;

use tracing::{debug, instrument, warn};

use contentflow_ecrf::Plugin;
use contentflow_shared::{ContentFlowError, Result};

use super::{MEDIA_KIND, is_remote, local_source};
use crate::Processor;

/// Rewrites local `media@src` values to forward-slash relative paths.
#[derive(Debug, Clone, Copy, Default)]
pub struct NormalizeAssetPaths;

impl Processor for NormalizeAssetPaths {
    fn name(&self) -> &str {
        "normalize_asset_paths"
    }

    fn execute(&self, mut tree: Plugin) -> Result<Plugin> {
        let mut rewritten = 0usize;
        tree.try_visit_mut(MEDIA_KIND, &mut |media| {
            let Some(src) = media.attribute("src") else {
                return Ok::<(), ContentFlowError>(());
            };
            if is_remote(src) {
                return Ok(());
            }
            let normalized = local_source(src)?;
            if normalized != src {
                media.set_attribute("src", normalized);
                rewritten += 1;
            }
            Ok(())
        })?;
        debug!(rewritten, "normalized asset paths");
        Ok(tree)
    }
}

/// Fails when a local media file is missing from the working directory.
#[derive(Debug, Clone)]
pub struct ValidateMissingAssets {
    base_path: PathBuf,
}

impl ValidateMissingAssets {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }
}

impl Processor for ValidateMissingAssets {
    fn name(&self) -> &str {
        "validate_missing_assets"
    }

    #[instrument(skip_all, fields(base = %self.base_path.display()))]
    fn execute(&self, tree: Plugin) -> Result<Plugin> {
        let mut missing = Vec::new();
        let mut checked = 0usize;

        for media in tree.descendants(MEDIA_KIND) {
            let Some(src) = media.attribute("src") else {
                continue;
            };
            if is_remote(src) {
                continue;
            }
            checked += 1;
            if !self.base_path.join(local_source(src)?).is_file() {
                let label = media.attribute("id").unwrap_or(src);
                warn!(asset = label, src, "missing asset");
                missing.push(label.to_string());
            }
        }

        if !missing.is_empty() {
            return Err(ContentFlowError::validation(format!(
                "missing assets: {}",
                missing.join(", ")
            )));
        }

        debug!(checked, "all local assets present");
        Ok(tree)
    }
}
