use std::collections::HashSet;

use tracing::{info, instrument, warn};

use contentflow_ecrf::{Plugin, to_ecml};
use contentflow_package::ArchiveBuilder;
use contentflow_shared::{ContentFlowError, Result, XML_MARKUP_FILE};

use super::{MEDIA_KIND, is_remote, local_source};
use crate::{Processor, ProcessorContext};

/// Writes `artifacts/<content_id>.zip` with the serialized tree as
/// `index.ecml` plus every local media file.
#[derive(Debug, Clone)]
pub struct PackageArtifact {
    context: ProcessorContext,
}

impl PackageArtifact {
    pub fn new(context: ProcessorContext) -> Self {
        Self { context }
    }
}

impl Processor for PackageArtifact {
    fn name(&self) -> &str {
        "package_artifact"
    }

    #[instrument(skip_all, fields(content_id = %self.context.content_id()))]
    fn execute(&self, tree: Plugin) -> Result<Plugin> {
        if tree.is_empty() {
            warn!("empty content tree, no artifact written");
            return Ok(tree);
        }

        let markup = to_ecml(&tree)?;
        let mut builder = ArchiveBuilder::create(&self.context.artifact_path())?;
        builder.add_bytes(XML_MARKUP_FILE, markup.as_bytes())?;

        let mut added = HashSet::new();
        for media in tree.descendants(MEDIA_KIND) {
            let Some(src) = media.attribute("src").filter(|s| !is_remote(s)) else {
                continue;
            };
            let entry = local_source(src)?;
            if entry == XML_MARKUP_FILE || !added.insert(entry.clone()) {
                continue;
            }

            let path = self.context.base_path().join(&entry);
            if !path.is_file() {
                return Err(ContentFlowError::validation(format!(
                    "cannot package missing asset `{entry}`"
                )));
            }
            builder.add_file(&entry, &path)?;
        }

        let meta = builder.finish()?;
        info!(
            path = %meta.path.display(),
            entries = meta.entries,
            sha256 = %meta.sha256,
            "artifact packaged"
        );
        Ok(tree)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn entry_names(path: &std::path::Path) -> Vec<String> {
        let zip = zip::ZipArchive::new(std::fs::File::open(path).unwrap()).unwrap();
        let mut names: Vec<String> = zip.file_names().map(String::from).collect();
        names.sort();
        names
    }

    #[test]
    fn packages_markup_and_local_media() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("assets")).unwrap();
        std::fs::write(dir.path().join("assets/bg.png"), b"png").unwrap();

        let tree = Plugin::new("theme").with_child(
            Plugin::new("manifest")
                .with_child(Plugin::new("media").with_attribute("src", "assets/bg.png"))
                .with_child(Plugin::new("media").with_attribute("src", "./assets/bg.png"))
                .with_child(Plugin::new("media").with_attribute("src", "https://x/logo.png")),
        );
        let ctx = ProcessorContext::new(dir.path(), "do_1");

        let out = PackageArtifact::new(ctx.clone()).execute(tree.clone()).unwrap();
        assert_eq!(out, tree);

        let artifact = ctx.artifact_path();
        assert_eq!(entry_names(&artifact), vec!["assets/bg.png", "index.ecml"]);

        let mut zip = zip::ZipArchive::new(std::fs::File::open(&artifact).unwrap()).unwrap();
        let mut markup = String::new();
        zip.by_name("index.ecml")
            .unwrap()
            .read_to_string(&mut markup)
            .unwrap();
        assert!(markup.contains("<theme>"));
    }

    #[test]
    fn empty_tree_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ProcessorContext::new(dir.path(), "do_1");
        let out = PackageArtifact::new(ctx.clone()).execute(Plugin::default()).unwrap();
        assert!(out.is_empty());
        assert!(!ctx.artifact_path().exists());
    }

    #[test]
    fn missing_media_fails() {
        let dir = tempfile::tempdir().unwrap();
        let tree = Plugin::new("theme")
            .with_child(Plugin::new("media").with_attribute("src", "assets/none.png"));
        let err = PackageArtifact::new(ProcessorContext::new(dir.path(), "do_1"))
            .execute(tree)
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION");
    }
}
