//! Finalization boundary and the default manifest-writing finalizer.

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::{info, instrument};

use contentflow_ecrf::Plugin;
use contentflow_package::sha256_file;
use contentflow_processors::artifact_path;
use contentflow_shared::{
    CURRENT_SCHEMA_VERSION, ContentFlowError, ContentNode, MarkupType, Operation, Result,
    metadata_keys,
};

/// Manifest written into the working directory by [`ManifestFinalizer`].
pub const MANIFEST_FILE: &str = "content-manifest.json";

// ---------------------------------------------------------------------------
// Response
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Ok,
    Failed,
}

/// A deliberately swallowed failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The uploaded archive failed validation; nothing was extracted.
    InvalidPackage,
    /// The existing artifact could not be fetched; no download URL was set.
    ArtifactUnavailable,
}

/// Result of a pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineResponse {
    pub status: ResponseStatus,
    #[serde(default)]
    pub payload: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skipped: Option<SkipReason>,
}

impl PipelineResponse {
    /// The empty default result: `ok`, no payload, no skip.
    pub fn empty() -> Self {
        Self {
            status: ResponseStatus::Ok,
            payload: Map::new(),
            skipped: None,
        }
    }

    /// An empty result marked with a skip reason.
    pub fn skipped(reason: SkipReason) -> Self {
        Self {
            skipped: Some(reason),
            ..Self::empty()
        }
    }

    pub fn ok(payload: Map<String, Value>) -> Self {
        Self {
            payload,
            ..Self::empty()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::empty()
    }
}

impl Default for PipelineResponse {
    fn default() -> Self {
        Self::empty()
    }
}

// ---------------------------------------------------------------------------
// Finalizer boundary
// ---------------------------------------------------------------------------

/// Everything the pipeline hands to finalization.
#[derive(Debug, Clone, Copy)]
pub struct FinalizeRequest<'a> {
    pub operation: Operation,
    pub content_id: &'a str,
    pub base_path: &'a Path,
    /// Processed tree; absent on the publish path when compression was skipped.
    pub tree: Option<&'a Plugin>,
    /// Uploaded archive (upload only).
    pub file: Option<&'a Path>,
    pub markup_type: Option<MarkupType>,
    pub node: &'a ContentNode,
}

/// Terminal pipeline step. Implementations persist whatever they need and
/// return the run's result.
pub trait Finalizer: Send + Sync {
    fn finalize(&self, request: FinalizeRequest<'_>) -> Result<PipelineResponse>;
}

// ---------------------------------------------------------------------------
// Manifest finalizer
// ---------------------------------------------------------------------------

/// Checksum of a file referenced by the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChecksum {
    pub path: PathBuf,
    pub sha256: String,
    pub size_bytes: u64,
}

/// `content-manifest.json` schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentManifest {
    pub schema_version: u32,
    pub content_id: String,
    pub operation: Operation,
    pub markup_type: Option<MarkupType>,
    pub node_identifier: String,
    pub node_metadata: Map<String, Value>,
    pub plugin_count: usize,
    pub root_kind: Option<String>,
    pub package: Option<FileChecksum>,
    pub artifact: Option<FileChecksum>,
    pub download_url: Option<String>,
    pub finalized_at: String,
}

/// Writes `<base>/content-manifest.json` atomically and returns a payload
/// carrying the processed tree and a manifest summary.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManifestFinalizer;

impl Finalizer for ManifestFinalizer {
    #[instrument(skip_all, fields(content_id = %request.content_id, operation = %request.operation))]
    fn finalize(&self, request: FinalizeRequest<'_>) -> Result<PipelineResponse> {
        let tree = request.tree.filter(|t| !t.is_empty());

        let package = request.file.map(checksum).transpose()?;
        // only a publish that compressed a tree produced the artifact
        let artifact_file = artifact_path(request.base_path, request.content_id);
        let compressed = request.operation == Operation::Publish && tree.is_some();
        let artifact = if compressed && artifact_file.is_file() {
            Some(checksum(&artifact_file)?)
        } else {
            None
        };

        let manifest = ContentManifest {
            schema_version: CURRENT_SCHEMA_VERSION,
            content_id: request.content_id.to_string(),
            operation: request.operation,
            markup_type: request.markup_type,
            node_identifier: request.node.identifier.clone(),
            node_metadata: request.node.metadata.clone(),
            plugin_count: tree.map_or(0, Plugin::count),
            root_kind: tree.map(|t| t.kind.clone()),
            package,
            artifact,
            download_url: request
                .node
                .metadata_str(metadata_keys::DOWNLOAD_URL)
                .map(String::from),
            finalized_at: Utc::now().to_rfc3339(),
        };

        let manifest_path = request.base_path.join(MANIFEST_FILE);
        write_json_atomic(&manifest_path, &manifest)?;
        info!(path = %manifest_path.display(), plugins = manifest.plugin_count, "manifest written");

        let mut payload = Map::new();
        payload.insert("contentId".into(), json!(manifest.content_id));
        payload.insert("operation".into(), json!(manifest.operation));
        payload.insert("manifest".into(), json!(manifest_path));
        payload.insert("markupType".into(), json!(manifest.markup_type));
        payload.insert("pluginCount".into(), json!(manifest.plugin_count));
        if let Some(tree) = tree {
            let tree = serde_json::to_value(tree).map_err(|e| {
                ContentFlowError::Packaging(format!("failed to serialize content tree: {e}"))
            })?;
            payload.insert("tree".into(), tree);
        }
        if let Some(artifact) = &manifest.artifact {
            payload.insert("artifact".into(), json!(artifact));
        }
        if let Some(url) = &manifest.download_url {
            payload.insert("downloadUrl".into(), json!(url));
        }

        Ok(PipelineResponse::ok(payload))
    }
}

fn checksum(path: &Path) -> Result<FileChecksum> {
    let (sha256, size_bytes) = sha256_file(path)?;
    Ok(FileChecksum {
        path: path.to_path_buf(),
        sha256,
        size_bytes,
    })
}

/// Serialize `data` to a temp sibling, then rename over `path`.
fn write_json_atomic<T: Serialize>(path: &Path, data: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| ContentFlowError::Packaging(format!("failed to serialize manifest: {e}")))?;
    let temp = path.with_extension("json.tmp");
    std::fs::write(&temp, json).map_err(|e| ContentFlowError::io(&temp, e))?;
    std::fs::rename(&temp, path).map_err(|e| ContentFlowError::io(path, e))?;
    Ok(())
}
