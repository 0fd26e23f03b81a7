//! Pipeline controller: upload and publish flows.
//!
//! Upload: validate → extract → detect markup → parse → `extract` chain → finalize.
//! Publish: decide whether the artifact must be rebuilt, then either fetch
//! the existing artifact or run the `compress` chain, then finalize.

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde_json::Value;
use tracing::{info, instrument, warn};

use contentflow_ecrf::{load_markup, parse};
use contentflow_package::{PackageRules, PackageValidator, extract};
use contentflow_processors::{COMPRESS_CHAIN, EXTRACT_CHAIN, ProcessorRegistry};
use contentflow_shared::{
    ContentFlowError, ContentNode, Operation, PackageContext, PipelineConfig, Result,
    metadata_keys,
};

use crate::download::ArtifactDownloader;
use crate::finalize::{FinalizeRequest, Finalizer, ManifestFinalizer, PipelineResponse, SkipReason};
use crate::slug::package_file_name;

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called when a run completes.
    fn done(&self, response: &PipelineResponse);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn done(&self, _response: &PipelineResponse) {}
}

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

/// Per-run inputs. Upload needs both fields, publish needs `node`.
#[derive(Debug, Default)]
pub struct PipelineParams<'a> {
    /// Uploaded archive.
    pub file: Option<PathBuf>,
    /// Caller-owned metadata record; publish may set `downloadUrl` on it.
    pub node: Option<&'a mut ContentNode>,
}

impl<'a> PipelineParams<'a> {
    pub fn upload(file: impl Into<PathBuf>, node: &'a mut ContentNode) -> Self {
        Self {
            file: Some(file.into()),
            node: Some(node),
        }
    }

    pub fn publish(node: &'a mut ContentNode) -> Self {
        Self {
            file: None,
            node: Some(node),
        }
    }
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// Runs workflow operations for one `(base_path, content_id)` pair.
pub struct PipelineController {
    base_path: PathBuf,
    content_id: String,
    validator: PackageValidator,
    downloader: ArtifactDownloader,
    registry: ProcessorRegistry,
    finalizer: Box<dyn Finalizer>,
    progress: Box<dyn ProgressReporter>,
}

impl PipelineController {
    /// Controller with the default configuration.
    ///
    /// Fails with `InvalidParameter` if `base_path` does not exist or
    /// `content_id` is blank.
    pub fn new(base_path: impl Into<PathBuf>, content_id: impl Into<String>) -> Result<Self> {
        Self::with_config(base_path, content_id, &PipelineConfig::default())
    }

    pub fn with_config(
        base_path: impl Into<PathBuf>,
        content_id: impl Into<String>,
        config: &PipelineConfig,
    ) -> Result<Self> {
        let base_path = base_path.into();
        let content_id = content_id.into();

        if !base_path.exists() {
            return Err(ContentFlowError::invalid_parameter(format!(
                "base path {} does not exist",
                base_path.display()
            )));
        }
        if content_id.trim().is_empty() {
            return Err(ContentFlowError::invalid_parameter("content id must not be blank"));
        }

        Ok(Self {
            base_path,
            content_id,
            validator: PackageValidator::new(PackageRules::from(config)),
            downloader: ArtifactDownloader::new(config.download_timeout_secs)?,
            registry: ProcessorRegistry::new(),
            finalizer: Box::new(ManifestFinalizer),
            progress: Box::new(SilentProgress),
        })
    }

    pub fn with_finalizer(mut self, finalizer: impl Finalizer + 'static) -> Self {
        self.finalizer = Box::new(finalizer);
        self
    }

    pub fn with_registry(mut self, registry: ProcessorRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_progress(mut self, progress: impl ProgressReporter + 'static) -> Self {
        self.progress = Box::new(progress);
        self
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn content_id(&self) -> &str {
        &self.content_id
    }

    /// Run `operation` (`upload`/`UPLOAD`, `publish`/`PUBLISH`).
    ///
    /// A blank operation is an `InvalidParameter` error; any other
    /// unrecognized operation returns the empty result without side effects.
    #[instrument(skip_all, fields(operation = %operation, content_id = %self.content_id))]
    pub async fn run(&self, operation: &str, params: PipelineParams<'_>) -> Result<PipelineResponse> {
        if operation.trim().is_empty() {
            return Err(ContentFlowError::invalid_parameter("operation must not be blank"));
        }

        let Some(op) = Operation::parse(operation) else {
            warn!(operation, "unrecognized operation, nothing to do");
            return Ok(PipelineResponse::empty());
        };

        let ctx = PackageContext::new(&self.base_path, &self.content_id, op);
        info!(%op, base = %ctx.base_path().display(), "starting pipeline");

        let response = match op {
            Operation::Upload => self.upload(&ctx, params)?,
            Operation::Publish => self.publish(&ctx, params).await?,
        };

        self.progress.done(&response);
        info!(%op, status = ?response.status, skipped = ?response.skipped, "pipeline complete");
        Ok(response)
    }

    fn upload(&self, ctx: &PackageContext, params: PipelineParams<'_>) -> Result<PipelineResponse> {
        let file = params
            .file
            .ok_or_else(|| ContentFlowError::invalid_parameter("upload requires an archive file"))?;
        if !file.is_file() {
            return Err(ContentFlowError::invalid_parameter(format!(
                "archive {} does not exist",
                file.display()
            )));
        }
        let node = params
            .node
            .ok_or_else(|| ContentFlowError::invalid_parameter("upload requires a content node"))?;

        self.progress.phase("Validating package");
        if !self.validator.is_valid_package(&file) {
            warn!(archive = %file.display(), "skipping upload of invalid package");
            return Ok(PipelineResponse::skipped(SkipReason::InvalidPackage));
        }

        self.progress.phase("Extracting package");
        extract(&file, ctx.base_path())?;

        self.progress.phase("Reading markup");
        let markup = load_markup(ctx.base_path())?;

        self.progress.phase("Parsing markup");
        let tree = parse(&markup.text, markup.markup_type)?;

        self.progress.phase("Processing");
        let tree = self
            .registry
            .resolve(EXTRACT_CHAIN, ctx.base_path(), ctx.content_id())?
            .execute(tree)?;

        self.progress.phase("Finalizing");
        self.finalizer.finalize(FinalizeRequest {
            operation: ctx.operation(),
            content_id: ctx.content_id(),
            base_path: ctx.base_path(),
            tree: Some(&tree),
            file: Some(&file),
            markup_type: markup.markup_type,
            node,
        })
    }

    async fn publish(&self, ctx: &PackageContext, params: PipelineParams<'_>) -> Result<PipelineResponse> {
        let node = params
            .node
            .ok_or_else(|| ContentFlowError::invalid_parameter("publish requires a content node"))?;

        let mut skipped = None;
        let mut tree = None;
        let mut markup_type = None;

        if requires_compression(node) {
            self.progress.phase("Reading markup");
            let markup = load_markup(ctx.base_path())?;
            markup_type = markup.markup_type;

            self.progress.phase("Parsing markup");
            let parsed = parse(&markup.text, markup.markup_type)?;

            self.progress.phase("Compressing");
            let compressed = self
                .registry
                .resolve(COMPRESS_CHAIN, ctx.base_path(), ctx.content_id())?
                .execute(parsed)?;
            tree = Some(compressed);
        } else {
            self.progress.phase("Fetching existing artifact");
            match self.fetch_existing_artifact(ctx, node).await {
                Ok(path) => {
                    info!(path = %path.display(), "reusing existing artifact");
                    node.set_metadata(metadata_keys::DOWNLOAD_URL, path.display().to_string());
                }
                Err(e) => {
                    warn!(error = %e, "existing artifact unavailable, publishing without download URL");
                    skipped = Some(SkipReason::ArtifactUnavailable);
                }
            }
        }

        self.progress.phase("Finalizing");
        let mut response = self.finalizer.finalize(FinalizeRequest {
            operation: ctx.operation(),
            content_id: ctx.content_id(),
            base_path: ctx.base_path(),
            tree: tree.as_ref(),
            file: None,
            markup_type,
            node,
        })?;
        if response.skipped.is_none() {
            response.skipped = skipped;
        }
        Ok(response)
    }

    /// Download the node's artifact into the working directory and rename it
    /// to its slugged package name.
    async fn fetch_existing_artifact(&self, ctx: &PackageContext, node: &ContentNode) -> Result<PathBuf> {
        let url = node
            .metadata_non_blank(metadata_keys::ARTIFACT_URL)
            .ok_or_else(|| ContentFlowError::invalid_parameter("node has no artifact URL"))?;

        let downloaded = self.downloader.download(url, ctx.base_path()).await?;
        if !downloaded.path.is_file() {
            return Err(ContentFlowError::Network(format!(
                "artifact {url} did not materialize at {}",
                downloaded.path.display()
            )));
        }

        let file_name = package_file_name(
            node.metadata_str(metadata_keys::NAME),
            Utc::now().timestamp_millis(),
            &node.identifier,
            downloaded.extension(),
        );
        let target = ctx.base_path().join(file_name);
        std::fs::rename(&downloaded.path, &target).map_err(|e| ContentFlowError::io(&target, e))?;
        Ok(target)
    }
}

/// Whether publish must rebuild the artifact.
///
/// Compression is skipped only when the node has a non-blank artifact URL and
/// no body.
pub fn requires_compression(node: &ContentNode) -> bool {
    let has_artifact = node.metadata_non_blank(metadata_keys::ARTIFACT_URL).is_some();
    !(has_artifact && !has_body(node))
}

fn has_body(node: &ContentNode) -> bool {
    match node.metadata.get(metadata_keys::BODY) {
        None | Some(Value::Null) => false,
        Some(Value::String(body)) => !body.trim().is_empty(),
        Some(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use contentflow_ecrf::Plugin;
    use contentflow_processors::{Processor, ProcessorChain, ProcessorContext, artifact_path};
    use zip::write::SimpleFileOptions;

    use crate::finalize::ResponseStatus;

    fn write_zip(path: &Path, entries: &[(&str, &str)]) {
        let file = std::fs::File::create(path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        for (name, contents) in entries {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(contents.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
    }

    fn load_fixture(name: &str) -> String {
        let path = format!("../../../fixtures/ecml/{name}");
        std::fs::read_to_string(&path).unwrap_or_else(|_| panic!("missing fixture: {path}"))
    }

    /// Working dir plus a separate directory for uploads.
    fn workspace() -> (tempfile::TempDir, tempfile::TempDir) {
        (tempfile::tempdir().unwrap(), tempfile::tempdir().unwrap())
    }

    struct Count(Arc<AtomicUsize>);

    impl Processor for Count {
        fn name(&self) -> &str {
            "count"
        }

        fn execute(&self, tree: Plugin) -> Result<Plugin> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(tree)
        }
    }

    fn counting_registry(counter: &Arc<AtomicUsize>) -> ProcessorRegistry {
        let mut registry = ProcessorRegistry::new();
        let counter = Arc::clone(counter);
        registry.register(COMPRESS_CHAIN, move |_ctx: &ProcessorContext| {
            ProcessorChain::new(COMPRESS_CHAIN).with_stage(Count(Arc::clone(&counter)))
        });
        registry
    }

    // -- construction -------------------------------------------------------

    #[test]
    fn constructor_validates_inputs() {
        let dir = tempfile::tempdir().unwrap();
        assert!(PipelineController::new(dir.path(), "do_1").is_ok());

        let err = PipelineController::new(dir.path().join("missing"), "do_1").err().unwrap();
        assert_eq!(err.code(), "INVALID_PARAMETER");

        let err = PipelineController::new(dir.path(), "  ").err().unwrap();
        assert!(err.is_client_error());
    }

    // -- dispatch -----------------------------------------------------------

    #[tokio::test]
    async fn unknown_operation_returns_empty_result() {
        let dir = tempfile::tempdir().unwrap();
        let controller = PipelineController::new(dir.path(), "do_1").unwrap();
        let mut node = ContentNode::new("do_1");

        let response = controller
            .run("unknown-op", PipelineParams::publish(&mut node))
            .await
            .unwrap();

        assert!(response.is_empty());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
        assert!(node.metadata.is_empty());
    }

    #[tokio::test]
    async fn mixed_case_operation_is_unrecognized() {
        let dir = tempfile::tempdir().unwrap();
        let controller = PipelineController::new(dir.path(), "do_1").unwrap();
        let response = controller
            .run("Upload", PipelineParams::default())
            .await
            .unwrap();
        assert!(response.is_empty());
    }

    #[tokio::test]
    async fn blank_operation_is_invalid_parameter() {
        let dir = tempfile::tempdir().unwrap();
        let controller = PipelineController::new(dir.path(), "do_1").unwrap();
        let err = controller.run(" ", PipelineParams::default()).await.unwrap_err();
        assert_eq!(err.code(), "INVALID_PARAMETER");
    }

    // -- upload -------------------------------------------------------------

    #[tokio::test]
    async fn upload_minimal_json_package() {
        let (work, uploads) = workspace();
        let archive = uploads.path().join("pkg.zip");
        write_zip(&archive, &[("index.json", r#"{"theme": {"id": "theme", "ver": "0.3"}}"#)]);

        let controller = PipelineController::new(work.path(), "do_1").unwrap();
        let mut node = ContentNode::new("do_1");
        let response = controller
            .run("upload", PipelineParams::upload(&archive, &mut node))
            .await
            .unwrap();

        assert_eq!(response.status, ResponseStatus::Ok);
        assert_eq!(response.skipped, None);
        assert_eq!(response.payload["markupType"], "json");
        assert_eq!(response.payload["pluginCount"], 1);

        let tree: Plugin = serde_json::from_value(response.payload["tree"].clone()).unwrap();
        assert_eq!(tree.kind, "theme");
        assert!(tree.children.is_empty());
        assert!(work.path().join("index.json").is_file());
    }

    #[tokio::test]
    async fn upload_ecml_package_runs_extract_chain() {
        let (work, uploads) = workspace();
        let archive = uploads.path().join("story.zip");
        write_zip(
            &archive,
            &[
                ("index.ecml", &load_fixture("story.ecml")),
                ("assets/bg.png", "png"),
                ("assets/tap.mp3", "mp3"),
                ("items/questions.json", r#"{"questions": []}"#),
            ],
        );

        let controller = PipelineController::new(work.path(), "do_2").unwrap();
        let mut node = ContentNode::new("do_2");
        let response = controller
            .run("UPLOAD", PipelineParams::upload(&archive, &mut node))
            .await
            .unwrap();

        assert_eq!(response.payload["markupType"], "xml");
        let tree: Plugin = serde_json::from_value(response.payload["tree"].clone()).unwrap();
        assert_eq!(tree.kind, "theme");
        let controller_node = tree.descendants("controller")[0];
        assert_eq!(controller_node.data.as_deref(), Some(r#"{"questions": []}"#));
        assert!(work.path().join("content-manifest.json").is_file());
    }

    #[tokio::test]
    async fn upload_with_missing_asset_fails_validation() {
        let (work, uploads) = workspace();
        let archive = uploads.path().join("story.zip");
        write_zip(&archive, &[("index.ecml", &load_fixture("story.ecml"))]);

        let controller = PipelineController::new(work.path(), "do_3").unwrap();
        let mut node = ContentNode::new("do_3");
        let err = controller
            .run("upload", PipelineParams::upload(&archive, &mut node))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION");
    }

    #[tokio::test]
    async fn upload_controller_outside_working_dir_fails() {
        let root = tempfile::tempdir().unwrap();
        let work = root.path().join("work");
        std::fs::create_dir_all(&work).unwrap();
        std::fs::write(root.path().join("secret.txt"), "TOP-SECRET").unwrap();
        let archive = root.path().join("pkg.zip");
        write_zip(
            &archive,
            &[("index.ecml", r#"<theme><controller id="c" src="../secret.txt"/></theme>"#)],
        );

        let controller = PipelineController::new(&work, "do_10").unwrap();
        let mut node = ContentNode::new("do_10");
        let err = controller
            .run("upload", PipelineParams::upload(&archive, &mut node))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION");
        assert!(!err.to_string().contains("TOP-SECRET"));
        assert!(!work.join("content-manifest.json").exists());
    }

    #[tokio::test]
    async fn upload_invalid_package_is_skipped() {
        let (work, uploads) = workspace();
        let archive = uploads.path().join("both.zip");
        write_zip(&archive, &[("index.json", "{}"), ("index.ecml", "<theme/>")]);

        let controller = PipelineController::new(work.path(), "do_4").unwrap();
        let mut node = ContentNode::new("do_4");
        let response = controller
            .run("upload", PipelineParams::upload(&archive, &mut node))
            .await
            .unwrap();

        assert_eq!(response.skipped, Some(SkipReason::InvalidPackage));
        assert!(response.payload.is_empty());
        assert_eq!(std::fs::read_dir(work.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn upload_requires_file_and_node() {
        let (work, uploads) = workspace();
        let controller = PipelineController::new(work.path(), "do_5").unwrap();
        let mut node = ContentNode::new("do_5");

        let err = controller
            .run("upload", PipelineParams::upload(uploads.path().join("nope.zip"), &mut node))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_PARAMETER");

        let archive = uploads.path().join("pkg.zip");
        write_zip(&archive, &[("index.json", r#"{"theme": {}}"#)]);
        let params = PipelineParams {
            file: Some(archive),
            node: None,
        };
        let err = controller.run("upload", params).await.unwrap_err();
        assert_eq!(err.code(), "INVALID_PARAMETER");
        assert_eq!(std::fs::read_dir(work.path()).unwrap().count(), 0);
    }

    #[test]
    fn both_markup_files_in_working_dir_fail_to_load() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.json"), "{}").unwrap();
        std::fs::write(dir.path().join("index.ecml"), "<theme/>").unwrap();

        let err = load_markup(dir.path()).unwrap_err();
        assert_eq!(err.code(), "MULTIPLE_MARKUP_FILES");
        assert!(err.is_client_error());
    }

    // -- publish ------------------------------------------------------------

    #[test]
    fn compression_decision() {
        let artifact_only = ContentNode::new("a").with_metadata("artifactUrl", "http://x/a.zip");
        assert!(!requires_compression(&artifact_only));

        let blank_body = artifact_only.clone().with_metadata("body", "");
        assert!(!requires_compression(&blank_body));

        let with_body = artifact_only.clone().with_metadata("body", "<theme/>");
        assert!(requires_compression(&with_body));

        let blank_url = ContentNode::new("b").with_metadata("artifactUrl", " ");
        assert!(requires_compression(&blank_url));

        assert!(requires_compression(&ContentNode::new("c")));
    }

    #[tokio::test]
    async fn publish_reuses_existing_artifact() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/a.zip"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_bytes(b"PK".to_vec()))
            .mount(&server)
            .await;

        let work = tempfile::tempdir().unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        let controller = PipelineController::new(work.path(), "do_123")
            .unwrap()
            .with_registry(counting_registry(&counter));
        let mut node = ContentNode::new("do_123")
            .with_metadata("name", "Counting Fun")
            .with_metadata("artifactUrl", format!("{}/a.zip", server.uri()))
            .with_metadata("body", "");

        let response = controller
            .run("publish", PipelineParams::publish(&mut node))
            .await
            .unwrap();

        assert_eq!(response.skipped, None);
        let download_url = node.metadata_str("downloadUrl").expect("download url").to_string();
        let file_name = Path::new(&download_url).file_name().unwrap().to_str().unwrap();
        let pattern = regex::Regex::new(r"^counting-fun_\d+_do_123\.zip$").unwrap();
        assert!(pattern.is_match(file_name), "unexpected name {file_name}");
        assert!(Path::new(&download_url).is_file());
        assert!(!work.path().join("a.zip").exists());
        assert!(!work.path().join(crate::download::DOWNLOAD_TEMP_FILE).exists());
        assert_eq!(response.payload["downloadUrl"], download_url.as_str());

        // unchanged metadata: still no compression
        controller
            .run("PUBLISH", PipelineParams::publish(&mut node))
            .await
            .unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn publish_with_unavailable_artifact_proceeds() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::path("/gone.zip"))
            .respond_with(wiremock::ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let work = tempfile::tempdir().unwrap();
        let controller = PipelineController::new(work.path(), "do_7").unwrap();
        let mut node = ContentNode::new("do_7")
            .with_metadata("artifactUrl", format!("{}/gone.zip", server.uri()));

        let response = controller
            .run("publish", PipelineParams::publish(&mut node))
            .await
            .unwrap();

        assert_eq!(response.status, ResponseStatus::Ok);
        assert_eq!(response.skipped, Some(SkipReason::ArtifactUnavailable));
        assert!(node.metadata_str("downloadUrl").is_none());
        assert!(work.path().join("content-manifest.json").is_file());
    }

    #[tokio::test]
    async fn publish_with_body_always_compresses() {
        let work = tempfile::tempdir().unwrap();
        std::fs::write(work.path().join("index.json"), r#"{"theme": {"id": "t"}}"#).unwrap();

        let counter = Arc::new(AtomicUsize::new(0));
        let controller = PipelineController::new(work.path(), "do_8")
            .unwrap()
            .with_registry(counting_registry(&counter));

        for node in [
            ContentNode::new("do_8").with_metadata("body", "<theme/>"),
            ContentNode::new("do_8")
                .with_metadata("body", "<theme/>")
                .with_metadata("artifactUrl", "http://127.0.0.1:9/a.zip"),
        ] {
            let mut node = node;
            let response = controller
                .run("publish", PipelineParams::publish(&mut node))
                .await
                .unwrap();
            assert_eq!(response.skipped, None);
            assert!(node.metadata_str("downloadUrl").is_none());
        }
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn publish_compress_writes_artifact() {
        let work = tempfile::tempdir().unwrap();
        std::fs::write(work.path().join("index.ecml"), load_fixture("story.ecml")).unwrap();
        std::fs::create_dir_all(work.path().join("assets")).unwrap();
        std::fs::create_dir_all(work.path().join("items")).unwrap();
        std::fs::write(work.path().join("assets/bg.png"), b"png").unwrap();
        std::fs::write(work.path().join("assets/tap.mp3"), b"mp3").unwrap();
        std::fs::write(work.path().join("items/questions.json"), b"[]").unwrap();

        let controller = PipelineController::new(work.path(), "do_9").unwrap();
        let mut node = ContentNode::new("do_9").with_metadata("body", "present");
        let response = controller
            .run("publish", PipelineParams::publish(&mut node))
            .await
            .unwrap();

        assert!(artifact_path(work.path(), "do_9").is_file());
        assert_eq!(response.payload["markupType"], "xml");
        assert_eq!(response.payload["tree"]["kind"], "theme");
        assert!(response.payload["artifact"]["sha256"].is_string());
    }

    #[tokio::test]
    async fn publish_requires_node() {
        let dir = tempfile::tempdir().unwrap();
        let controller = PipelineController::new(dir.path(), "do_1").unwrap();
        let err = controller
            .run("publish", PipelineParams::default())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_PARAMETER");
    }
}
