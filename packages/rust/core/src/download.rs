//! Fetching an already packaged artifact over HTTP.

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::Client;
use tracing::{debug, info, instrument};
use url::Url;

use contentflow_shared::{ContentFlowError, Result};

const USER_AGENT: &str = concat!("ContentFlow/", env!("CARGO_PKG_VERSION"));

/// File name used when the URL path has no final segment.
const FALLBACK_FILE_NAME: &str = "artifact";

/// Name of the in-progress download inside the target directory.
pub const DOWNLOAD_TEMP_FILE: &str = ".artifact-download.tmp";

/// A downloaded artifact waiting to be renamed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedArtifact {
    /// Where the bytes were written.
    pub path: PathBuf,
    /// Last path segment of the URL.
    pub file_name: String,
}

impl DownloadedArtifact {
    /// Extension of the remote file name, if any.
    pub fn extension(&self) -> Option<&str> {
        Path::new(&self.file_name)
            .extension()
            .and_then(|ext| ext.to_str())
    }
}

/// HTTP downloader for existing artifacts.
#[derive(Debug, Clone)]
pub struct ArtifactDownloader {
    client: Client,
}

impl ArtifactDownloader {
    /// Build a downloader whose requests time out after `timeout_secs`.
    pub fn new(timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ContentFlowError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Download `url` into [`DOWNLOAD_TEMP_FILE`] under `dir`.
    ///
    /// The caller renames the file; the remote name never touches `dir`.
    #[instrument(skip_all, fields(url = %url))]
    pub async fn download(&self, url: &str, dir: &Path) -> Result<DownloadedArtifact> {
        let parsed = Url::parse(url)
            .map_err(|e| ContentFlowError::Network(format!("invalid artifact URL {url}: {e}")))?;

        let response = self
            .client
            .get(parsed.as_str())
            .send()
            .await
            .map_err(|e| ContentFlowError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ContentFlowError::Network(format!("{url}: HTTP {status}")));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| ContentFlowError::Network(format!("{url}: {e}")))?;

        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| ContentFlowError::io(dir, e))?;
        let target = dir.join(DOWNLOAD_TEMP_FILE);
        tokio::fs::write(&target, &body)
            .await
            .map_err(|e| ContentFlowError::io(&target, e))?;

        let file_name = file_name_from_url(&parsed);
        debug!(path = %target.display(), file_name, "artifact saved");
        info!(bytes = body.len(), "artifact downloaded");
        Ok(DownloadedArtifact {
            path: target,
            file_name,
        })
    }
}

fn file_name_from_url(url: &Url) -> String {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|name| !name.is_empty() && *name != "." && *name != "..")
        .map(String::from)
        .unwrap_or_else(|| FALLBACK_FILE_NAME.to_string())
}
