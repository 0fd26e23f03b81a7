//! Core domain types for the ContentFlow pipeline.

use std::path::{Path, PathBuf};

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Current schema version for the content manifest written on finalization.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// File name of the JSON-dialect markup inside a working directory.
pub const JSON_MARKUP_FILE: &str = "index.json";

/// File name of the XML-dialect (ECML) markup inside a working directory.
pub const XML_MARKUP_FILE: &str = "index.ecml";

// ---------------------------------------------------------------------------
// MarkupType
// ---------------------------------------------------------------------------

/// The two recognized markup dialects.
///
/// "Undetermined" is expressed as `Option::<MarkupType>::None`, never as a
/// third variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkupType {
    Json,
    Xml,
}

impl MarkupType {
    /// Lowercase dialect name (`"json"` / `"xml"`).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Xml => "xml",
        }
    }

    /// The fixed markup file name for this dialect.
    pub fn file_name(self) -> &'static str {
        match self {
            Self::Json => JSON_MARKUP_FILE,
            Self::Xml => XML_MARKUP_FILE,
        }
    }
}

impl std::fmt::Display for MarkupType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Operation
// ---------------------------------------------------------------------------

/// Workflow operations understood by the pipeline controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Upload,
    Publish,
}

impl Operation {
    /// Parse an operation name. Only the all-lowercase and all-uppercase
    /// spellings are recognized; anything else is `None`.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "upload" | "UPLOAD" => Some(Self::Upload),
            "publish" | "PUBLISH" => Some(Self::Publish),
            _ => None,
        }
    }

    /// Lowercase operation name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Upload => "upload",
            Self::Publish => "publish",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// PackageContext
// ---------------------------------------------------------------------------

/// The immutable (base path, content id, operation) triple a run works in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageContext {
    base_path: PathBuf,
    content_id: String,
    operation: Operation,
}

impl PackageContext {
    pub fn new(base_path: impl Into<PathBuf>, content_id: impl Into<String>, operation: Operation) -> Self {
        Self {
            base_path: base_path.into(),
            content_id: content_id.into(),
            operation,
        }
    }

    /// Working directory used for extraction and file lookups.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn content_id(&self) -> &str {
        &self.content_id
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }
}

// ---------------------------------------------------------------------------
// ContentNode
// ---------------------------------------------------------------------------

/// Well-known metadata keys read or written by the pipeline.
pub mod metadata_keys {
    /// URL of an already packaged artifact.
    pub const ARTIFACT_URL: &str = "artifactUrl";
    /// Inline content body.
    pub const BODY: &str = "body";
    /// Display name of the content.
    pub const NAME: &str = "name";
    /// Local path of the renamed artifact, set during publish.
    pub const DOWNLOAD_URL: &str = "downloadUrl";
}

/// The caller-owned metadata record of the content item being processed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentNode {
    /// Content identifier.
    pub identifier: String,
    /// Object type (e.g. `Content`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_type: Option<String>,
    /// Named properties attached to the content item.
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl ContentNode {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            object_type: None,
            metadata: Map::new(),
        }
    }

    /// Builder-style metadata setter.
    pub fn with_metadata(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    /// String value of a metadata property, if present and a string.
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }

    /// String value of a metadata property, treating blank strings as absent.
    pub fn metadata_non_blank(&self, key: &str) -> Option<&str> {
        self.metadata_str(key).filter(|v| !v.trim().is_empty())
    }

    pub fn set_metadata(&mut self, key: &str, value: impl Into<Value>) {
        self.metadata.insert(key.to_string(), value.into());
    }
}

// ---------------------------------------------------------------------------
// Audit history
// ---------------------------------------------------------------------------

/// A single audit history entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Unique record identifier (UUID v7).
    pub id: String,
    /// Identifier of the audited object.
    pub object_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graph_id: Option<String>,
    /// Operation that produced the record (e.g. `upload`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Free-form JSON summary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub created_on: DateTime<Utc>,
}

impl AuditRecord {
    /// Create a record for `object_id` stamped with a fresh id and the current
    /// time (millisecond precision, matching what storage keeps).
    pub fn new(object_id: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::now_v7().to_string(),
            object_id: object_id.into(),
            object_type: None,
            request_id: None,
            graph_id: None,
            operation: None,
            user_id: None,
            summary: None,
            created_on: Utc::now().trunc_subsecs(3),
        }
    }
}

/// Filters for reading audit history. The time range is inclusive.
#[derive(Debug, Clone)]
pub struct AuditQuery {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub graph_id: Option<String>,
    pub object_type: Option<String>,
    pub object_id: Option<String>,
}

impl AuditQuery {
    pub fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start,
            end,
            graph_id: None,
            object_type: None,
            object_id: None,
        }
    }
}
