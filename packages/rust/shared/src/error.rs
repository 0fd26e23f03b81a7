//! Error types for ContentFlow.
//!
//! Library crates use [`ContentFlowError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.
//!
//! Every variant belongs to one of two categories (see [`ErrorCategory`]):
//! client errors describe a malformed request, server errors describe an
//! environment or deployment fault. Neither is retried inside the pipeline.

use std::path::PathBuf;

use crate::types::MarkupType;

/// Who is at fault for an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The caller supplied invalid input.
    Client,
    /// The environment or deployment is broken.
    Server,
}

/// Top-level error type for all ContentFlow operations.
#[derive(Debug, thiserror::Error)]
pub enum ContentFlowError {
    /// A required parameter is missing, blank, or points at nothing.
    #[error("invalid parameter: {message}")]
    InvalidParameter { code: &'static str, message: String },

    /// Both markup files exist in the same working directory.
    #[error("multiple markup files found in {dir:?} (index.json and index.ecml)")]
    MultipleMarkupFiles { dir: PathBuf },

    /// The markup file exists but could not be read.
    #[error("failed to read markup file {path:?}: {source}")]
    MarkupRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The markup text is not a well-formed document of its dialect.
    #[error("{dialect} markup parse error{}: {message}", fmt_location(.location))]
    MarkupParse {
        dialect: MarkupType,
        message: String,
        location: Option<String>,
    },

    /// Content failed a processing-stage check (missing assets, controllers, ...).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// The uploaded archive could not be unpacked.
    #[error("archive extraction failed for {path:?}: {message}")]
    Extraction { path: PathBuf, message: String },

    /// Wiring defect, e.g. an unknown processing stage or a broken config file.
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// An output archive could not be written.
    #[error("packaging error: {0}")]
    Packaging(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Network/HTTP error while fetching an artifact.
    #[error("network error: {0}")]
    Network(String),

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),
}

fn fmt_location(location: &Option<String>) -> String {
    location
        .as_deref()
        .map(|l| format!(" at {l}"))
        .unwrap_or_default()
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ContentFlowError>;

impl ContentFlowError {
    /// Create an invalid-parameter error with the generic code.
    pub fn invalid_parameter(msg: impl Into<String>) -> Self {
        Self::InvalidParameter {
            code: "INVALID_PARAMETER",
            message: msg.into(),
        }
    }

    /// Create an invalid-parameter error carrying a specific error code.
    pub fn invalid_parameter_with_code(code: &'static str, msg: impl Into<String>) -> Self {
        Self::InvalidParameter {
            code,
            message: msg.into(),
        }
    }

    /// Create a parse error for the given dialect.
    pub fn parse(dialect: MarkupType, msg: impl Into<String>, location: Option<String>) -> Self {
        Self::MarkupParse {
            dialect,
            message: msg.into(),
            location,
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a configuration error from any displayable message.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration {
            message: msg.into(),
        }
    }

    /// Create an extraction error for the archive at `path`.
    pub fn extraction(path: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Self::Extraction {
            path: path.into(),
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Stable machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidParameter { code, .. } => *code,
            Self::MultipleMarkupFiles { .. } => "MULTIPLE_MARKUP_FILES",
            Self::MarkupRead { .. } => "MARKUP_FILE_READ",
            Self::MarkupParse { .. } => "MARKUP_PARSE",
            Self::Validation { .. } => "VALIDATION",
            Self::Extraction { .. } => "ZIP_EXTRACTION",
            Self::Configuration { .. } => "CONFIGURATION",
            Self::Packaging(_) => "PACKAGING",
            Self::Io { .. } => "IO",
            Self::Network(_) => "NETWORK",
            Self::Storage(_) => "STORAGE",
        }
    }

    /// Whether the caller or the environment is at fault.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidParameter { .. }
            | Self::MultipleMarkupFiles { .. }
            | Self::MarkupParse { .. }
            | Self::Validation { .. } => ErrorCategory::Client,
            Self::MarkupRead { .. }
            | Self::Extraction { .. }
            | Self::Configuration { .. }
            | Self::Packaging(_)
            | Self::Io { .. }
            | Self::Network(_)
            | Self::Storage(_) => ErrorCategory::Server,
        }
    }

    /// Shorthand for `category() == ErrorCategory::Client`.
    pub fn is_client_error(&self) -> bool {
        self.category() == ErrorCategory::Client
    }
}
