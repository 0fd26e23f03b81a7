//! Core pipeline orchestration for ContentFlow.
//!
//! This crate ties together package validation, extraction, markup parsing,
//! processor chains, and finalization into the `upload` and `publish`
//! workflows, plus the audit history service.

pub mod audit;
pub mod download;
pub mod finalize;
pub mod pipeline;
pub mod slug;

pub use audit::{AuditHistoryService, ERR_SAVE_AUDIT_MISSING_REQ_PARAMS, run_audit_record};
pub use download::{ArtifactDownloader, DOWNLOAD_TEMP_FILE, DownloadedArtifact};
pub use finalize::{
    FinalizeRequest, Finalizer, MANIFEST_FILE, ManifestFinalizer, PipelineResponse,
    ResponseStatus, SkipReason,
};
pub use pipeline::{
    PipelineController, PipelineParams, ProgressReporter, SilentProgress, requires_compression,
};
pub use slug::{package_file_name, slugify};
