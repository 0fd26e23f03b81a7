//! Shared types, error model, and configuration for ContentFlow.
//!
//! This crate is the foundation depended on by all other ContentFlow crates.
//! It provides:
//! - [`ContentFlowError`]: the unified error type
//! - Domain types ([`ContentNode`], [`MarkupType`], [`Operation`], [`PackageContext`],
//!   [`AuditRecord`])
//! - Configuration ([`AppConfig`], [`PipelineConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DefaultsConfig, PackageConfig, PipelineConfig, PublishConfig, StorageConfig,
    config_dir, config_file_path, expand_home, init_config, load_config, load_config_from,
};
pub use error::{ContentFlowError, ErrorCategory, Result};
pub use types::{
    AuditQuery, AuditRecord, CURRENT_SCHEMA_VERSION, ContentNode, JSON_MARKUP_FILE, MarkupType,
    Operation, PackageContext, XML_MARKUP_FILE, metadata_keys,
};
