//! Name → chain-builder lookup.

use std::collections::HashMap;
use std::path::Path;

use tracing::debug;

use contentflow_shared::{ContentFlowError, Result};

use crate::stages::{EmbedControllers, NormalizeAssetPaths, PackageArtifact, ValidateMissingAssets};
use crate::{ProcessorChain, ProcessorContext};

/// Chain run on upload.
pub const EXTRACT_CHAIN: &str = "extract";

/// Chain run on publish when the artifact has to be rebuilt.
pub const COMPRESS_CHAIN: &str = "compress";

/// Builds a fresh chain for one working directory and content id.
pub type ChainBuilder = Box<dyn Fn(&ProcessorContext) -> ProcessorChain + Send + Sync>;

/// Registered chains, keyed by name.
pub struct ProcessorRegistry {
    builders: HashMap<String, ChainBuilder>,
}

impl ProcessorRegistry {
    /// Registry with the built-in `extract` and `compress` chains.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register(EXTRACT_CHAIN, extract_chain);
        registry.register(COMPRESS_CHAIN, compress_chain);
        registry
    }

    /// Registry with nothing registered.
    pub fn empty() -> Self {
        Self {
            builders: HashMap::new(),
        }
    }

    /// Register (or replace) the chain called `name`.
    pub fn register<F>(&mut self, name: impl Into<String>, builder: F)
    where
        F: Fn(&ProcessorContext) -> ProcessorChain + Send + Sync + 'static,
    {
        self.builders.insert(name.into(), Box::new(builder));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.builders.contains_key(name)
    }

    /// Registered chain names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.builders.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Build the chain called `name` for `working_dir` / `content_id`.
    ///
    /// An unknown name is a `Configuration` error.
    pub fn resolve(&self, name: &str, working_dir: &Path, content_id: &str) -> Result<ProcessorChain> {
        let builder = self.builders.get(name).ok_or_else(|| {
            ContentFlowError::configuration(format!("no processor chain registered as `{name}`"))
        })?;
        let chain = builder(&ProcessorContext::new(working_dir, content_id));
        debug!(chain = name, stages = ?chain.stage_names(), "resolved processor chain");
        Ok(chain)
    }
}

impl Default for ProcessorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ProcessorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessorRegistry")
            .field("chains", &self.names())
            .finish()
    }
}

/// Resolve `name` against the built-in chains.
pub fn resolve_chain(name: &str, working_dir: &Path, content_id: &str) -> Result<ProcessorChain> {
    ProcessorRegistry::new().resolve(name, working_dir, content_id)
}

fn extract_chain(ctx: &ProcessorContext) -> ProcessorChain {
    ProcessorChain::new(EXTRACT_CHAIN)
        .with_stage(NormalizeAssetPaths)
        .with_stage(ValidateMissingAssets::new(ctx.base_path()))
        .with_stage(EmbedControllers::new(ctx.base_path()))
}

fn compress_chain(ctx: &ProcessorContext) -> ProcessorChain {
    extract_chain(ctx)
        .renamed(COMPRESS_CHAIN)
        .with_stage(PackageArtifact::new(ctx.clone()))
}
