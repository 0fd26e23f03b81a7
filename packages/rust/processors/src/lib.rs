//! Pluggable content-tree processing stages.
//!
//! A [`Processor`] transforms a [`Plugin`] tree; a [`ProcessorChain`] runs
//! processors in order; the [`ProcessorRegistry`] maps chain names
//! (`extract`, `compress`, or custom ones) to chain builders.

mod registry;
pub mod stages;

use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument};

use contentflow_ecrf::Plugin;
use contentflow_shared::Result;

pub use registry::{COMPRESS_CHAIN, ChainBuilder, EXTRACT_CHAIN, ProcessorRegistry, resolve_chain};

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// A single transformation stage.
///
/// Stages may mutate the tree and write files under the working directory.
/// They must hand the tree back for the next stage.
pub trait Processor: Send + Sync {
    /// Stage name for tracing.
    fn name(&self) -> &str;

    /// Transform `tree`.
    fn execute(&self, tree: Plugin) -> Result<Plugin>;
}

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

/// Working directory and content id a chain is built for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessorContext {
    base_path: PathBuf,
    content_id: String,
}

impl ProcessorContext {
    pub fn new(base_path: impl Into<PathBuf>, content_id: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into(),
            content_id: content_id.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn content_id(&self) -> &str {
        &self.content_id
    }

    /// Where the compress chain writes its archive: `<base>/artifacts/<id>.zip`.
    pub fn artifact_path(&self) -> PathBuf {
        artifact_path(&self.base_path, &self.content_id)
    }
}

/// `<base>/artifacts/<content_id>.zip`.
pub fn artifact_path(base_path: &Path, content_id: &str) -> PathBuf {
    base_path.join("artifacts").join(format!("{content_id}.zip"))
}

// ---------------------------------------------------------------------------
// Chain
// ---------------------------------------------------------------------------

/// An ordered sequence of processors.
pub struct ProcessorChain {
    name: String,
    stages: Vec<Box<dyn Processor>>,
}

impl ProcessorChain {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: Vec::new(),
        }
    }

    /// Builder-style [`push`](Self::push).
    pub fn with_stage(mut self, stage: impl Processor + 'static) -> Self {
        self.push(stage);
        self
    }

    /// Same stages under another name.
    pub fn renamed(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn push(&mut self, stage: impl Processor + 'static) {
        self.stages.push(Box::new(stage));
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run every stage in order, threading the tree through.
    #[instrument(skip_all, fields(chain = %self.name, stages = self.stages.len()))]
    pub fn execute(&self, mut tree: Plugin) -> Result<Plugin> {
        for stage in &self.stages {
            debug!(stage = stage.name(), "running stage");
            tree = stage.execute(tree)?;
        }
        info!(nodes = tree.count(), "processor chain complete");
        Ok(tree)
    }
}

impl std::fmt::Debug for ProcessorChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessorChain")
            .field("name", &self.name)
            .field("stages", &self.stage_names())
            .finish()
    }
}
