use std::io::ErrorKind;
use std::path::PathBuf;

use tracing::{debug, instrument};

use contentflow_ecrf::Plugin;
use contentflow_shared::{ContentFlowError, Result};

use super::{CONTROLLER_KIND, is_remote, local_source};
use crate::Processor;

/// Inlines the file behind each `controller@src` as the controller's data.
///
/// Controllers that already carry data, or point at remote sources, are left
/// alone.
#[derive(Debug, Clone)]
pub struct EmbedControllers {
    base_path: PathBuf,
}

impl EmbedControllers {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }
}

impl Processor for EmbedControllers {
    fn name(&self) -> &str {
        "embed_controllers"
    }

    #[instrument(skip_all, fields(base = %self.base_path.display()))]
    fn execute(&self, mut tree: Plugin) -> Result<Plugin> {
        let mut embedded = 0usize;

        tree.try_visit_mut(CONTROLLER_KIND, &mut |controller| {
            if controller.data.is_some() {
                return Ok(());
            }
            let Some(src) = controller.attribute("src").filter(|s| !is_remote(s)) else {
                return Ok(());
            };

            let path = self.base_path.join(local_source(src)?);
            let contents = match std::fs::read_to_string(&path) {
                Ok(contents) => contents,
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    let id = controller.attribute("id").unwrap_or(src);
                    return Err(ContentFlowError::validation(format!(
                        "controller `{id}` references missing file `{src}`"
                    )));
                }
                Err(e) => return Err(ContentFlowError::io(&path, e)),
            };

            debug!(src, bytes = contents.len(), "embedded controller");
            controller.data = Some(contents);
            embedded += 1;
            Ok(())
        })?;

        debug!(embedded, "controllers embedded");
        Ok(tree)
    }
}
