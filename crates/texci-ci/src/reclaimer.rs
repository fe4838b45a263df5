//! Filesystem storage reclaimer.

use std::io::ErrorKind;
use std::path::Path;

use async_trait::async_trait;
use tracing::debug;

use texci_core::{PipelineError, Result, StorageReclaimer};

/// Removes working directories recursively. A directory that is already
/// gone counts as reclaimed.
#[derive(Debug, Clone, Default)]
pub struct FsReclaimer;

impl FsReclaimer {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl StorageReclaimer for FsReclaimer {
    async fn delete(&self, workdir: &Path) -> Result<()> {
        match tokio::fs::remove_dir_all(workdir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %workdir.display(), "working directory already gone");
                Ok(())
            }
            Err(e) => Err(PipelineError::Storage(format!(
                "failed to remove {}: {}",
                workdir.display(),
                e
            ))),
        }
    }
}
