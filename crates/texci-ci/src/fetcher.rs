//! git-backed source fetcher.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info, warn};
use uuid::Uuid;

use texci_core::{PipelineError, Result, SourceFetcher, SourceRef};

use crate::config::RunnerConfig;
use crate::exec::{run_command, CommandSpec};

/// Whether `revision` is an abbreviated or full commit id.
pub fn is_commit_id(revision: &str) -> bool {
    (4..=64).contains(&revision.len()) && revision.chars().all(|c| c.is_ascii_hexdigit())
}

fn ensure_commit_id(revision: &str) -> Result<()> {
    if is_commit_id(revision) {
        Ok(())
    } else {
        Err(PipelineError::Fetch(format!("invalid revision: {:?}", revision)))
    }
}

/// Clones into `<workspace_root>/<uuid>` and checks out the revision.
pub struct GitFetcher {
    config: RunnerConfig,
}

impl GitFetcher {
    pub fn new(config: RunnerConfig) -> Self {
        Self { config }
    }

    async fn git(&self, dir: Option<&Path>, args: &[&str]) -> Result<String> {
        let mut spec = CommandSpec::new(&self.config.git_bin)
            .args(args.iter().copied())
            .timeout(self.config.timeout_secs);
        if let Some(dir) = dir {
            spec = spec.current_dir(dir);
        }
        let output = run_command(&spec).await?;
        if !output.passed() {
            return Err(PipelineError::Fetch(format!(
                "git {} failed: {}",
                args.first().copied().unwrap_or_default(),
                output.stderr.trim()
            )));
        }
        Ok(output.stdout)
    }

    async fn clone_and_checkout(&self, source: &SourceRef, workdir: &Path) -> Result<()> {
        ensure_commit_id(&source.revision)?;
        let url = self.config.clone_url(&source.owner, &source.repo);
        let target = workdir.to_string_lossy();
        self.git(None, &["clone", "--quiet", url.as_str(), target.as_ref()])
            .await?;
        self.git(Some(workdir), &["checkout", "--quiet", "--detach", &source.revision])
            .await?;
        Ok(())
    }
}

#[async_trait]
impl SourceFetcher for GitFetcher {
    async fn fetch(&self, source: &SourceRef) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.config.workspace_root).await?;
        let workdir = self.config.workspace_root.join(Uuid::new_v4().to_string());

        match self.clone_and_checkout(source, &workdir).await {
            Ok(()) => {
                info!(repo = %source.slug(), revision = %source.short_revision(), "checked out source");
                Ok(workdir)
            }
            Err(e) => {
                // Nothing else owns the directory yet.
                if let Err(cleanup) = tokio::fs::remove_dir_all(&workdir).await {
                    if cleanup.kind() != std::io::ErrorKind::NotFound {
                        warn!(path = %workdir.display(), error = %cleanup, "failed to remove partial clone");
                    }
                }
                Err(e)
            }
        }
    }

    async fn read_commit_message(&self, workdir: &Path, revision: &str) -> Result<String> {
        ensure_commit_id(revision)?;
        let message = self
            .git(Some(workdir), &["log", "-1", "--format=%B", revision, "--"])
            .await?;
        debug!(revision = %revision, "read commit message");
        Ok(message.trim_end().to_string())
    }
}
