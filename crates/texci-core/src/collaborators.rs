//! Collaborator traits consumed by the orchestration engine.
//!
//! Everything that talks to the outside world (git, containers, the code
//! hosting API, the filesystem) sits behind one of these traits and is
//! injected into the [`Orchestrator`](crate::pipeline::Orchestrator) through
//! [`Collaborators`]. Tests use the in-memory versions in [`crate::fakes`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::PipelineConfig;
use crate::domain::{
    BuildOutput, Result, SourceRef, StageOutcome, StatusState, StatusTrack, VerificationOutput,
};

/// Fetches source code into a freshly allocated working directory.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Check out `source.revision` and return the working directory.
    ///
    /// On error the fetcher must not leave a partially populated directory
    /// behind: no cleanup barrier is armed for a request that never fetched.
    async fn fetch(&self, source: &SourceRef) -> Result<PathBuf>;

    /// Full commit message of `revision` inside `workdir`.
    async fn read_commit_message(&self, workdir: &Path, revision: &str) -> Result<String>;
}

/// Loads the per-project pipeline settings.
#[async_trait]
pub trait ConfigLoader: Send + Sync {
    /// Never fails: missing or malformed configuration yields defaults.
    async fn load(&self, workdir: &Path) -> PipelineConfig;
}

/// Runs one isolated document build.
#[async_trait]
pub trait BuildRunner: Send + Sync {
    async fn run(&self, workdir: &Path, entry_point: &str) -> StageOutcome<BuildOutput>;
}

/// Runs the spellchecker over the build outputs in `workdir`.
#[async_trait]
pub trait VerificationRunner: Send + Sync {
    async fn run(&self, workdir: &Path, dictionary: Option<&str>) -> StageOutcome<VerificationOutput>;
}

/// Posts commit statuses.
#[async_trait]
pub trait StatusReporter: Send + Sync {
    async fn set_status(
        &self,
        source: &SourceRef,
        track: StatusTrack,
        state: StatusState,
        description: &str,
    ) -> Result<()>;
}

/// Posts pull request comments.
#[async_trait]
pub trait CommentPoster: Send + Sync {
    async fn post_comment(&self, owner: &str, repo: &str, pr_number: u64, body: &str) -> Result<()>;
}

/// Handle to a created release, used for asset uploads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseHandle {
    pub id: u64,
    pub tag_name: String,
    /// Upload endpoint with any URI template suffix already removed.
    pub upload_url: String,
}

/// Parameters of a pre-release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRelease<'a> {
    pub owner: &'a str,
    pub repo: &'a str,
    pub tag_name: &'a str,
    pub target_revision: &'a str,
    pub title: &'a str,
}

/// Creates pre-releases and uploads their assets.
#[async_trait]
pub trait ReleasePublisher: Send + Sync {
    async fn create_release(&self, release: NewRelease<'_>) -> Result<ReleaseHandle>;

    async fn upload_asset(&self, release: &ReleaseHandle, file: &Path, asset_name: &str) -> Result<()>;
}

/// Deletes working directories. Best effort.
#[async_trait]
pub trait StorageReclaimer: Send + Sync {
    async fn delete(&self, workdir: &Path) -> Result<()>;
}

/// The full set of collaborators one orchestrator works with.
#[derive(Clone)]
pub struct Collaborators {
    pub fetcher: Arc<dyn SourceFetcher>,
    pub config_loader: Arc<dyn ConfigLoader>,
    pub builder: Arc<dyn BuildRunner>,
    pub verifier: Arc<dyn VerificationRunner>,
    pub status: Arc<dyn StatusReporter>,
    pub comments: Arc<dyn CommentPoster>,
    pub releases: Arc<dyn ReleasePublisher>,
    pub reclaimer: Arc<dyn StorageReclaimer>,
}
