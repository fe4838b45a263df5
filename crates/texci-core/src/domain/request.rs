//! Build requests: one unit of work per revision.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Location of the source to build.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct SourceRef {
    pub owner: String,
    pub repo: String,
    /// Commit SHA the pipeline checks out and reports against.
    pub revision: String,
}

impl SourceRef {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>, revision: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            revision: revision.into(),
        }
    }

    /// `owner/repo`
    pub fn slug(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    /// First seven characters of the revision.
    pub fn short_revision(&self) -> &str {
        let end = self
            .revision
            .char_indices()
            .nth(7)
            .map(|(i, _)| i)
            .unwrap_or(self.revision.len());
        &self.revision[..end]
    }
}

/// A single inbound unit of work.
///
/// Created per inbound event. The working directory is not part of the
/// request: it is allocated by the fetch stage and owned by the pipeline
/// run until the cleanup barrier reclaims it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BuildRequest {
    pub id: Uuid,
    /// Where the revision is cloned from.
    pub source: SourceRef,
    /// Repository that receives statuses, comments and releases. Same
    /// revision as `source`; differs in owner or repo for pull requests
    /// opened from a fork.
    pub target: SourceRef,
    /// Branch (ref name without `refs/heads/`) the revision was pushed to.
    pub branch: String,
    /// Present when the request comes from a pull request.
    pub pull_request: Option<u64>,
}

impl BuildRequest {
    /// Request built from a branch push.
    pub fn push(source: SourceRef, branch: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            target: source.clone(),
            source,
            branch: branch.into(),
            pull_request: None,
        }
    }

    /// Request built from a pull request head.
    pub fn pull_request(source: SourceRef, branch: impl Into<String>, number: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            target: source.clone(),
            source,
            branch: branch.into(),
            pull_request: Some(number),
        }
    }

    /// Report to `owner/repo` instead of the clone repository.
    pub fn reporting_to(mut self, owner: impl Into<String>, repo: impl Into<String>) -> Self {
        self.target = SourceRef::new(owner, repo, self.source.revision.clone());
        self
    }

    pub fn is_pull_request(&self) -> bool {
        self.pull_request.is_some()
    }
}
