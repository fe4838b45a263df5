//! Mapping of GitHub webhook payloads to build requests.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{BuildRequest, PipelineError, Result, SourceRef};

/// Webhook event types that can trigger builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Push,
    PullRequest,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Push => f.write_str("push"),
            EventKind::PullRequest => f.write_str("pull_request"),
        }
    }
}

impl FromStr for EventKind {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "push" => Ok(EventKind::Push),
            "pull_request" => Ok(EventKind::PullRequest),
            other => Err(PipelineError::Config(format!("unsupported event: {}", other))),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Account {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    login: Option<String>,
}

impl Account {
    /// Push payloads carry `name`; everything else carries `login`.
    fn handle(&self) -> Option<&str> {
        self.name.as_deref().or(self.login.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct Repository {
    name: String,
    owner: Account,
}

#[derive(Debug, Deserialize)]
struct PushCommit {
    id: String,
}

#[derive(Debug, Deserialize)]
struct PushEvent {
    #[serde(rename = "ref")]
    git_ref: String,
    #[serde(default)]
    deleted: bool,
    #[serde(default)]
    commits: Vec<PushCommit>,
    repository: Repository,
}

#[derive(Debug, Deserialize)]
struct PullRequestHead {
    #[serde(rename = "ref")]
    git_ref: String,
    sha: String,
    /// `null` when the fork has been deleted.
    repo: Option<Repository>,
}

#[derive(Debug, Deserialize)]
struct PullRequestBase {
    repo: Repository,
}

#[derive(Debug, Deserialize)]
struct PullRequest {
    head: PullRequestHead,
    base: PullRequestBase,
}

#[derive(Debug, Deserialize)]
struct PullRequestEvent {
    action: String,
    number: u64,
    pull_request: PullRequest,
}

/// Pull request actions that trigger a build.
const BUILD_ACTIONS: [&str; 3] = ["opened", "synchronize", "reopened"];

/// Build requests for a webhook delivery. Events that do not trigger builds
/// yield an empty list; malformed payloads are an error.
pub fn requests_from_event(kind: EventKind, payload: &str) -> Result<Vec<BuildRequest>> {
    match kind {
        EventKind::Push => from_push(serde_json::from_str(payload)?),
        EventKind::PullRequest => from_pull_request(serde_json::from_str(payload)?),
    }
}

fn from_push(event: PushEvent) -> Result<Vec<BuildRequest>> {
    if event.deleted {
        debug!(git_ref = %event.git_ref, "ignoring branch deletion");
        return Ok(Vec::new());
    }
    let owner = event
        .repository
        .owner
        .handle()
        .ok_or_else(|| PipelineError::Config("push payload has no repository owner".to_string()))?
        .to_string();
    let branch = branch_name(&event.git_ref);

    let mut seen = HashSet::new();
    Ok(event
        .commits
        .into_iter()
        .filter(|commit| seen.insert(commit.id.clone()))
        .map(|commit| {
            BuildRequest::push(
                SourceRef::new(owner.clone(), event.repository.name.clone(), commit.id),
                branch.clone(),
            )
        })
        .collect())
}

fn from_pull_request(event: PullRequestEvent) -> Result<Vec<BuildRequest>> {
    if !BUILD_ACTIONS.contains(&event.action.as_str()) {
        debug!(action = %event.action, "ignoring pull request action");
        return Ok(Vec::new());
    }
    let PullRequest { head, base } = event.pull_request;
    let repo = head.repo.ok_or_else(|| {
        PipelineError::Config(format!(
            "pull request #{} head repository is gone",
            event.number
        ))
    })?;
    let owner = repo
        .owner
        .handle()
        .ok_or_else(|| PipelineError::Config("pull request head has no owner".to_string()))?
        .to_string();
    let base_owner = base
        .repo
        .owner
        .handle()
        .ok_or_else(|| PipelineError::Config("pull request base has no owner".to_string()))?
        .to_string();

    // Clone from the head; statuses and the comment go to the base.
    Ok(vec![BuildRequest::pull_request(
        SourceRef::new(owner, repo.name, head.sha),
        head.git_ref,
        event.number,
    )
    .reporting_to(base_owner, base.repo.name)])
}

fn branch_name(git_ref: &str) -> String {
    git_ref
        .strip_prefix("refs/heads/")
        .unwrap_or(git_ref)
        .to_string()
}
