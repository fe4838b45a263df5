//! Cleanup barrier: reclaim the working directory once every post-build
//! branch has settled.

use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::collaborators::StorageReclaimer;
use crate::gate::{CompletionGate, Signal};
use crate::obs;

/// Independent continuations after a successful build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Branch {
    Verification,
    Publish,
}

impl Branch {
    pub const ALL: [Branch; 2] = [Branch::Verification, Branch::Publish];
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Branch::Verification => f.write_str("verification"),
            Branch::Publish => f.write_str("publish"),
        }
    }
}

/// What happened to the working directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReclaimStatus {
    /// Some branch has not signalled yet.
    Pending,
    Reclaimed,
    /// The reclaimer returned an error; not retried.
    Failed,
    /// The path was empty or a filesystem root and was left alone.
    Refused,
}

/// Holds the completion flags of one request.
pub struct CleanupBarrier {
    gate: CompletionGate<Branch>,
    workdir: PathBuf,
    reclaimer: Arc<dyn StorageReclaimer>,
    status: Mutex<ReclaimStatus>,
}

impl CleanupBarrier {
    /// Arm the barrier with every branch flag cleared.
    pub fn arm(workdir: impl Into<PathBuf>, reclaimer: Arc<dyn StorageReclaimer>) -> Arc<Self> {
        Arc::new(Self {
            gate: CompletionGate::new(Branch::ALL),
            workdir: workdir.into(),
            reclaimer,
            status: Mutex::new(ReclaimStatus::Pending),
        })
    }

    /// Record that `branch` has finished. The signal that completes the set
    /// reclaims the working directory; returns whether this call did so.
    pub async fn signal(&self, branch: Branch) -> bool {
        match self.gate.signal(branch) {
            Signal::Opened => {
                let status = self.reclaim().await;
                *self.status.lock().unwrap_or_else(|p| p.into_inner()) = status;
                true
            }
            Signal::Waiting { remaining } => {
                debug!(branch = %branch, remaining, "branch settled");
                false
            }
            Signal::Duplicate | Signal::Unknown => false,
        }
    }

    pub fn status(&self) -> ReclaimStatus {
        *self.status.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Whether the working directory has been deleted.
    pub fn reclaimed(&self) -> bool {
        self.status() == ReclaimStatus::Reclaimed
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    async fn reclaim(&self) -> ReclaimStatus {
        if !is_reclaimable(&self.workdir) {
            warn!(path = %self.workdir.display(), "refusing to reclaim root or empty path");
            return ReclaimStatus::Refused;
        }
        match self.reclaimer.delete(&self.workdir).await {
            Ok(()) => {
                obs::emit_workspace_reclaimed(&self.workdir);
                ReclaimStatus::Reclaimed
            }
            Err(e) => {
                warn!(path = %self.workdir.display(), error = %e, "failed to reclaim working directory");
                ReclaimStatus::Failed
            }
        }
    }
}

/// Whether `path` may be handed to the reclaimer.
pub fn is_reclaimable(path: &Path) -> bool {
    let mut normal = 0usize;
    for component in path.components() {
        match component {
            Component::Normal(_) => normal += 1,
            Component::ParentDir => return false,
            _ => {}
        }
    }
    normal > 0
}
