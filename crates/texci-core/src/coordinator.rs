//! Dependent-stage coordinator.
//!
//! After a successful build, two branches run concurrently and independently:
//! verification (spellcheck + PR comment) and publish (pre-release + asset
//! uploads). Each branch signals the request's [`CleanupBarrier`] exactly once
//! when it settles, including when it is a no-op, fails, or panics, so the
//! working directory is reclaimed only after both are done.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{info, warn, Instrument};

use crate::cleanup::{Branch, CleanupBarrier, ReclaimStatus};
use crate::collaborators::{
    Collaborators, CommentPoster, NewRelease, ReleasePublisher, StorageReclaimer,
    VerificationRunner,
};
use crate::config::PipelineConfig;
use crate::domain::{Artifact, BuildRequest, StageOutcome, StatusState, StatusTrack};
use crate::join::join_all_outcomes;
use crate::report::{release_tag, release_title, render_spellcheck_comment};
use crate::status::StatusTracker;

/// Spellchecking description when the report could not be posted.
pub const COMMENT_FAILED_DESCRIPTION: &str = "unable to post comment";

/// Everything the post-build branches read. Shared, never mutated.
#[derive(Debug, Clone)]
pub struct PostBuildContext {
    pub request: BuildRequest,
    pub config: PipelineConfig,
    pub workdir: PathBuf,
    /// Build artifacts in entry-point order.
    pub artifacts: Vec<Artifact>,
    pub commit_message: String,
}

/// How the verification branch ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationOutcome {
    /// Not a pull request, or spellchecking disabled.
    Skipped,
    Passed,
    /// Spellchecker ran but the comment could not be posted.
    CommentFailed,
    /// Spellchecker failed.
    Failed,
    /// The branch task died before finishing.
    Aborted,
}

/// How the publish branch ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum PublishOutcome {
    /// Branch is not the pre-release branch.
    Skipped,
    Published {
        tag: String,
        uploaded: usize,
        failed_uploads: usize,
    },
    ReleaseFailed {
        tag: String,
    },
    Aborted,
}

/// Result of both branches plus the cleanup barrier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorReport {
    pub verification: VerificationOutcome,
    pub publish: PublishOutcome,
    pub reclaim: ReclaimStatus,
}

/// Starts the verification and publish branches and arms the cleanup barrier.
pub struct DependentStageCoordinator {
    verifier: Arc<dyn VerificationRunner>,
    comments: Arc<dyn CommentPoster>,
    releases: Arc<dyn ReleasePublisher>,
    reclaimer: Arc<dyn StorageReclaimer>,
}

impl DependentStageCoordinator {
    pub fn new(collaborators: &Collaborators) -> Self {
        Self {
            verifier: Arc::clone(&collaborators.verifier),
            comments: Arc::clone(&collaborators.comments),
            releases: Arc::clone(&collaborators.releases),
            reclaimer: Arc::clone(&collaborators.reclaimer),
        }
    }

    /// Run both branches to completion. Returns once the cleanup barrier has
    /// seen both signals.
    pub async fn run(
        &self,
        tracker: Arc<StatusTracker>,
        context: Arc<PostBuildContext>,
    ) -> CoordinatorReport {
        let barrier = CleanupBarrier::arm(context.workdir.clone(), Arc::clone(&self.reclaimer));

        let verification = tokio::spawn(
            verification_branch(
                Arc::clone(&self.verifier),
                Arc::clone(&self.comments),
                Arc::clone(&tracker),
                Arc::clone(&context),
            )
            .in_current_span(),
        );
        let publish = tokio::spawn(
            publish_branch(Arc::clone(&self.releases), Arc::clone(&context)).in_current_span(),
        );

        let (verification, publish) = tokio::join!(
            settle(&barrier, Branch::Verification, verification, VerificationOutcome::Aborted),
            settle(&barrier, Branch::Publish, publish, PublishOutcome::Aborted),
        );

        CoordinatorReport {
            verification,
            publish,
            reclaim: barrier.status(),
        }
    }
}

/// Await a branch task and signal its completion flag, whatever happened.
async fn settle<T>(
    barrier: &CleanupBarrier,
    branch: Branch,
    task: JoinHandle<T>,
    aborted: T,
) -> T {
    let outcome = match task.await {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!(branch = %branch, error = %e, "post-build branch aborted");
            aborted
        }
    };
    barrier.signal(branch).await;
    outcome
}

async fn verification_branch(
    verifier: Arc<dyn VerificationRunner>,
    comments: Arc<dyn CommentPoster>,
    tracker: Arc<StatusTracker>,
    context: Arc<PostBuildContext>,
) -> VerificationOutcome {
    let pr_number = match context.request.pull_request {
        Some(number) if context.config.spellchecks(&context.request) => number,
        _ => return VerificationOutcome::Skipped,
    };

    tracker
        .report(StatusTrack::Spellchecking, StatusState::Pending, None)
        .await;

    let output = match verifier
        .run(&context.workdir, context.config.dictionary.as_deref())
        .await
    {
        StageOutcome::Success(output) => output,
        StageOutcome::Failure(failure) => {
            warn!(message = %failure.message, cause = ?failure.cause, "spellchecking failed");
            tracker
                .report(StatusTrack::Spellchecking, StatusState::Error, None)
                .await;
            return VerificationOutcome::Failed;
        }
    };

    let target = &context.request.target;
    let body = render_spellcheck_comment(target, &output);
    match comments
        .post_comment(&target.owner, &target.repo, pr_number, &body)
        .await
    {
        Ok(()) => {
            info!(pull_request = pr_number, "posted spellchecking report");
            tracker
                .report(StatusTrack::Spellchecking, StatusState::Success, None)
                .await;
            VerificationOutcome::Passed
        }
        Err(e) => {
            warn!(pull_request = pr_number, error = %e, "failed to post spellchecking report");
            tracker
                .report(
                    StatusTrack::Spellchecking,
                    StatusState::Failure,
                    Some(COMMENT_FAILED_DESCRIPTION),
                )
                .await;
            VerificationOutcome::CommentFailed
        }
    }
}

async fn publish_branch(
    releases: Arc<dyn ReleasePublisher>,
    context: Arc<PostBuildContext>,
) -> PublishOutcome {
    if !context.config.publishes(&context.request.branch) {
        return PublishOutcome::Skipped;
    }

    let target = &context.request.target;
    let tag = release_tag(Utc::now(), target);
    let title = release_title(&context.commit_message, target);

    let release = match releases
        .create_release(NewRelease {
            owner: &target.owner,
            repo: &target.repo,
            tag_name: &tag,
            target_revision: &target.revision,
            title: &title,
        })
        .await
    {
        Ok(release) => release,
        Err(e) => {
            warn!(tag = %tag, error = %e, "failed to create pre-release");
            return PublishOutcome::ReleaseFailed { tag };
        }
    };
    info!(tag = %tag, release_id = release.id, "created pre-release");

    let uploads: Vec<_> = context
        .artifacts
        .iter()
        .map(|artifact| {
            let releases = Arc::clone(&releases);
            let release = release.clone();
            let path = artifact.path.clone();
            let asset_name = artifact.asset_name();
            async move {
                StageOutcome::from_result(releases.upload_asset(&release, &path, &asset_name).await)
            }
        })
        .collect();

    let outcomes = join_all_outcomes(uploads).await;
    let mut failed_uploads = 0;
    for (artifact, outcome) in context.artifacts.iter().zip(&outcomes) {
        if let Some(failure) = outcome.as_failure() {
            failed_uploads += 1;
            warn!(asset = %artifact.asset_name(), message = %failure.message, "failed to upload asset");
        }
    }

    PublishOutcome::Published {
        tag,
        uploaded: outcomes.len() - failed_uploads,
        failed_uploads,
    }
}
