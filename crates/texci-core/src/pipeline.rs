//! Linear stage pipeline for one build request.
//!
//! ```text
//! accept ──► fetch ──► commit message ──► config ──► fan-out ──► coordinator
//!              │                                        │
//!              └─ typesetting=failure                   └─ typesetting=error,
//!                 (nothing to reclaim)                     barrier released at once
//! ```
//!
//! Each stage receives the immutable request and config and either hands
//! its output to the next stage or ends the run. Every run yields a
//! [`PipelineReport`].

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{info, warn, Instrument};
use uuid::Uuid;

use crate::cleanup::{Branch, CleanupBarrier, ReclaimStatus};
use crate::collaborators::Collaborators;
use crate::coordinator::{
    DependentStageCoordinator, PostBuildContext, PublishOutcome, VerificationOutcome,
};
use crate::domain::{Artifact, BuildRequest, SourceRef, StatusState, StatusTrack};
use crate::fanout::{BuildFanOutStage, EntryFailure, FanOutOutcome};
use crate::obs;
use crate::status::{StatusTracker, TrackState};

/// Furthest stage a run reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageReached {
    Fetch,
    Build,
    PostBuild,
}

/// Summary of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineReport {
    pub request_id: Uuid,
    pub source: SourceRef,
    pub target: SourceRef,
    pub branch: String,
    pub pull_request: Option<u64>,
    pub stage: StageReached,
    pub workdir: Option<PathBuf>,
    pub typesetting: Option<TrackState>,
    pub spellchecking: Option<TrackState>,
    pub artifacts: Vec<Artifact>,
    pub build_failures: Vec<EntryFailure>,
    pub verification: VerificationOutcome,
    pub publish: PublishOutcome,
    /// `None` when no working directory was ever allocated.
    pub reclaim: Option<ReclaimStatus>,
    pub duration_ms: u64,
}

impl PipelineReport {
    fn new(request: &BuildRequest) -> Self {
        Self {
            request_id: request.id,
            source: request.source.clone(),
            target: request.target.clone(),
            branch: request.branch.clone(),
            pull_request: request.pull_request,
            stage: StageReached::Fetch,
            workdir: None,
            typesetting: None,
            spellchecking: None,
            artifacts: Vec::new(),
            build_failures: Vec::new(),
            verification: VerificationOutcome::Skipped,
            publish: PublishOutcome::Skipped,
            reclaim: None,
            duration_ms: 0,
        }
    }

    /// Tag of the created release, if any.
    pub fn release_tag(&self) -> Option<&str> {
        match &self.publish {
            PublishOutcome::Published { tag, .. } | PublishOutcome::ReleaseFailed { tag } => {
                Some(tag)
            }
            PublishOutcome::Skipped | PublishOutcome::Aborted => None,
        }
    }

    /// Whether typesetting finished successfully.
    pub fn built(&self) -> bool {
        matches!(
            self.typesetting.as_ref().map(|t| t.state),
            Some(StatusState::Success)
        )
    }
}

/// Runs build requests against an injected set of collaborators.
#[derive(Clone)]
pub struct Orchestrator {
    collaborators: Collaborators,
}

impl Orchestrator {
    pub fn new(collaborators: Collaborators) -> Self {
        Self { collaborators }
    }

    /// Run one request to completion.
    pub async fn run(&self, request: BuildRequest) -> PipelineReport {
        let span = obs::request_span(&request);
        self.run_request(request).instrument(span).await
    }

    /// Run independent requests concurrently. Reports are in input order.
    pub async fn run_all(&self, requests: Vec<BuildRequest>) -> Vec<PipelineReport> {
        futures::future::join_all(requests.into_iter().map(|request| self.run(request))).await
    }

    async fn run_request(&self, request: BuildRequest) -> PipelineReport {
        let started = Instant::now();
        obs::emit_pipeline_started(&request);

        let tracker = Arc::new(StatusTracker::new(
            request.target.clone(),
            Arc::clone(&self.collaborators.status),
        ));
        let mut report = PipelineReport::new(&request);

        tracker
            .report(StatusTrack::Typesetting, StatusState::Pending, None)
            .await;

        // Stage: fetch
        let workdir = match self.collaborators.fetcher.fetch(&request.source).await {
            Ok(workdir) => workdir,
            Err(e) => {
                warn!(error = %e, "failed to fetch source");
                tracker
                    .report(StatusTrack::Typesetting, StatusState::Failure, None)
                    .await;
                return finish(report, &tracker, started);
            }
        };
        info!(workdir = %workdir.display(), "fetched source");
        report.workdir = Some(workdir.clone());
        report.stage = StageReached::Build;

        // Stage: commit message (only used for the release title)
        let commit_message = match self
            .collaborators
            .fetcher
            .read_commit_message(&workdir, &request.source.revision)
            .await
        {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "failed to read commit message");
                String::new()
            }
        };

        // Stage: config
        let config = self.collaborators.config_loader.load(&workdir).await;

        // Stage: build fan-out
        let fanout = BuildFanOutStage::new(Arc::clone(&self.collaborators.builder));
        match fanout.execute(&tracker, &request, &config, &workdir).await {
            FanOutOutcome::Succeeded { artifacts } => {
                report.stage = StageReached::PostBuild;
                report.artifacts = artifacts.clone();

                let context = Arc::new(PostBuildContext {
                    request,
                    config,
                    workdir,
                    artifacts,
                    commit_message,
                });
                let outcome = DependentStageCoordinator::new(&self.collaborators)
                    .run(Arc::clone(&tracker), context)
                    .await;

                report.verification = outcome.verification;
                report.publish = outcome.publish;
                report.reclaim = Some(outcome.reclaim);
            }
            FanOutOutcome::Failed { failures } => {
                report.build_failures = failures;

                // Neither branch runs; release the barrier straight away.
                let barrier =
                    CleanupBarrier::arm(workdir, Arc::clone(&self.collaborators.reclaimer));
                for branch in Branch::ALL {
                    barrier.signal(branch).await;
                }
                report.reclaim = Some(barrier.status());
            }
        }

        finish(report, &tracker, started)
    }
}

fn finish(mut report: PipelineReport, tracker: &StatusTracker, started: Instant) -> PipelineReport {
    report.typesetting = tracker.state_of(StatusTrack::Typesetting);
    report.spellchecking = tracker.state_of(StatusTrack::Spellchecking);
    report.duration_ms = started.elapsed().as_millis() as u64;
    obs::emit_pipeline_finished(report.duration_ms, report.typesetting.as_ref().map(|t| t.state));
    report
}
