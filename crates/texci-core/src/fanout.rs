//! Build fan-out: one build job per entry point, joined and classified.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::collaborators::BuildRunner;
use crate::config::PipelineConfig;
use crate::domain::{
    Artifact, BuildOutput, BuildRequest, StageFailure, StageOutcome, StatusState, StatusTrack,
};
use crate::join::join_all_outcomes;
use crate::obs;
use crate::status::StatusTracker;

/// Spellchecking description when the build produced nothing to check.
pub const NO_ARTIFACT_DESCRIPTION: &str = "no artifact available";

/// A failed entry point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryFailure {
    pub entry_point: String,
    pub failure: StageFailure,
}

/// Aggregate outcome over all entry points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FanOutOutcome {
    /// Every entry point produced an artifact; artifacts are in entry-point order.
    Succeeded { artifacts: Vec<Artifact> },
    /// At least one entry point failed or produced nothing.
    Failed { failures: Vec<EntryFailure> },
}

impl FanOutOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, FanOutOutcome::Succeeded { .. })
    }
}

/// Classify joined build outcomes. A success without an artifact counts as
/// a failure; there is no partial success.
pub fn classify(entry_points: &[String], outcomes: Vec<StageOutcome<BuildOutput>>) -> FanOutOutcome {
    let mut artifacts = Vec::with_capacity(outcomes.len());
    let mut failures = Vec::new();

    for (entry_point, outcome) in entry_points.iter().zip(outcomes) {
        match outcome {
            StageOutcome::Success(BuildOutput {
                artifact: Some(path),
                ..
            }) => artifacts.push(Artifact {
                entry_point: entry_point.clone(),
                path,
            }),
            StageOutcome::Success(BuildOutput { log, .. }) => failures.push(EntryFailure {
                entry_point: entry_point.clone(),
                failure: StageFailure::new("build finished without producing an artifact")
                    .with_log(log),
            }),
            StageOutcome::Failure(failure) => failures.push(EntryFailure {
                entry_point: entry_point.clone(),
                failure,
            }),
        }
    }

    if failures.is_empty() && artifacts.len() == entry_points.len() {
        FanOutOutcome::Succeeded { artifacts }
    } else {
        FanOutOutcome::Failed { failures }
    }
}

/// Run one build job per entry point concurrently and classify the result.
pub async fn run_fanout(
    builder: Arc<dyn BuildRunner>,
    workdir: &Path,
    entry_points: &[String],
) -> FanOutOutcome {
    let jobs: Vec<_> = entry_points
        .iter()
        .map(|entry_point| {
            let builder = Arc::clone(&builder);
            let workdir: PathBuf = workdir.to_path_buf();
            let entry_point = entry_point.clone();
            async move {
                info!(entry_point = %entry_point, "building entry point");
                builder.run(&workdir, &entry_point).await
            }
        })
        .collect();

    let outcomes = join_all_outcomes(jobs).await;
    let outcome = classify(entry_points, outcomes);

    let failed = match &outcome {
        FanOutOutcome::Succeeded { .. } => 0,
        FanOutOutcome::Failed { failures } => failures.len(),
    };
    obs::emit_fanout_classified(entry_points.len(), failed);
    outcome
}

/// Build stage of the pipeline: fan out, then report the typesetting track
/// (and the spellchecking track when the build left nothing to check).
pub struct BuildFanOutStage {
    builder: Arc<dyn BuildRunner>,
}

impl BuildFanOutStage {
    pub fn new(builder: Arc<dyn BuildRunner>) -> Self {
        Self { builder }
    }

    pub async fn execute(
        &self,
        tracker: &StatusTracker,
        request: &BuildRequest,
        config: &PipelineConfig,
        workdir: &Path,
    ) -> FanOutOutcome {
        let outcome = run_fanout(Arc::clone(&self.builder), workdir, &config.documents).await;

        match &outcome {
            FanOutOutcome::Succeeded { artifacts } => {
                info!(artifacts = artifacts.len(), "typesetting succeeded");
                tracker
                    .report(StatusTrack::Typesetting, StatusState::Success, None)
                    .await;
            }
            FanOutOutcome::Failed { failures } => {
                for failure in failures {
                    warn!(
                        entry_point = %failure.entry_point,
                        message = %failure.failure.message,
                        cause = ?failure.failure.cause,
                        "entry point failed to build"
                    );
                }
                tracker
                    .report(StatusTrack::Typesetting, StatusState::Error, None)
                    .await;
                if config.spellchecks(request) {
                    tracker
                        .report(
                            StatusTrack::Spellchecking,
                            StatusState::Failure,
                            Some(NO_ARTIFACT_DESCRIPTION),
                        )
                        .await;
                }
            }
        }
        outcome
    }
}
