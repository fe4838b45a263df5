//! texci Core Library
//!
//! Orchestration engine for LaTeX continuous integration: fetch, parallel
//! document builds, spellchecking of pull requests, pre-release publishing
//! and working directory cleanup, all driven through injected collaborators.

pub mod cleanup;
pub mod collaborators;
pub mod config;
pub mod coordinator;
pub mod domain;
pub mod event;
pub mod fakes;
pub mod fanout;
pub mod gate;
pub mod join;
pub mod obs;
pub mod pipeline;
pub mod report;
pub mod status;
pub mod telemetry;

pub use domain::{
    clamp_description, Artifact, BuildOutput, BuildRequest, PipelineError, Result, SourceRef,
    StageFailure, StageOutcome, StatusState, StatusTrack, VerificationOutput,
    STATUS_CONTEXT_PREFIX,
};

pub use collaborators::{
    BuildRunner, Collaborators, CommentPoster, ConfigLoader, NewRelease, ReleaseHandle,
    ReleasePublisher, SourceFetcher, StatusReporter, StorageReclaimer, VerificationRunner,
};

pub use cleanup::{Branch, CleanupBarrier, ReclaimStatus};
pub use config::{document_stem, FileConfigLoader, PipelineConfig, CONFIG_FILE_NAME};
pub use coordinator::{DependentStageCoordinator, PublishOutcome, VerificationOutcome};
pub use event::{requests_from_event, EventKind};
pub use fanout::{run_fanout, FanOutOutcome};
pub use gate::CompletionGate;
pub use join::join_all_outcomes;
pub use pipeline::{Orchestrator, PipelineReport, StageReached};
pub use status::{StatusTracker, TrackState};
pub use telemetry::{init_tracing, LogFormat};

/// texci version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
