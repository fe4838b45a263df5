//! texci domain model.

pub mod error;
pub mod outcome;
pub mod request;
pub mod status;

pub use error::{PipelineError, Result};
pub use outcome::{Artifact, BuildOutput, StageFailure, StageOutcome, VerificationOutput};
pub use request::{BuildRequest, SourceRef};
pub use status::{clamp_description, StatusState, StatusTrack, STATUS_CONTEXT_PREFIX};
