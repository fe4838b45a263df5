//! Stage outcomes: the tagged result of one asynchronous operation.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::error::PipelineError;

/// Failure payload of a stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageFailure {
    /// Human-readable message.
    pub message: String,

    /// Captured log text (may be empty).
    #[serde(default)]
    pub log: String,

    /// Underlying cause, rendered.
    pub cause: Option<String>,
}

impl StageFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            log: String::new(),
            cause: None,
        }
    }

    pub fn with_log(mut self, log: impl Into<String>) -> Self {
        self.log = log.into();
        self
    }

    pub fn with_cause(mut self, cause: impl std::fmt::Display) -> Self {
        self.cause = Some(cause.to_string());
        self
    }
}

impl From<PipelineError> for StageFailure {
    fn from(err: PipelineError) -> Self {
        StageFailure::new(err.to_string())
    }
}

/// Either a success payload or a failure payload, never both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome<T> {
    Success(T),
    Failure(StageFailure),
}

impl<T> StageOutcome<T> {
    pub fn failure(message: impl Into<String>) -> Self {
        StageOutcome::Failure(StageFailure::new(message))
    }

    /// Capture a fallible operation's result as an outcome.
    pub fn from_result<E: Into<StageFailure>>(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => StageOutcome::Success(value),
            Err(e) => StageOutcome::Failure(e.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, StageOutcome::Success(_))
    }

    pub fn success(&self) -> Option<&T> {
        match self {
            StageOutcome::Success(value) => Some(value),
            StageOutcome::Failure(_) => None,
        }
    }

    pub fn as_failure(&self) -> Option<&StageFailure> {
        match self {
            StageOutcome::Success(_) => None,
            StageOutcome::Failure(failure) => Some(failure),
        }
    }
}

/// Success payload of a single build job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildOutput {
    pub entry_point: String,

    /// Produced document. `None` means the build declared success without
    /// producing output, which the fan-out stage treats as a failure.
    pub artifact: Option<PathBuf>,

    /// Captured compiler log.
    #[serde(default)]
    pub log: String,
}

/// Success payload of the verification runner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationOutput {
    /// Rendered report (markdown).
    pub log: String,
}

/// A produced document forwarded to the dependent stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub entry_point: String,
    pub path: PathBuf,
}

impl Artifact {
    /// Release asset name: the artifact's file name.
    pub fn asset_name(&self) -> String {
        file_name_of(&self.path)
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_result_captures_error() {
        let ok: StageOutcome<u8> = StageOutcome::from_result(Ok::<u8, PipelineError>(3));
        assert_eq!(ok.success(), Some(&3));

        let err: StageOutcome<u8> = StageOutcome::from_result(Err(PipelineError::Reporting(
            "upload rejected".to_string(),
        )));
        assert!(!err.is_success());
        let failure = err.as_failure().expect("failure payload");
        assert!(failure.message.contains("upload rejected"));
    }

    #[test]
    fn test_failure_builder() {
        let failure = StageFailure::new("latexmk failed")
            .with_log("! Undefined control sequence.")
            .with_cause("exit status 12");
        assert_eq!(failure.message, "latexmk failed");
        assert!(failure.log.contains("Undefined control sequence"));
        assert_eq!(failure.cause.as_deref(), Some("exit status 12"));
    }

    #[test]
    fn test_artifact_asset_name() {
        let artifact = Artifact {
            entry_point: "chapters/main.tex".to_string(),
            path: PathBuf::from("/tmp/work/chapters/main.pdf"),
        };
        assert_eq!(artifact.asset_name(), "main.pdf");
    }
}
