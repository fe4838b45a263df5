//! Pipeline-level error taxonomy for texci.

/// Errors produced by collaborators and pipeline stages.
///
/// Only `Fetch` and `Build` are terminal for a request. `Verification` only
/// affects the spellchecking track, and `Reporting` / `Storage` are logged and
/// swallowed by the orchestrator.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("fetch error: {0}")]
    Fetch(String),

    #[error("build error for {entry_point}: {message}")]
    Build { entry_point: String, message: String },

    #[error("verification error: {0}")]
    Verification(String),

    #[error("reporting error: {0}")]
    Reporting(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for texci pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_error_display() {
        let err = PipelineError::Fetch("repository not found".to_string());
        assert!(err.to_string().contains("fetch error"));

        let err = PipelineError::Build {
            entry_point: "main.tex".to_string(),
            message: "latexmk exited with 12".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("main.tex"));
        assert!(msg.contains("latexmk exited with 12"));
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: PipelineError = io.into();
        assert!(matches!(err, PipelineError::Io(_)));
        assert!(err.to_string().contains("gone"));
    }
}
