//! Runner configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default image carrying `latexmk` and a TeX distribution.
pub const DEFAULT_BUILD_IMAGE: &str = "texci/latex:latest";

/// Default image carrying the spellchecker.
pub const DEFAULT_SPELLCHECK_IMAGE: &str = "texci/spellcheck:latest";

/// Default per-command timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 600;

/// Settings shared by the git and docker collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Container runtime executable.
    pub docker_bin: String,
    /// git executable.
    pub git_bin: String,
    /// Image used for typesetting.
    pub build_image: String,
    /// Image used for spellchecking.
    pub spellcheck_image: String,
    /// Directory under which per-request working directories are created.
    pub workspace_root: PathBuf,
    /// Repositories are cloned from `<clone_base>/<owner>/<repo>.git`.
    pub clone_base: String,
    /// Timeout for every spawned command (0 = none).
    pub timeout_secs: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        RunnerConfig {
            docker_bin: std::env::var("TEXCI_DOCKER").unwrap_or_else(|_| "docker".to_string()),
            git_bin: "git".to_string(),
            build_image: std::env::var("TEXCI_BUILD_IMAGE")
                .unwrap_or_else(|_| DEFAULT_BUILD_IMAGE.to_string()),
            spellcheck_image: std::env::var("TEXCI_SPELLCHECK_IMAGE")
                .unwrap_or_else(|_| DEFAULT_SPELLCHECK_IMAGE.to_string()),
            workspace_root: std::env::var("TEXCI_WORKSPACE_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|_| std::env::temp_dir().join("texci")),
            clone_base: std::env::var("TEXCI_CLONE_BASE")
                .unwrap_or_else(|_| "https://github.com".to_string()),
            timeout_secs: std::env::var("TEXCI_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl RunnerConfig {
    /// Create a new config from environment variables
    pub fn from_env() -> Self {
        Self::default()
    }

    pub fn with_workspace_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.workspace_root = root.into();
        self
    }

    pub fn with_clone_base(mut self, base: impl Into<String>) -> Self {
        self.clone_base = base.into();
        self
    }

    pub fn with_docker_bin(mut self, docker_bin: impl Into<String>) -> Self {
        self.docker_bin = docker_bin.into();
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Clone URL of `owner/repo`.
    pub fn clone_url(&self, owner: &str, repo: &str) -> String {
        format!("{}/{}/{}.git", self.clone_base.trim_end_matches('/'), owner, repo)
    }
}
