//! Per-project pipeline configuration (`.texci.yml`).

use std::collections::HashMap;
use std::collections::HashSet;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::collaborators::ConfigLoader;
use crate::domain::{BuildRequest, PipelineError};

/// File name looked up at the root of the working directory.
pub const CONFIG_FILE_NAME: &str = ".texci.yml";

/// Entry point built when the project does not list any.
pub const DEFAULT_DOCUMENT: &str = "main.tex";

/// Branch whose builds are published as pre-releases by default.
pub const DEFAULT_PRERELEASE_BRANCH: &str = "master";

/// Settings read once per request and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Ordered build entry points.
    pub documents: Vec<String>,

    /// Whether pull requests are spellchecked.
    pub spellcheck: bool,

    /// Branch whose pushes are published as a pre-release.
    pub prerelease: String,

    /// Extra dictionary for the spellchecker, relative to the working directory.
    pub dictionary: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            documents: vec![DEFAULT_DOCUMENT.to_string()],
            spellcheck: true,
            prerelease: DEFAULT_PRERELEASE_BRANCH.to_string(),
            dictionary: None,
        }
    }
}

impl PipelineConfig {
    /// Parse YAML, normalising the document list and rejecting documents
    /// whose outputs would overwrite each other.
    pub fn from_yaml(content: &str) -> Result<Self, PipelineError> {
        let config: PipelineConfig = if content.trim().is_empty() {
            PipelineConfig::default()
        } else {
            serde_yaml::from_str(content).map_err(|e| PipelineError::Config(e.to_string()))?
        };
        let config = config.normalized();
        config.validate()?;
        Ok(config)
    }

    /// Drop blank and repeated entries; an empty list becomes the default.
    fn normalized(mut self) -> Self {
        let mut seen = HashSet::new();
        self.documents
            .retain(|d| !d.trim().is_empty() && seen.insert(d.clone()));
        if self.documents.is_empty() {
            self.documents = vec![DEFAULT_DOCUMENT.to_string()];
        }
        self
    }

    /// Every document must produce a distinctly named artifact.
    pub fn validate(&self) -> Result<(), PipelineError> {
        let mut stems: HashMap<String, &str> = HashMap::new();
        for document in &self.documents {
            if let Some(previous) = stems.insert(document_stem(document), document) {
                return Err(PipelineError::Config(format!(
                    "documents {} and {} produce the same artifact",
                    previous, document
                )));
            }
        }
        Ok(())
    }

    /// Whether `branch` is the one published as a pre-release.
    pub fn publishes(&self, branch: &str) -> bool {
        self.prerelease == branch
    }

    /// Whether the spellchecking track applies to `request`.
    pub fn spellchecks(&self, request: &BuildRequest) -> bool {
        self.spellcheck && request.is_pull_request()
    }
}

/// File stem of an entry point; its artifact is `<stem>.pdf` at the root of
/// the working directory.
pub fn document_stem(entry_point: &str) -> String {
    Path::new(entry_point)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| entry_point.to_string())
}

/// Reads [`CONFIG_FILE_NAME`] from the working directory.
#[derive(Debug, Clone, Default)]
pub struct FileConfigLoader;

impl FileConfigLoader {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ConfigLoader for FileConfigLoader {
    async fn load(&self, workdir: &Path) -> PipelineConfig {
        let path = workdir.join(CONFIG_FILE_NAME);
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => match PipelineConfig::from_yaml(&content) {
                Ok(config) => {
                    debug!(path = %path.display(), "loaded project config");
                    config
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "malformed project config, using defaults");
                    PipelineConfig::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no project config, using defaults");
                PipelineConfig::default()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "unreadable project config, using defaults");
                PipelineConfig::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.documents, vec!["main.tex".to_string()]);
        assert!(config.spellcheck);
        assert_eq!(config.prerelease, "master");
        assert!(config.dictionary.is_none());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = PipelineConfig::from_yaml("prerelease: release\n").expect("parse");
        assert_eq!(config.prerelease, "release");
        assert_eq!(config.documents, vec!["main.tex".to_string()]);
        assert!(config.spellcheck);
    }

    #[test]
    fn test_full_yaml() {
        let yaml = "documents:\n  - thesis.tex\n  - slides.tex\nspellcheck: false\nprerelease: main\ndictionary: words.txt\n";
        let config = PipelineConfig::from_yaml(yaml).expect("parse");
        assert_eq!(config.documents, vec!["thesis.tex", "slides.tex"]);
        assert!(!config.spellcheck);
        assert_eq!(config.prerelease, "main");
        assert_eq!(config.dictionary.as_deref(), Some("words.txt"));
    }

    #[test]
    fn test_empty_documents_normalised() {
        let config = PipelineConfig::from_yaml("documents: []\n").expect("parse");
        assert_eq!(config.documents, vec!["main.tex".to_string()]);
    }

    #[test]
    fn test_repeated_documents_dropped() {
        let config =
            PipelineConfig::from_yaml("documents: [main.tex, slides.tex, main.tex]\n").expect("parse");
        assert_eq!(config.documents, vec!["main.tex", "slides.tex"]);
    }

    #[test]
    fn test_colliding_stems_rejected() {
        let result = PipelineConfig::from_yaml("documents: [a/main.tex, b/main.tex]\n");
        match result {
            Err(PipelineError::Config(message)) => {
                assert!(message.contains("a/main.tex"));
                assert!(message.contains("b/main.tex"));
            }
            other => panic!("expected config error, got {:?}", other),
        }
    }

    #[test]
    fn test_document_stem() {
        assert_eq!(document_stem("chapters/thesis.tex"), "thesis");
        assert_eq!(document_stem("main"), "main");
    }

    #[test]
    fn test_malformed_yaml_is_error() {
        let result = PipelineConfig::from_yaml("documents: [unterminated\n");
        assert!(matches!(result, Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_spellchecks_only_pull_requests() {
        let source = crate::domain::SourceRef::new("octo", "thesis", "abc123");
        let push = BuildRequest::push(source.clone(), "master");
        let pr = BuildRequest::pull_request(source, "feature", 3);

        let config = PipelineConfig::default();
        assert!(!config.spellchecks(&push));
        assert!(config.spellchecks(&pr));

        let disabled = PipelineConfig {
            spellcheck: false,
            ..PipelineConfig::default()
        };
        assert!(!disabled.spellchecks(&pr));
    }

    #[test]
    fn test_publishes() {
        let config = PipelineConfig::default();
        assert!(config.publishes("master"));
        assert!(!config.publishes("feature/x"));
    }

    #[tokio::test]
    async fn test_loader_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = FileConfigLoader::new().load(dir.path()).await;
        assert_eq!(config, PipelineConfig::default());
    }

    #[tokio::test]
    async fn test_loader_malformed_file_gives_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "spellcheck: [not, a, bool]\n")
            .expect("write config");
        let config = FileConfigLoader::new().load(dir.path()).await;
        assert_eq!(config, PipelineConfig::default());
    }

    #[tokio::test]
    async fn test_loader_reads_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "documents: [a.tex, b.tex]\nspellcheck: false\n",
        )
        .expect("write config");
        let config = FileConfigLoader::new().load(dir.path()).await;
        assert_eq!(config.documents, vec!["a.tex", "b.tex"]);
        assert!(!config.spellcheck);
    }
}
