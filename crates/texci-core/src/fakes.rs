//! In-memory fakes for the collaborator traits (testing only).
//!
//! Every fake records what it was asked to do so tests can assert on the
//! calls. Failing variants still record the attempt.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::collaborators::{
    BuildRunner, Collaborators, CommentPoster, ConfigLoader, NewRelease, ReleaseHandle,
    ReleasePublisher, SourceFetcher, StatusReporter, StorageReclaimer, VerificationRunner,
};
use crate::config::PipelineConfig;
use crate::domain::{
    BuildOutput, PipelineError, Result, SourceRef, StageOutcome, StatusState, StatusTrack,
    VerificationOutput,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|p| p.into_inner())
}

// ---------------------------------------------------------------------------
// FakeFetcher
// ---------------------------------------------------------------------------

/// Hands out `<root>/<owner>-<repo>-<revision>` without touching the disk.
#[derive(Debug)]
pub struct FakeFetcher {
    root: PathBuf,
    fetch_error: Mutex<Option<String>>,
    commit_message: Mutex<Option<String>>,
    fetched: Mutex<Vec<SourceRef>>,
}

impl Default for FakeFetcher {
    fn default() -> Self {
        Self::new("/tmp/texci-fake")
    }
}

impl FakeFetcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            fetch_error: Mutex::new(None),
            commit_message: Mutex::new(Some("Update document".to_string())),
            fetched: Mutex::new(Vec::new()),
        }
    }

    /// Make every subsequent fetch fail with `message`.
    pub fn fail(&self, message: impl Into<String>) {
        *lock(&self.fetch_error) = Some(message.into());
    }

    /// Commit message returned by `read_commit_message`; `None` makes it fail.
    pub fn set_commit_message(&self, message: Option<&str>) {
        *lock(&self.commit_message) = message.map(str::to_string);
    }

    pub fn workdir_for(&self, source: &SourceRef) -> PathBuf {
        self.root
            .join(format!("{}-{}-{}", source.owner, source.repo, source.revision))
    }

    pub fn fetched(&self) -> Vec<SourceRef> {
        lock(&self.fetched).clone()
    }
}

#[async_trait]
impl SourceFetcher for FakeFetcher {
    async fn fetch(&self, source: &SourceRef) -> Result<PathBuf> {
        lock(&self.fetched).push(source.clone());
        if let Some(message) = lock(&self.fetch_error).clone() {
            return Err(PipelineError::Fetch(message));
        }
        Ok(self.workdir_for(source))
    }

    async fn read_commit_message(&self, _workdir: &Path, revision: &str) -> Result<String> {
        lock(&self.commit_message)
            .clone()
            .ok_or_else(|| PipelineError::Fetch(format!("unknown revision {}", revision)))
    }
}

// ---------------------------------------------------------------------------
// StaticConfigLoader
// ---------------------------------------------------------------------------

/// Returns the same configuration for every working directory.
#[derive(Debug, Default)]
pub struct StaticConfigLoader {
    config: Mutex<PipelineConfig>,
}

impl StaticConfigLoader {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config: Mutex::new(config),
        }
    }

    pub fn set(&self, config: PipelineConfig) {
        *lock(&self.config) = config;
    }
}

#[async_trait]
impl ConfigLoader for StaticConfigLoader {
    async fn load(&self, _workdir: &Path) -> PipelineConfig {
        lock(&self.config).clone()
    }
}

// ---------------------------------------------------------------------------
// ScriptedBuildRunner
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum BuildScript {
    Fail(String),
    NoArtifact,
}

/// Succeeds with `<workdir>/<stem>.pdf` unless an entry point is scripted
/// otherwise.
#[derive(Debug, Default)]
pub struct ScriptedBuildRunner {
    scripts: Mutex<HashMap<String, BuildScript>>,
    built: Mutex<Vec<String>>,
}

impl ScriptedBuildRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(self, entry_point: &str, message: &str) -> Self {
        lock(&self.scripts).insert(entry_point.to_string(), BuildScript::Fail(message.to_string()));
        self
    }

    /// Report success without producing an artifact.
    pub fn no_artifact(self, entry_point: &str) -> Self {
        lock(&self.scripts).insert(entry_point.to_string(), BuildScript::NoArtifact);
        self
    }

    /// Entry points built so far, in call order.
    pub fn built(&self) -> Vec<String> {
        lock(&self.built).clone()
    }
}

#[async_trait]
impl BuildRunner for ScriptedBuildRunner {
    async fn run(&self, workdir: &Path, entry_point: &str) -> StageOutcome<BuildOutput> {
        lock(&self.built).push(entry_point.to_string());
        let script = lock(&self.scripts).get(entry_point).cloned();
        match script {
            Some(BuildScript::Fail(message)) => StageOutcome::failure(message),
            Some(BuildScript::NoArtifact) => StageOutcome::Success(BuildOutput {
                entry_point: entry_point.to_string(),
                artifact: None,
                log: String::new(),
            }),
            None => {
                let stem = Path::new(entry_point)
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| entry_point.to_string());
                StageOutcome::Success(BuildOutput {
                    entry_point: entry_point.to_string(),
                    artifact: Some(workdir.join(format!("{}.pdf", stem))),
                    log: String::new(),
                })
            }
        }
    }
}

// ---------------------------------------------------------------------------
// ScriptedVerifier
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum VerifyScript {
    Succeed(String),
    Fail(String),
    Panic,
}

/// Spellchecker stand-in. Succeeds with an empty report by default.
#[derive(Debug)]
pub struct ScriptedVerifier {
    script: Mutex<VerifyScript>,
    dictionaries: Mutex<Vec<Option<String>>>,
}

impl Default for ScriptedVerifier {
    fn default() -> Self {
        Self {
            script: Mutex::new(VerifyScript::Succeed(String::new())),
            dictionaries: Mutex::new(Vec::new()),
        }
    }
}

impl ScriptedVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn succeed(&self, report: &str) {
        *lock(&self.script) = VerifyScript::Succeed(report.to_string());
    }

    pub fn fail(&self, message: &str) {
        *lock(&self.script) = VerifyScript::Fail(message.to_string());
    }

    /// Panic inside `run`, to exercise task failure handling.
    pub fn panic(&self) {
        *lock(&self.script) = VerifyScript::Panic;
    }

    /// Dictionary argument of every run, in call order.
    pub fn runs(&self) -> Vec<Option<String>> {
        lock(&self.dictionaries).clone()
    }
}

#[async_trait]
impl VerificationRunner for ScriptedVerifier {
    async fn run(&self, _workdir: &Path, dictionary: Option<&str>) -> StageOutcome<VerificationOutput> {
        lock(&self.dictionaries).push(dictionary.map(str::to_string));
        let script = lock(&self.script).clone();
        match script {
            VerifyScript::Succeed(report) => StageOutcome::Success(VerificationOutput { log: report }),
            VerifyScript::Fail(message) => StageOutcome::failure(message),
            VerifyScript::Panic => panic!("scripted verifier panic"),
        }
    }
}

// ---------------------------------------------------------------------------
// RecordingStatusReporter
// ---------------------------------------------------------------------------

/// One `set_status` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedStatus {
    /// `owner/repo` the status was posted to.
    pub repo: String,
    pub revision: String,
    pub track: StatusTrack,
    pub state: StatusState,
    pub description: String,
}

#[derive(Debug, Default)]
pub struct RecordingStatusReporter {
    reports: Mutex<Vec<RecordedStatus>>,
    failing: bool,
}

impl RecordingStatusReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records every call, then returns an error.
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn reports(&self) -> Vec<RecordedStatus> {
        lock(&self.reports).clone()
    }

    pub fn reports_for(&self, track: StatusTrack) -> Vec<RecordedStatus> {
        lock(&self.reports)
            .iter()
            .filter(|r| r.track == track)
            .cloned()
            .collect()
    }

    pub fn states_for(&self, track: StatusTrack) -> Vec<StatusState> {
        self.reports_for(track).into_iter().map(|r| r.state).collect()
    }
}

#[async_trait]
impl StatusReporter for RecordingStatusReporter {
    async fn set_status(
        &self,
        source: &SourceRef,
        track: StatusTrack,
        state: StatusState,
        description: &str,
    ) -> Result<()> {
        lock(&self.reports).push(RecordedStatus {
            repo: source.slug(),
            revision: source.revision.clone(),
            track,
            state,
            description: description.to_string(),
        });
        if self.failing {
            return Err(PipelineError::Reporting("status endpoint unavailable".to_string()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// RecordingCommentPoster
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostedComment {
    pub owner: String,
    pub repo: String,
    pub pr_number: u64,
    pub body: String,
}

#[derive(Debug, Default)]
pub struct RecordingCommentPoster {
    posted: Mutex<Vec<PostedComment>>,
    failing: AtomicBool,
}

impl RecordingCommentPoster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    pub fn posted(&self) -> Vec<PostedComment> {
        lock(&self.posted).clone()
    }
}

#[async_trait]
impl CommentPoster for RecordingCommentPoster {
    async fn post_comment(&self, owner: &str, repo: &str, pr_number: u64, body: &str) -> Result<()> {
        lock(&self.posted).push(PostedComment {
            owner: owner.to_string(),
            repo: repo.to_string(),
            pr_number,
            body: body.to_string(),
        });
        if self.failing.load(Ordering::SeqCst) {
            return Err(PipelineError::Reporting("comment rejected".to_string()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// RecordingReleasePublisher
// ---------------------------------------------------------------------------

/// Owned copy of a [`NewRelease`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedRelease {
    pub owner: String,
    pub repo: String,
    pub tag_name: String,
    pub target_revision: String,
    pub title: String,
}

#[derive(Debug, Default)]
pub struct RecordingReleasePublisher {
    created: Mutex<Vec<CreatedRelease>>,
    /// `owner/repo@tag` of every accepted release.
    tags: Mutex<HashSet<String>>,
    uploaded: Mutex<Vec<String>>,
    fail_create: AtomicBool,
    failing_assets: Mutex<HashSet<String>>,
}

impl RecordingReleasePublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_create(&self) {
        self.fail_create.store(true, Ordering::SeqCst);
    }

    pub fn fail_upload(&self, asset_name: &str) {
        lock(&self.failing_assets).insert(asset_name.to_string());
    }

    /// Every create attempt.
    pub fn created(&self) -> Vec<CreatedRelease> {
        lock(&self.created).clone()
    }

    /// Asset names that were uploaded successfully.
    pub fn uploaded_assets(&self) -> Vec<String> {
        lock(&self.uploaded).clone()
    }
}

#[async_trait]
impl ReleasePublisher for RecordingReleasePublisher {
    async fn create_release(&self, release: NewRelease<'_>) -> Result<ReleaseHandle> {
        let id = {
            let mut created = lock(&self.created);
            created.push(CreatedRelease {
                owner: release.owner.to_string(),
                repo: release.repo.to_string(),
                tag_name: release.tag_name.to_string(),
                target_revision: release.target_revision.to_string(),
                title: release.title.to_string(),
            });
            created.len() as u64
        };
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(PipelineError::Reporting("release rejected".to_string()));
        }
        let key = format!("{}/{}@{}", release.owner, release.repo, release.tag_name);
        if !lock(&self.tags).insert(key) {
            return Err(PipelineError::Reporting(format!(
                "tag {} already exists",
                release.tag_name
            )));
        }
        Ok(ReleaseHandle {
            id,
            tag_name: release.tag_name.to_string(),
            upload_url: format!(
                "https://uploads.example.test/repos/{}/{}/releases/{}/assets",
                release.owner, release.repo, id
            ),
        })
    }

    async fn upload_asset(&self, _release: &ReleaseHandle, _file: &Path, asset_name: &str) -> Result<()> {
        if lock(&self.failing_assets).contains(asset_name) {
            return Err(PipelineError::Reporting(format!("upload of {} rejected", asset_name)));
        }
        lock(&self.uploaded).push(asset_name.to_string());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// RecordingReclaimer
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct RecordingReclaimer {
    deleted: Mutex<Vec<PathBuf>>,
    failing: bool,
}

impl RecordingReclaimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records every call, then returns an error.
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn deleted(&self) -> Vec<PathBuf> {
        lock(&self.deleted).clone()
    }
}

#[async_trait]
impl StorageReclaimer for RecordingReclaimer {
    async fn delete(&self, workdir: &Path) -> Result<()> {
        lock(&self.deleted).push(workdir.to_path_buf());
        if self.failing {
            return Err(PipelineError::Storage("permission denied".to_string()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FakeCollaborators
// ---------------------------------------------------------------------------

/// One of each fake, kept as concrete types for assertions.
#[derive(Clone)]
pub struct FakeCollaborators {
    pub fetcher: Arc<FakeFetcher>,
    pub config_loader: Arc<StaticConfigLoader>,
    pub builder: Arc<ScriptedBuildRunner>,
    pub verifier: Arc<ScriptedVerifier>,
    pub status: Arc<RecordingStatusReporter>,
    pub comments: Arc<RecordingCommentPoster>,
    pub releases: Arc<RecordingReleasePublisher>,
    pub reclaimer: Arc<RecordingReclaimer>,
}

impl Default for FakeCollaborators {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeCollaborators {
    pub fn new() -> Self {
        Self {
            fetcher: Arc::new(FakeFetcher::default()),
            config_loader: Arc::new(StaticConfigLoader::default()),
            builder: Arc::new(ScriptedBuildRunner::new()),
            verifier: Arc::new(ScriptedVerifier::new()),
            status: Arc::new(RecordingStatusReporter::new()),
            comments: Arc::new(RecordingCommentPoster::new()),
            releases: Arc::new(RecordingReleasePublisher::new()),
            reclaimer: Arc::new(RecordingReclaimer::new()),
        }
    }

    pub fn with_builder(mut self, builder: ScriptedBuildRunner) -> Self {
        self.builder = Arc::new(builder);
        self
    }

    pub fn with_config(self, config: PipelineConfig) -> Self {
        self.config_loader.set(config);
        self
    }

    /// Trait-object view for the orchestrator.
    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            fetcher: self.fetcher.clone(),
            config_loader: self.config_loader.clone(),
            builder: self.builder.clone(),
            verifier: self.verifier.clone(),
            status: self.status.clone(),
            comments: self.comments.clone(),
            releases: self.releases.clone(),
            reclaimer: self.reclaimer.clone(),
        }
    }
}
