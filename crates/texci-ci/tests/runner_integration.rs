//! Integration tests for the process-backed collaborators.
//!
//! A small shell script stands in for the container runtime: it writes the
//! files the real images would produce into the mounted working directory.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Command as StdCommand;
use std::sync::Arc;

use texci_ci::{DockerBuildRunner, DockerSpellchecker, FsReclaimer, GitFetcher, RunnerConfig};
use texci_core::fakes::FakeCollaborators;
use texci_core::{
    BuildRequest, BuildRunner, FileConfigLoader, Orchestrator, ReclaimStatus, SourceRef,
    StageOutcome, StatusState, StatusTrack, VerificationRunner,
};

const FAKE_DOCKER: &str = r#"#!/bin/sh
mount="$4"
dir="${mount%:/data}"
for last; do :; done
case "$last" in
  *.tex) echo "%PDF-1.4" > "$dir/$(basename "$last" .tex).pdf" ;;
  *) printf '|TYPOS|\n|-|\n|Teh|\n' > "$dir/.texci-spellcheck.md" ;;
esac
"#;

fn fake_docker(dir: &Path) -> PathBuf {
    let path = dir.join("docker");
    std::fs::write(&path, FAKE_DOCKER).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

fn run_git(repo_dir: &Path, args: &[&str]) -> String {
    let output = StdCommand::new("git")
        .args(args)
        .current_dir(repo_dir)
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// Test: build runner reports the document the container wrote
#[tokio::test]
async fn test_build_runner_finds_artifact() {
    let bin = tempfile::tempdir().unwrap();
    let workdir = tempfile::tempdir().unwrap();
    let config = RunnerConfig::default()
        .with_docker_bin(fake_docker(bin.path()).to_string_lossy())
        .with_timeout(60);

    let outcome = DockerBuildRunner::new(config).run(workdir.path(), "thesis.tex").await;

    let output = outcome.success().expect("build should succeed");
    assert_eq!(output.artifact, Some(workdir.path().join("thesis.pdf")));
}

/// Test: zero exit without a document yields no artifact
#[tokio::test]
async fn test_build_runner_without_document() {
    let workdir = tempfile::tempdir().unwrap();
    let config = RunnerConfig::default().with_docker_bin("true").with_timeout(60);

    let outcome = DockerBuildRunner::new(config).run(workdir.path(), "main.tex").await;

    let output = outcome.success().expect("exit code 0");
    assert_eq!(output.artifact, None);
}

/// Test: non-zero exit is a failure carrying the exit code
#[tokio::test]
async fn test_build_runner_failure() {
    let workdir = tempfile::tempdir().unwrap();
    let config = RunnerConfig::default().with_docker_bin("false").with_timeout(60);

    let outcome = DockerBuildRunner::new(config).run(workdir.path(), "main.tex").await;

    match outcome {
        StageOutcome::Failure(failure) => assert!(failure.message.contains("exited with code 1")),
        other => panic!("expected failure, got {:?}", other),
    }
}

/// Test: spellchecker output is read from the report file
#[tokio::test]
async fn test_spellchecker_reads_report() {
    let bin = tempfile::tempdir().unwrap();
    let workdir = tempfile::tempdir().unwrap();
    let config = RunnerConfig::default()
        .with_docker_bin(fake_docker(bin.path()).to_string_lossy())
        .with_timeout(60);

    let outcome = DockerSpellchecker::new(config).run(workdir.path(), None).await;

    let output = outcome.success().expect("spellcheck should succeed");
    assert!(output.log.contains("|Teh|"));
}

/// Test: unavailable runtime is a verification failure, not a panic
#[tokio::test]
async fn test_spellchecker_missing_runtime() {
    let workdir = tempfile::tempdir().unwrap();
    let config = RunnerConfig::default()
        .with_docker_bin("texci-no-such-runtime")
        .with_timeout(60);

    let outcome = DockerSpellchecker::new(config).run(workdir.path(), None).await;
    assert!(!outcome.is_success());
}

/// Test: full pipeline with git, fake container runtime and disk cleanup
#[tokio::test]
async fn test_pipeline_end_to_end() {
    let bin = tempfile::tempdir().unwrap();
    let remote = tempfile::tempdir().unwrap();
    let workspace = tempfile::tempdir().unwrap();

    let repo = remote.path().join("octo").join("thesis.git");
    std::fs::create_dir_all(&repo).unwrap();
    run_git(&repo, &["init", "--quiet"]);
    run_git(&repo, &["config", "user.name", "test-user"]);
    run_git(&repo, &["config", "user.email", "test@example.com"]);
    std::fs::write(repo.join("main.tex"), "\\documentclass{article}\n").unwrap();
    std::fs::write(repo.join("appendix.tex"), "\\documentclass{article}\n").unwrap();
    std::fs::write(
        repo.join(".texci.yml"),
        "documents:\n  - main.tex\n  - appendix.tex\n",
    )
    .unwrap();
    run_git(&repo, &["add", "."]);
    run_git(&repo, &["commit", "--quiet", "-m", "Add appendix"]);
    let revision = run_git(&repo, &["rev-parse", "HEAD"]);

    let config = RunnerConfig::default()
        .with_docker_bin(fake_docker(bin.path()).to_string_lossy())
        .with_clone_base(remote.path().to_string_lossy())
        .with_workspace_root(workspace.path())
        .with_timeout(60);

    let fakes = FakeCollaborators::new();
    let mut collaborators = fakes.collaborators();
    collaborators.fetcher = Arc::new(GitFetcher::new(config.clone()));
    collaborators.config_loader = Arc::new(FileConfigLoader::new());
    collaborators.builder = Arc::new(DockerBuildRunner::new(config.clone()));
    collaborators.verifier = Arc::new(DockerSpellchecker::new(config));
    collaborators.reclaimer = Arc::new(FsReclaimer::new());

    let request = BuildRequest::pull_request(SourceRef::new("octo", "thesis", revision), "master", 7);
    let report = Orchestrator::new(collaborators).run(request).await;

    assert_eq!(
        fakes.status.states_for(StatusTrack::Typesetting),
        vec![StatusState::Pending, StatusState::Success]
    );
    assert_eq!(
        fakes.status.states_for(StatusTrack::Spellchecking),
        vec![StatusState::Pending, StatusState::Success]
    );
    assert!(fakes.comments.posted()[0].body.contains("|Teh|"));

    let created = fakes.releases.created();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].title, "Add appendix");
    let mut assets = fakes.releases.uploaded_assets();
    assets.sort();
    assert_eq!(assets, vec!["appendix.pdf".to_string(), "main.pdf".to_string()]);

    assert_eq!(report.reclaim, Some(ReclaimStatus::Reclaimed));
    let leftovers = std::fs::read_dir(workspace.path()).unwrap().count();
    assert_eq!(leftovers, 0, "working directory must be removed");
}
