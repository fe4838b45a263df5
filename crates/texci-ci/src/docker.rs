//! Containerised build and spellcheck runners.
//!
//! The working directory is mounted at [`CONTAINER_DATA_DIR`]; both images
//! expect their input there.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use texci_core::{
    document_stem, BuildOutput, BuildRunner, PipelineError, StageFailure, StageOutcome,
    VerificationOutput, VerificationRunner,
};

use crate::config::RunnerConfig;
use crate::exec::{run_command, CommandOutput, CommandSpec};

/// Mount point of the working directory inside the containers.
pub const CONTAINER_DATA_DIR: &str = "/data";

/// Report file written by the spellchecker, relative to the working directory.
pub const SPELLCHECK_REPORT_FILE: &str = ".texci-spellcheck.md";

fn docker_run(config: &RunnerConfig, workdir: &Path, image: &str) -> CommandSpec {
    CommandSpec::new(&config.docker_bin)
        .args(["run", "--rm", "-v"])
        .arg(format!("{}:{}", workdir.display(), CONTAINER_DATA_DIR))
        .args(["-w", CONTAINER_DATA_DIR])
        .arg(image)
        .timeout(config.timeout_secs)
}

fn exit_failure(error: PipelineError, output: &CommandOutput) -> StageFailure {
    StageFailure::from(error).with_log(output.combined_log())
}

/// `<workdir>/<stem of entry_point>.pdf`
pub fn artifact_path(workdir: &Path, entry_point: &str) -> PathBuf {
    workdir.join(format!("{}.pdf", document_stem(entry_point)))
}

/// Runs `latexmk -pdf <entry point>` in the build image.
pub struct DockerBuildRunner {
    config: RunnerConfig,
}

impl DockerBuildRunner {
    pub fn new(config: RunnerConfig) -> Self {
        Self { config }
    }

    pub fn command(&self, workdir: &Path, entry_point: &str) -> CommandSpec {
        docker_run(&self.config, workdir, &self.config.build_image)
            .args(["latexmk", "-pdf", "-interaction=nonstopmode"])
            .arg(entry_point)
    }
}

#[async_trait]
impl BuildRunner for DockerBuildRunner {
    async fn run(&self, workdir: &Path, entry_point: &str) -> StageOutcome<BuildOutput> {
        let output = match run_command(&self.command(workdir, entry_point)).await {
            Ok(output) => output,
            Err(e) => {
                return StageOutcome::Failure(
                    StageFailure::new(format!("could not run build for {}", entry_point))
                        .with_cause(e),
                )
            }
        };
        if !output.passed() {
            let error = PipelineError::Build {
                entry_point: entry_point.to_string(),
                message: format!("latexmk exited with code {}", output.exit_code),
            };
            return StageOutcome::Failure(exit_failure(error, &output));
        }

        let path = artifact_path(workdir, entry_point);
        let artifact = match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Some(path),
            _ => {
                warn!(entry_point = %entry_point, path = %path.display(), "build produced no document");
                None
            }
        };
        info!(entry_point = %entry_point, duration_ms = output.duration_ms, "build finished");

        StageOutcome::Success(BuildOutput {
            entry_point: entry_point.to_string(),
            artifact,
            log: output.combined_log(),
        })
    }
}

/// Runs the spellchecker image over every PDF in the working directory.
pub struct DockerSpellchecker {
    config: RunnerConfig,
}

impl DockerSpellchecker {
    pub fn new(config: RunnerConfig) -> Self {
        Self { config }
    }

    pub fn command(&self, workdir: &Path, dictionary: Option<&str>) -> CommandSpec {
        let mut spec = docker_run(&self.config, workdir, &self.config.spellcheck_image)
            .arg("-o")
            .arg(format!("{}/{}", CONTAINER_DATA_DIR, SPELLCHECK_REPORT_FILE));
        if let Some(dictionary) = dictionary {
            spec = spec
                .arg("-d")
                .arg(format!("{}/{}", CONTAINER_DATA_DIR, dictionary.trim_start_matches('/')));
        }
        spec.arg(CONTAINER_DATA_DIR)
    }
}

#[async_trait]
impl VerificationRunner for DockerSpellchecker {
    async fn run(&self, workdir: &Path, dictionary: Option<&str>) -> StageOutcome<VerificationOutput> {
        let output = match run_command(&self.command(workdir, dictionary)).await {
            Ok(output) => output,
            Err(e) => {
                return StageOutcome::Failure(
                    StageFailure::new("could not run spellchecker").with_cause(e),
                )
            }
        };
        if !output.passed() {
            let error = PipelineError::Verification(format!(
                "spellchecker exited with code {}",
                output.exit_code
            ));
            return StageOutcome::Failure(exit_failure(error, &output));
        }

        let report_path = workdir.join(SPELLCHECK_REPORT_FILE);
        match tokio::fs::read_to_string(&report_path).await {
            Ok(report) => {
                debug!(bytes = report.len(), "read spellchecking report");
                StageOutcome::Success(VerificationOutput { log: report })
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                StageOutcome::Success(VerificationOutput { log: output.stdout })
            }
            Err(e) => StageOutcome::Failure(
                StageFailure::new("could not read spellchecking report").with_cause(e),
            ),
        }
    }
}
