//! Bounded execution of external commands.

use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::process::Command;
use tracing::debug;

use texci_core::{PipelineError, Result};

/// A command to spawn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub current_dir: Option<PathBuf>,
    /// 0 = no timeout.
    pub timeout_secs: u64,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
            timeout_secs: 0,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    pub fn timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// `program arg1 arg2 ...`, for logs.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Result of a finished command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Exit code (-1 when killed by a signal).
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
    pub success: bool,
}

impl CommandOutput {
    /// Whether the command exited with code 0.
    pub fn passed(&self) -> bool {
        self.success && self.exit_code == 0
    }

    /// stdout followed by stderr.
    pub fn combined_log(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (_, true) => self.stdout.clone(),
            (true, false) => self.stderr.clone(),
            (false, false) => format!("{}\n{}", self.stdout.trim_end(), self.stderr),
        }
    }
}

/// Spawn `spec`, wait for it and capture its output.
///
/// Spawn failures and timeouts are errors; a non-zero exit is not. The
/// child is killed when the timeout elapses.
pub async fn run_command(spec: &CommandSpec) -> Result<CommandOutput> {
    let start = Instant::now();
    debug!(command = %spec.display(), "spawning command");

    let mut command = Command::new(&spec.program);
    command
        .args(&spec.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = &spec.current_dir {
        command.current_dir(dir);
    }

    let child = command.spawn().map_err(|e| {
        PipelineError::Io(io::Error::new(
            e.kind(),
            format!("failed to spawn {}: {}", spec.program, e),
        ))
    })?;

    let output = if spec.timeout_secs > 0 {
        tokio::time::timeout(Duration::from_secs(spec.timeout_secs), child.wait_with_output())
            .await
            .map_err(|_| {
                PipelineError::Io(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("{} timed out after {} seconds", spec.program, spec.timeout_secs),
                ))
            })??
    } else {
        child.wait_with_output().await?
    };

    Ok(CommandOutput {
        exit_code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        duration_ms: start.elapsed().as_millis() as u64,
        success: output.status.success(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_passed() {
        let output = CommandOutput {
            exit_code: 0,
            stdout: "".to_string(),
            stderr: "".to_string(),
            duration_ms: 100,
            success: true,
        };
        assert!(output.passed());
    }

    #[test]
    fn test_combined_log() {
        let output = CommandOutput {
            exit_code: 1,
            stdout: "Latexmk: applying rule 'pdflatex'\n".to_string(),
            stderr: "! Undefined control sequence.".to_string(),
            duration_ms: 10,
            success: false,
        };
        assert_eq!(
            output.combined_log(),
            "Latexmk: applying rule 'pdflatex'\n! Undefined control sequence."
        );
    }

    #[test]
    fn test_spec_display() {
        let spec = CommandSpec::new("docker").args(["run", "--rm"]).arg("image");
        assert_eq!(spec.display(), "docker run --rm image");
    }

    #[tokio::test]
    async fn test_run_simple_command() {
        let output = run_command(&CommandSpec::new("echo").arg("hello").timeout(60))
            .await
            .expect("run echo");
        assert!(output.passed());
        assert!(output.stdout.contains("hello"));
    }

    #[tokio::test]
    async fn test_run_failing_command() {
        let output = run_command(&CommandSpec::new("false").timeout(60))
            .await
            .expect("run false");
        assert!(!output.passed());
        assert_ne!(output.exit_code, 0);
    }

    #[tokio::test]
    async fn test_missing_program_is_error() {
        let result = run_command(&CommandSpec::new("texci-definitely-not-installed")).await;
        assert!(matches!(result, Err(PipelineError::Io(_))));
    }

    #[tokio::test]
    async fn test_timeout_is_error() {
        let result = run_command(&CommandSpec::new("sleep").arg("5").timeout(1)).await;
        match result {
            Err(PipelineError::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::TimedOut),
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_current_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        let output = run_command(&CommandSpec::new("pwd").current_dir(dir.path()))
            .await
            .expect("run pwd");
        let reported = std::fs::canonicalize(output.stdout.trim()).expect("canonical pwd");
        let expected = std::fs::canonicalize(dir.path()).expect("canonical tempdir");
        assert_eq!(reported, expected);
    }
}
