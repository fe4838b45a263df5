//! texci - LaTeX continuous integration
//!
//! The `texci` command runs the build pipeline for a GitHub webhook delivery.
//!
//! ## Commands
//!
//! - `run`: map a webhook payload to build requests and run them
//! - `config`: print the effective project configuration of a checkout

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tokio::io::AsyncReadExt;
use tracing::{info, Level};

use texci_ci::config::{DEFAULT_BUILD_IMAGE, DEFAULT_SPELLCHECK_IMAGE, DEFAULT_TIMEOUT_SECS};
use texci_ci::{DockerBuildRunner, DockerSpellchecker, FsReclaimer, GitFetcher, RunnerConfig};
use texci_core::{
    requests_from_event, Collaborators, ConfigLoader, EventKind, FileConfigLoader, LogFormat,
    Orchestrator, PipelineReport, PublishOutcome, ReclaimStatus, TrackState,
};
use texci_github::{GithubClient, GithubConfig, DEFAULT_API_URL};

#[derive(Parser)]
#[command(name = "texci")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Typeset, spellcheck and pre-release LaTeX documents on GitHub events", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline for a webhook delivery
    Run {
        /// Webhook event type (`X-GitHub-Event` header)
        #[arg(short, long)]
        event: EventKind,

        /// Payload file (default: read from stdin)
        #[arg(short, long)]
        payload: Option<PathBuf>,

        /// Report output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,

        #[command(flatten)]
        runner: RunnerArgs,

        #[command(flatten)]
        github: GithubArgs,
    },

    /// Print the effective project configuration of a checkout
    Config {
        /// Working directory containing `.texci.yml` (default: current directory)
        #[arg(default_value = ".")]
        dir: PathBuf,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Args, Debug)]
struct RunnerArgs {
    /// Container runtime executable
    #[arg(long, env = "TEXCI_DOCKER", default_value = "docker")]
    docker: String,

    /// Image used for typesetting
    #[arg(long, env = "TEXCI_BUILD_IMAGE", default_value = DEFAULT_BUILD_IMAGE)]
    build_image: String,

    /// Image used for spellchecking
    #[arg(long, env = "TEXCI_SPELLCHECK_IMAGE", default_value = DEFAULT_SPELLCHECK_IMAGE)]
    spellcheck_image: String,

    /// Directory for per-request checkouts (default: system temp dir)
    #[arg(long, env = "TEXCI_WORKSPACE_ROOT")]
    workspace_root: Option<PathBuf>,

    /// Clone base URL
    #[arg(long, env = "TEXCI_CLONE_BASE")]
    clone_base: Option<String>,

    /// Timeout for each git or container command, in seconds (0 = none)
    #[arg(long, env = "TEXCI_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT_SECS)]
    timeout_secs: u64,
}

impl RunnerArgs {
    fn into_config(self) -> RunnerConfig {
        let mut config = RunnerConfig::from_env()
            .with_docker_bin(self.docker)
            .with_timeout(self.timeout_secs);
        config.build_image = self.build_image;
        config.spellcheck_image = self.spellcheck_image;
        if let Some(root) = self.workspace_root {
            config = config.with_workspace_root(root);
        }
        if let Some(base) = self.clone_base {
            config = config.with_clone_base(base);
        }
        config
    }
}

#[derive(Args, Debug)]
struct GithubArgs {
    /// GitHub REST API base URL
    #[arg(long, env = "GITHUB_API_URL", default_value = DEFAULT_API_URL)]
    github_api_url: String,

    /// GitHub token
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    github_token: Option<String>,
}

impl GithubArgs {
    fn into_config(self) -> GithubConfig {
        let config = GithubConfig::new(&self.github_api_url);
        match self.github_token {
            Some(token) => config.with_token(&token),
            None => config,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let format = if cli.json {
        LogFormat::Json
    } else {
        LogFormat::Text
    };
    texci_core::init_tracing(format, level);

    match cli.command {
        Commands::Run {
            event,
            payload,
            format,
            runner,
            github,
        } => {
            cmd_run(
                event,
                payload.as_deref(),
                format,
                runner.into_config(),
                github.into_config(),
            )
            .await
        }
        Commands::Config { dir } => cmd_config(&dir).await,
    }
}

fn build_collaborators(runner: RunnerConfig, github: GithubConfig) -> Result<Collaborators> {
    let github = Arc::new(GithubClient::new(github).context("Failed to create GitHub client")?);

    Ok(Collaborators {
        fetcher: Arc::new(GitFetcher::new(runner.clone())),
        config_loader: Arc::new(FileConfigLoader::new()),
        builder: Arc::new(DockerBuildRunner::new(runner.clone())),
        verifier: Arc::new(DockerSpellchecker::new(runner)),
        status: github.clone(),
        comments: github.clone(),
        releases: github,
        reclaimer: Arc::new(FsReclaimer::new()),
    })
}

async fn read_payload(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read payload {}", path.display())),
        None => {
            let mut payload = String::new();
            tokio::io::stdin()
                .read_to_string(&mut payload)
                .await
                .context("Failed to read payload from stdin")?;
            Ok(payload)
        }
    }
}

async fn cmd_run(
    event: EventKind,
    payload: Option<&Path>,
    format: OutputFormat,
    runner: RunnerConfig,
    github: GithubConfig,
) -> Result<()> {
    let payload = read_payload(payload).await?;
    let requests = requests_from_event(event, &payload)
        .with_context(|| format!("Failed to parse {} payload", event))?;

    if requests.is_empty() {
        info!(event = %event, "event does not trigger any build");
    }

    let orchestrator = Orchestrator::new(build_collaborators(runner, github)?);
    let reports = orchestrator.run_all(requests).await;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&reports)?),
        OutputFormat::Text => {
            for report in &reports {
                println!("{}", render_report(report));
            }
        }
    }

    let failed = reports.iter().filter(|r| !r.built()).count();
    if failed > 0 {
        anyhow::bail!("{} of {} builds failed", failed, reports.len());
    }
    Ok(())
}

async fn cmd_config(dir: &Path) -> Result<()> {
    let config = FileConfigLoader::new().load(dir).await;
    print!(
        "{}",
        serde_yaml::to_string(&config).context("Failed to render config")?
    );
    Ok(())
}

fn track_label(track: Option<&TrackState>) -> String {
    match track {
        Some(track) => format!("{} ({})", track.state, track.description),
        None => "-".to_string(),
    }
}

/// One summary block per request.
fn render_report(report: &PipelineReport) -> String {
    let mut lines = vec![format!(
        "{}@{} ({}{})",
        report.source.slug(),
        report.source.short_revision(),
        report.branch,
        report
            .pull_request
            .map(|n| format!(", PR #{}", n))
            .unwrap_or_default()
    )];
    lines.push(format!(
        "  typesetting:   {}",
        track_label(report.typesetting.as_ref())
    ));
    lines.push(format!(
        "  spellchecking: {}",
        track_label(report.spellchecking.as_ref())
    ));
    for failure in &report.build_failures {
        lines.push(format!(
            "  failed:        {}: {}",
            failure.entry_point, failure.failure.message
        ));
    }
    let release = match &report.publish {
        PublishOutcome::Published {
            tag,
            uploaded,
            failed_uploads,
        } => format!("{} ({} uploaded, {} failed)", tag, uploaded, failed_uploads),
        PublishOutcome::ReleaseFailed { tag } => format!("{} (creation failed)", tag),
        PublishOutcome::Skipped => "-".to_string(),
        PublishOutcome::Aborted => "aborted".to_string(),
    };
    lines.push(format!("  release:       {}", release));
    let workdir = match report.reclaim {
        Some(ReclaimStatus::Reclaimed) => "reclaimed",
        Some(ReclaimStatus::Failed) => "reclaim failed",
        Some(ReclaimStatus::Refused) => "reclaim refused",
        Some(ReclaimStatus::Pending) => "pending",
        None => "-",
    };
    lines.push(format!("  workdir:       {}", workdir));
    lines.join("\n")
}
