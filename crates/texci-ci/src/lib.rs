//! texci process-backed collaborators
//!
//! Implements the texci-core collaborator traits by spawning `git` and a
//! container runtime, and by deleting working directories on disk.

pub mod config;
pub mod docker;
pub mod exec;
pub mod fetcher;
pub mod reclaimer;

pub use config::RunnerConfig;
pub use docker::{DockerBuildRunner, DockerSpellchecker};
pub use exec::{run_command, CommandOutput, CommandSpec};
pub use fetcher::GitFetcher;
pub use reclaimer::FsReclaimer;
