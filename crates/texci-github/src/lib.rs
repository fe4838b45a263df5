//! texci GitHub integration
//!
//! Commit statuses, pull request comments and pre-releases through the
//! GitHub REST API.

pub mod client;
pub mod config;
pub mod payload;

pub use client::GithubClient;
pub use config::{GithubConfig, DEFAULT_API_URL};
