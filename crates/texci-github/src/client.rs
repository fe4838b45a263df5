//! GitHub REST client implementing the texci reporting collaborators.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::debug;

use texci_core::{
    CommentPoster, NewRelease, PipelineError, ReleaseHandle, ReleasePublisher, Result,
    SourceRef, StatusReporter, StatusState, StatusTrack,
};

use crate::config::GithubConfig;
use crate::payload::{
    asset_content_type, strip_uri_template, CommentBody, ReleaseBody, ReleaseResponse, StatusBody,
};

const GITHUB_JSON: &str = "application/vnd.github+json";
const API_VERSION_HEADER: &str = "X-GitHub-Api-Version";
const API_VERSION: &str = "2022-11-28";

/// GitHub client for statuses, comments and releases
pub struct GithubClient {
    config: GithubConfig,
    http_client: Client,
}

impl GithubClient {
    /// Create a new GitHub client
    pub fn new(config: GithubConfig) -> Result<Self> {
        let http_client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| PipelineError::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(GithubClient {
            config,
            http_client,
        })
    }

    /// Create client from environment variables
    pub fn from_env() -> Result<Self> {
        Self::new(GithubConfig::from_env())
    }

    pub fn config(&self) -> &GithubConfig {
        &self.config
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request
            .header(ACCEPT, GITHUB_JSON)
            .header(API_VERSION_HEADER, API_VERSION);
        match &self.config.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder, what: &str) -> Result<Response> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| PipelineError::Reporting(format!("{}: request failed: {}", what, e)))?;

        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(PipelineError::Reporting(format!(
                "{}: GitHub API error ({}): {}",
                what,
                status,
                body.trim()
            )))
        }
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder, what: &str) -> Result<T> {
        self.send(request, what)
            .await?
            .json()
            .await
            .map_err(|e| PipelineError::Reporting(format!("{}: invalid response: {}", what, e)))
    }
}

#[async_trait]
impl StatusReporter for GithubClient {
    async fn set_status(
        &self,
        source: &SourceRef,
        track: StatusTrack,
        state: StatusState,
        description: &str,
    ) -> Result<()> {
        let url = self.config.endpoint(&format!(
            "repos/{}/{}/statuses/{}",
            source.owner, source.repo, source.revision
        ));
        let body = StatusBody::new(track, state, description);
        self.send(self.http_client.post(&url).json(&body), "set status")
            .await?;
        debug!(context = %body.context, state = %state, "status posted");
        Ok(())
    }
}

#[async_trait]
impl CommentPoster for GithubClient {
    async fn post_comment(&self, owner: &str, repo: &str, pr_number: u64, body: &str) -> Result<()> {
        let url = self
            .config
            .endpoint(&format!("repos/{}/{}/issues/{}/comments", owner, repo, pr_number));
        self.send(
            self.http_client.post(&url).json(&CommentBody { body }),
            "post comment",
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl ReleasePublisher for GithubClient {
    async fn create_release(&self, release: NewRelease<'_>) -> Result<ReleaseHandle> {
        let url = self
            .config
            .endpoint(&format!("repos/{}/{}/releases", release.owner, release.repo));
        let body = ReleaseBody {
            tag_name: release.tag_name,
            target_commitish: release.target_revision,
            name: release.title,
            prerelease: true,
            draft: false,
        };
        let response: ReleaseResponse = self
            .send_json(self.http_client.post(&url).json(&body), "create release")
            .await?;

        Ok(ReleaseHandle {
            id: response.id,
            tag_name: response.tag_name,
            upload_url: strip_uri_template(&response.upload_url).to_string(),
        })
    }

    async fn upload_asset(&self, release: &ReleaseHandle, file: &Path, asset_name: &str) -> Result<()> {
        let bytes = tokio::fs::read(file).await?;
        let size = bytes.len();
        let request = self
            .http_client
            .post(&release.upload_url)
            .query(&[("name", asset_name)])
            .header(CONTENT_TYPE, asset_content_type(file))
            .body(bytes);
        self.send(request, "upload asset").await?;
        debug!(asset = %asset_name, bytes = size, release = %release.tag_name, "asset uploaded");
        Ok(())
    }
}
