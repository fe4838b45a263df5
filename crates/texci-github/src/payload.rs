//! Request and response bodies of the GitHub REST endpoints in use.

use std::path::Path;

use serde::{Deserialize, Serialize};

use texci_core::{StatusState, StatusTrack};

/// `POST /repos/{owner}/{repo}/statuses/{sha}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusBody<'a> {
    pub state: &'static str,
    pub description: &'a str,
    pub context: String,
}

impl<'a> StatusBody<'a> {
    pub fn new(track: StatusTrack, state: StatusState, description: &'a str) -> Self {
        Self {
            state: state.name(),
            description,
            context: track.context(),
        }
    }
}

/// `POST /repos/{owner}/{repo}/issues/{number}/comments`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommentBody<'a> {
    pub body: &'a str,
}

/// `POST /repos/{owner}/{repo}/releases`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReleaseBody<'a> {
    pub tag_name: &'a str,
    pub target_commitish: &'a str,
    pub name: &'a str,
    pub prerelease: bool,
    pub draft: bool,
}

/// The fields of a release response that texci reads.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReleaseResponse {
    pub id: u64,
    pub tag_name: String,
    pub upload_url: String,
}

/// Drop the `{?name,label}` URI template suffix from a release upload URL.
pub fn strip_uri_template(upload_url: &str) -> &str {
    match upload_url.find('{') {
        Some(index) => &upload_url[..index],
        None => upload_url,
    }
}

/// Content type of an uploaded asset, by extension.
pub fn asset_content_type(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("pdf") => "application/pdf",
        Some("md") | Some("txt") | Some("log") => "text/plain",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_body() {
        let body = StatusBody::new(StatusTrack::Spellchecking, StatusState::Failure, "unable to post comment");
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["state"], "failure");
        assert_eq!(json["context"], "continuous-integration/latex/spellchecking");
        assert_eq!(json["description"], "unable to post comment");
    }

    #[test]
    fn test_release_body_is_prerelease() {
        let body = ReleaseBody {
            tag_name: "build-20240131-174502-abc1234",
            target_commitish: "abc123",
            name: "Finish chapter three",
            prerelease: true,
            draft: false,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["prerelease"], true);
        assert_eq!(json["target_commitish"], "abc123");
    }

    #[test]
    fn test_release_response_ignores_extra_fields() {
        let response: ReleaseResponse = serde_json::from_str(
            r#"{"id": 7, "tag_name": "build-1", "upload_url": "https://uploads.github.com/repos/o/r/releases/7/assets{?name,label}", "draft": false}"#,
        )
        .unwrap();
        assert_eq!(response.id, 7);
        assert_eq!(
            strip_uri_template(&response.upload_url),
            "https://uploads.github.com/repos/o/r/releases/7/assets"
        );
    }

    #[test]
    fn test_strip_uri_template_without_template() {
        assert_eq!(strip_uri_template("https://up/assets"), "https://up/assets");
    }

    #[test]
    fn test_asset_content_type() {
        assert_eq!(asset_content_type(Path::new("/w/main.pdf")), "application/pdf");
        assert_eq!(asset_content_type(Path::new("/w/MAIN.PDF")), "application/pdf");
        assert_eq!(asset_content_type(Path::new("/w/archive")), "application/octet-stream");
    }
}
