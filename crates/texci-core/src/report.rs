//! Rendering of user-visible text: PR comments and release names.

use chrono::{DateTime, Utc};

use crate::domain::{SourceRef, VerificationOutput};

/// GitHub rejects issue comments longer than this many characters.
pub const MAX_COMMENT_CHARS: usize = 65_536;

const TRUNCATION_MARKER: &str = "\n\n_Report truncated._";

/// Body of the pull request comment carrying the spellchecking report.
pub fn render_spellcheck_comment(source: &SourceRef, output: &VerificationOutput) -> String {
    let mut body = format!("### Spellchecking report for `{}`\n\n", source.short_revision());
    let report = output.log.trim();
    if report.is_empty() {
        body.push_str("No spelling errors found.\n");
    } else {
        body.push_str(report);
        body.push('\n');
    }
    truncate_comment(body)
}

fn truncate_comment(body: String) -> String {
    if body.chars().count() <= MAX_COMMENT_CHARS {
        return body;
    }
    let keep = MAX_COMMENT_CHARS - TRUNCATION_MARKER.chars().count();
    let mut truncated: String = body.chars().take(keep).collect();
    truncated.push_str(TRUNCATION_MARKER);
    truncated
}

/// Tag of a pre-release of `source` created at `at`, e.g.
/// `build-20240131-174502-0123456`. Revisions built in the same second
/// still get distinct tags.
pub fn release_tag(at: DateTime<Utc>, source: &SourceRef) -> String {
    format!(
        "build-{}-{}",
        at.format("%Y%m%d-%H%M%S"),
        source.short_revision()
    )
}

/// Title of a pre-release: the first non-empty line of the commit message.
pub fn release_title(commit_message: &str, source: &SourceRef) -> String {
    commit_message
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("Build {}", source.short_revision()))
}
