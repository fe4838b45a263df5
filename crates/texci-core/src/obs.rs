//! Structured observability hooks for the pipeline lifecycle.
//!
//! This module provides:
//! - Request-scoped tracing spans via the `RequestSpan` RAII guard
//! - Emission functions for key lifecycle events: start, status report,
//!   fan-out classification, workspace reclamation, finish
//!
//! Events are emitted at `info!` level. For JSON output, start the binary
//! with `--json`.

use std::path::Path;

use tracing::info;

use crate::domain::{BuildRequest, SourceRef, StatusState, StatusTrack};

/// RAII guard that enters a request-scoped span.
///
/// Only use it around synchronous sections; async code should attach the
/// span returned by [`request_span`] with `Instrument::instrument`.
pub struct RequestSpan {
    _span: tracing::span::EnteredSpan,
}

impl RequestSpan {
    pub fn enter(request: &BuildRequest) -> Self {
        Self {
            _span: request_span(request).entered(),
        }
    }
}

/// Span tagged with the request's identity.
pub fn request_span(request: &BuildRequest) -> tracing::Span {
    tracing::info_span!(
        "texci.request",
        request_id = %request.id,
        owner = %request.source.owner,
        repo = %request.source.repo,
        revision = %request.source.short_revision(),
    )
}

/// Emit event: pipeline accepted a request.
pub fn emit_pipeline_started(request: &BuildRequest) {
    info!(
        event = "pipeline.started",
        branch = %request.branch,
        pull_request = ?request.pull_request,
    );
}

/// Emit event: a status was forwarded to the reporter.
pub fn emit_status_reported(source: &SourceRef, track: StatusTrack, state: StatusState) {
    info!(
        event = "status.reported",
        revision = %source.short_revision(),
        track = %track,
        state = %state,
    );
}

/// Emit event: build fan-out classified.
pub fn emit_fanout_classified(entry_points: usize, failed: usize) {
    info!(
        event = "fanout.classified",
        entry_points = entry_points,
        failed = failed,
        success = failed == 0,
    );
}

/// Emit event: working directory reclaimed.
pub fn emit_workspace_reclaimed(workdir: &Path) {
    info!(event = "workspace.reclaimed", path = %workdir.display());
}

/// Emit event: pipeline finished for a request.
pub fn emit_pipeline_finished(duration_ms: u64, typesetting: Option<StatusState>) {
    info!(
        event = "pipeline.finished",
        duration_ms = duration_ms,
        typesetting = ?typesetting,
    );
}
