//! Per-request status tracks.
//!
//! [`StatusTracker`] remembers the last state of each track and forwards
//! transitions to the external [`StatusReporter`]. A track only moves forward
//! (unset → pending → terminal), so no track reports more than one terminal
//! state. Reporter failures are logged and swallowed.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::collaborators::StatusReporter;
use crate::domain::{clamp_description, SourceRef, StatusState, StatusTrack};
use crate::obs;

/// Last reported state of a track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackState {
    pub state: StatusState,
    pub description: String,
}

pub struct StatusTracker {
    source: SourceRef,
    reporter: Arc<dyn StatusReporter>,
    tracks: Mutex<HashMap<StatusTrack, TrackState>>,
}

impl StatusTracker {
    pub fn new(source: SourceRef, reporter: Arc<dyn StatusReporter>) -> Self {
        Self {
            source,
            reporter,
            tracks: Mutex::new(HashMap::new()),
        }
    }

    /// Report `state` on `track`, using the state's default description when
    /// none is given. Returns `false` when the transition was rejected
    /// because it would move the track backwards or past a terminal state.
    pub async fn report(
        &self,
        track: StatusTrack,
        state: StatusState,
        description: Option<&str>,
    ) -> bool {
        let description = clamp_description(description.unwrap_or(state.default_description()));

        {
            let mut tracks = self.tracks.lock().unwrap_or_else(|p| p.into_inner());
            if let Some(current) = tracks.get(&track) {
                if current.state.is_terminal() || !state.is_terminal() {
                    warn!(
                        track = %track,
                        current = %current.state,
                        requested = %state,
                        "ignoring non-forward status transition"
                    );
                    return false;
                }
            }
            tracks.insert(
                track,
                TrackState {
                    state,
                    description: description.clone(),
                },
            );
        }

        match self
            .reporter
            .set_status(&self.source, track, state, &description)
            .await
        {
            Ok(()) => obs::emit_status_reported(&self.source, track, state),
            Err(e) => {
                warn!(track = %track, state = %state, error = %e, "failed to report status");
            }
        }
        true
    }

    /// Last state reported on `track`, if any.
    pub fn state_of(&self, track: StatusTrack) -> Option<TrackState> {
        let tracks = self.tracks.lock().unwrap_or_else(|p| p.into_inner());
        tracks.get(&track).cloned()
    }

    pub fn source(&self) -> &SourceRef {
        &self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::RecordingStatusReporter;

    fn tracker(reporter: Arc<RecordingStatusReporter>) -> StatusTracker {
        StatusTracker::new(SourceRef::new("octo", "thesis", "abc123"), reporter)
    }

    #[tokio::test]
    async fn test_default_descriptions_forwarded() {
        let reporter = Arc::new(RecordingStatusReporter::new());
        let tracker = tracker(reporter.clone());

        assert!(tracker.report(StatusTrack::Typesetting, StatusState::Pending, None).await);
        assert!(tracker.report(StatusTrack::Typesetting, StatusState::Success, None).await);

        let reports = reporter.reports();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].state, StatusState::Pending);
        assert_eq!(reports[0].description, "in progress");
        assert_eq!(reports[1].state, StatusState::Success);
        assert_eq!(reports[1].description, "finished");
        assert_eq!(reports[1].revision, "abc123");
    }

    #[tokio::test]
    async fn test_only_one_terminal_state() {
        let reporter = Arc::new(RecordingStatusReporter::new());
        let tracker = tracker(reporter.clone());

        tracker.report(StatusTrack::Spellchecking, StatusState::Pending, None).await;
        assert!(tracker.report(StatusTrack::Spellchecking, StatusState::Error, None).await);
        assert!(!tracker.report(StatusTrack::Spellchecking, StatusState::Success, None).await);
        assert!(!tracker.report(StatusTrack::Spellchecking, StatusState::Pending, None).await);

        assert_eq!(
            reporter.states_for(StatusTrack::Spellchecking),
            vec![StatusState::Pending, StatusState::Error]
        );
        assert_eq!(
            tracker.state_of(StatusTrack::Spellchecking).map(|s| s.state),
            Some(StatusState::Error)
        );
    }

    #[tokio::test]
    async fn test_tracks_are_independent() {
        let reporter = Arc::new(RecordingStatusReporter::new());
        let tracker = tracker(reporter.clone());

        tracker.report(StatusTrack::Typesetting, StatusState::Success, None).await;
        assert!(
            tracker
                .report(
                    StatusTrack::Spellchecking,
                    StatusState::Failure,
                    Some("no artifact available")
                )
                .await
        );

        assert!(tracker.state_of(StatusTrack::Typesetting).is_some());
        let spell = tracker.state_of(StatusTrack::Spellchecking).expect("spellchecking state");
        assert_eq!(spell.description, "no artifact available");
    }

    #[tokio::test]
    async fn test_reporter_failure_is_swallowed() {
        let reporter = Arc::new(RecordingStatusReporter::failing());
        let tracker = tracker(reporter.clone());

        assert!(tracker.report(StatusTrack::Typesetting, StatusState::Pending, None).await);
        assert_eq!(
            tracker.state_of(StatusTrack::Typesetting).map(|s| s.state),
            Some(StatusState::Pending)
        );
        assert_eq!(reporter.reports().len(), 1);
    }
}
