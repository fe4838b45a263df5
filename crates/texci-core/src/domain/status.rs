//! Status tracks and their reportable states.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Prefix of every external status context.
pub const STATUS_CONTEXT_PREFIX: &str = "continuous-integration/latex/";

/// GitHub rejects status descriptions longer than this.
pub const MAX_DESCRIPTION_CHARS: usize = 140;

/// One of the two independently reported status lines.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StatusTrack {
    Typesetting,
    Spellchecking,
}

impl StatusTrack {
    pub fn name(&self) -> &'static str {
        match self {
            StatusTrack::Typesetting => "typesetting",
            StatusTrack::Spellchecking => "spellchecking",
        }
    }

    /// External status context, e.g. `continuous-integration/latex/typesetting`.
    pub fn context(&self) -> String {
        format!("{}{}", STATUS_CONTEXT_PREFIX, self.name())
    }
}

impl fmt::Display for StatusTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Reportable state of a track.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StatusState {
    Pending,
    Success,
    /// Upstream build or verification failure.
    Error,
    /// Orchestration-level failure.
    Failure,
}

impl StatusState {
    pub fn name(&self) -> &'static str {
        match self {
            StatusState::Pending => "pending",
            StatusState::Success => "success",
            StatusState::Error => "error",
            StatusState::Failure => "failure",
        }
    }

    pub fn default_description(&self) -> &'static str {
        match self {
            StatusState::Pending => "in progress",
            StatusState::Success => "finished",
            StatusState::Error => "failed",
            StatusState::Failure => "internal error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, StatusState::Pending)
    }
}

impl fmt::Display for StatusState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Clamp a description to [`MAX_DESCRIPTION_CHARS`] characters.
pub fn clamp_description(description: &str) -> String {
    if description.chars().count() <= MAX_DESCRIPTION_CHARS {
        return description.to_string();
    }
    let mut clamped: String = description.chars().take(MAX_DESCRIPTION_CHARS - 1).collect();
    clamped.push('…');
    clamped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_context() {
        assert_eq!(
            StatusTrack::Typesetting.context(),
            "continuous-integration/latex/typesetting"
        );
        assert_eq!(
            StatusTrack::Spellchecking.context(),
            "continuous-integration/latex/spellchecking"
        );
    }

    #[test]
    fn test_default_descriptions() {
        assert_eq!(StatusState::Pending.default_description(), "in progress");
        assert_eq!(StatusState::Success.default_description(), "finished");
        assert_eq!(StatusState::Error.default_description(), "failed");
        assert_eq!(StatusState::Failure.default_description(), "internal error");
    }

    #[test]
    fn test_terminal_states() {
        assert!(!StatusState::Pending.is_terminal());
        assert!(StatusState::Success.is_terminal());
        assert!(StatusState::Error.is_terminal());
        assert!(StatusState::Failure.is_terminal());
    }

    #[test]
    fn test_clamp_description() {
        assert_eq!(clamp_description("finished"), "finished");

        let long = "x".repeat(200);
        let clamped = clamp_description(&long);
        assert_eq!(clamped.chars().count(), MAX_DESCRIPTION_CHARS);
        assert!(clamped.ends_with('…'));
    }

    #[test]
    fn test_state_serializes_snake_case() {
        let json = serde_json::to_string(&StatusState::Failure).expect("serialize");
        assert_eq!(json, "\"failure\"");
    }
}
