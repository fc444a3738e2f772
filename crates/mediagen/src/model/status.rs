//! Generation status of a prompt and its transition table.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Generation status stored in `prompts.artifact_status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactStatus {
    Pending,
    Processing,
    Ready,
    Error,
}

/// Every legal `(from, to)` pair. Anything else is rejected.
const TRANSITIONS: &[(ArtifactStatus, ArtifactStatus)] = &[
    (ArtifactStatus::Pending, ArtifactStatus::Processing),
    (ArtifactStatus::Processing, ArtifactStatus::Ready),
    (ArtifactStatus::Processing, ArtifactStatus::Error),
];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Illegal status transition: {from} -> {to}")]
pub struct InvalidTransition {
    pub from: ArtifactStatus,
    pub to: ArtifactStatus,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown artifact status: {0}")]
pub struct UnknownStatus(pub String);

impl ArtifactStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactStatus::Pending => "pending",
            ArtifactStatus::Processing => "processing",
            ArtifactStatus::Ready => "ready",
            ArtifactStatus::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ArtifactStatus::Ready | ArtifactStatus::Error)
    }

    pub fn can_transition_to(&self, next: ArtifactStatus) -> bool {
        TRANSITIONS.iter().any(|&(f, t)| f == *self && t == next)
    }

    /// Validates a transition, returning the new status on success.
    pub fn transition_to(&self, next: ArtifactStatus) -> Result<ArtifactStatus, InvalidTransition> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(InvalidTransition {
                from: *self,
                to: next,
            })
        }
    }
}

impl fmt::Display for ArtifactStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArtifactStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ArtifactStatus::Pending),
            "processing" => Ok(ArtifactStatus::Processing),
            "ready" => Ok(ArtifactStatus::Ready),
            "error" => Ok(ArtifactStatus::Error),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ArtifactStatus::*;

    #[test]
    fn test_happy_path_transitions() {
        assert_eq!(Pending.transition_to(Processing), Ok(Processing));
        assert_eq!(Processing.transition_to(Ready), Ok(Ready));
        assert_eq!(Processing.transition_to(Error), Ok(Error));
    }

    #[test]
    fn test_no_transition_skips_processing() {
        assert!(Pending.transition_to(Ready).is_err());
        assert!(Pending.transition_to(Error).is_err());
    }

    #[test]
    fn test_terminal_states_are_final() {
        for next in [Pending, Processing, Ready, Error] {
            assert!(!Ready.can_transition_to(next));
            assert!(!Error.can_transition_to(next));
        }
    }

    #[test]
    fn test_processing_cannot_be_claimed_twice() {
        let err = Processing.transition_to(Processing).unwrap_err();
        assert_eq!(err.from, Processing);
        assert_eq!(err.to, Processing);
        assert_eq!(
            err.to_string(),
            "Illegal status transition: processing -> processing"
        );
    }

    #[test]
    fn test_round_trip_strings() {
        for status in [Pending, Processing, Ready, Error] {
            assert_eq!(status.as_str().parse::<ArtifactStatus>(), Ok(status));
        }
        assert!("completed".parse::<ArtifactStatus>().is_err());
    }

    #[test]
    fn test_is_terminal() {
        assert!(!Pending.is_terminal());
        assert!(!Processing.is_terminal());
        assert!(Ready.is_terminal());
        assert!(Error.is_terminal());
    }
}
