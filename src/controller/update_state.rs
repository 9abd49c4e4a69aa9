//! Automatic update state and its persisted form.
//!
//! The state lives in `status.updateConditions` as human-readable strings.
//! Only the last entry matters for transitions; it is parsed into an
//! `UpdateState` on read and written back as a string.

use std::fmt;

use thiserror::Error;

const STARTING_PREFIX: &str = "Starting automatic update from ";
const SUCCEEDED_PREFIX: &str = "Successfully updated from ";
const FAILED_PREFIX: &str = "Failed to update from ";
const SEPARATOR: &str = " to ";

/// An update log entry that doesn't match any known format.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unrecognized update condition {0:?}")]
pub struct UpdateLogError(pub String);

/// State of the automatic update machinery for one Nexus.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UpdateState {
    /// Nothing tracked.
    Idle,
    /// Rolling out `target`, coming from `previous`.
    Updating { previous: String, target: String },
    /// Last tracked update finished.
    Succeeded { previous: String, target: String },
    /// Last tracked update failed and was rolled back.
    Failed { previous: String, target: String },
}

impl UpdateState {
    /// State encoded by an update log.
    pub fn from_log(log: &[String]) -> Result<Self, UpdateLogError> {
        match log.last() {
            None => Ok(UpdateState::Idle),
            Some(entry) => Self::parse_entry(entry),
        }
    }

    /// Parse a single log entry.
    pub fn parse_entry(entry: &str) -> Result<Self, UpdateLogError> {
        let invalid = || UpdateLogError(entry.to_string());

        let (prefix, rest) = [STARTING_PREFIX, SUCCEEDED_PREFIX, FAILED_PREFIX]
            .into_iter()
            .find_map(|prefix| entry.strip_prefix(prefix).map(|rest| (prefix, rest)))
            .ok_or_else(invalid)?;
        let (previous, target) = rest.split_once(SEPARATOR).ok_or_else(invalid)?;
        if !is_token(previous) || !is_token(target) {
            return Err(invalid());
        }

        let (previous, target) = (previous.to_string(), target.to_string());
        Ok(match prefix {
            STARTING_PREFIX => UpdateState::Updating { previous, target },
            SUCCEEDED_PREFIX => UpdateState::Succeeded { previous, target },
            _ => UpdateState::Failed { previous, target },
        })
    }

    /// Log entry for this state. `Idle` has none.
    pub fn entry(&self) -> Option<String> {
        match self {
            UpdateState::Idle => None,
            other => Some(other.to_string()),
        }
    }

    /// Whether `entry` claims to be a start record, parseable or not.
    pub fn is_start_entry(entry: &str) -> bool {
        entry.starts_with(STARTING_PREFIX)
    }

    pub fn is_updating(&self) -> bool {
        matches!(self, UpdateState::Updating { .. })
    }
}

/// A tag as the log formats it: non-empty, no whitespace.
fn is_token(s: &str) -> bool {
    !s.is_empty() && !s.chars().any(char::is_whitespace)
}

impl fmt::Display for UpdateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateState::Idle => write!(f, "Idle"),
            UpdateState::Updating { previous, target } => {
                write!(f, "{STARTING_PREFIX}{previous}{SEPARATOR}{target}")
            }
            UpdateState::Succeeded { previous, target } => {
                write!(f, "{SUCCEEDED_PREFIX}{previous}{SEPARATOR}{target}")
            }
            UpdateState::Failed { previous, target } => {
                write!(f, "{FAILED_PREFIX}{previous}{SEPARATOR}{target}")
            }
        }
    }
}
