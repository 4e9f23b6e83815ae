use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Lifecycle state shared by mesocycles and their plan instances.
///
/// `NotStarted → InProgress → Complete`; `Complete` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    #[default]
    NotStarted,
    InProgress,
    Complete,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid status: {raw}")]
pub struct ParseStatusError {
    pub raw: String,
}

impl Status {
    /// Stable storage representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Status::NotStarted => "NOT_STARTED",
            Status::InProgress => "IN_PROGRESS",
            Status::Complete => "COMPLETE",
        }
    }

    /// Parse the storage representation produced by [`Status::as_str`].
    ///
    /// # Errors
    ///
    /// Returns `ParseStatusError` for unknown values.
    pub fn parse(raw: &str) -> Result<Self, ParseStatusError> {
        match raw {
            "NOT_STARTED" => Ok(Status::NotStarted),
            "IN_PROGRESS" => Ok(Status::InProgress),
            "COMPLETE" => Ok(Status::Complete),
            _ => Err(ParseStatusError {
                raw: raw.to_owned(),
            }),
        }
    }

    #[must_use]
    pub fn is_complete(self) -> bool {
        matches!(self, Status::Complete)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
