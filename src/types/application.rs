// src/types/application.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::TrackerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    /// Cover letter drafted, not yet sent.
    Prepared,
    Applied,
    Responded,
    Interviewing,
    Offered,
    Closed,
    Rejected,
    Withdrawn,
}

/// Outcome of a valid status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Unchanged,
    Advanced,
}

impl ApplicationStatus {
    pub const ALL: [ApplicationStatus; 8] = [
        Self::Prepared,
        Self::Applied,
        Self::Responded,
        Self::Interviewing,
        Self::Offered,
        Self::Closed,
        Self::Rejected,
        Self::Withdrawn,
    ];

    fn stage(self) -> u8 {
        match self {
            Self::Prepared => 0,
            Self::Applied => 1,
            Self::Responded => 2,
            Self::Interviewing => 3,
            Self::Offered => 4,
            Self::Closed | Self::Rejected | Self::Withdrawn => 5,
        }
    }

    pub fn is_terminal(self) -> bool {
        self.stage() == 5
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Prepared => "prepared",
            Self::Applied => "applied",
            Self::Responded => "responded",
            Self::Interviewing => "interviewing",
            Self::Offered => "offered",
            Self::Closed => "closed",
            Self::Rejected => "rejected",
            Self::Withdrawn => "withdrawn",
        }
    }

    /// Statuses only move forward. Repeating the current status is a no-op.
    pub fn check_transition(self, to: ApplicationStatus) -> Result<Transition, TrackerError> {
        if self == to {
            return Ok(Transition::Unchanged);
        }
        if self.is_terminal() || to.stage() <= self.stage() {
            return Err(TrackerError::InvalidTransition {
                from: self.to_string(),
                to: to.to_string(),
            });
        }
        Ok(Transition::Advanced)
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApplicationStatus {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == wanted)
            .ok_or_else(|| TrackerError::UnknownStatus(s.to_string()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Application {
    pub id: i64,
    pub platform: String,
    pub listing_id: String,
    pub title: String,
    pub company: String,
    pub status: ApplicationStatus,
    pub cover_letter_path: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Application {
    pub fn key(&self) -> String {
        format!("{}:{}", self.platform, self.listing_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationEvent {
    pub status: ApplicationStatus,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}
