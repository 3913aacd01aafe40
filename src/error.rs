// src/error.rs
//! Typed errors for the library layers. Binaries and orchestration code wrap
//! these in `anyhow::Error` with context.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found, a default one was written to {0}. Edit it and run again.")]
    DefaultCreated(String),

    #[error("Invalid configuration field `{field}`: {reason}")]
    Invalid { field: String, reason: String },
}

impl ConfigError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("{platform}: network error: {source}")]
    Network {
        platform: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{platform}: HTTP {status} for {url}")]
    Http {
        platform: String,
        status: u16,
        url: String,
    },

    #[error("{platform}: authentication required or session expired")]
    Auth { platform: String },

    #[error("{platform}: rate limited")]
    RateLimited { platform: String },

    #[error("{platform}: could not parse response: {reason}")]
    Parse { platform: String, reason: String },

    #[error("{platform}: listing {id} not found")]
    NotFound { platform: String, id: String },
}

impl PlatformError {
    /// Network failures, server errors and throttling are worth another try.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network { .. } | Self::RateLimited { .. } => true,
            Self::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }

    pub fn parse(platform: &str, reason: impl Into<String>) -> Self {
        Self::Parse {
            platform: platform.to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("Unknown listing `{0}`. Run a search first so the listing is stored.")]
    UnknownListing(String),

    #[error("No application recorded for `{0}`")]
    NoApplication(String),

    #[error("Cannot move application from `{from}` to `{to}`")]
    InvalidTransition { from: String, to: String },

    #[error("Daily application limit of {0} reached")]
    DailyLimitReached(u32),

    #[error("Invalid listing key `{0}`, expected `platform:id`")]
    InvalidKey(String),

    #[error("Unknown application status `{0}`")]
    UnknownStatus(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        let rate = PlatformError::RateLimited {
            platform: "indeed".into(),
        };
        let server = PlatformError::Http {
            platform: "indeed".into(),
            status: 503,
            url: "https://www.indeed.com/jobs".into(),
        };
        let missing = PlatformError::Http {
            platform: "indeed".into(),
            status: 404,
            url: "https://www.indeed.com/jobs".into(),
        };
        let auth = PlatformError::Auth {
            platform: "upwork".into(),
        };

        assert!(rate.is_transient());
        assert!(server.is_transient());
        assert!(!missing.is_transient());
        assert!(!auth.is_transient());
    }

    #[test]
    fn test_config_error_message_names_field() {
        let err = ConfigError::invalid("scheduler.time", "expected HH:MM");
        assert_eq!(
            err.to_string(),
            "Invalid configuration field `scheduler.time`: expected HH:MM"
        );
    }
}
