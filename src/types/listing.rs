// src/types/listing.rs
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::TrackerError;

/// A job or freelance opportunity, normalized across platforms.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub platform: String,
    pub id: String,
    pub title: String,
    pub company: String,
    pub location: String,
    pub description: String,
    pub url: String,
    pub salary: String,
    pub date_posted: Option<NaiveDate>,
    pub job_type: String,
    pub experience_level: String,
    pub skills: Vec<String>,
    pub is_remote: bool,
}

impl Listing {
    pub fn new(platform: &str, id: impl Into<String>) -> Self {
        Self {
            platform: platform.to_string(),
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn key(&self) -> ListingKey {
        ListingKey {
            platform: self.platform.clone(),
            id: self.id.clone(),
        }
    }

    /// Title and description, the text keyword and skill matchers look at.
    pub fn searchable_text(&self) -> String {
        format!("{} {}", self.title, self.description)
    }
}

/// `platform:id`, the identity of a listing across runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListingKey {
    pub platform: String,
    pub id: String,
}

impl fmt::Display for ListingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.platform, self.id)
    }
}

impl FromStr for ListingKey {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().split_once(':') {
            Some((platform, id)) if !platform.is_empty() && !id.is_empty() => Ok(Self {
                platform: platform.to_lowercase(),
                id: id.to_string(),
            }),
            _ => Err(TrackerError::InvalidKey(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredListing {
    #[serde(flatten)]
    pub listing: Listing,
    pub score: u32,
    pub matched_skills: Vec<String>,
    pub matched_keywords: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listing_key_round_trip() {
        let listing = Listing::new("upwork", "~01abc");
        let key = listing.key();
        assert_eq!(key.to_string(), "upwork:~01abc");
        assert_eq!("upwork:~01abc".parse::<ListingKey>().unwrap(), key);
    }

    #[test]
    fn test_listing_key_keeps_colons_in_id() {
        let key: ListingKey = "LinkedIn:urn:li:123".parse().unwrap();
        assert_eq!(key.platform, "linkedin");
        assert_eq!(key.id, "urn:li:123");
    }

    #[test]
    fn test_listing_key_rejects_malformed() {
        assert!("no-separator".parse::<ListingKey>().is_err());
        assert!(":123".parse::<ListingKey>().is_err());
        assert!("indeed:".parse::<ListingKey>().is_err());
    }
}
