// src/agent.rs
//! One search run across every enabled platform.

use chrono::{DateTime, Local};
use std::collections::HashSet;

use crate::app_log;
use crate::config::AgentConfig;
use crate::platforms::{build_platforms, JobPlatform, SearchQuery};
use crate::search::{rank, ListingFilter, Scorer};
use crate::types::{Listing, ScoredListing};

#[derive(Debug, Clone)]
pub struct PlatformFailure {
    pub platform: String,
    pub error: String,
}

#[derive(Debug, Clone)]
pub struct SearchOutcome {
    /// Filtered listings, best first.
    pub listings: Vec<ScoredListing>,
    pub platform_errors: Vec<PlatformFailure>,
    /// Listings returned by the platforms before deduplication and filtering.
    pub fetched: usize,
    pub started_at: DateTime<Local>,
}

impl SearchOutcome {
    /// Timestamp used in report file names.
    pub fn timestamp(&self) -> String {
        self.started_at.format("%Y%m%d_%H%M%S").to_string()
    }
}

pub struct JobSearchAgent {
    platforms: Vec<Box<dyn JobPlatform>>,
    query: SearchQuery,
    filter: ListingFilter,
    scorer: Scorer,
}

impl JobSearchAgent {
    pub fn from_config(config: &AgentConfig) -> Self {
        Self::with_platforms(config, build_platforms(config))
    }

    pub fn with_platforms(config: &AgentConfig, platforms: Vec<Box<dyn JobPlatform>>) -> Self {
        Self {
            platforms,
            query: SearchQuery::from_config(&config.job_search),
            filter: ListingFilter::from_config(config),
            scorer: Scorer::from_config(config),
        }
    }

    pub fn platform_names(&self) -> Vec<&'static str> {
        self.platforms.iter().map(|p| p.name()).collect()
    }

    /// Query every platform in turn. A failing platform is reported in the
    /// outcome and never aborts the run.
    pub async fn run(&self) -> SearchOutcome {
        let started_at = Local::now();
        let mut collected = Vec::new();
        let mut platform_errors = Vec::new();

        if self.platforms.is_empty() {
            app_log!(error, "No platforms loaded, nothing to search");
        }

        for platform in &self.platforms {
            app_log!(info, "Searching for jobs on {}", platform.name());
            match platform.search(&self.query).await {
                Ok(listings) => {
                    app_log!(info, "Found {} jobs on {}", listings.len(), platform.name());
                    collected.extend(listings);
                }
                Err(e) => {
                    app_log!(error, "Error searching on {}: {}", platform.name(), e);
                    platform_errors.push(PlatformFailure {
                        platform: platform.name().to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }

        let fetched = collected.len();
        let unique = dedup(collected);
        let kept = self.filter.apply(unique);

        let today = started_at.date_naive();
        let mut listings: Vec<ScoredListing> = kept
            .into_iter()
            .map(|listing| self.scorer.score(listing, today))
            .collect();
        rank(&mut listings);

        app_log!(
            info,
            "Search finished: {} fetched, {} kept, {} platform errors",
            fetched,
            listings.len(),
            platform_errors.len()
        );

        SearchOutcome {
            listings,
            platform_errors,
            fetched,
            started_at,
        }
    }
}

/// Keep the first listing for each `(platform, id)`.
pub fn dedup(listings: Vec<Listing>) -> Vec<Listing> {
    let mut seen = HashSet::new();
    listings
        .into_iter()
        .filter(|listing| seen.insert(listing.key()))
        .collect()
}
