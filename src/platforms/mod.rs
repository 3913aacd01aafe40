// src/platforms/mod.rs
//! Connectors for job and freelance platforms.
//!
//! Every connector turns a [`SearchQuery`] into normalized [`Listing`]s. The
//! scraping ones fetch public HTML with [`http::HttpFetcher`] and read it
//! with the selector helpers in [`html`]; Freelancer exposes a JSON API.

use async_trait::async_trait;
use crate::app_log;
use url::Url;

use crate::config::{AgentConfig, JobSearchConfig, PlatformSettings};
use crate::error::PlatformError;
use crate::types::Listing;

pub mod fiverr;
pub mod freelancer;
pub mod html;
pub mod http;
pub mod indeed;
pub mod linkedin;
pub mod upwork;

pub use fiverr::FiverrConnector;
pub use freelancer::FreelancerConnector;
pub use indeed::IndeedConnector;
pub use linkedin::LinkedinConnector;
pub use upwork::UpworkConnector;

pub const SUPPORTED_PLATFORMS: [&str; 5] = ["linkedin", "indeed", "upwork", "fiverr", "freelancer"];

/// What to look for, shared by all connectors. Connectors ignore the fields
/// their platform has no notion of.
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    pub keywords: Vec<String>,
    pub locations: Vec<String>,
    pub job_types: Vec<String>,
    pub remote: bool,
    pub experience_levels: Vec<String>,
}

impl SearchQuery {
    pub fn from_config(search: &JobSearchConfig) -> Self {
        Self {
            keywords: non_empty(&search.keywords),
            locations: non_empty(&search.locations),
            job_types: non_empty(&search.job_types),
            remote: search.remote,
            experience_levels: non_empty(&search.experience_level),
        }
    }
}

fn non_empty(values: &[String]) -> Vec<String> {
    values
        .iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}

#[async_trait]
pub trait JobPlatform: Send + Sync {
    fn name(&self) -> &'static str;

    async fn search(&self, query: &SearchQuery) -> Result<Vec<Listing>, PlatformError>;

    async fn job_details(&self, id: &str) -> Result<Listing, PlatformError>;
}

pub fn build_platform(
    name: &str,
    settings: &PlatformSettings,
) -> Result<Option<Box<dyn JobPlatform>>, PlatformError> {
    let connector: Box<dyn JobPlatform> = match name {
        "linkedin" => Box::new(LinkedinConnector::new(settings)?),
        "indeed" => Box::new(IndeedConnector::new(settings)?),
        "upwork" => Box::new(UpworkConnector::new(settings)?),
        "fiverr" => Box::new(FiverrConnector::new(settings)?),
        "freelancer" => Box::new(FreelancerConnector::new(settings)?),
        _ => return Ok(None),
    };
    Ok(Some(connector))
}

/// Instantiate a connector for every enabled platform in the configuration.
pub fn build_platforms(config: &AgentConfig) -> Vec<Box<dyn JobPlatform>> {
    let mut connectors = Vec::new();

    for (name, settings) in &config.platforms {
        if !settings.enabled {
            app_log!(info, "Platform {} is disabled, skipping", name);
            continue;
        }
        match build_platform(name, settings) {
            Ok(Some(connector)) => {
                app_log!(info, "Successfully loaded platform: {}", name);
                connectors.push(connector);
            }
            Ok(None) => app_log!(
                error,
                "Failed to load platform {}: unknown platform (supported: {})",
                name,
                SUPPORTED_PLATFORMS.join(", ")
            ),
            Err(e) => app_log!(error, "Failed to load platform {}: {}", name, e),
        }
    }

    connectors
}

/// Accumulates the pages of a multi-query search. Individual failures are
/// tolerated; the search only fails when nothing succeeded or the platform
/// refused the session.
pub(crate) struct PartialResults {
    listings: Vec<Listing>,
    attempts: usize,
    failures: usize,
    last_error: Option<PlatformError>,
}

impl PartialResults {
    pub(crate) fn new() -> Self {
        Self {
            listings: Vec::new(),
            attempts: 0,
            failures: 0,
            last_error: None,
        }
    }

    /// Returns the number of listings added.
    pub(crate) fn record(
        &mut self,
        result: Result<Vec<Listing>, PlatformError>,
    ) -> Result<usize, PlatformError> {
        self.attempts += 1;
        match result {
            Ok(page) => {
                let added = page.len();
                self.listings.extend(page);
                Ok(added)
            }
            Err(e @ PlatformError::Auth { .. }) => Err(e),
            Err(e) => {
                app_log!(warn, "{}", e);
                self.failures += 1;
                self.last_error = Some(e);
                Ok(0)
            }
        }
    }

    pub(crate) fn finish(self) -> Result<Vec<Listing>, PlatformError> {
        match self.last_error {
            Some(e) if self.failures == self.attempts => Err(e),
            _ => Ok(self.listings),
        }
    }
}

/// Resolve a possibly relative link against the platform origin, dropping
/// tracking query strings.
pub(crate) fn absolute_url(base: &Url, href: &str, keep_query: bool) -> String {
    match base.join(href.trim()) {
        Ok(mut url) => {
            if !keep_query {
                url.set_query(None);
            }
            url.set_fragment(None);
            url.to_string()
        }
        Err(_) => href.trim().to_string(),
    }
}

pub(crate) fn max_pages(settings: &PlatformSettings, default: u32) -> u32 {
    settings.search_criteria.max_pages.unwrap_or(default).max(1)
}

pub(crate) fn is_remote_location(location: &str) -> bool {
    location.trim().eq_ignore_ascii_case("remote")
}
