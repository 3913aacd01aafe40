// src/platforms/linkedin.rs
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use regex::Regex;
use scraper::Html;
use std::sync::LazyLock;
use crate::app_log;
use url::Url;

use super::html::{all_texts, first_attr, first_text, parse_relative_date, select_all};
use super::http::HttpFetcher;
use super::{absolute_url, is_remote_location, max_pages, JobPlatform, PartialResults, SearchQuery};
use crate::config::{PlatformSettings, SearchCriteria};
use crate::error::PlatformError;
use crate::types::Listing;

const PLATFORM: &str = "linkedin";
const BASE_URL: &str = "https://www.linkedin.com";
const SEARCH_PATH: &str = "/jobs-guest/jobs/api/seeMoreJobPostings/search";
const PAGE_SIZE: u32 = 25;

static JOB_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d{6,})/?$").unwrap());

pub struct LinkedinConnector {
    http: HttpFetcher,
    endpoint: Url,
    criteria: SearchCriteria,
    max_pages: u32,
}

impl LinkedinConnector {
    pub fn new(settings: &PlatformSettings) -> Result<Self, PlatformError> {
        Ok(Self {
            http: HttpFetcher::new(PLATFORM, &settings.credentials)?,
            endpoint: Url::parse(&format!("{}{}", BASE_URL, SEARCH_PATH))
                .map_err(|e| PlatformError::parse(PLATFORM, e.to_string()))?,
            criteria: settings.search_criteria.clone(),
            max_pages: max_pages(settings, 3),
        })
    }

    fn search_url(&self, keyword: &str, location: &str, query: &SearchQuery, page: u32) -> Url {
        let mut url = self.endpoint.clone();
        {
            let mut params = url.query_pairs_mut();
            params.append_pair("keywords", keyword);
            let remote_only = is_remote_location(location);
            if !remote_only {
                params.append_pair("location", location);
                if let Some(distance) = self.criteria.location_distance {
                    params.append_pair("distance", &distance.to_string());
                }
            }
            if query.remote || remote_only {
                params.append_pair("f_WT", "2");
            }
            let job_types = job_type_codes(&query.job_types);
            if !job_types.is_empty() {
                params.append_pair("f_JT", &job_types.join(","));
            }
            let levels = experience_codes(&query.experience_levels);
            if !levels.is_empty() {
                params.append_pair("f_E", &levels.join(","));
            }
            if let Some(window) = date_posted_param(self.criteria.post_days.unwrap_or(7)) {
                params.append_pair("f_TPR", window);
            }
            params.append_pair("start", &(page * PAGE_SIZE).to_string());
        }
        url
    }
}

#[async_trait]
impl JobPlatform for LinkedinConnector {
    fn name(&self) -> &'static str {
        PLATFORM
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<Listing>, PlatformError> {
        let mut results = PartialResults::new();
        let today = Utc::now().date_naive();

        for keyword in &query.keywords {
            for location in &query.locations {
                app_log!(info, "Searching LinkedIn for '{}' in '{}'", keyword, location);
                for page in 0..self.max_pages {
                    if page > 0 {
                        self.http.pause().await;
                    }
                    let url = self.search_url(keyword, location, query, page);
                    let page_result = self
                        .http
                        .get_text(&url)
                        .await
                        .map(|body| parse_search_page(&body, today));
                    if results.record(page_result)? == 0 {
                        break;
                    }
                }
            }
        }

        results.finish()
    }

    async fn job_details(&self, id: &str) -> Result<Listing, PlatformError> {
        let url = Url::parse(&format!("{}/jobs/view/{}", BASE_URL, id))
            .map_err(|e| PlatformError::parse(PLATFORM, e.to_string()))?;
        let body = self.http.get_text(&url).await?;
        parse_job_page(&body, id, url.as_str()).ok_or_else(|| PlatformError::NotFound {
            platform: PLATFORM.to_string(),
            id: id.to_string(),
        })
    }
}

pub(crate) fn job_type_codes(job_types: &[String]) -> Vec<&'static str> {
    job_types
        .iter()
        .filter_map(|job_type| match job_type.to_lowercase().as_str() {
            "full-time" | "full time" => Some("F"),
            "part-time" | "part time" => Some("P"),
            "contract" => Some("C"),
            "temporary" => Some("T"),
            "volunteer" => Some("V"),
            "internship" => Some("I"),
            _ => None,
        })
        .collect()
}

pub(crate) fn experience_codes(levels: &[String]) -> Vec<&'static str> {
    levels
        .iter()
        .filter_map(|level| match level.to_lowercase().as_str() {
            "internship" => Some("1"),
            "entry level" | "entry-level" => Some("2"),
            "associate" => Some("3"),
            "mid-level" | "mid-senior level" | "mid level" => Some("4"),
            "senior" => Some("5"),
            "director" => Some("6"),
            "executive" => Some("7"),
            _ => None,
        })
        .collect()
}

pub(crate) fn date_posted_param(days: u32) -> Option<&'static str> {
    match days {
        0..=1 => Some("r86400"),
        2..=7 => Some("r604800"),
        8..=30 => Some("r2592000"),
        _ => None,
    }
}

/// Parse the job cards returned by the guest search endpoint.
pub(crate) fn parse_search_page(body: &str, today: NaiveDate) -> Vec<Listing> {
    let document = Html::parse_document(body);
    let base = Url::parse(BASE_URL).ok();
    let mut listings = Vec::new();

    for card in select_all(document.root_element(), "div.base-search-card") {
        let Some(title) = first_text(card, &["h3.base-search-card__title"]) else {
            app_log!(debug, "Skipping LinkedIn card without title");
            continue;
        };
        let href = first_attr(card, &["a.base-card__full-link", "a"], "href").unwrap_or_default();
        let url = match &base {
            Some(base) => absolute_url(base, &href, false),
            None => href.clone(),
        };
        let id = card
            .value()
            .attr("data-entity-urn")
            .and_then(|urn| urn.rsplit(':').next())
            .map(str::to_string)
            .or_else(|| JOB_ID.captures(&url).map(|c| c[1].to_string()));
        let Some(id) = id else {
            app_log!(debug, "Skipping LinkedIn card without id: {}", title);
            continue;
        };

        let location = first_text(card, &[".job-search-card__location"]).unwrap_or_default();
        let date_posted = first_attr(card, &["time"], "datetime")
            .and_then(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d").ok())
            .or_else(|| first_text(card, &["time"]).and_then(|t| parse_relative_date(&t, today)));

        let mut listing = Listing::new(PLATFORM, id);
        listing.title = title;
        listing.company = first_text(
            card,
            &["h4.base-search-card__subtitle a", "h4.base-search-card__subtitle"],
        )
        .unwrap_or_default();
        listing.is_remote = location.to_lowercase().contains("remote");
        listing.location = location;
        listing.salary = first_text(card, &[".job-search-card__salary-info"]).unwrap_or_default();
        listing.url = url;
        listing.date_posted = date_posted;
        listings.push(listing);
    }

    listings
}

/// Parse a public job view page.
pub(crate) fn parse_job_page(body: &str, id: &str, url: &str) -> Option<Listing> {
    let document = Html::parse_document(body);
    let root = document.root_element();

    let title = first_text(
        root,
        &[
            "h1.top-card-layout__title",
            ".job-details-jobs-unified-top-card__job-title",
            "h1[data-test-id='job-title']",
            ".jobs-unified-top-card__job-title",
        ],
    )?;

    let mut listing = Listing::new(PLATFORM, id);
    listing.title = title;
    listing.url = url.to_string();
    listing.company = first_text(
        root,
        &[
            ".topcard__org-name-link",
            ".job-details-jobs-unified-top-card__company-name",
            "a[data-test-id='job-poster-name']",
            ".jobs-unified-top-card__company-name",
        ],
    )
    .unwrap_or_default();
    listing.location = first_text(
        root,
        &[
            ".topcard__flavor--bullet",
            ".job-details-jobs-unified-top-card__bullet",
            "[data-test-id='job-location']",
            ".jobs-unified-top-card__bullet",
        ],
    )
    .unwrap_or_default();
    listing.description = first_text(
        root,
        &[
            ".show-more-less-html__markup",
            ".jobs-box__html-content",
            ".jobs-description-content__text",
            "[data-test-id='job-description']",
        ],
    )
    .unwrap_or_default();
    listing.salary = first_text(root, &[".salary.compensation__salary"]).unwrap_or_default();
    listing.is_remote = listing.location.to_lowercase().contains("remote");

    for item in select_all(root, "li.description__job-criteria-item") {
        let header = first_text(item, &["h3"]).unwrap_or_default();
        let value = first_text(item, &["span"]).unwrap_or_default();
        if header.contains("Seniority") {
            listing.experience_level = value;
        } else if header.contains("Employment type") {
            listing.job_type = value;
        }
    }
    listing.skills = all_texts(root, ".job-details-skill-match-status-list__skill");

    Some(listing)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEARCH_FIXTURE: &str = r#"
<li>
  <div class="base-card base-search-card job-search-card" data-entity-urn="urn:li:jobPosting:3912345678">
    <a class="base-card__full-link" href="https://www.linkedin.com/jobs/view/senior-rust-engineer-at-acme-3912345678?refId=abc&trackingId=x"></a>
    <div class="base-search-card__info">
      <h3 class="base-search-card__title">
            Senior Rust Engineer
      </h3>
      <h4 class="base-search-card__subtitle"><a href="/company/acme">Acme Corp</a></h4>
      <div class="base-search-card__metadata">
        <span class="job-search-card__location">Remote</span>
        <span class="job-search-card__salary-info">$150,000 - $180,000</span>
        <time class="job-search-card__listdate" datetime="2024-05-18">2 days ago</time>
      </div>
    </div>
  </div>
</li>
<li>
  <div class="base-card base-search-card job-search-card">
    <a class="base-card__full-link" href="https://www.linkedin.com/jobs/view/backend-developer-at-globex-3900000001?position=2"></a>
    <h3 class="base-search-card__title">Backend Developer</h3>
    <h4 class="base-search-card__subtitle">Globex</h4>
    <span class="job-search-card__location">Berlin, Germany</span>
    <time class="job-search-card__listdate--new">1 week ago</time>
  </div>
</li>
<li><div class="base-search-card"><h4 class="base-search-card__subtitle">No title</h4></div></li>
"#;

    fn connector() -> LinkedinConnector {
        let mut settings = PlatformSettings::default();
        settings.search_criteria.location_distance = Some(25);
        LinkedinConnector::new(&settings).unwrap()
    }

    #[test]
    fn test_parse_search_page() {
        let today = NaiveDate::from_ymd_opt(2024, 5, 20).unwrap();
        let listings = parse_search_page(SEARCH_FIXTURE, today);
        assert_eq!(listings.len(), 2);

        let first = &listings[0];
        assert_eq!(first.id, "3912345678");
        assert_eq!(first.title, "Senior Rust Engineer");
        assert_eq!(first.company, "Acme Corp");
        assert!(first.is_remote);
        assert_eq!(first.salary, "$150,000 - $180,000");
        assert_eq!(first.date_posted, NaiveDate::from_ymd_opt(2024, 5, 18));
        assert_eq!(
            first.url,
            "https://www.linkedin.com/jobs/view/senior-rust-engineer-at-acme-3912345678"
        );

        let second = &listings[1];
        assert_eq!(second.id, "3900000001");
        assert_eq!(second.company, "Globex");
        assert!(!second.is_remote);
        assert_eq!(second.date_posted, NaiveDate::from_ymd_opt(2024, 5, 13));
    }

    #[test]
    fn test_search_url_parameters() {
        let query = SearchQuery {
            keywords: vec!["Rust Developer".into()],
            locations: vec!["New York, NY".into()],
            job_types: vec!["Full-time".into(), "Contract".into(), "Freelance".into()],
            remote: false,
            experience_levels: vec!["Mid-level".into(), "Senior".into()],
        };
        let url = connector().search_url("Rust Developer", "New York, NY", &query, 1);
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        let get = |k: &str| pairs.iter().find(|(key, _)| key == k).map(|(_, v)| v.as_str());

        assert_eq!(url.path(), SEARCH_PATH);
        assert_eq!(get("keywords"), Some("Rust Developer"));
        assert_eq!(get("location"), Some("New York, NY"));
        assert_eq!(get("distance"), Some("25"));
        assert_eq!(get("f_JT"), Some("F,C"));
        assert_eq!(get("f_E"), Some("4,5"));
        assert_eq!(get("f_TPR"), Some("r604800"));
        assert_eq!(get("start"), Some("25"));
        assert_eq!(get("f_WT"), None);
    }

    #[test]
    fn test_remote_location_uses_remote_filter() {
        let query = SearchQuery {
            keywords: vec!["Rust".into()],
            locations: vec!["Remote".into()],
            ..Default::default()
        };
        let url = connector().search_url("Rust", "Remote", &query, 0);
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("f_WT".to_string(), "2".to_string())));
        assert!(!pairs.iter().any(|(k, _)| k == "location"));
    }

    #[test]
    fn test_date_window_mapping() {
        assert_eq!(date_posted_param(1), Some("r86400"));
        assert_eq!(date_posted_param(7), Some("r604800"));
        assert_eq!(date_posted_param(14), Some("r2592000"));
        assert_eq!(date_posted_param(90), None);
    }

    #[test]
    fn test_parse_job_page() {
        let body = r#"
<html><body>
  <h1 class="top-card-layout__title">Staff Platform Engineer</h1>
  <a class="topcard__org-name-link">Initech</a>
  <span class="topcard__flavor--bullet">Austin, TX (Hybrid)</span>
  <div class="show-more-less-html__markup"><p>Build   things in Rust.</p></div>
  <ul>
    <li class="description__job-criteria-item">
      <h3 class="description__job-criteria-subheader">Seniority level</h3>
      <span class="description__job-criteria-text">Mid-Senior level</span>
    </li>
    <li class="description__job-criteria-item">
      <h3 class="description__job-criteria-subheader">Employment type</h3>
      <span class="description__job-criteria-text">Full-time</span>
    </li>
  </ul>
</body></html>"#;
        let listing =
            parse_job_page(body, "42", "https://www.linkedin.com/jobs/view/42").unwrap();
        assert_eq!(listing.title, "Staff Platform Engineer");
        assert_eq!(listing.company, "Initech");
        assert_eq!(listing.description, "Build things in Rust.");
        assert_eq!(listing.experience_level, "Mid-Senior level");
        assert_eq!(listing.job_type, "Full-time");
        assert!(parse_job_page("<html></html>", "1", "x").is_none());
    }
}
