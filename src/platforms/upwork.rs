// src/platforms/upwork.rs
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use regex::Regex;
use scraper::Html;
use std::sync::LazyLock;
use crate::app_log;
use url::Url;

use super::html::{all_texts, first_attr, first_text, parse_relative_date, select_all};
use super::http::HttpFetcher;
use super::{absolute_url, max_pages, JobPlatform, PartialResults, SearchQuery};
use crate::config::{PlatformSettings, RateRange};
use crate::error::PlatformError;
use crate::types::Listing;

const PLATFORM: &str = "upwork";
const BASE_URL: &str = "https://www.upwork.com";
const CLIENT_FALLBACK: &str = "Upwork Client";

static JOB_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"~([0-9a-z]+)/?$").unwrap());
static PAYMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$[\d.,]+(?:\s*-\s*\$[\d.,]+)?").unwrap());

pub struct UpworkConnector {
    http: HttpFetcher,
    base: Url,
    hourly_rate: Option<RateRange>,
    max_pages: u32,
}

impl UpworkConnector {
    pub fn new(settings: &PlatformSettings) -> Result<Self, PlatformError> {
        Ok(Self {
            http: HttpFetcher::new(PLATFORM, &settings.credentials)?,
            base: Url::parse(BASE_URL).map_err(|e| PlatformError::parse(PLATFORM, e.to_string()))?,
            hourly_rate: settings.search_criteria.hourly_rate,
            max_pages: max_pages(settings, 2),
        })
    }

    fn search_url(&self, keyword: &str, query: &SearchQuery, page: u32) -> Url {
        let mut url = self.base.clone();
        url.set_path("/nx/search/jobs/");
        {
            let mut params = url.query_pairs_mut();
            params.append_pair("q", keyword);
            params.append_pair("sort", "recency");
            if page > 0 {
                params.append_pair("page", &(page + 1).to_string());
            }
            if let Some(rate) = self.hourly_rate {
                params.append_pair("hourly_rate", &format!("{}-{}", rate.min, rate.max));
            }
            let payment = payment_types(&query.job_types);
            if !payment.is_empty() {
                params.append_pair("t", &payment.join(","));
            }
            let tiers = contractor_tiers(&query.experience_levels);
            if !tiers.is_empty() {
                params.append_pair("contractor_tier", &tiers.join(","));
            }
        }
        url
    }
}

#[async_trait]
impl JobPlatform for UpworkConnector {
    fn name(&self) -> &'static str {
        PLATFORM
    }

    /// Upwork has no location filter, every contract is remote; only
    /// keywords drive the queries.
    async fn search(&self, query: &SearchQuery) -> Result<Vec<Listing>, PlatformError> {
        let mut results = PartialResults::new();
        let today = Utc::now().date_naive();

        for keyword in &query.keywords {
            app_log!(info, "Searching Upwork for '{}'", keyword);
            for page in 0..self.max_pages {
                if page > 0 {
                    self.http.pause().await;
                }
                let url = self.search_url(keyword, query, page);
                let page_result = self
                    .http
                    .get_text(&url)
                    .await
                    .map(|body| parse_search_page(&body, &self.base, today));
                if results.record(page_result)? == 0 {
                    break;
                }
            }
        }

        results.finish()
    }

    async fn job_details(&self, id: &str) -> Result<Listing, PlatformError> {
        let mut url = self.base.clone();
        url.set_path(&format!("/jobs/~{}", id.trim_start_matches('~')));
        let body = self.http.get_text(&url).await?;
        parse_job_page(&body, id.trim_start_matches('~'), url.as_str()).ok_or_else(|| {
            PlatformError::NotFound {
                platform: PLATFORM.to_string(),
                id: id.to_string(),
            }
        })
    }
}

fn payment_types(job_types: &[String]) -> Vec<&'static str> {
    let mut codes = Vec::new();
    let lower: Vec<String> = job_types.iter().map(|t| t.to_lowercase()).collect();
    if lower.iter().any(|t| t.contains("hour")) {
        codes.push("0");
    }
    if lower.iter().any(|t| t.contains("fixed")) {
        codes.push("1");
    }
    codes
}

fn contractor_tiers(levels: &[String]) -> Vec<&'static str> {
    let mut tiers: Vec<&'static str> = levels
        .iter()
        .filter_map(|level| match level.to_lowercase().as_str() {
            "entry level" | "entry-level" | "internship" => Some("1"),
            "associate" | "mid-level" | "mid level" | "intermediate" => Some("2"),
            "senior" | "expert" | "director" | "executive" => Some("3"),
            _ => None,
        })
        .collect();
    tiers.sort_unstable();
    tiers.dedup();
    tiers
}

/// Split a payment line into the contract type and the amount it quotes.
pub(crate) fn parse_payment(text: &str) -> (String, String) {
    let amount = PAYMENT
        .find(text)
        .map(|m| m.as_str().to_string())
        .unwrap_or_default();
    let lower = text.to_lowercase();
    let job_type = if lower.contains("fixed") {
        "Fixed-Price"
    } else if lower.contains("hourly") {
        "Hourly"
    } else {
        ""
    };
    (job_type.to_string(), amount)
}

pub(crate) fn parse_search_page(body: &str, base: &Url, today: NaiveDate) -> Vec<Listing> {
    let document = Html::parse_document(body);
    let root = document.root_element();
    let mut tiles = select_all(root, "article[data-test='JobTile']");
    if tiles.is_empty() {
        tiles = select_all(root, "section[data-test='job-tile']");
    }

    let mut listings = Vec::new();
    for tile in tiles {
        let Some(title) = first_text(tile, &["h2.job-tile-title a", "[data-test='job-title'] a", "h2 a"])
        else {
            continue;
        };
        let href = first_attr(tile, &["h2.job-tile-title a", "[data-test='job-title'] a", "h2 a"], "href")
            .unwrap_or_default();
        let url = absolute_url(base, &href, false);
        let Some(id) = JOB_ID.captures(&url).map(|c| c[1].to_string()) else {
            app_log!(debug, "Skipping Upwork tile without job id: {}", title);
            continue;
        };

        let payment = first_text(
            tile,
            &["[data-test='job-type-label']", "[data-test='job-type']", "[data-test='JobInfo']"],
        )
        .unwrap_or_default();
        let budget = first_text(tile, &["[data-test='is-fixed-price'] strong:last-child"]);
        let (job_type, mut salary) = parse_payment(&payment);
        if salary.is_empty() {
            if let Some(budget) = budget {
                salary = budget;
            }
        }

        let client = all_texts(tile, "[data-test='client-info'] small");
        let mut listing = Listing::new(PLATFORM, id);
        listing.title = title;
        listing.company = if client.is_empty() {
            CLIENT_FALLBACK.to_string()
        } else {
            client.join(" - ")
        };
        listing.url = url;
        listing.location = "Remote".to_string();
        listing.is_remote = true;
        listing.description = first_text(
            tile,
            &["[data-test='UpCLineClamp JobDescription'] p", "[data-test='job-description-text']"],
        )
        .unwrap_or_default();
        listing.job_type = job_type;
        listing.salary = salary;
        listing.experience_level = first_text(tile, &["[data-test='experience-level'] strong"])
            .unwrap_or_default();
        listing.skills = {
            let mut skills = all_texts(tile, "[data-test='token'] span");
            if skills.is_empty() {
                skills = all_texts(tile, "[data-test='skill-tag']");
            }
            skills
        };
        listing.date_posted = first_text(
            tile,
            &["[data-test='job-pubilshed-date']", "[data-test='posted-on']"],
        )
        .and_then(|t| parse_relative_date(&t, today));
        listings.push(listing);
    }

    listings
}

pub(crate) fn parse_job_page(body: &str, id: &str, url: &str) -> Option<Listing> {
    let document = Html::parse_document(body);
    let root = document.root_element();

    let title = first_text(root, &["h1[data-qa='job-title']", "header h4", "h1"])?;

    let mut listing = Listing::new(PLATFORM, id);
    listing.title = title;
    listing.url = url.to_string();
    listing.location = "Remote".to_string();
    listing.is_remote = true;
    listing.description = first_text(
        root,
        &["div[data-qa='job-description']", "[data-test='Description']"],
    )
    .unwrap_or_default();
    listing.company = first_text(root, &["div[data-qa='client-info'] h2"])
        .unwrap_or_else(|| CLIENT_FALLBACK.to_string());

    for insight in all_texts(root, "div[data-qa='job-insights'] strong") {
        if insight.starts_with('$') {
            listing.salary = insight;
        } else if insight.to_lowercase().contains("hour") {
            listing.job_type = "Hourly".to_string();
        } else if insight.to_lowercase().contains("fixed") {
            listing.job_type = "Fixed-Price".to_string();
        }
    }
    for item in select_all(root, "li[data-test='attribute-item']") {
        let text = first_text(item, &["*"]).unwrap_or_default();
        if let Some(level) = ["Entry level", "Intermediate", "Expert"]
            .iter()
            .find(|level| text.contains(*level))
        {
            listing.experience_level = level.to_string();
        }
    }
    listing.skills = all_texts(root, "span[data-qa='skill-tag']");

    Some(listing)
}
