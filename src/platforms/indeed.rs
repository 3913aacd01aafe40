// src/platforms/indeed.rs
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use scraper::Html;
use crate::app_log;
use url::Url;

use super::html::{first_attr, first_text, parse_relative_date, select_all};
use super::http::HttpFetcher;
use super::{absolute_url, is_remote_location, max_pages, JobPlatform, PartialResults, SearchQuery};
use crate::config::{PlatformSettings, SearchCriteria};
use crate::error::PlatformError;
use crate::types::Listing;

const PLATFORM: &str = "indeed";
const BASE_URL: &str = "https://www.indeed.com";
const PAGE_SIZE: u32 = 10;
const REMOTE_FILTER: &str = "0kf:attr(DSQF7);";

pub struct IndeedConnector {
    http: HttpFetcher,
    base: Url,
    criteria: SearchCriteria,
    max_pages: u32,
}

impl IndeedConnector {
    pub fn new(settings: &PlatformSettings) -> Result<Self, PlatformError> {
        Ok(Self {
            http: HttpFetcher::new(PLATFORM, &settings.credentials)?,
            base: Url::parse(BASE_URL).map_err(|e| PlatformError::parse(PLATFORM, e.to_string()))?,
            criteria: settings.search_criteria.clone(),
            max_pages: max_pages(settings, 3),
        })
    }

    fn search_url(&self, keyword: &str, location: &str, query: &SearchQuery, page: u32) -> Url {
        let mut url = self.base.clone();
        url.set_path("/jobs");
        {
            let mut params = url.query_pairs_mut();
            params.append_pair("q", keyword);
            let remote_only = is_remote_location(location);
            if !remote_only {
                params.append_pair("l", location);
                if let Some(radius) = self.criteria.location_distance {
                    params.append_pair("radius", &radius.to_string());
                }
            }
            if query.remote || remote_only {
                params.append_pair("sc", REMOTE_FILTER);
            }
            // Indeed accepts a single job type per query.
            if let [job_type] = query.job_types.as_slice() {
                if let Some(code) = job_type_code(job_type) {
                    params.append_pair("jt", code);
                }
            }
            params.append_pair("fromage", fromage(self.criteria.post_days.unwrap_or(14)));
            if page > 0 {
                params.append_pair("start", &(page * PAGE_SIZE).to_string());
            }
        }
        url
    }
}

#[async_trait]
impl JobPlatform for IndeedConnector {
    fn name(&self) -> &'static str {
        PLATFORM
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<Listing>, PlatformError> {
        let mut results = PartialResults::new();
        let today = Utc::now().date_naive();

        for keyword in &query.keywords {
            for location in &query.locations {
                app_log!(info, "Searching Indeed for '{}' in '{}'", keyword, location);
                for page in 0..self.max_pages {
                    if page > 0 {
                        self.http.pause().await;
                    }
                    let url = self.search_url(keyword, location, query, page);
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
        }

        results.finish()
    }

    async fn job_details(&self, id: &str) -> Result<Listing, PlatformError> {
        let url = view_url(&self.base, id);
        let body = self.http.get_text(&url).await?;
        parse_job_page(&body, id, url.as_str()).ok_or_else(|| PlatformError::NotFound {
            platform: PLATFORM.to_string(),
            id: id.to_string(),
        })
    }
}

fn view_url(base: &Url, id: &str) -> Url {
    let mut url = base.clone();
    url.set_path("/viewjob");
    url.query_pairs_mut().append_pair("jk", id);
    url
}

fn job_type_code(job_type: &str) -> Option<&'static str> {
    match job_type.to_lowercase().as_str() {
        "full-time" | "full time" => Some("fulltime"),
        "part-time" | "part time" => Some("parttime"),
        "contract" | "freelance" => Some("contract"),
        "temporary" => Some("temporary"),
        "internship" => Some("internship"),
        _ => None,
    }
}

/// Indeed only offers a few "posted within" windows.
pub(crate) fn fromage(days: u32) -> &'static str {
    match days {
        0..=1 => "1",
        2..=3 => "3",
        4..=7 => "7",
        _ => "14",
    }
}

pub(crate) fn parse_search_page(body: &str, base: &Url, today: NaiveDate) -> Vec<Listing> {
    let document = Html::parse_document(body);
    let root = document.root_element();
    let mut cards = select_all(root, "div.job_seen_beacon");
    if cards.is_empty() {
        cards = select_all(root, "[data-testid='jobCard']");
    }

    let mut listings = Vec::new();
    for card in cards {
        let Some(title) = first_text(card, &["h2.jobTitle a span[title]", "h2.jobTitle a", "h2.jobTitle"])
        else {
            continue;
        };
        let id = first_attr(card, &["h2.jobTitle a[data-jk]", "a[data-jk]", "[data-jk]"], "data-jk");
        let Some(id) = id else {
            app_log!(debug, "Skipping Indeed card without job key: {}", title);
            continue;
        };

        let location = first_text(
            card,
            &["[data-testid='text-location']", "div.companyLocation"],
        )
        .unwrap_or_default();

        let mut listing = Listing::new(PLATFORM, id.as_str());
        listing.title = title;
        listing.company = first_text(
            card,
            &["[data-testid='company-name']", "span.companyName"],
        )
        .unwrap_or_default();
        listing.url = absolute_url(base, &format!("/viewjob?jk={}", id), true);
        listing.is_remote = location.to_lowercase().contains("remote");
        listing.location = location;
        listing.salary = first_text(
            card,
            &[
                "div.salary-snippet-container",
                "div.salary-snippet",
                "[data-testid='attribute_snippet_testid']",
            ],
        )
        .unwrap_or_default();
        listing.description = first_text(card, &["div.job-snippet", "[data-testid='jobsnippet_footer']"])
            .unwrap_or_default();
        listing.date_posted = first_text(card, &["span.date", "[data-testid='myJobsStateDate']"])
            .and_then(|t| parse_relative_date(&t, today));
        listings.push(listing);
    }

    listings
}

pub(crate) fn parse_job_page(body: &str, id: &str, url: &str) -> Option<Listing> {
    let document = Html::parse_document(body);
    let root = document.root_element();

    let title = first_text(
        root,
        &[
            "h1.jobsearch-JobInfoHeader-title",
            "[data-testid='jobsearch-JobInfoHeader-title']",
        ],
    )?;

    let mut listing = Listing::new(PLATFORM, id);
    listing.title = title.trim_end_matches("- job post").trim().to_string();
    listing.url = url.to_string();
    listing.company = first_text(
        root,
        &["div[data-company-name='true']", "[data-testid='inlineHeader-companyName']"],
    )
    .unwrap_or_default();
    listing.location = first_text(
        root,
        &[
            "div[data-testid='inlineHeader-companyLocation']",
            "[data-testid='job-location']",
        ],
    )
    .unwrap_or_default();
    listing.description = first_text(root, &["#jobDescriptionText"]).unwrap_or_default();
    listing.salary = first_text(
        root,
        &["div[data-testid='attribute_snippet_compensation']", "#salaryInfoAndJobType span"],
    )
    .unwrap_or_default();
    listing.job_type = first_text(root, &["div[data-testid='attribute_snippet_job_type']"])
        .unwrap_or_default();
    listing.is_remote = listing.location.to_lowercase().contains("remote");

    Some(listing)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEARCH_FIXTURE: &str = r#"
<ul class="jobsearch-ResultsList">
  <li>
    <div class="cardOutline"><div class="job_seen_beacon">
      <h2 class="jobTitle"><a data-jk="a1b2c3d4e5f60718" href="/rc/clk?jk=a1b2c3d4e5f60718&amp;from=serp"><span title="Rust Backend Engineer">Rust Backend Engineer</span></a></h2>
      <span data-testid="company-name">Hooli</span>
      <div data-testid="text-location">Remote in United States</div>
      <div class="salary-snippet-container">$60 - $80 an hour</div>
      <div class="job-snippet"><ul><li>Design async services</li><li>Own the data pipeline</li></ul></div>
      <span class="date">Posted 3 days ago</span>
    </div></div>
  </li>
  <li>
    <div class="job_seen_beacon">
      <h2 class="jobTitle"><a data-jk="ffff000011112222"><span title="Data Engineer">Data Engineer</span></a></h2>
      <span data-testid="company-name">Pied Piper</span>
      <div data-testid="text-location">Palo Alto, CA</div>
      <span class="date">Just posted</span>
    </div>
  </li>
  <li><div class="job_seen_beacon"><h2 class="jobTitle"><a>Sponsored</a></h2></div></li>
</ul>"#;

    fn base() -> Url {
        Url::parse(BASE_URL).unwrap()
    }

    #[test]
    fn test_parse_search_page() {
        let today = NaiveDate::from_ymd_opt(2024, 5, 20).unwrap();
        let listings = parse_search_page(SEARCH_FIXTURE, &base(), today);
        assert_eq!(listings.len(), 2);

        let first = &listings[0];
        assert_eq!(first.id, "a1b2c3d4e5f60718");
        assert_eq!(first.title, "Rust Backend Engineer");
        assert_eq!(first.company, "Hooli");
        assert!(first.is_remote);
        assert_eq!(first.salary, "$60 - $80 an hour");
        assert_eq!(first.description, "Design async services Own the data pipeline");
        assert_eq!(first.url, "https://www.indeed.com/viewjob?jk=a1b2c3d4e5f60718");
        assert_eq!(first.date_posted, NaiveDate::from_ymd_opt(2024, 5, 17));

        assert_eq!(listings[1].date_posted, Some(today));
        assert!(!listings[1].is_remote);
    }

    #[test]
    fn test_search_url() {
        let mut settings = PlatformSettings::default();
        settings.search_criteria.post_days = Some(5);
        settings.search_criteria.location_distance = Some(50);
        let connector = IndeedConnector::new(&settings).unwrap();
        let query = SearchQuery {
            keywords: vec!["Rust".into()],
            locations: vec!["Austin, TX".into()],
            job_types: vec!["Full-time".into()],
            remote: true,
            ..Default::default()
        };
        let url = connector.search_url("Rust", "Austin, TX", &query, 2);
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        let get = |k: &str| pairs.iter().find(|(key, _)| key == k).map(|(_, v)| v.as_str());

        assert_eq!(url.path(), "/jobs");
        assert_eq!(get("q"), Some("Rust"));
        assert_eq!(get("l"), Some("Austin, TX"));
        assert_eq!(get("radius"), Some("50"));
        assert_eq!(get("sc"), Some(REMOTE_FILTER));
        assert_eq!(get("jt"), Some("fulltime"));
        assert_eq!(get("fromage"), Some("7"));
        assert_eq!(get("start"), Some("20"));
    }

    #[test]
    fn test_multiple_job_types_are_not_sent() {
        let connector = IndeedConnector::new(&PlatformSettings::default()).unwrap();
        let query = SearchQuery {
            job_types: vec!["Full-time".into(), "Contract".into()],
            ..Default::default()
        };
        let url = connector.search_url("Rust", "Remote", &query, 0);
        assert!(!url.query_pairs().any(|(k, _)| k == "jt" || k == "l" || k == "start"));
    }

    #[test]
    fn test_fromage_windows() {
        assert_eq!(fromage(1), "1");
        assert_eq!(fromage(3), "3");
        assert_eq!(fromage(7), "7");
        assert_eq!(fromage(30), "14");
    }

    #[test]
    fn test_parse_job_page() {
        let body = r#"<html><body>
          <h1 class="jobsearch-JobInfoHeader-title">Platform Engineer - job post</h1>
          <div data-company-name="true">Umbrella</div>
          <div data-testid="inlineHeader-companyLocation">Remote</div>
          <div data-testid="attribute_snippet_compensation">$140,000 a year</div>
          <div data-testid="attribute_snippet_job_type">Full-time</div>
          <div id="jobDescriptionText"><p>Kubernetes and Rust.</p></div>
        </body></html>"#;
        let url = view_url(&base(), "abc").to_string();
        let listing = parse_job_page(body, "abc", &url).unwrap();
        assert_eq!(listing.title, "Platform Engineer");
        assert_eq!(listing.company, "Umbrella");
        assert_eq!(listing.salary, "$140,000 a year");
        assert_eq!(listing.job_type, "Full-time");
        assert!(listing.is_remote);
        assert_eq!(listing.url, "https://www.indeed.com/viewjob?jk=abc");
    }
}
