// src/platforms/fiverr.rs
//! Fiverr is a seller marketplace: opportunities are buyer requests, which
//! need a logged-in seller session. Without one, public gigs are turned into
//! market insights instead.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use scraper::Html;
use crate::app_log;
use url::Url;

use super::html::{content_id, element_text, first_text, select_all};
use super::http::HttpFetcher;
use super::{JobPlatform, PartialResults, SearchQuery};
use crate::config::PlatformSettings;
use crate::error::PlatformError;
use crate::types::Listing;

const PLATFORM: &str = "fiverr";
const BASE_URL: &str = "https://www.fiverr.com";
const MAX_INSIGHTS_PER_KEYWORD: usize = 10;
const REQUEST_TITLE_CHARS: usize = 50;

pub struct FiverrConnector {
    http: HttpFetcher,
    base: Url,
    has_session: bool,
}

impl FiverrConnector {
    pub fn new(settings: &PlatformSettings) -> Result<Self, PlatformError> {
        let has_session = settings
            .credentials
            .session_cookie
            .as_deref()
            .is_some_and(|c| !c.trim().is_empty());
        Ok(Self {
            http: HttpFetcher::new(PLATFORM, &settings.credentials)?,
            base: Url::parse(BASE_URL).map_err(|e| PlatformError::parse(PLATFORM, e.to_string()))?,
            has_session,
        })
    }

    fn buyer_requests_url(&self) -> Url {
        let mut url = self.base.clone();
        url.set_path("/users/me/requests");
        url
    }

    fn gig_search_url(&self, keyword: &str) -> Url {
        let mut url = self.base.clone();
        url.set_path("/search/gigs");
        url.query_pairs_mut().append_pair("query", keyword);
        url
    }

    async fn buyer_requests(&self, query: &SearchQuery) -> Result<Vec<Listing>, PlatformError> {
        let url = self.buyer_requests_url();
        let body = self.http.get_text(&url).await?;
        let today = Utc::now().date_naive();
        let requests = parse_buyer_requests(&body, url.as_str(), today);
        app_log!(info, "Found {} Fiverr buyer requests", requests.len());

        let needles: Vec<String> = query.keywords.iter().map(|k| k.to_lowercase()).collect();
        Ok(requests
            .into_iter()
            .filter(|r| {
                let text = r.description.to_lowercase();
                needles.iter().any(|needle| text.contains(needle))
            })
            .collect())
    }

    async fn market_insights(&self, query: &SearchQuery) -> Result<Vec<Listing>, PlatformError> {
        let mut results = PartialResults::new();
        let today = Utc::now().date_naive();

        for (i, keyword) in query.keywords.iter().enumerate() {
            if i > 0 {
                self.http.pause().await;
            }
            app_log!(info, "Collecting Fiverr market insights for '{}'", keyword);
            let url = self.gig_search_url(keyword);
            let page = self
                .http
                .get_text(&url)
                .await
                .map(|body| parse_gig_insights(&body, url.as_str(), today));
            results.record(page)?;
        }

        results.finish()
    }
}

#[async_trait]
impl JobPlatform for FiverrConnector {
    fn name(&self) -> &'static str {
        PLATFORM
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<Listing>, PlatformError> {
        if self.has_session {
            match self.buyer_requests(query).await {
                Ok(requests) if !requests.is_empty() => return Ok(requests),
                Ok(_) => app_log!(info, "No matching Fiverr buyer requests, falling back to market insights"),
                Err(e) => app_log!(warn, "Fiverr buyer requests unavailable ({}), falling back to market insights", e),
            }
        }
        self.market_insights(query).await
    }

    async fn job_details(&self, id: &str) -> Result<Listing, PlatformError> {
        // Requests and insights carry everything the page shows.
        Err(PlatformError::NotFound {
            platform: PLATFORM.to_string(),
            id: id.to_string(),
        })
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

pub(crate) fn parse_buyer_requests(body: &str, page_url: &str, today: NaiveDate) -> Vec<Listing> {
    let document = Html::parse_document(body);
    let mut listings = Vec::new();

    for row in select_all(document.root_element(), "div.buyer-request-row") {
        let Some(description) = first_text(row, &["div.description"]) else {
            continue;
        };
        let buyer = first_text(row, &["div.request-from a", "div.request-from"])
            .unwrap_or_else(|| "Unknown".to_string());

        let mut listing = Listing::new(PLATFORM, format!("req-{}", content_id(&[&description, &buyer])));
        listing.title = format!("Buyer Request: {}", truncate_chars(&description, REQUEST_TITLE_CHARS));
        listing.company = format!("Fiverr Buyer: {}", buyer);
        listing.salary = first_text(row, &["div.price"]).unwrap_or_default();
        if let Some(delivery) = first_text(row, &["div.delivery-time"]) {
            listing.description = format!("{}\n\nDelivery: {}", description, delivery);
        } else {
            listing.description = description;
        }
        listing.job_type = "Freelance".to_string();
        listing.location = "Remote".to_string();
        listing.is_remote = true;
        listing.url = page_url.to_string();
        listing.date_posted = Some(today);
        listings.push(listing);
    }

    listings
}

pub(crate) fn parse_gig_insights(body: &str, page_url: &str, today: NaiveDate) -> Vec<Listing> {
    let document = Html::parse_document(body);
    let mut listings = Vec::new();

    for card in select_all(document.root_element(), "div.gig-card-layout, div.gig-card")
        .into_iter()
        .take(MAX_INSIGHTS_PER_KEYWORD)
    {
        let Some(title) = first_text(card, &["h3", "p[role='heading']"]) else {
            continue;
        };
        let seller = first_text(card, &["div.seller-name", "[class*='seller-name']"])
            .unwrap_or_else(|| "Unknown seller".to_string());
        let price = first_text(card, &["span.price", "[class*='price'] span"]).unwrap_or_default();
        let rating = select_all(card, "span.gig-rating, strong.rating-score")
            .into_iter()
            .map(element_text)
            .next()
            .unwrap_or_else(|| "n/a".to_string());

        let mut listing = Listing::new(PLATFORM, format!("gig-{}", content_id(&[&title, &seller])));
        listing.description = format!(
            "Market insight based on competitor offering: '{}' by {}. This service is priced at {} with a rating of {}. Consider offering similar services to tap into this market demand.",
            title, seller, price, rating
        );
        listing.title = format!("Market Opportunity: {}", title);
        listing.company = "Fiverr Market Analysis".to_string();
        listing.salary = format!("Competitor price: {}", price);
        listing.job_type = "Market Insight".to_string();
        listing.location = "Remote".to_string();
        listing.is_remote = true;
        listing.url = page_url.to_string();
        listing.date_posted = Some(today);
        listings.push(listing);
    }

    listings
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 20).unwrap()
    }

    #[test]
    fn test_parse_buyer_requests() {
        let body = r#"<div class="js-buyer-requests-table">
          <div class="buyer-request-row">
            <div class="request-from"><a>acme_buyer</a></div>
            <div class="description">I need a Rust developer to port a Python scraper to an async service with retries</div>
            <div class="delivery-time">3 days</div>
            <div class="price">$250</div>
          </div>
          <div class="buyer-request-row"><div class="request-from"><a>empty</a></div></div>
        </div>"#;
        let listings = parse_buyer_requests(body, "https://www.fiverr.com/users/me/requests", today());
        assert_eq!(listings.len(), 1);
        let request = &listings[0];
        assert!(request.id.starts_with("req-"));
        assert_eq!(
            request.title,
            "Buyer Request: I need a Rust developer to port a Python scraper t..."
        );
        assert_eq!(request.company, "Fiverr Buyer: acme_buyer");
        assert_eq!(request.salary, "$250");
        assert!(request.description.ends_with("Delivery: 3 days"));
        assert_eq!(request.date_posted, Some(today()));

        let again = parse_buyer_requests(body, "x", today());
        assert_eq!(again[0].id, request.id);
    }

    #[test]
    fn test_gig_insights_are_capped() {
        let card = |i: usize| {
            format!(
                r#"<div class="gig-card-layout"><h3>I will build your Rust API #{i}</h3><div class="seller-name">seller{i}</div><span class="price">$100</span><span class="gig-rating">4.9</span></div>"#
            )
        };
        let body: String = (0..12).map(card).collect();
        let listings = parse_gig_insights(&body, "https://www.fiverr.com/search/gigs?query=rust", today());
        assert_eq!(listings.len(), MAX_INSIGHTS_PER_KEYWORD);

        let first = &listings[0];
        assert_eq!(first.title, "Market Opportunity: I will build your Rust API #0");
        assert_eq!(first.company, "Fiverr Market Analysis");
        assert_eq!(first.job_type, "Market Insight");
        assert_eq!(first.salary, "Competitor price: $100");
        assert!(first.description.contains("rating of 4.9"));
        assert_ne!(listings[0].id, listings[1].id);
    }

    #[test]
    fn test_truncate_is_char_safe() {
        assert_eq!(truncate_chars("héllo wörld", 5), "héllo...");
        assert_eq!(truncate_chars("short", 50), "short");
    }

    #[tokio::test]
    async fn test_job_details_not_available() {
        let connector = FiverrConnector::new(&PlatformSettings::default()).unwrap();
        assert!(matches!(
            connector.job_details("gig-1").await,
            Err(PlatformError::NotFound { .. })
        ));
    }
}
