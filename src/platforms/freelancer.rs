// src/platforms/freelancer.rs
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use crate::app_log;
use url::Url;

use super::http::HttpFetcher;
use super::{JobPlatform, PartialResults, SearchQuery};
use crate::config::PlatformSettings;
use crate::error::PlatformError;
use crate::types::Listing;

const PLATFORM: &str = "freelancer";
const BASE_URL: &str = "https://www.freelancer.com";
const PAGE_LIMIT: u32 = 50;

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    status: String,
    #[serde(default)]
    message: Option<String>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ProjectList {
    #[serde(default)]
    projects: Vec<Project>,
}

#[derive(Debug, Deserialize)]
struct Project {
    id: u64,
    title: String,
    #[serde(default)]
    seo_url: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    preview_description: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    budget: Option<Budget>,
    #[serde(default)]
    currency: Option<Currency>,
    #[serde(default)]
    time_submitted: Option<i64>,
    #[serde(default)]
    jobs: Vec<Skill>,
}

#[derive(Debug, Deserialize)]
struct Budget {
    minimum: Option<f64>,
    maximum: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Currency {
    #[serde(default)]
    sign: String,
    #[serde(default)]
    code: String,
}

#[derive(Debug, Deserialize)]
struct Skill {
    name: String,
}

pub struct FreelancerConnector {
    http: HttpFetcher,
    base: Url,
    post_days: u32,
}

impl FreelancerConnector {
    pub fn new(settings: &PlatformSettings) -> Result<Self, PlatformError> {
        Ok(Self {
            http: HttpFetcher::new(PLATFORM, &settings.credentials)?,
            base: Url::parse(BASE_URL).map_err(|e| PlatformError::parse(PLATFORM, e.to_string()))?,
            post_days: settings.search_criteria.post_days.unwrap_or(14),
        })
    }

    fn search_url(&self, keyword: &str, since: DateTime<Utc>) -> Url {
        let mut url = self.base.clone();
        url.set_path("/api/projects/0.1/projects/active/");
        url.query_pairs_mut()
            .append_pair("query", keyword)
            .append_pair("limit", &PAGE_LIMIT.to_string())
            .append_pair("full_description", "true")
            .append_pair("job_details", "true")
            .append_pair("compact", "true")
            .append_pair("from_time", &since.timestamp().to_string());
        url
    }

    async fn fetch<T: serde::de::DeserializeOwned>(&self, url: &Url) -> Result<T, PlatformError> {
        let response: ApiResponse<T> = self.http.get_json(url).await?;
        unwrap_response(response)
    }
}

fn unwrap_response<T>(response: ApiResponse<T>) -> Result<T, PlatformError> {
    match response.result {
        Some(result) if response.status == "success" => Ok(result),
        _ => Err(PlatformError::parse(
            PLATFORM,
            response
                .message
                .unwrap_or_else(|| format!("API returned status '{}'", response.status)),
        )),
    }
}

#[async_trait]
impl JobPlatform for FreelancerConnector {
    fn name(&self) -> &'static str {
        PLATFORM
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<Listing>, PlatformError> {
        let mut results = PartialResults::new();
        let since = Utc::now() - Duration::days(i64::from(self.post_days));

        for (i, keyword) in query.keywords.iter().enumerate() {
            if i > 0 {
                self.http.pause().await;
            }
            app_log!(info, "Searching Freelancer for '{}'", keyword);
            let url = self.search_url(keyword, since);
            let page = self
                .fetch::<ProjectList>(&url)
                .await
                .map(|list| list.projects.into_iter().map(|p| to_listing(p, &self.base)).collect());
            results.record(page)?;
        }

        results.finish()
    }

    async fn job_details(&self, id: &str) -> Result<Listing, PlatformError> {
        let mut url = self.base.clone();
        url.set_path(&format!("/api/projects/0.1/projects/{}/", id));
        url.query_pairs_mut()
            .append_pair("full_description", "true")
            .append_pair("job_details", "true");
        let project: Project = self.fetch(&url).await.map_err(|e| match e {
            PlatformError::Http { status: 404, .. } => PlatformError::NotFound {
                platform: PLATFORM.to_string(),
                id: id.to_string(),
            },
            other => other,
        })?;
        Ok(to_listing(project, &self.base))
    }
}

fn format_budget(budget: &Budget, currency: Option<&Currency>, hourly: bool) -> String {
    let sign = currency.map(|c| c.sign.as_str()).unwrap_or("$");
    let code = currency
        .map(|c| c.code.as_str())
        .filter(|c| !c.is_empty() && *c != "USD");
    let amount = |v: f64| format!("{}{}", sign, v.round() as u64);
    let mut text = match (budget.minimum, budget.maximum) {
        (Some(min), Some(max)) if max > min => format!("{} - {}", amount(min), amount(max)),
        (Some(min), _) => amount(min),
        (None, Some(max)) => amount(max),
        (None, None) => return String::new(),
    };
    if hourly {
        text.push_str(" an hour");
    }
    if let Some(code) = code {
        text.push(' ');
        text.push_str(code);
    }
    text
}

fn to_listing(project: Project, base: &Url) -> Listing {
    let hourly = project.kind.as_deref() == Some("hourly");
    let mut listing = Listing::new(PLATFORM, project.id.to_string());
    listing.url = match &project.seo_url {
        Some(seo) if !seo.is_empty() => format!("{}projects/{}", base, seo.trim_start_matches('/')),
        _ => format!("{}projects/{}", base, project.id),
    };
    listing.title = project.title;
    listing.company = "Freelancer Client".to_string();
    listing.location = "Remote".to_string();
    listing.is_remote = true;
    listing.description = project
        .description
        .or(project.preview_description)
        .unwrap_or_default();
    listing.salary = project
        .budget
        .as_ref()
        .map(|b| format_budget(b, project.currency.as_ref(), hourly))
        .unwrap_or_default();
    listing.job_type = if hourly { "Hourly" } else { "Fixed-Price" }.to_string();
    listing.date_posted = project
        .time_submitted
        .and_then(|ts| DateTime::from_timestamp(ts, 0))
        .map(|dt| dt.date_naive());
    listing.skills = project.jobs.into_iter().map(|j| j.name).collect();
    listing
}
