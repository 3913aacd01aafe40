// src/platforms/http.rs
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_LANGUAGE, COOKIE};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;
use crate::app_log;
use url::Url;

use crate::config::Credentials;
use crate::error::PlatformError;

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Attempts per request, the first one included.
const MAX_ATTEMPTS: usize = 3;

/// HTTP client shared by a connector: browser user agent, optional session
/// cookie, retries with exponential backoff on transient failures.
pub struct HttpFetcher {
    client: Client,
    platform: &'static str,
    page_delay: Duration,
}

impl HttpFetcher {
    pub fn new(platform: &'static str, credentials: &Credentials) -> Result<Self, PlatformError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        if let Some(cookie) = credentials
            .session_cookie
            .as_deref()
            .filter(|c| !c.trim().is_empty())
        {
            let value = HeaderValue::from_str(cookie.trim())
                .map_err(|_| PlatformError::parse(platform, "session_cookie is not a valid header value"))?;
            headers.insert(COOKIE, value);
        }

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|source| PlatformError::Network {
                platform: platform.to_string(),
                source,
            })?;

        Ok(Self {
            client,
            platform,
            page_delay: Duration::from_millis(1500),
        })
    }

    pub fn platform(&self) -> &'static str {
        self.platform
    }

    /// Wait between consecutive pages of the same search.
    pub async fn pause(&self) {
        tokio::time::sleep(self.page_delay).await;
    }

    pub async fn get_text(&self, url: &Url) -> Result<String, PlatformError> {
        let strategy = ExponentialBackoff::from_millis(2)
            .factor(250)
            .max_delay(Duration::from_secs(10))
            .map(jitter)
            .take(MAX_ATTEMPTS - 1);

        RetryIf::spawn(
            strategy,
            || self.fetch_once(url),
            |err: &PlatformError| {
                let retry = err.is_transient();
                if retry {
                    app_log!(warn, "Retrying after transient error: {}", err);
                }
                retry
            },
        )
        .await
    }

    pub async fn get_json<T: DeserializeOwned>(&self, url: &Url) -> Result<T, PlatformError> {
        let body = self.get_text(url).await?;
        serde_json::from_str(&body).map_err(|e| PlatformError::parse(self.platform, e.to_string()))
    }

    async fn fetch_once(&self, url: &Url) -> Result<String, PlatformError> {
        app_log!(debug, "GET {}", url);

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|source| PlatformError::Network {
                platform: self.platform.to_string(),
                source,
            })?;

        let status = response.status();
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(PlatformError::Auth {
                    platform: self.platform.to_string(),
                })
            }
            StatusCode::TOO_MANY_REQUESTS => {
                return Err(PlatformError::RateLimited {
                    platform: self.platform.to_string(),
                })
            }
            s if !s.is_success() => {
                return Err(PlatformError::Http {
                    platform: self.platform.to_string(),
                    status: s.as_u16(),
                    url: url.to_string(),
                })
            }
            _ => {}
        }

        response.text().await.map_err(|source| PlatformError::Network {
            platform: self.platform.to_string(),
            source,
        })
    }
}
