//! HTTP client for the YouTube Data API v3.
//!
//! Wraps `reqwest` with API key management, typed response deserialization,
//! and retry on transient failures. Non-2xx bodies are decoded into
//! [`YoutubeError::QuotaExceeded`] or [`YoutubeError::ApiError`].

use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;

use crate::error::YoutubeError;
use crate::retry::retry_with_backoff;
use crate::types::{ErrorEnvelope, ListResponse, SearchResult, Video};

const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/youtube/v3/";
const DEFAULT_MAX_RETRIES: u32 = 2;
const DEFAULT_BACKOFF_BASE_MS: u64 = 500;

/// Largest `maxResults` (and `id` list length) the API accepts per request.
pub const MAX_PAGE_SIZE: usize = 50;

const VIDEO_PARTS: &str = "snippet,statistics,contentDetails";

/// Client for the YouTube Data API.
///
/// Use [`YoutubeClient::new`] for production or [`YoutubeClient::with_base_url`]
/// to point at a mock server in tests.
#[derive(Debug, Clone)]
pub struct YoutubeClient {
    client: Client,
    api_key: String,
    base_url: Url,
    max_retries: u32,
    backoff_base_ms: u64,
}

impl YoutubeClient {
    /// Creates a new client pointed at the production API.
    ///
    /// # Errors
    ///
    /// Returns [`YoutubeError::Configuration`] for an empty API key and
    /// [`YoutubeError::Http`] if the `reqwest::Client` cannot be built.
    pub fn new(api_key: &str, timeout_secs: u64) -> Result<Self, YoutubeError> {
        Self::with_base_url(api_key, timeout_secs, DEFAULT_BASE_URL)
    }

    /// Creates a new client with a custom base URL (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`YoutubeError::Configuration`] for an empty API key or an
    /// invalid `base_url`, and [`YoutubeError::Http`] if the `reqwest::Client`
    /// cannot be built.
    pub fn with_base_url(
        api_key: &str,
        timeout_secs: u64,
        base_url: &str,
    ) -> Result<Self, YoutubeError> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(YoutubeError::Configuration(
                "YouTube API key is empty".to_owned(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("viewtrend/0.1 (view-growth-tracking)")
            .build()?;

        // Exactly one trailing slash so `Url::join` appends the endpoint name
        // instead of replacing the last path segment.
        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised).map_err(|e| {
            YoutubeError::Configuration(format!("invalid base URL '{base_url}': {e}"))
        })?;

        Ok(Self {
            client,
            api_key: api_key.to_owned(),
            base_url,
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_base_ms: DEFAULT_BACKOFF_BASE_MS,
        })
    }

    /// Overrides the retry policy for transient failures.
    #[must_use]
    pub fn with_retry(mut self, max_retries: u32, backoff_base_ms: u64) -> Self {
        self.max_retries = max_retries;
        self.backoff_base_ms = backoff_base_ms;
        self
    }

    /// Fetches the trending chart (`chart=mostPopular`) for one region.
    ///
    /// `max_results` is clamped to `1..=50`.
    ///
    /// # Errors
    ///
    /// - [`YoutubeError::QuotaExceeded`] / [`YoutubeError::ApiError`] for 4xx bodies.
    /// - [`YoutubeError::Http`] on network failure or 5xx after retries.
    /// - [`YoutubeError::Deserialize`] if the body does not match [`Video`].
    pub async fn most_popular(
        &self,
        region: &str,
        max_results: usize,
    ) -> Result<Vec<Video>, YoutubeError> {
        let max = page_size(max_results).to_string();
        let url = self.build_url(
            "videos",
            &[
                ("part", VIDEO_PARTS),
                ("chart", "mostPopular"),
                ("regionCode", region),
                ("maxResults", &max),
            ],
        )?;
        let page: ListResponse<Video> = self
            .request_json(&url, &format!("videos(chart=mostPopular, regionCode={region})"))
            .await?;
        Ok(page.items)
    }

    /// Searches videos by keyword, most-viewed first, returning their ids.
    ///
    /// With `published_after` set, only videos uploaded at or after that
    /// instant are considered.
    ///
    /// # Errors
    ///
    /// Same as [`most_popular`](Self::most_popular).
    pub async fn search_video_ids(
        &self,
        query: &str,
        region: &str,
        language: &str,
        max_results: usize,
        published_after: Option<DateTime<Utc>>,
    ) -> Result<Vec<String>, YoutubeError> {
        let max = page_size(max_results).to_string();
        let after = published_after.map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true));
        let mut params = vec![
            ("part", "snippet"),
            ("type", "video"),
            ("order", "viewCount"),
            ("q", query),
            ("regionCode", region),
            ("relevanceLanguage", language),
            ("maxResults", max.as_str()),
        ];
        if let Some(after) = after.as_deref() {
            params.push(("publishedAfter", after));
        }
        let url = self.build_url("search", &params)?;
        let page: ListResponse<SearchResult> = self
            .request_json(
                &url,
                &format!("search(q={query}, regionCode={region}, relevanceLanguage={language})"),
            )
            .await?;
        Ok(page
            .items
            .into_iter()
            .filter_map(|r| r.id.video_id)
            .collect())
    }

    /// Fetches full video details for `ids`, 50 ids per request.
    ///
    /// Ids the API does not return (deleted, private) are silently absent.
    ///
    /// # Errors
    ///
    /// Same as [`most_popular`](Self::most_popular).
    pub async fn videos_by_id(&self, ids: &[String]) -> Result<Vec<Video>, YoutubeError> {
        let mut videos = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(MAX_PAGE_SIZE) {
            let joined = chunk.join(",");
            let url = self.build_url("videos", &[("part", VIDEO_PARTS), ("id", &joined)])?;
            let page: ListResponse<Video> = self
                .request_json(&url, &format!("videos(id=<{} ids>)", chunk.len()))
                .await?;
            videos.extend(page.items);
        }
        Ok(videos)
    }

    /// Builds `<base>/<endpoint>?key=...&<extra>` with percent-encoded values.
    fn build_url(&self, endpoint: &str, extra: &[(&str, &str)]) -> Result<Url, YoutubeError> {
        let mut url = self.base_url.join(endpoint).map_err(|e| {
            YoutubeError::Configuration(format!("invalid endpoint '{endpoint}': {e}"))
        })?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("key", &self.api_key);
            for (k, v) in extra {
                pairs.append_pair(k, v);
            }
        }
        Ok(url)
    }

    async fn request_json<T: DeserializeOwned>(
        &self,
        url: &Url,
        context: &str,
    ) -> Result<T, YoutubeError> {
        retry_with_backoff(self.max_retries, self.backoff_base_ms, || {
            self.send_once(url, context)
        })
        .await
    }

    /// One GET. Request URLs carry the API key, so it is stripped from
    /// transport errors before they can reach a log line.
    async fn send_once<T: DeserializeOwned>(
        &self,
        url: &Url,
        context: &str,
    ) -> Result<T, YoutubeError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| YoutubeError::Http(e.without_url()))?;

        let status = response.status();
        if status.is_client_error() {
            let body = response
                .text()
                .await
                .map_err(|e| YoutubeError::Http(e.without_url()))?;
            return Err(decode_api_error(status.as_u16(), &body));
        }

        let response = response
            .error_for_status()
            .map_err(|e| YoutubeError::Http(e.without_url()))?;
        let body = response
            .text()
            .await
            .map_err(|e| YoutubeError::Http(e.without_url()))?;
        serde_json::from_str(&body).map_err(|e| YoutubeError::Deserialize {
            context: context.to_owned(),
            source: e,
        })
    }
}

fn page_size(requested: usize) -> usize {
    requested.clamp(1, MAX_PAGE_SIZE)
}

fn decode_api_error(status: u16, body: &str) -> YoutubeError {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => {
            let reason = envelope.error.reason().to_owned();
            if matches!(reason.as_str(), "quotaExceeded" | "dailyLimitExceeded") {
                YoutubeError::QuotaExceeded(envelope.error.message)
            } else {
                YoutubeError::ApiError {
                    status,
                    reason,
                    message: envelope.error.message,
                }
            }
        }
        Err(_) => YoutubeError::ApiError {
            status,
            reason: "unknown".to_owned(),
            message: body.chars().take(200).collect(),
        },
    }
}
