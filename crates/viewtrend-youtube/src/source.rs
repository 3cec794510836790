//! [`MetricSource`] implementation backed by the YouTube Data API, plus
//! live queries that return videos without recording them.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use futures::{stream, StreamExt, TryStreamExt};
use serde::Serialize;
use viewtrend_core::{AppConfig, MetricSource, Observation, ScopeConfig, SourceError};

use crate::client::{YoutubeClient, MAX_PAGE_SIZE};
use crate::error::YoutubeError;
use crate::types::Video;

/// Videos at or under this length count as shorts.
const SHORTS_MAX_SECS: u64 = 60;

/// Regions of one scope fetched in parallel.
const REGION_CONCURRENCY: usize = 4;

/// Search languages tried per region, most relevant first. At most two are used.
#[must_use]
pub fn preferred_languages(region: &str) -> &'static [&'static str] {
    match region {
        "IN" => &["en", "hi"],
        "PH" => &["en", "tl"],
        "BR" => &["pt"],
        "ID" => &["id"],
        "MX" => &["es"],
        "JP" => &["ja"],
        "DE" => &["de"],
        "VN" => &["vi"],
        "TR" => &["tr"],
        "KR" => &["ko"],
        _ => &["en"],
    }
}

/// A video returned by a live query, annotated with the region it was found in.
#[derive(Debug, Clone, Serialize)]
pub struct LiveVideo {
    pub id: String,
    pub title: String,
    pub channel: String,
    pub thumbnail: Option<String>,
    pub url: String,
    pub region: String,
    pub published_at: Option<DateTime<Utc>>,
    pub duration_secs: Option<u64>,
    pub views: u64,
    pub views_per_day: Option<f64>,
}

impl LiveVideo {
    fn from_video(video: &Video, region: &str, now: DateTime<Utc>) -> Self {
        let published_at = video.published_at();
        let views = video.view_count();
        Self {
            id: video.id.clone(),
            title: video.snippet.title.clone(),
            channel: video.snippet.channel_title.clone(),
            thumbnail: video.thumbnail_url().map(str::to_owned),
            url: video.watch_url(),
            region: region.to_owned(),
            published_at,
            duration_secs: video.duration_secs(),
            views,
            views_per_day: published_at.map(|at| views_per_day(views, at, now)),
        }
    }
}

/// Average daily views since upload, to one decimal place. Videos younger
/// than a day count as one day old.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn views_per_day(views: u64, published_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let days = (now - published_at).num_days().max(1);
    (views as f64 / days as f64 * 10.0).round() / 10.0
}

/// View counts for a scope's regions, via trending charts or keyword search.
#[derive(Debug, Clone)]
pub struct YoutubeSource {
    client: YoutubeClient,
}

impl YoutubeSource {
    #[must_use]
    pub fn new(client: YoutubeClient) -> Self {
        Self { client }
    }

    /// Builds a source from the process configuration.
    ///
    /// # Errors
    ///
    /// Returns [`YoutubeError::Configuration`] when `YOUTUBE_API_KEY` is not
    /// set, or any error from [`YoutubeClient::new`].
    pub fn from_app_config(config: &AppConfig) -> Result<Self, YoutubeError> {
        let api_key = config.youtube_api_key.as_deref().ok_or_else(|| {
            YoutubeError::Configuration("YOUTUBE_API_KEY is not set".to_owned())
        })?;
        let client = YoutubeClient::new(api_key, config.source_timeout_secs)?
            .with_retry(config.source_max_retries, config.source_retry_backoff_ms);
        Ok(Self::new(client))
    }

    /// Runs `scope` against the API without recording anything: the top
    /// `scope.limit` videos across its regions, most-viewed first.
    ///
    /// # Errors
    ///
    /// Returns the first [`YoutubeError`] hit by any region.
    pub async fn live(&self, scope: &ScopeConfig) -> Result<Vec<LiveVideo>, YoutubeError> {
        let now = Utc::now();
        let mut videos: Vec<LiveVideo> = self
            .fetch_videos(scope)
            .await?
            .iter()
            .map(|(region, video)| LiveVideo::from_video(video, region, now))
            .collect();

        videos.sort_by(|a, b| b.views.cmp(&a.views).then_with(|| a.id.cmp(&b.id)));
        let mut seen = HashSet::new();
        videos.retain(|v| seen.insert(v.id.clone()));
        videos.truncate(usize::try_from(scope.limit).unwrap_or(MAX_PAGE_SIZE));
        Ok(videos)
    }

    /// Every region's videos, shorts filter applied, tagged with their region.
    /// Regions are fetched [`REGION_CONCURRENCY`] at a time; the first failure
    /// aborts the rest.
    async fn fetch_videos(
        &self,
        scope: &ScopeConfig,
    ) -> Result<Vec<(String, Video)>, YoutubeError> {
        let limit = usize::try_from(scope.limit).unwrap_or(MAX_PAGE_SIZE);
        let per_region = limit.min(MAX_PAGE_SIZE);
        let published_after = scope
            .published_within_days
            .map(|days| Utc::now() - Duration::days(i64::from(days)));

        let region_fetches: Vec<_> = scope.regions.iter().map(move |region| async move {
                let videos = self
                    .fetch_region(scope, region, per_region, published_after)
                    .await
                    .inspect_err(|e| {
                        tracing::warn!(
                            scope = %scope.name,
                            region = %region,
                            error = %e,
                            "YouTube fetch failed"
                        );
                    })?;
                tracing::debug!(
                    scope = %scope.name,
                    region = %region,
                    fetched = videos.len(),
                    "region fetched"
                );
                Ok::<_, YoutubeError>(
                    videos
                        .into_iter()
                        .filter(|v| passes_shorts_filter(v, scope.shorts))
                        .map(|v| (region.clone(), v))
                        .collect::<Vec<_>>(),
                )
            }).collect();
        let per_region_videos: Vec<Vec<(String, Video)>> = stream::iter(region_fetches)
            .buffered(REGION_CONCURRENCY)
            .try_collect()
            .await?;

        Ok(per_region_videos.into_iter().flatten().collect())
    }

    async fn fetch_region(
        &self,
        scope: &ScopeConfig,
        region: &str,
        per_region: usize,
        published_after: Option<DateTime<Utc>>,
    ) -> Result<Vec<Video>, YoutubeError> {
        match scope.keyword() {
            None => self.client.most_popular(region, per_region).await,
            Some(keyword) => {
                self.search_region(keyword, region, per_region, published_after).await
            }
        }
    }

    /// Keyword search in the region's preferred languages, then one details
    /// lookup for the de-duplicated ids.
    async fn search_region(
        &self,
        keyword: &str,
        region: &str,
        per_region: usize,
        published_after: Option<DateTime<Utc>>,
    ) -> Result<Vec<Video>, YoutubeError> {
        let mut seen = HashSet::new();
        let mut ids = Vec::new();
        for language in preferred_languages(region).iter().take(2) {
            let found = self
                .client
                .search_video_ids(keyword, region, language, per_region, published_after)
                .await?;
            ids.extend(found.into_iter().filter(|id| seen.insert(id.clone())));
            if ids.len() >= per_region {
                break;
            }
        }
        ids.truncate(per_region);

        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.client.videos_by_id(&ids).await
    }
}

impl MetricSource for YoutubeSource {
    async fn fetch(&self, scope: &ScopeConfig) -> Result<Vec<Observation>, SourceError> {
        let limit = usize::try_from(scope.limit).unwrap_or(MAX_PAGE_SIZE);
        let videos = self.fetch_videos(scope).await?;
        let observations = videos.iter().map(|(_, v)| v.to_observation()).collect();
        Ok(merge_by_metric(observations, limit))
    }
}

/// `Some(true)` keeps shorts only, `Some(false)` drops them. Videos with no
/// usable duration are always kept.
fn passes_shorts_filter(video: &Video, shorts: Option<bool>) -> bool {
    match (shorts, video.duration_secs()) {
        (None, _) | (_, None | Some(0)) => true,
        (Some(true), Some(secs)) => secs <= SHORTS_MAX_SECS,
        (Some(false), Some(secs)) => secs > SHORTS_MAX_SECS,
    }
}

/// Highest metric first (ties by id), one entry per id, at most `limit`.
fn merge_by_metric(mut observations: Vec<Observation>, limit: usize) -> Vec<Observation> {
    observations.sort_by(|a, b| b.metric.cmp(&a.metric).then_with(|| a.id.cmp(&b.id)));
    let mut seen = HashSet::new();
    observations.retain(|o| seen.insert(o.id.clone()));
    observations.truncate(limit);
    observations
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(id: &str, metric: u64) -> Observation {
        Observation {
            id: id.to_owned(),
            title: String::new(),
            channel: String::new(),
            thumbnail: None,
            metric,
        }
    }

    fn video_with_duration(duration: Option<&str>) -> Video {
        serde_json::from_value(serde_json::json!({
            "id": "v",
            "contentDetails": { "duration": duration }
        }))
        .unwrap()
    }

    #[test]
    fn merge_dedupes_keeping_highest_and_truncates() {
        let merged = merge_by_metric(
            vec![obs("a", 10), obs("b", 30), obs("a", 50), obs("c", 30), obs("d", 1)],
            3,
        );
        let ids: Vec<(&str, u64)> = merged.iter().map(|o| (o.id.as_str(), o.metric)).collect();
        assert_eq!(ids, vec![("a", 50), ("b", 30), ("c", 30)]);
    }

    #[test]
    fn shorts_filter_splits_at_sixty_seconds() {
        let short = video_with_duration(Some("PT60S"));
        let long = video_with_duration(Some("PT1M1S"));

        assert!(passes_shorts_filter(&short, Some(true)));
        assert!(!passes_shorts_filter(&long, Some(true)));
        assert!(!passes_shorts_filter(&short, Some(false)));
        assert!(passes_shorts_filter(&long, Some(false)));
        assert!(passes_shorts_filter(&short, None));
    }

    #[test]
    fn shorts_filter_keeps_unknown_durations() {
        let unknown = video_with_duration(None);
        let live = video_with_duration(Some("P0D"));
        assert!(passes_shorts_filter(&unknown, Some(true)));
        assert!(passes_shorts_filter(&live, Some(false)));
    }

    #[test]
    fn views_per_day_counts_young_videos_as_one_day() {
        let now = DateTime::parse_from_rfc3339("2026-10-19T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);

        let close = |a: f64, b: f64| (a - b).abs() < 1e-9;

        assert!(close(views_per_day(500, now - Duration::hours(3), now), 500.0));
        assert!(close(views_per_day(1000, now - Duration::days(3), now), 333.3));
        assert!(
            close(views_per_day(10, now + Duration::hours(1), now), 10.0),
            "clock skew must not divide by zero"
        );
    }

    #[test]
    fn preferred_languages_default_to_english() {
        assert_eq!(preferred_languages("KR"), &["ko"]);
        assert_eq!(preferred_languages("IN"), &["en", "hi"]);
        assert_eq!(preferred_languages("FR"), &["en"]);
    }
}
