//! YouTube Data API v3 response types.
//!
//! Only the fields viewtrend reads are modelled. Every list endpoint wraps its
//! results in `{"items": [...]}`; [`ListResponse`] captures that generically.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use viewtrend_core::Observation;

use crate::duration::parse_iso8601_duration;

/// Envelope shared by `videos.list` and `search.list`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

// ---------------------------------------------------------------------------
// videos.list
// ---------------------------------------------------------------------------

/// One entry from `videos.list` with `part=snippet,statistics,contentDetails`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Video {
    pub id: String,
    #[serde(default)]
    pub snippet: Snippet,
    #[serde(default)]
    pub statistics: Statistics,
    #[serde(default)]
    pub content_details: ContentDetails,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snippet {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub channel_title: String,
    #[serde(default)]
    pub published_at: Option<String>,
    #[serde(default)]
    pub thumbnails: Thumbnails,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Thumbnails {
    #[serde(default)]
    pub default: Option<Thumbnail>,
    #[serde(default)]
    pub medium: Option<Thumbnail>,
    #[serde(default)]
    pub high: Option<Thumbnail>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Thumbnail {
    pub url: String,
}

/// Counters arrive as decimal strings; absent counters (hidden stats) are `None`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    #[serde(default)]
    pub view_count: Option<String>,
    #[serde(default)]
    pub like_count: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContentDetails {
    #[serde(default)]
    pub duration: Option<String>,
}

impl Video {
    /// View count, treating a missing or unparseable value as zero.
    #[must_use]
    pub fn view_count(&self) -> u64 {
        self.statistics
            .view_count
            .as_deref()
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0)
    }

    /// Duration in seconds, if the API reported a parseable one.
    #[must_use]
    pub fn duration_secs(&self) -> Option<u64> {
        self.content_details
            .duration
            .as_deref()
            .and_then(parse_iso8601_duration)
    }

    /// Medium thumbnail URL, falling back to the default size.
    #[must_use]
    pub fn thumbnail_url(&self) -> Option<&str> {
        let thumbs = &self.snippet.thumbnails;
        thumbs
            .medium
            .as_ref()
            .or(thumbs.default.as_ref())
            .map(|t| t.url.as_str())
    }

    /// Upload time, if the snippet carried a valid RFC 3339 timestamp.
    #[must_use]
    pub fn published_at(&self) -> Option<DateTime<Utc>> {
        self.snippet
            .published_at
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|t| t.with_timezone(&Utc))
    }

    #[must_use]
    pub fn watch_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.id)
    }

    #[must_use]
    pub fn to_observation(&self) -> Observation {
        Observation {
            id: self.id.clone(),
            title: self.snippet.title.clone(),
            channel: self.snippet.channel_title.clone(),
            thumbnail: self.thumbnail_url().map(str::to_owned),
            metric: self.view_count(),
        }
    }
}

// ---------------------------------------------------------------------------
// search.list
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct SearchResult {
    pub id: SearchResultId,
}

/// `kind` is always `youtube#video` with `type=video`, but the id is still optional.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResultId {
    #[serde(default)]
    pub video_id: Option<String>,
}

// ---------------------------------------------------------------------------
// Error bodies
// ---------------------------------------------------------------------------

/// Body of a non-2xx response: `{"error": {"code": 403, "message": ..., "errors": [...]}}`.
#[derive(Debug, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub code: u16,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub errors: Vec<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
pub struct ErrorDetail {
    #[serde(default)]
    pub reason: String,
}

impl ErrorBody {
    /// The first machine-readable reason, or `"unknown"`.
    #[must_use]
    pub fn reason(&self) -> &str {
        self.errors
            .first()
            .map(|e| e.reason.as_str())
            .filter(|r| !r.is_empty())
            .unwrap_or("unknown")
    }
}
