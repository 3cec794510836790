//! YouTube Data API v3 metric source for viewtrend.
//!
//! [`YoutubeClient`] wraps the `videos` and `search` endpoints with typed
//! responses and retry on transient failures. [`YoutubeSource`] implements
//! [`viewtrend_core::MetricSource`] on top of it: trending charts or keyword
//! search per region, an optional shorts filter, and a merged, de-duplicated
//! top-N by view count. [`YoutubeSource::live`] runs the same query without
//! recording it and returns [`LiveVideo`]s with a views-per-day figure.

pub mod client;
pub mod duration;
pub mod error;
pub mod source;
pub mod types;

mod retry;

pub use client::YoutubeClient;
pub use duration::parse_iso8601_duration;
pub use error::YoutubeError;
pub use source::{preferred_languages, views_per_day, LiveVideo, YoutubeSource};
pub use types::Video;
