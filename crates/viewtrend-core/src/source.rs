//! The metric-source capability: anything that can produce a batch of item
//! observations for a scope.

use std::future::Future;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ScopeConfig;

/// A single point-in-time reading of an item returned by a metric source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub id: String,
    pub title: String,
    pub channel: String,
    pub thumbnail: Option<String>,
    pub metric: u64,
}

/// Failures a metric source may report.
///
/// Callers treat both variants as "no observations this cycle"; the split
/// exists so operators can tell a flaky upstream from a broken deployment.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SourceError {
    /// Network, HTTP, or remote API failure. Likely to succeed on a later cycle.
    #[error("transient source failure: {0}")]
    Transient(String),

    /// Missing credential or invalid client setup. Will not fix itself.
    #[error("source configuration error: {0}")]
    Configuration(String),
}

impl SourceError {
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, SourceError::Transient(_))
    }
}

/// Produces a bounded, ordered batch of observations for a scope.
///
/// The scope definition carries the regions to poll, the optional search
/// keyword and the candidate limit.
pub trait MetricSource: Send + Sync {
    fn fetch(
        &self,
        scope: &ScopeConfig,
    ) -> impl Future<Output = Result<Vec<Observation>, SourceError>> + Send;
}
