//! Growth ranking and ingestion orchestration over a [`SnapshotStore`].
//!
//! [`GrowthEngine`] turns stored snapshots into baseline-relative deltas and
//! ranked top-K lists. [`IngestionScheduler`] drives batches from a
//! [`MetricSource`] into the store, one cycle per scope.
//!
//! [`SnapshotStore`]: viewtrend_db::SnapshotStore
//! [`MetricSource`]: viewtrend_core::MetricSource

pub mod error;
pub mod growth;
pub mod ingest;

pub use error::EngineError;
pub use growth::{GrowthEngine, GrowthEntry, LatestEntry};
pub use ingest::{CycleReport, CycleStatus, IngestionScheduler};
