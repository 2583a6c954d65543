//! Traits for metric collection.

use crate::error::Result;
use crate::metrics::data::Metric;
use async_trait::async_trait;

/// A source of metrics for one telemetry domain.
///
/// Implementations must be independent of each other: a collector never reads
/// another collector's output and never shares mutable state with it. A
/// collector either returns every metric it produced or an error; the
/// registry turns an error into "no metrics from this collector".
#[async_trait]
pub trait Collector: Send + Sync {
    /// Short, stable identifier used in logs (e.g. `"gpu"`).
    fn name(&self) -> &'static str;

    /// Take a fresh measurement.
    async fn collect(&self) -> Result<Vec<Metric>>;
}
