//! Collector registry and per-scrape aggregation.

use crate::metrics::data::Metric;
use crate::metrics::render;
use crate::metrics::traits::Collector;
use futures_util::future::join_all;
use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// How one collector fared during a scrape.
#[derive(Debug, Clone, PartialEq)]
pub enum CollectorStatus {
    /// The collector finished and contributed `metrics` observations
    Success { metrics: usize },
    /// The collector failed and contributed nothing
    Failed { reason: String },
}

/// Per-collector record of a scrape.
#[derive(Debug, Clone)]
pub struct CollectorOutcome {
    pub name: &'static str,
    pub status: CollectorStatus,
    pub elapsed: Duration,
}

impl CollectorOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self.status, CollectorStatus::Success { .. })
    }
}

/// Result of running every registered collector once.
#[derive(Debug, Clone, Default)]
pub struct Scrape {
    /// Metrics of all successful collectors, in registration order
    pub metrics: Vec<Metric>,
    /// One outcome per registered collector, in registration order
    pub outcomes: Vec<CollectorOutcome>,
}

impl Scrape {
    /// Render the merged metrics as exposition text.
    pub fn render(&self) -> String {
        render::render(&self.metrics)
    }

    /// Outcomes of collectors that failed during this scrape.
    pub fn failures(&self) -> impl Iterator<Item = &CollectorOutcome> {
        self.outcomes.iter().filter(|outcome| !outcome.is_success())
    }
}

/// Set of collectors run on every scrape.
#[derive(Clone, Default)]
pub struct CollectorRegistry {
    collectors: Vec<Arc<dyn Collector>>,
}

impl CollectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a collector, builder style.
    pub fn with_collector(mut self, collector: impl Collector + 'static) -> Self {
        self.register(collector);
        self
    }

    /// Add a collector.
    pub fn register(&mut self, collector: impl Collector + 'static) {
        self.collectors.push(Arc::new(collector));
    }

    pub fn len(&self) -> usize {
        self.collectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collectors.is_empty()
    }

    /// Names of registered collectors, in registration order.
    pub fn names(&self) -> Vec<&'static str> {
        self.collectors.iter().map(|c| c.name()).collect()
    }

    /// Run every collector once and merge the results.
    ///
    /// Collectors run concurrently on the calling task, so dropping the
    /// returned future cancels all of them. A collector that errors or panics
    /// contributes no metrics; the remaining collectors are unaffected.
    pub async fn scrape(&self) -> Scrape {
        let runs = self.collectors.iter().map(|collector| async move {
            let started = Instant::now();
            let result = AssertUnwindSafe(collector.collect()).catch_unwind().await;
            (collector.name(), result, started.elapsed())
        });

        let mut scrape = Scrape::default();
        for (name, result, elapsed) in join_all(runs).await {
            let status = match result {
                Ok(Ok(metrics)) => {
                    debug!(collector = name, metrics = metrics.len(), ?elapsed, "collector finished");
                    let count = metrics.len();
                    scrape.metrics.extend(metrics);
                    CollectorStatus::Success { metrics: count }
                }
                Ok(Err(err)) => {
                    warn!(collector = name, error = %err, "collector failed, omitting its metrics");
                    CollectorStatus::Failed {
                        reason: err.to_string(),
                    }
                }
                Err(_) => {
                    warn!(collector = name, "collector panicked, omitting its metrics");
                    CollectorStatus::Failed {
                        reason: "collector panicked".to_string(),
                    }
                }
            };
            scrape.outcomes.push(CollectorOutcome {
                name,
                status,
                elapsed,
            });
        }

        scrape
    }
}
