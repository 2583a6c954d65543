//! Metric model, rendering and collector aggregation.
//!
//! Collectors produce [`Metric`] values; the [`CollectorRegistry`] runs them
//! with per-collector failure isolation and the [`render`] module turns the
//! merged set into exposition text.

pub mod data;
pub mod registry;
pub mod render;
pub mod traits;

// Re-export commonly used items
pub use data::{Labels, Metric, MetricValue};
pub use registry::{CollectorOutcome, CollectorRegistry, CollectorStatus, Scrape};
pub use traits::Collector;
