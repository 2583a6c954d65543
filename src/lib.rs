//! # host_exporter - Host Telemetry Exporter
//!
//! Gathers point-in-time GPU, disk, CPU, memory, host and terminal-session
//! measurements on every scrape and serves them as exposition text for a
//! pull-based monitoring collector.
//!
//! ## Features
//!
//! - **GPU metrics**: per-device readings and running processes from `nvidia-smi`
//! - **Host metrics**: disks, CPU topology and usage, memory, host identity
//! - **Session metrics**: GNU screen sessions and what runs inside them
//! - **Failure isolation**: a missing tool or unreadable file only removes
//!   that collector's lines; the scrape itself always succeeds
//! - **Deterministic output**: lines are sorted and label values escaped
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use host_exporter::{default_registry, start_web_server, SourceConfig, WebConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = default_registry(&SourceConfig::default())?;
//!
//!     // Serve /metrics on the default port
//!     start_web_server(WebConfig::default(), registry).await?;
//!     Ok(())
//! }
//! ```

pub mod collectors;
pub mod error;
pub mod metrics;
pub mod nvidia;
pub mod web;

// Re-export public API
pub use collectors::{default_registry, registry_with_runner, SourceConfig};
pub use error::{ExporterError, Result};
pub use metrics::{Collector, CollectorRegistry, Labels, Metric, MetricValue, Scrape};
pub use nvidia::{CannedRunner, CommandRunner, SystemCommandRunner, ToolQuery};
pub use web::{create_app, start_web_server, WebConfig};

/// The default web server port
pub const DEFAULT_WEB_PORT: u16 = 8754;

/// The default bound on one external tool invocation in milliseconds
pub const DEFAULT_TOOL_TIMEOUT_MS: u64 = 5_000;
