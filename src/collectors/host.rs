//! Host identity, boot time and uptime.

use crate::collectors::procfs;
use crate::error::Result;
use crate::metrics::{Collector, Labels, Metric};
use async_trait::async_trait;
use lazy_static::lazy_static;
use std::path::PathBuf;
use sysinfo::System;
use tracing::debug;

const UNKNOWN: &str = "Unknown";

/// Facts that cannot change while the process runs.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticHostFacts {
    /// Kernel name, e.g. `Linux`
    pub os: String,
    /// Kernel release
    pub os_release: String,
    /// Machine hardware name, e.g. `x86_64`
    pub machine: String,
    /// Pointer width, e.g. `64bit`
    pub architecture: String,
}

impl StaticHostFacts {
    fn detect() -> Self {
        let os = match std::env::consts::OS {
            "linux" => "Linux",
            "macos" => "Darwin",
            "windows" => "Windows",
            other => other,
        };
        Self {
            os: os.to_string(),
            os_release: System::kernel_version().unwrap_or_else(|| UNKNOWN.to_string()),
            machine: std::env::consts::ARCH.to_string(),
            architecture: format!("{}bit", usize::BITS),
        }
    }
}

lazy_static! {
    static ref STATIC_FACTS: StaticHostFacts = StaticHostFacts::detect();
}

/// Cached static host facts.
pub fn static_facts() -> &'static StaticHostFacts {
    &STATIC_FACTS
}

/// Distribution name and version.
#[derive(Debug, Clone, PartialEq)]
pub struct Distribution {
    pub name: String,
    pub version: String,
}

impl Default for Distribution {
    fn default() -> Self {
        Self {
            name: UNKNOWN.to_string(),
            version: UNKNOWN.to_string(),
        }
    }
}

impl Distribution {
    /// From `/etc/lsb-release` content.
    pub fn from_lsb_release(text: &str) -> Self {
        Self::from_keys(text, "DISTRIB_ID", "DISTRIB_RELEASE")
    }

    /// From `/etc/os-release` content.
    pub fn from_os_release(text: &str) -> Self {
        Self::from_keys(text, "NAME", "VERSION_ID")
    }

    fn from_keys(text: &str, name_key: &str, version_key: &str) -> Self {
        let mut values = procfs::parse_key_value(text);
        let mut take = |key: &str| values.remove(key).unwrap_or_else(|| UNKNOWN.to_string());
        Self {
            name: take(name_key),
            version: take(version_key),
        }
    }
}

/// `host_info`, `host_boot_time` and `host_uptime`.
pub struct HostCollector {
    lsb_release_path: PathBuf,
    os_release_path: PathBuf,
}

impl HostCollector {
    pub fn new(lsb_release_path: impl Into<PathBuf>, os_release_path: impl Into<PathBuf>) -> Self {
        Self {
            lsb_release_path: lsb_release_path.into(),
            os_release_path: os_release_path.into(),
        }
    }

    /// Distribution from lsb-release, then os-release, else `Unknown`.
    async fn distribution(&self) -> Distribution {
        match procfs::read_source(&self.lsb_release_path).await {
            Ok(text) => return Distribution::from_lsb_release(&text),
            Err(err) => debug!(error = %err, "lsb-release unavailable"),
        }
        match procfs::read_source(&self.os_release_path).await {
            Ok(text) => Distribution::from_os_release(&text),
            Err(err) => {
                debug!(error = %err, "os-release unavailable");
                Distribution::default()
            }
        }
    }
}

#[async_trait]
impl Collector for HostCollector {
    fn name(&self) -> &'static str {
        "host"
    }

    async fn collect(&self) -> Result<Vec<Metric>> {
        let distribution = self.distribution().await;
        let hostname = System::host_name().unwrap_or_else(|| UNKNOWN.to_string());

        Ok(host_metrics(
            static_facts(),
            &distribution,
            &hostname,
            System::boot_time(),
            System::uptime(),
        ))
    }
}

pub fn host_metrics(
    facts: &StaticHostFacts,
    distribution: &Distribution,
    hostname: &str,
    boot_time: u64,
    uptime: u64,
) -> Vec<Metric> {
    vec![
        Metric::info(
            "host_info",
            Labels::new()
                .with("hostname", hostname)
                .with("machine", facts.machine.as_str())
                .with("os", facts.os.as_str())
                .with("os_release", facts.os_release.as_str())
                .with("os_name", distribution.name.as_str())
                .with("os_version", distribution.version.as_str())
                .with("os_architecture", facts.architecture.as_str()),
        ),
        Metric::new("host_boot_time", boot_time),
        Metric::new("host_uptime", uptime),
    ]
}
