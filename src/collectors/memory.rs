//! RAM and swap figures from `/proc/meminfo`.

use crate::collectors::procfs;
use crate::error::{ExporterError, Result};
use crate::metrics::{Collector, Metric};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;

/// RAM and swap in bytes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryInfo {
    pub ram_total: u64,
    pub ram_free: u64,
    pub ram_available: u64,
    pub ram_used: u64,
    pub swap_total: u64,
    pub swap_free: u64,
}

impl MemoryInfo {
    /// Build from parsed meminfo. `MemTotal` is mandatory.
    ///
    /// Used RAM is total minus free, buffers and page cache (including
    /// reclaimable slab), falling back to total minus free when that would go
    /// negative. Without `MemAvailable` (kernels before 3.14) available is
    /// estimated as free plus buffers plus cache.
    pub fn from_meminfo(values: &HashMap<String, u64>) -> Result<Self> {
        let get = |key: &str| values.get(key).copied().unwrap_or(0);

        let ram_total = values
            .get("MemTotal")
            .copied()
            .ok_or_else(|| ExporterError::record_parse("meminfo has no MemTotal"))?;
        let ram_free = get("MemFree");
        let cached = get("Cached") + get("SReclaimable");
        let buffers = get("Buffers");

        let ram_used = ram_total
            .checked_sub(ram_free + buffers + cached)
            .unwrap_or_else(|| ram_total.saturating_sub(ram_free));
        let ram_available = values
            .get("MemAvailable")
            .copied()
            .unwrap_or(ram_free + buffers + cached);

        Ok(Self {
            ram_total,
            ram_free,
            ram_available,
            ram_used,
            swap_total: get("SwapTotal"),
            swap_free: get("SwapFree"),
        })
    }

    pub fn ram_used_percent(&self) -> f64 {
        percent(self.ram_total.saturating_sub(self.ram_available), self.ram_total)
    }

    pub fn swap_used(&self) -> u64 {
        self.swap_total.saturating_sub(self.swap_free)
    }

    pub fn swap_used_percent(&self) -> f64 {
        percent(self.swap_used(), self.swap_total)
    }

    pub fn metrics(&self) -> Vec<Metric> {
        vec![
            Metric::new("memory_ram_total", self.ram_total),
            Metric::new("memory_ram_used", self.ram_used),
            Metric::new("memory_ram_free", self.ram_free),
            Metric::new("memory_ram_available", self.ram_available),
            Metric::new("memory_ram_used_percent", self.ram_used_percent()),
            Metric::new("memory_swap_total", self.swap_total),
            Metric::new("memory_swap_used", self.swap_used()),
            Metric::new("memory_swap_free", self.swap_free),
            Metric::new("memory_swap_used_percent", self.swap_used_percent()),
        ]
    }
}

fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        // One decimal place, as most tools report it.
        (part as f64 / whole as f64 * 1000.0).round() / 10.0
    }
}

pub struct MemoryCollector {
    proc_path: PathBuf,
}

impl MemoryCollector {
    pub fn new(proc_path: impl Into<PathBuf>) -> Self {
        Self {
            proc_path: proc_path.into(),
        }
    }
}

#[async_trait]
impl Collector for MemoryCollector {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn collect(&self) -> Result<Vec<Metric>> {
        let text = procfs::read_source(self.proc_path.join("meminfo")).await?;
        let info = MemoryInfo::from_meminfo(&procfs::parse_meminfo(&text))?;
        Ok(info.metrics())
    }
}
