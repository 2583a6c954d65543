//! Mounted filesystem usage.

use crate::error::Result;
use crate::metrics::{Collector, Labels, Metric};
use async_trait::async_trait;
use sysinfo::Disks;

/// Mount point fragments that mark pseudo or uninteresting filesystems.
pub const JUNK_MOUNT_PATTERNS: &[&str] = &["snap", "docker", "loop", "boot", "var/lib"];

/// Space figures for one mounted filesystem, in bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    pub device: String,
    pub mountpoint: String,
    pub fstype: String,
    pub total_bytes: u64,
    pub available_bytes: u64,
}

impl Partition {
    /// Everything the unprivileged user cannot write to, so blocks reserved
    /// for root (5% on a default ext4) count as used. This reads higher than
    /// `df`'s "Used" column, which is `total - free`.
    pub fn used_bytes(&self) -> u64 {
        self.total_bytes.saturating_sub(self.available_bytes)
    }

    /// `used_bytes` as a share of `total_bytes`; reserved blocks included.
    pub fn usage_percent(&self) -> f64 {
        if self.total_bytes > 0 {
            self.used_bytes() as f64 / self.total_bytes as f64 * 100.0
        } else {
            0.0
        }
    }
}

/// Whether `mountpoint` should be left out of the export.
pub fn is_junk_mount(mountpoint: &str) -> bool {
    JUNK_MOUNT_PATTERNS
        .iter()
        .any(|pattern| mountpoint.contains(pattern))
}

/// Where partitions come from.
pub trait PartitionSource: Send + Sync {
    fn partitions(&self) -> Result<Vec<Partition>>;
}

/// Partitions as listed by `sysinfo`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SysinfoPartitions;

impl PartitionSource for SysinfoPartitions {
    fn partitions(&self) -> Result<Vec<Partition>> {
        let disks = Disks::new_with_refreshed_list();
        Ok(disks
            .iter()
            .map(|disk| Partition {
                device: disk.name().to_string_lossy().to_string(),
                mountpoint: disk.mount_point().to_string_lossy().to_string(),
                fstype: disk.file_system().to_string_lossy().to_string(),
                total_bytes: disk.total_space(),
                available_bytes: disk.available_space(),
            })
            .collect())
    }
}

impl PartitionSource for Vec<Partition> {
    fn partitions(&self) -> Result<Vec<Partition>> {
        Ok(self.clone())
    }
}

/// `disk_usage`, `disk_total`, `disk_used` and `disk_free` per real partition.
pub struct DiskCollector {
    source: Box<dyn PartitionSource>,
}

impl DiskCollector {
    pub fn new() -> Self {
        Self::with_source(SysinfoPartitions)
    }

    pub fn with_source(source: impl PartitionSource + 'static) -> Self {
        Self {
            source: Box::new(source),
        }
    }
}

impl Default for DiskCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Collector for DiskCollector {
    fn name(&self) -> &'static str {
        "disk"
    }

    async fn collect(&self) -> Result<Vec<Metric>> {
        Ok(partition_metrics(&self.source.partitions()?))
    }
}

/// Metrics for every partition that is not junk.
pub fn partition_metrics(partitions: &[Partition]) -> Vec<Metric> {
    partitions
        .iter()
        .filter(|p| !is_junk_mount(&p.mountpoint))
        .flat_map(|p| {
            let labels = Labels::new()
                .with("device", p.device.as_str())
                .with("mountpoint", p.mountpoint.as_str())
                .with("fstype", p.fstype.as_str());
            [
                Metric::new("disk_usage", p.usage_percent()).with_labels(&labels),
                Metric::new("disk_total", p.total_bytes).with_labels(&labels),
                Metric::new("disk_used", p.used_bytes()).with_labels(&labels),
                Metric::new("disk_free", p.available_bytes).with_labels(&labels),
            ]
        })
        .collect()
}
