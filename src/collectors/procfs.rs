//! Readers for simple host fact files (`/proc/meminfo`, `/proc/cpuinfo`,
//! `/proc/stat`, `/etc/lsb-release`).
//!
//! Parsers take text so they can be exercised without a real `/proc`.

use crate::error::{ExporterError, Result};
use std::collections::HashMap;
use std::path::Path;

/// Read a host source, classifying failures.
pub async fn read_source(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ExporterError::from_source_io(path, e))
}

/// Parse `KEY=value` lines, stripping surrounding quotes from values.
/// Comments and lines without `=` are ignored.
pub fn parse_key_value(text: &str) -> HashMap<String, String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| {
            let value = value.trim().trim_matches('"').trim_matches('\'');
            (key.trim().to_string(), value.to_string())
        })
        .collect()
}

/// Parse `/proc/meminfo` into bytes. Values with a `kB` unit are scaled;
/// unitless counters (e.g. `HugePages_Total`) are kept as-is.
pub fn parse_meminfo(text: &str) -> HashMap<String, u64> {
    let mut values = HashMap::new();

    for line in text.lines() {
        if let Some((key, value_str)) = line.split_once(':') {
            let mut parts = value_str.split_whitespace();
            if let Some(Ok(value)) = parts.next().map(str::parse::<u64>) {
                let bytes = match parts.next() {
                    Some("kB") => value * 1024,
                    _ => value,
                };
                values.insert(key.trim().to_string(), bytes);
            }
        }
    }

    values
}

/// One logical CPU block from `/proc/cpuinfo`.
pub type CpuInfoBlock = HashMap<String, String>;

/// Split `/proc/cpuinfo` into per-logical-CPU blocks.
pub fn parse_cpuinfo(text: &str) -> Vec<CpuInfoBlock> {
    let mut blocks = Vec::new();
    let mut current = CpuInfoBlock::new();

    for line in text.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                blocks.push(std::mem::take(&mut current));
            }
            continue;
        }
        if let Some((key, value)) = line.split_once(':') {
            current.insert(key.trim().to_string(), value.trim().to_string());
        }
    }
    if !current.is_empty() {
        blocks.push(current);
    }

    // Architectures like aarch64 append a trailer block without a processor id.
    blocks.retain(|block| block.contains_key("processor"));
    blocks
}

/// Per-CPU time counters from `/proc/stat`, converted to seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct CpuTimes {
    pub cpu: usize,
    pub modes: Vec<(&'static str, f64)>,
}

const STAT_MODES: [&str; 10] = [
    "user",
    "nice",
    "system",
    "idle",
    "iowait",
    "irq",
    "softirq",
    "steal",
    "guest",
    "guest_nice",
];

/// Kernel clock ticks per second for `/proc/stat` (USER_HZ).
pub const USER_HZ: f64 = 100.0;

/// Parse the `cpuN` lines of `/proc/stat`; the aggregate `cpu` line is skipped.
pub fn parse_proc_stat(text: &str) -> Vec<CpuTimes> {
    text.lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let cpu = parts.next()?.strip_prefix("cpu")?.parse::<usize>().ok()?;
            let modes = STAT_MODES
                .iter()
                .zip(parts)
                .filter_map(|(mode, ticks)| {
                    ticks.parse::<u64>().ok().map(|t| (*mode, t as f64 / USER_HZ))
                })
                .collect();
            Some(CpuTimes { cpu, modes })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_value_strips_quotes() {
        let text = "DISTRIB_ID=Ubuntu\nDISTRIB_RELEASE=22.04\nDISTRIB_DESCRIPTION=\"Ubuntu 22.04.3 LTS\"\n# comment\n";
        let values = parse_key_value(text);
        assert_eq!(values["DISTRIB_ID"], "Ubuntu");
        assert_eq!(values["DISTRIB_RELEASE"], "22.04");
        assert_eq!(values["DISTRIB_DESCRIPTION"], "Ubuntu 22.04.3 LTS");
        assert_eq!(values.len(), 3);
    }

    #[test]
    fn meminfo_scales_kilobytes() {
        let text = "MemTotal:       16318480 kB\nMemFree:         1024 kB\nHugePages_Total:       4\n";
        let values = parse_meminfo(text);
        assert_eq!(values["MemTotal"], 16318480 * 1024);
        assert_eq!(values["MemFree"], 1024 * 1024);
        assert_eq!(values["HugePages_Total"], 4);
    }

    #[test]
    fn cpuinfo_splits_blocks() {
        let text = "processor\t: 0\nvendor_id\t: GenuineIntel\nphysical id\t: 0\ncore id\t: 0\n\n\
                    processor\t: 1\nvendor_id\t: GenuineIntel\nphysical id\t: 0\ncore id\t: 1\n\n";
        let blocks = parse_cpuinfo(text);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[1]["processor"], "1");
        assert_eq!(blocks[0]["vendor_id"], "GenuineIntel");
    }

    #[test]
    fn cpuinfo_drops_trailer_without_processor() {
        let text = "processor : 0\nBogoMIPS : 108.00\n\nHardware : BCM2835\nModel : Raspberry Pi 5\n";
        let blocks = parse_cpuinfo(text);
        assert_eq!(blocks.len(), 1);
    }

    #[test]
    fn proc_stat_per_cpu_seconds() {
        let text = "cpu  100 0 50 1000 0 0 0 0 0 0\ncpu0 250 10 50 1000 5 0 1 0 0 0\nintr 12345\n";
        let times = parse_proc_stat(text);
        assert_eq!(times.len(), 1);
        assert_eq!(times[0].cpu, 0);
        assert_eq!(times[0].modes[0], ("user", 2.5));
        assert_eq!(times[0].modes[3], ("idle", 10.0));
        assert_eq!(times[0].modes.len(), 10);
    }

    #[tokio::test]
    async fn missing_source_is_unavailable() {
        let err = read_source("/nonexistent/host-exporter/meminfo").await.unwrap_err();
        assert!(matches!(err, ExporterError::SourceUnavailable { .. }));
    }
}
