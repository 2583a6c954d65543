//! CPU topology, utilization, frequency, sensors and process count.

use crate::collectors::hwmon;
use crate::collectors::procfs::{self, CpuInfoBlock, CpuTimes};
use crate::error::Result;
use crate::metrics::render::format_value;
use crate::metrics::{Collector, Labels, Metric, MetricValue};
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::path::PathBuf;
use sysinfo::{System, MINIMUM_CPU_UPDATE_INTERVAL};
use tracing::debug;

/// CPU metrics. Topology from `/proc/cpuinfo` is required; the remaining
/// readings are best effort.
pub struct CpuCollector {
    proc_path: PathBuf,
    sys_path: PathBuf,
}

impl CpuCollector {
    pub fn new(proc_path: impl Into<PathBuf>, sys_path: impl Into<PathBuf>) -> Self {
        Self {
            proc_path: proc_path.into(),
            sys_path: sys_path.into(),
        }
    }

    /// Read a `cpufreq` file of cpu0 in kHz and return Hz.
    async fn read_cpu0_freq_hz(&self, file: &str) -> Option<f64> {
        let path = self.sys_path.join("devices/system/cpu/cpu0/cpufreq").join(file);
        let khz = procfs::read_source(path).await.ok()?.trim().parse::<f64>().ok()?;
        Some(khz * 1000.0)
    }
}

#[async_trait]
impl Collector for CpuCollector {
    fn name(&self) -> &'static str {
        "cpu"
    }

    async fn collect(&self) -> Result<Vec<Metric>> {
        let cpuinfo = procfs::read_source(self.proc_path.join("cpuinfo")).await?;
        let mut metrics = topology_metrics(&procfs::parse_cpuinfo(&cpuinfo));

        match procfs::read_source(self.proc_path.join("stat")).await {
            Ok(stat) => metrics.extend(cpu_times_metrics(&procfs::parse_proc_stat(&stat))),
            Err(err) => debug!(error = %err, "skipping cpu_times"),
        }

        // Usage needs two samples at least MINIMUM_CPU_UPDATE_INTERVAL apart.
        let mut system = System::new_all();
        tokio::time::sleep(MINIMUM_CPU_UPDATE_INTERVAL).await;
        system.refresh_cpu_usage();

        let cpus = system.cpus();
        for (idx, cpu) in cpus.iter().enumerate() {
            metrics.push(
                Metric::new("cpu_utilization", cpu.cpu_usage()).with_label("thread", idx.to_string()),
            );
        }

        if !cpus.is_empty() {
            let mean_mhz = cpus.iter().map(|cpu| cpu.frequency() as f64).sum::<f64>() / cpus.len() as f64;
            let mut frequency = Metric::new("cpu_frequency", mean_mhz * 1_000_000.0);
            if let Some(min) = self.read_cpu0_freq_hz("cpuinfo_min_freq").await {
                frequency = frequency.with_label("min", format_value(MetricValue::Number(min)));
            }
            if let Some(max) = self.read_cpu0_freq_hz("cpuinfo_max_freq").await {
                frequency = frequency.with_label("max", format_value(MetricValue::Number(max)));
            }
            metrics.push(frequency);
        }

        metrics.push(Metric::new("process_count", system.processes().len()));

        match hwmon::read_chips(&self.sys_path).await {
            Ok(chips) => metrics.extend(hwmon::sensor_metrics(&chips)),
            Err(err) => debug!(error = %err, "no hwmon sensors"),
        }

        Ok(metrics)
    }
}

fn field<'a>(block: &'a CpuInfoBlock, key: &str) -> &'a str {
    block.get(key).map(String::as_str).unwrap_or("")
}

fn distinct<'a>(blocks: &[&'a CpuInfoBlock], key: &str) -> BTreeSet<&'a str> {
    blocks.iter().map(|b| field(*b, key)).collect()
}

/// `cpu_info`, `cpu_processor_info` and `cpu_thread_info` from cpuinfo blocks.
pub fn topology_metrics(blocks: &[CpuInfoBlock]) -> Vec<Metric> {
    let all: Vec<&CpuInfoBlock> = blocks.iter().collect();
    let packages = distinct(&all, "physical id");

    let mut metrics = vec![Metric::info(
        "cpu_info",
        Labels::new()
            .with("processors", packages.len().to_string())
            .with("cores", distinct(&all, "core id").len().to_string())
            .with("threads", distinct(&all, "processor").len().to_string()),
    )];

    for package in &packages {
        let threads: Vec<&CpuInfoBlock> = all
            .iter()
            .copied()
            .filter(|b| field(*b, "physical id") == *package)
            .collect();
        let first = threads[0];
        metrics.push(Metric::info(
            "cpu_processor_info",
            Labels::new()
                .with("vendor", field(first, "vendor_id"))
                .with("model", field(first, "model name"))
                .with("processor", *package)
                .with("cores", distinct(&threads, "core id").len().to_string())
                .with("threads", distinct(&threads, "processor").len().to_string()),
        ));
    }

    for block in blocks {
        metrics.push(Metric::info(
            "cpu_thread_info",
            Labels::new()
                .with("vendor", field(block, "vendor_id"))
                .with("model", field(block, "model name"))
                .with("physical_id", field(block, "physical id"))
                .with("core_id", field(block, "core id"))
                .with("processor_id", field(block, "processor"))
                .with("apic_id", field(block, "apicid")),
        ));
    }

    metrics
}

/// `cpu_times{thread, mode}` in seconds.
pub fn cpu_times_metrics(times: &[CpuTimes]) -> Vec<Metric> {
    times
        .iter()
        .flat_map(|cpu| {
            cpu.modes.iter().map(move |(mode, seconds)| {
                Metric::new("cpu_times", *seconds)
                    .with_label("thread", cpu.cpu.to_string())
                    .with_label("mode", *mode)
            })
        })
        .collect()
}
