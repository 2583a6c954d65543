//! NVIDIA GPU metrics from `nvidia-smi`.

use crate::error::Result;
use crate::metrics::render::format_value;
use crate::metrics::{Collector, Labels, Metric, MetricValue};
use crate::nvidia::{GpuRecord, NvidiaSmi, ProcessIndex};
use async_trait::async_trait;
use tracing::debug;

/// Per-device gauges and per-process info metrics.
///
/// The device query and the process query must both succeed; if either fails
/// the collector reports nothing for this scrape.
pub struct GpuCollector {
    smi: NvidiaSmi,
}

impl GpuCollector {
    pub fn new(smi: NvidiaSmi) -> Self {
        Self { smi }
    }
}

#[async_trait]
impl Collector for GpuCollector {
    fn name(&self) -> &'static str {
        "gpu"
    }

    async fn collect(&self) -> Result<Vec<Metric>> {
        let gpus = self.smi.gpus().await?;
        if gpus.is_empty() {
            debug!(binary = self.smi.binary(), "no GPUs reported");
            return Ok(Vec::new());
        }

        let processes = self.smi.processes().await?;
        let index = ProcessIndex::build(&processes);
        debug!(
            gpus = gpus.len(),
            processes = processes.len(),
            devices_with_processes = index.device_count(),
            "joined compute processes"
        );

        Ok(gpus
            .iter()
            .flat_map(|gpu| gpu_metrics(gpu, &index))
            .collect())
    }
}

fn number(value: f64) -> String {
    format_value(MetricValue::Number(value))
}

/// Metrics for one device, joined against the process index.
pub fn gpu_metrics(gpu: &GpuRecord, index: &ProcessIndex<'_>) -> Vec<Metric> {
    let labels = Labels::new()
        .with("id", gpu.index.as_str())
        .with("uuid", gpu.short_uuid())
        .with("name", gpu.name.as_str());
    let gauge = |name: &str, value: MetricValue| {
        Metric::new(format!("nvidia_gpu_{name}"), value).with_labels(&labels)
    };

    let processes = index.processes_on(&gpu.uuid);

    let mut metrics = vec![
        Metric::info(
            "nvidia_gpu_info",
            labels
                .clone()
                .with("driver", gpu.driver_version.as_str())
                .with("vbios_version", gpu.vbios_version.as_str())
                .with("mem_total", number(gpu.memory_total)),
        ),
        gauge("utilization", gpu.utilization.into()),
        gauge("memory_used", gpu.memory_used.into()),
        gauge("memory_free", gpu.memory_free.into()),
        gauge("memory_total", gpu.memory_total.into()),
        gauge("memory_utilization", gpu.memory_utilization().into()),
        gauge("temperature", gpu.temperature.into()),
        gauge("memory_temperature", gpu.memory_temperature.into()),
        gauge("fan_speed", gpu.fan_speed.into()),
        gauge("power_draw", gpu.power_draw.into()),
        gauge("power_limit", gpu.power_limit.into()),
        gauge("enforced_power_limit", gpu.enforced_power_limit.into()),
        gauge("running_processes", processes.len().into()),
        gauge("pstate", gpu.pstate_level().into()),
        gauge("clocks_current_graphics", gpu.clocks_graphics.into()),
        gauge("clocks_current_sm", gpu.clocks_sm.into()),
        gauge("clocks_current_memory", gpu.clocks_memory.into()),
    ];

    for (reason, active) in gpu.throttle.entries() {
        metrics.push(gauge(
            &format!("clocks_throttle_reasons_{reason}"),
            active.into(),
        ));
    }

    for process in processes {
        metrics.push(Metric::info(
            "nvidia_gpu_process_info",
            labels
                .clone()
                .with("pid", process.pid.to_string())
                .with("process_name", process.name.as_str())
                .with("used_memory", number(process.used_memory)),
        ));
    }

    metrics
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::render::render;
    use crate::nvidia::records::{fixtures::gpu_line, gpu_query, process_query};
    use crate::nvidia::CannedRunner;
    use std::sync::Arc;

    fn collector(runner: CannedRunner) -> GpuCollector {
        GpuCollector::new(NvidiaSmi::new("nvidia-smi", Arc::new(runner)))
    }

    fn lines_starting<'a>(body: &'a str, prefix: &str) -> Vec<&'a str> {
        body.lines().filter(|line| line.starts_with(prefix)).collect()
    }

    #[tokio::test]
    async fn one_gpu_one_process() {
        let runner = CannedRunner::new()
            .with_output(gpu_query("nvidia-smi"), gpu_line(0, "GPU-abc", "42", "8192", "1024"))
            .with_output(
                process_query("nvidia-smi"),
                "777, python3, GPU-abc, NVIDIA GeForce RTX 3080, 1000\n",
            );

        let metrics = collector(runner).collect().await.unwrap();
        let body = render(&metrics);

        let util = lines_starting(&body, "nvidia_gpu_utilization{");
        assert_eq!(
            util,
            vec!["nvidia_gpu_utilization{id=\"0\", uuid=\"abc\", name=\"NVIDIA GeForce RTX 3080\"} 42"]
        );
        let running = lines_starting(&body, "nvidia_gpu_running_processes{");
        assert_eq!(running.len(), 1);
        assert!(running[0].ends_with(" 1"));

        let procs = lines_starting(&body, "nvidia_gpu_process_info{");
        assert_eq!(
            procs,
            vec![
                "nvidia_gpu_process_info{id=\"0\", uuid=\"abc\", name=\"NVIDIA GeForce RTX 3080\", \
                 pid=\"777\", process_name=\"python3\", used_memory=\"1000\"} 1"
            ]
        );
        assert_eq!(lines_starting(&body, "nvidia_gpu_memory_utilization{")[0].rsplit(' ').next(), Some("12.5"));
        assert_eq!(lines_starting(&body, "nvidia_gpu_pstate{")[0].rsplit(' ').next(), Some("2"));
    }

    #[tokio::test]
    async fn throttle_reasons_render_as_zero_or_one() {
        let runner = CannedRunner::new()
            .with_output(gpu_query("nvidia-smi"), gpu_line(0, "GPU-abc", "42", "8192", "1024"))
            .with_output(process_query("nvidia-smi"), "");

        let body = render(&collector(runner).collect().await.unwrap());
        let throttle = lines_starting(&body, "nvidia_gpu_clocks_throttle_reasons_");
        assert_eq!(throttle.len(), 6);
        for line in throttle {
            let expected = if line.starts_with("nvidia_gpu_clocks_throttle_reasons_sw_power_cap{") {
                " 1"
            } else {
                " 0"
            };
            assert!(line.ends_with(expected), "{line}");
        }
    }

    #[tokio::test]
    async fn processes_are_attributed_to_their_own_gpu() {
        let gpus = format!(
            "{}\n{}\n",
            gpu_line(0, "GPU-aaa", "10", "8192", "0"),
            gpu_line(1, "GPU-bbb", "20", "8192", "0")
        );
        let runner = CannedRunner::new()
            .with_output(gpu_query("nvidia-smi"), gpus)
            .with_output(
                process_query("nvidia-smi"),
                "1, a, GPU-bbb, X, 1\n2, b, GPU-bbb, X, 1\n",
            );

        let body = render(&collector(runner).collect().await.unwrap());
        let running = lines_starting(&body, "nvidia_gpu_running_processes{");
        assert_eq!(running.len(), 2);
        assert!(running[0].contains("uuid=\"aaa\"") && running[0].ends_with(" 0"));
        assert!(running[1].contains("uuid=\"bbb\"") && running[1].ends_with(" 2"));
    }

    #[tokio::test]
    async fn missing_tool_fails_collector() {
        assert!(collector(CannedRunner::new()).collect().await.is_err());
    }

    #[tokio::test]
    async fn failing_process_query_fails_collector() {
        let runner = CannedRunner::new()
            .with_output(gpu_query("nvidia-smi"), gpu_line(0, "GPU-abc", "42", "8192", "1024"))
            .with_timeout(process_query("nvidia-smi"));
        assert!(collector(runner).collect().await.is_err());
    }

    #[tokio::test]
    async fn no_devices_means_no_metrics() {
        let runner = CannedRunner::new().with_output(gpu_query("nvidia-smi"), "\n");
        assert!(collector(runner).collect().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn quoted_gpu_name_is_escaped() {
        let line = gpu_line(0, "GPU-abc", "1", "1", "1").replace("NVIDIA GeForce RTX 3080", "Evil \"GPU\"");
        let runner = CannedRunner::new()
            .with_output(gpu_query("nvidia-smi"), line)
            .with_output(process_query("nvidia-smi"), "");

        let body = render(&collector(runner).collect().await.unwrap());
        assert!(body.contains("name=\"Evil \\\"GPU\\\"\""));
    }
}
