use host_exporter::{
    collectors::{disk::Partition, SourceConfig},
    metrics::render::{escape_label_value, render, render_line},
    nvidia::{GpuRecord, ProcessIndex, ProcessRecord},
    ExporterError, Labels, Metric, MetricValue, WebConfig,
};

/// A device row in query order.
fn gpu_row(index: u32, uuid: &str) -> String {
    format!(
        "{index}, {uuid}, 42, 8192, 1024, 7168, 550.54.15, NVIDIA A100-SXM4-40GB, 1564720004631, \
         Disabled, Enabled, 33, 92.00.36.00.02, [N/A], P0, Active, Not Active, Not Active, \
         Not Active, Not Active, Not Active, 41, 57.12, 400.00, 400.00, 1410, 1410, 1215"
    )
}

/// Test the positional GPU record parse end to end
#[test]
fn test_gpu_record_fields() {
    let gpu = GpuRecord::from_line(&gpu_row(3, "GPU-4b1e")).expect("Should parse device row");

    assert_eq!(gpu.index, "3");
    assert_eq!(gpu.uuid, "GPU-4b1e");
    assert_eq!(gpu.name, "NVIDIA A100-SXM4-40GB");
    assert_eq!(gpu.utilization, 42.0);
    assert_eq!(gpu.display_mode, "Enabled");
    assert!(gpu.fan_speed.is_nan(), "[N/A] fan speed should degrade to NaN");
    assert_eq!(gpu.pstate_level(), 0.0);
    assert!(gpu.throttle.gpu_idle);
    assert!(!gpu.throttle.sw_power_cap);
    assert_eq!(gpu.memory_temperature, 41.0);
    assert_eq!(gpu.clocks_memory, 1215.0);
}

/// Test the join against records parsed from tool text
#[test]
fn test_process_join_from_rows() {
    let processes: Vec<ProcessRecord> = [
        "100, trainer, GPU-a, A100, 30000",
        "101, notebook, GPU-a, A100, 512",
        "102, infer, GPU-b, A100, 2048",
    ]
    .iter()
    .map(|line| ProcessRecord::from_line(line).expect("Should parse process row"))
    .collect();

    let index = ProcessIndex::build(&processes);
    let on_a: Vec<u32> = index.processes_on("GPU-a").iter().map(|p| p.pid).collect();
    assert_eq!(on_a, vec![100, 101]);
    assert_eq!(index.processes_on("GPU-b").len(), 1);
    assert!(index.processes_on("GPU-c").is_empty());
}

/// Test label escaping and line layout
#[test]
fn test_render_line_layout() {
    let metric = Metric::new("nvidia_gpu_temperature", 61.0).with_labels(
        &Labels::new()
            .with("id", "0")
            .with("uuid", "abc")
            .with("name", "Quadro \"RTX\" \\ 8000"),
    );

    assert_eq!(
        render_line(&metric),
        "nvidia_gpu_temperature{id=\"0\", uuid=\"abc\", name=\"Quadro \\\"RTX\\\" \\\\ 8000\"} 61"
    );
    assert_eq!(escape_label_value("plain"), "plain");
}

/// Test that sorting happens on whole lines
#[test]
fn test_render_sorts_lines() {
    let metrics = vec![
        Metric::new("screen_count", 0u64),
        Metric::new("disk_free", 5u64).with_label("device", "/dev/sdb1"),
        Metric::new("disk_free", 7u64).with_label("device", "/dev/sda1"),
    ];

    assert_eq!(
        render(&metrics),
        "disk_free{device=\"/dev/sda1\"} 7\ndisk_free{device=\"/dev/sdb1\"} 5\nscreen_count 0\n"
    );
}

/// Test boolean value rendering
#[test]
fn test_flag_values() {
    let on = Metric::new("nvidia_gpu_clocks_throttle_reasons_gpu_idle", true);
    let off = Metric::new("nvidia_gpu_clocks_throttle_reasons_gpu_idle", false);
    assert!(render_line(&on).ends_with(" 1"));
    assert!(render_line(&off).ends_with(" 0"));
    assert_eq!(on.value, MetricValue::Flag(true));
}

/// Test Partition calculations
#[test]
fn test_partition_calculations() {
    let total = 1000 * 1024 * 1024 * 1024_u64; // 1TB
    let used = 300 * 1024 * 1024 * 1024_u64; // 300GB

    let partition = Partition {
        device: "/dev/sda1".to_string(),
        mountpoint: "/".to_string(),
        fstype: "ext4".to_string(),
        total_bytes: total,
        available_bytes: total - used,
    };

    assert_eq!(partition.used_bytes(), used);
    assert!(
        (partition.usage_percent() - 30.0).abs() < 0.001,
        "Usage percent should be approximately 30.0, got {}",
        partition.usage_percent()
    );
}

/// Test ExporterError formatting
#[test]
fn test_exporter_error_types() {
    let not_found = ExporterError::ToolNotFound {
        tool: "nvidia-smi".to_string(),
    };
    assert!(format!("{}", not_found).contains("nvidia-smi"));

    let parse_error = ExporterError::record_parse("expected 28 fields, found 3");
    assert!(format!("{}", parse_error).contains("expected 28 fields"));

    let config_error = ExporterError::config_error("Invalid configuration");
    assert!(format!("{}", config_error).contains("Invalid configuration"));

    let denied = ExporterError::PermissionDenied {
        path: "/sys/class/hwmon/hwmon0/temp1_input".to_string(),
    };
    assert!(format!("{}", denied).contains("permission denied"));
}

/// Test WebConfig builder pattern
#[test]
fn test_web_config() {
    let config = WebConfig::default()
        .with_host("127.0.0.1")
        .with_port(9090)
        .with_metrics_path("/node/metrics");

    assert_eq!(config.host, "127.0.0.1");
    assert_eq!(config.port, 9090);
    assert_eq!(config.metrics_path, "/node/metrics");
    assert_eq!(config.bind_address(), "127.0.0.1:9090");
}

/// Test SourceConfig serialization for config dumps
#[test]
fn test_source_config_json() {
    let config = SourceConfig::default().with_tool_timeout_ms(2500);
    let json = serde_json::to_string(&config).expect("Should serialize");
    let back: SourceConfig = serde_json::from_str(&json).expect("Should deserialize");
    assert_eq!(back, config);
    assert_eq!(back.tool_timeout().as_millis(), 2500);
}
