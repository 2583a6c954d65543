//! Typed GPU and compute-process records.

use crate::error::Result;
use crate::nvidia::command::ToolQuery;
use crate::nvidia::csv::{data_lines, CsvRecord};
use tracing::warn;

/// Fields requested from `--query-gpu`, in request order. The parser reads
/// rows through this same list.
pub const GPU_QUERY_FIELDS: &[&str] = &[
    "index",
    "uuid",
    "utilization.gpu",
    "memory.total",
    "memory.used",
    "memory.free",
    "driver_version",
    "name",
    "gpu_serial",
    "display_active",
    "display_mode",
    "temperature.gpu",
    "vbios_version",
    "fan.speed",
    "pstate",
    "clocks_throttle_reasons.gpu_idle",
    "clocks_throttle_reasons.applications_clocks_setting",
    "clocks_throttle_reasons.sw_power_cap",
    "clocks_throttle_reasons.hw_thermal_slowdown",
    "clocks_throttle_reasons.hw_power_brake_slowdown",
    "clocks_throttle_reasons.sw_thermal_slowdown",
    "temperature.memory",
    "power.draw",
    "power.limit",
    "enforced.power.limit",
    "clocks.current.graphics",
    "clocks.current.sm",
    "clocks.current.memory",
];

/// Fields requested from `--query-compute-apps`, in request order.
pub const PROCESS_QUERY_FIELDS: &[&str] = &[
    "pid",
    "process_name",
    "gpu_uuid",
    "gpu_name",
    "used_memory",
];

const CSV_FORMAT: &str = "--format=csv,noheader,nounits";

/// Device query for `binary`.
pub fn gpu_query(binary: &str) -> ToolQuery {
    ToolQuery::new(
        binary,
        [format!("--query-gpu={}", GPU_QUERY_FIELDS.join(",")), CSV_FORMAT.to_string()],
    )
}

/// Compute-process query for `binary`.
pub fn process_query(binary: &str) -> ToolQuery {
    ToolQuery::new(
        binary,
        [
            format!("--query-compute-apps={}", PROCESS_QUERY_FIELDS.join(",")),
            CSV_FORMAT.to_string(),
        ],
    )
}

/// Clock throttle reasons reported as `Active` / `Not Active`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ThrottleReasons {
    pub gpu_idle: bool,
    pub applications_clocks_setting: bool,
    pub sw_power_cap: bool,
    pub hw_thermal_slowdown: bool,
    pub hw_power_brake_slowdown: bool,
    pub sw_thermal_slowdown: bool,
}

impl ThrottleReasons {
    /// Reasons paired with their metric suffix.
    pub fn entries(&self) -> [(&'static str, bool); 6] {
        [
            ("gpu_idle", self.gpu_idle),
            ("applications_clocks_setting", self.applications_clocks_setting),
            ("sw_power_cap", self.sw_power_cap),
            ("hw_thermal_slowdown", self.hw_thermal_slowdown),
            ("hw_power_brake_slowdown", self.hw_power_brake_slowdown),
            ("sw_thermal_slowdown", self.sw_thermal_slowdown),
        ]
    }
}

/// One GPU as reported by the device query. Memory in MiB, power in W,
/// clocks in MHz, temperatures in °C.
#[derive(Debug, Clone, PartialEq)]
pub struct GpuRecord {
    pub index: String,
    pub uuid: String,
    pub utilization: f64,
    pub memory_total: f64,
    pub memory_used: f64,
    pub memory_free: f64,
    pub driver_version: String,
    pub name: String,
    pub serial: String,
    pub display_active: String,
    pub display_mode: String,
    pub temperature: f64,
    pub vbios_version: String,
    pub fan_speed: f64,
    pub pstate: String,
    pub throttle: ThrottleReasons,
    pub memory_temperature: f64,
    pub power_draw: f64,
    pub power_limit: f64,
    pub enforced_power_limit: f64,
    pub clocks_graphics: f64,
    pub clocks_sm: f64,
    pub clocks_memory: f64,
}

impl GpuRecord {
    pub fn from_line(line: &str) -> Result<Self> {
        let row = CsvRecord::parse(line, GPU_QUERY_FIELDS)?;

        Ok(Self {
            index: row.text("index")?.to_string(),
            uuid: row.text("uuid")?.to_string(),
            utilization: row.float("utilization.gpu")?,
            memory_total: row.float("memory.total")?,
            memory_used: row.float("memory.used")?,
            memory_free: row.float("memory.free")?,
            driver_version: row.text("driver_version")?.to_string(),
            name: row.text("name")?.to_string(),
            serial: row.text("gpu_serial")?.to_string(),
            display_active: row.text("display_active")?.to_string(),
            display_mode: row.text("display_mode")?.to_string(),
            temperature: row.float("temperature.gpu")?,
            vbios_version: row.text("vbios_version")?.to_string(),
            fan_speed: row.float("fan.speed")?,
            pstate: row.text("pstate")?.to_string(),
            throttle: ThrottleReasons {
                gpu_idle: row.flag("clocks_throttle_reasons.gpu_idle")?,
                applications_clocks_setting: row
                    .flag("clocks_throttle_reasons.applications_clocks_setting")?,
                sw_power_cap: row.flag("clocks_throttle_reasons.sw_power_cap")?,
                hw_thermal_slowdown: row.flag("clocks_throttle_reasons.hw_thermal_slowdown")?,
                hw_power_brake_slowdown: row
                    .flag("clocks_throttle_reasons.hw_power_brake_slowdown")?,
                sw_thermal_slowdown: row.flag("clocks_throttle_reasons.sw_thermal_slowdown")?,
            },
            memory_temperature: row.float("temperature.memory")?,
            power_draw: row.float("power.draw")?,
            power_limit: row.float("power.limit")?,
            enforced_power_limit: row.float("enforced.power.limit")?,
            clocks_graphics: row.float("clocks.current.graphics")?,
            clocks_sm: row.float("clocks.current.sm")?,
            clocks_memory: row.float("clocks.current.memory")?,
        })
    }

    /// Used memory as a percentage of total; `NaN` when total is unknown or zero.
    pub fn memory_utilization(&self) -> f64 {
        if self.memory_total > 0.0 {
            self.memory_used / self.memory_total * 100.0
        } else {
            f64::NAN
        }
    }

    /// Numeric performance state: `"P2"` → `2`.
    pub fn pstate_level(&self) -> f64 {
        self.pstate
            .strip_prefix('P')
            .and_then(|level| level.parse::<f64>().ok())
            .unwrap_or(f64::NAN)
    }

    /// UUID without the `GPU-` prefix.
    pub fn short_uuid(&self) -> &str {
        self.uuid.strip_prefix("GPU-").unwrap_or(&self.uuid)
    }
}

/// One compute process running on a GPU. Memory in MiB.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessRecord {
    pub pid: u32,
    pub name: String,
    pub gpu_uuid: String,
    pub gpu_name: String,
    pub used_memory: f64,
}

impl ProcessRecord {
    pub fn from_line(line: &str) -> Result<Self> {
        // Process names are free text and may contain the field separator.
        let row = CsvRecord::parse_with_free_field(line, PROCESS_QUERY_FIELDS, "process_name")?;

        Ok(Self {
            pid: row.parsed("pid")?,
            name: row.text("process_name")?.to_string(),
            gpu_uuid: row.text("gpu_uuid")?.to_string(),
            gpu_name: row.text("gpu_name")?.to_string(),
            used_memory: row.float("used_memory")?,
        })
    }
}

/// Parse every non-blank line of `output`, skipping rows that fail.
pub fn parse_rows<T>(output: &str, parse: impl Fn(&str) -> Result<T>) -> Vec<T> {
    data_lines(output)
        .filter_map(|line| match parse(line) {
            Ok(record) => Some(record),
            Err(err) => {
                warn!(error = %err, "skipping malformed row");
                None
            }
        })
        .collect()
}


#[cfg(test)]
mod tests {
    use super::fixtures::gpu_line;
    use super::*;

    #[test]
    fn gpu_query_requests_fields_in_schema_order() {
        let query = gpu_query("nvidia-smi");
        assert_eq!(query.program, "nvidia-smi");
        assert_eq!(query.args[0], format!("--query-gpu={}", GPU_QUERY_FIELDS.join(",")));
        assert!(query.args[0].starts_with("--query-gpu=index,uuid,utilization.gpu,"));
        assert_eq!(query.args[1], "--format=csv,noheader,nounits");
        assert_eq!(GPU_QUERY_FIELDS.len(), 28);
    }

    #[test]
    fn process_query_matches_schema() {
        let query = process_query("/usr/bin/nvidia-smi");
        assert_eq!(
            query.args[0],
            "--query-compute-apps=pid,process_name,gpu_uuid,gpu_name,used_memory"
        );
    }

    #[test]
    fn parses_full_gpu_row() {
        let gpu = GpuRecord::from_line(&gpu_line(0, "GPU-abc", "42", "8192", "1024")).unwrap();

        assert_eq!(gpu.index, "0");
        assert_eq!(gpu.uuid, "GPU-abc");
        assert_eq!(gpu.short_uuid(), "abc");
        assert_eq!(gpu.utilization, 42.0);
        assert_eq!(gpu.memory_total, 8192.0);
        assert_eq!(gpu.memory_used, 1024.0);
        assert_eq!(gpu.memory_free, 7168.0);
        assert_eq!(gpu.driver_version, "535.104.05");
        assert_eq!(gpu.name, "NVIDIA GeForce RTX 3080");
        assert_eq!(gpu.temperature, 54.0);
        assert_eq!(gpu.fan_speed, 30.0);
        assert_eq!(gpu.pstate_level(), 2.0);
        assert_eq!(gpu.memory_utilization(), 12.5);
        assert!(gpu.memory_temperature.is_nan());
        assert_eq!(gpu.power_draw, 112.45);
        assert_eq!(gpu.clocks_memory, 9501.0);
        assert_eq!(
            gpu.throttle,
            ThrottleReasons {
                sw_power_cap: true,
                ..ThrottleReasons::default()
            }
        );
    }

    #[test]
    fn malformed_numeric_field_only_affects_that_field() {
        let gpu = GpuRecord::from_line(&gpu_line(1, "GPU-def", "oops", "8192", "1024")).unwrap();
        assert!(gpu.utilization.is_nan());
        assert_eq!(gpu.memory_total, 8192.0);
    }

    #[test]
    fn zero_total_memory_gives_nan_utilization() {
        let gpu = GpuRecord::from_line(&gpu_line(0, "GPU-abc", "1", "0", "0")).unwrap();
        assert!(gpu.memory_utilization().is_nan());
    }

    #[test]
    fn truncated_gpu_row_fails() {
        assert!(GpuRecord::from_line("0, GPU-abc, 42, 8192").is_err());
    }

    #[test]
    fn parses_process_row() {
        let proc = ProcessRecord::from_line("4242, python3, GPU-abc, NVIDIA A100, 2048").unwrap();
        assert_eq!(proc.pid, 4242);
        assert_eq!(proc.name, "python3");
        assert_eq!(proc.gpu_uuid, "GPU-abc");
        assert_eq!(proc.used_memory, 2048.0);
    }

    #[test]
    fn process_name_with_separator_keeps_device_uuid() {
        let proc =
            ProcessRecord::from_line("99, bash -c sleep 1, echo done, GPU-abc, NVIDIA A100, 512").unwrap();
        assert_eq!(proc.name, "bash -c sleep 1, echo done");
        assert_eq!(proc.gpu_uuid, "GPU-abc");
        assert_eq!(proc.gpu_name, "NVIDIA A100");
        assert_eq!(proc.used_memory, 512.0);
    }

    #[test]
    fn process_row_with_bad_pid_fails() {
        assert!(ProcessRecord::from_line("abc, python3, GPU-abc, A100, 10").is_err());
    }

    #[test]
    fn parse_rows_skips_bad_rows_and_blank_lines() {
        let output = "1, a, GPU-1, A, 1\n\nbroken\n2, b, GPU-2, B, [N/A]\n";
        let rows = parse_rows(output, ProcessRecord::from_line);
        assert_eq!(rows.len(), 2);
        assert!(rows[1].used_memory.is_nan());
    }
}
