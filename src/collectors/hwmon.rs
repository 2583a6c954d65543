//! Temperature and fan sensors under `<sys>/class/hwmon`.
//!
//! Each `hwmonN` directory is one chip with a `name` file and numbered
//! `tempK_*` / `fanK_*` attribute files. Temperatures are millidegrees Celsius.

use crate::collectors::procfs;
use crate::error::{ExporterError, Result};
use crate::metrics::{Labels, Metric};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Chips whose temperature inputs describe the CPU package.
pub const CPU_SENSOR_CHIPS: &[&str] = &["coretemp", "k10temp", "cpu_thermal"];

#[derive(Debug, Clone, PartialEq)]
pub struct TemperatureSensor {
    pub label: String,
    pub current: f64,
    pub high: Option<f64>,
    pub critical: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FanSensor {
    pub label: String,
    /// Revolutions per minute
    pub rpm: f64,
}

/// One hwmon chip and the sensors it exposes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HwmonChip {
    pub name: String,
    pub temperatures: Vec<TemperatureSensor>,
    pub fans: Vec<FanSensor>,
}

/// Index `K` of an attribute file named `<kind>K_input`.
fn input_index(file_name: &str, kind: &str) -> Option<u32> {
    file_name
        .strip_prefix(kind)?
        .strip_suffix("_input")?
        .parse::<u32>()
        .ok()
}

async fn read_number(path: PathBuf) -> Option<f64> {
    procfs::read_source(path).await.ok()?.trim().parse::<f64>().ok()
}

/// `<stem>_label` when present and non-empty, otherwise the stem (`temp1`).
async fn read_label(dir: &Path, stem: &str) -> String {
    match procfs::read_source(dir.join(format!("{stem}_label"))).await {
        Ok(label) if !label.trim().is_empty() => label.trim().to_string(),
        _ => stem.to_string(),
    }
}

async fn list_dir(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| ExporterError::from_source_io(dir, e))?;
    let mut paths = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| ExporterError::from_source_io(dir, e))?
    {
        paths.push(entry.path());
    }
    paths.sort();
    Ok(paths)
}

fn indices(files: &[PathBuf], kind: &str) -> Vec<u32> {
    let mut found: Vec<u32> = files
        .iter()
        .filter_map(|path| path.file_name()?.to_str())
        .filter_map(|name| input_index(name, kind))
        .collect();
    found.sort_unstable();
    found
}

async fn read_chip(dir: &Path) -> Result<HwmonChip> {
    let name = procfs::read_source(dir.join("name")).await?.trim().to_string();
    let files = list_dir(dir).await?;
    let mut chip = HwmonChip {
        name,
        ..HwmonChip::default()
    };

    for k in indices(&files, "temp") {
        let stem = format!("temp{k}");
        let Some(current) = read_number(dir.join(format!("{stem}_input"))).await else {
            continue;
        };
        chip.temperatures.push(TemperatureSensor {
            label: read_label(dir, &stem).await,
            current: current / 1000.0,
            high: read_number(dir.join(format!("{stem}_max"))).await.map(|v| v / 1000.0),
            critical: read_number(dir.join(format!("{stem}_crit"))).await.map(|v| v / 1000.0),
        });
    }

    for k in indices(&files, "fan") {
        let stem = format!("fan{k}");
        if let Some(rpm) = read_number(dir.join(format!("{stem}_input"))).await {
            chip.fans.push(FanSensor {
                label: read_label(dir, &stem).await,
                rpm,
            });
        }
    }

    Ok(chip)
}

/// Read every chip under `<sys_path>/class/hwmon`. Chips without a readable
/// `name` are skipped; a missing hwmon class is an error.
pub async fn read_chips(sys_path: &Path) -> Result<Vec<HwmonChip>> {
    let root = sys_path.join("class/hwmon");
    let mut chips = Vec::new();
    for dir in list_dir(&root).await? {
        match read_chip(&dir).await {
            Ok(chip) => chips.push(chip),
            Err(err) => debug!(chip = %dir.display(), error = %err, "skipping hwmon chip"),
        }
    }
    Ok(chips)
}

/// `cpu_temperature*` for CPU package chips and `fan_speed` for every chip.
pub fn sensor_metrics(chips: &[HwmonChip]) -> Vec<Metric> {
    let mut metrics = Vec::new();

    for chip in chips {
        if CPU_SENSOR_CHIPS.contains(&chip.name.as_str()) {
            for sensor in &chip.temperatures {
                let label = sensor.label.as_str();
                metrics.push(Metric::new("cpu_temperature", sensor.current).with_label("label", label));
                if let Some(high) = sensor.high {
                    metrics.push(Metric::new("cpu_temperature_high", high).with_label("label", label));
                }
                if let Some(critical) = sensor.critical {
                    metrics.push(Metric::new("cpu_temperature_critical", critical).with_label("label", label));
                }
            }
        }

        for fan in &chip.fans {
            metrics.push(Metric::new("fan_speed", fan.rpm).with_labels(
                &Labels::new()
                    .with("category", chip.name.as_str())
                    .with("label", fan.label.as_str()),
            ));
        }
    }

    metrics
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::render::render;

    #[test]
    fn input_index_matches_numbered_inputs_only() {
        assert_eq!(input_index("temp1_input", "temp"), Some(1));
        assert_eq!(input_index("fan12_input", "fan"), Some(12));
        assert_eq!(input_index("temp1_max", "temp"), None);
        assert_eq!(input_index("temp_input", "temp"), None);
        assert_eq!(input_index("fan1_input", "temp"), None);
    }

    #[tokio::test]
    async fn reads_chips_from_sysfs() {
        let dir = tempfile::tempdir().unwrap();
        fixtures::write_hwmon(dir.path());

        let chips = read_chips(dir.path()).await.unwrap();
        assert_eq!(chips.len(), 2);

        let coretemp = &chips[0];
        assert_eq!(coretemp.name, "coretemp");
        assert_eq!(
            coretemp.temperatures[0],
            TemperatureSensor {
                label: "Package id 0".to_string(),
                current: 45.0,
                high: Some(80.0),
                critical: Some(100.0),
            }
        );
        assert_eq!(coretemp.temperatures[1].label, "temp2");
        assert_eq!(coretemp.temperatures[1].high, None);

        assert_eq!(chips[1].fans.len(), 2);
        assert_eq!(chips[1].fans[0].label, "CPU Fan");
        assert_eq!(chips[1].fans[1].label, "fan2");
    }

    #[tokio::test]
    async fn renders_temperatures_and_fans() {
        let dir = tempfile::tempdir().unwrap();
        fixtures::write_hwmon(dir.path());

        let body = render(&sensor_metrics(&read_chips(dir.path()).await.unwrap()));
        assert!(body.contains("cpu_temperature{label=\"Package id 0\"} 45\n"));
        assert!(body.contains("cpu_temperature{label=\"temp2\"} 43.5\n"));
        assert!(body.contains("cpu_temperature_high{label=\"Package id 0\"} 80\n"));
        assert!(body.contains("cpu_temperature_critical{label=\"Package id 0\"} 100\n"));
        assert!(!body.contains("cpu_temperature_high{label=\"temp2\"}"));
        assert!(body.contains("fan_speed{category=\"nct6775\", label=\"CPU Fan\"} 1200\n"));
        assert!(body.contains("fan_speed{category=\"nct6775\", label=\"fan2\"} 0\n"));
        // Board temperatures are not CPU temperatures.
        assert!(!body.contains("cpu_temperature{label=\"temp1\"}"));
    }

    #[tokio::test]
    async fn chip_without_name_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let chip = dir.path().join("class/hwmon/hwmon0");
        std::fs::create_dir_all(&chip).unwrap();
        std::fs::write(chip.join("fan1_input"), "900\n").unwrap();

        assert!(read_chips(dir.path()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_hwmon_class_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_chips(dir.path()).await.unwrap_err();
        assert!(matches!(err, ExporterError::SourceUnavailable { .. }));
    }
}
