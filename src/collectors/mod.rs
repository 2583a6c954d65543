//! Per-domain collectors and their configuration.

pub mod cpu;
pub mod disk;
pub mod gpu;
pub mod host;
pub mod hwmon;
pub mod memory;
pub mod procfs;
pub mod session;

pub use cpu::CpuCollector;
pub use disk::DiskCollector;
pub use gpu::GpuCollector;
pub use host::HostCollector;
pub use memory::MemoryCollector;
pub use session::SessionCollector;

use crate::error::{ExporterError, Result};
use crate::metrics::CollectorRegistry;
use crate::nvidia::{CommandRunner, NvidiaSmi, SystemCommandRunner, DEFAULT_NVIDIA_SMI};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Names accepted by [`SourceConfig::disabled`].
pub const COLLECTOR_NAMES: &[&str] = &["gpu", "disk", "cpu", "memory", "host", "session"];

/// Where collectors read their data from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// GPU query binary
    pub nvidia_smi: String,
    /// Terminal multiplexer binary
    pub screen: String,
    /// Upper bound on one external tool invocation, in milliseconds
    pub tool_timeout_ms: u64,
    /// procfs mount point
    pub proc_path: PathBuf,
    /// sysfs mount point
    pub sys_path: PathBuf,
    /// Distribution identity file
    pub lsb_release_path: PathBuf,
    /// Fallback distribution identity file
    pub os_release_path: PathBuf,
    /// Collectors to skip entirely
    pub disabled: Vec<String>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            nvidia_smi: DEFAULT_NVIDIA_SMI.to_string(),
            screen: session::DEFAULT_SCREEN.to_string(),
            tool_timeout_ms: crate::DEFAULT_TOOL_TIMEOUT_MS,
            proc_path: PathBuf::from("/proc"),
            sys_path: PathBuf::from("/sys"),
            lsb_release_path: PathBuf::from("/etc/lsb-release"),
            os_release_path: PathBuf::from("/etc/os-release"),
            disabled: Vec::new(),
        }
    }
}

impl SourceConfig {
    /// Set the GPU query binary.
    pub fn with_nvidia_smi(mut self, binary: impl Into<String>) -> Self {
        self.nvidia_smi = binary.into();
        self
    }

    /// Set the external tool timeout.
    pub fn with_tool_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.tool_timeout_ms = timeout_ms;
        self
    }

    /// Set the procfs mount point.
    pub fn with_proc_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.proc_path = path.into();
        self
    }

    /// Skip the named collectors.
    pub fn with_disabled<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.disabled = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_millis(self.tool_timeout_ms)
    }

    pub fn is_enabled(&self, collector: &str) -> bool {
        !self.disabled.iter().any(|name| name == collector)
    }

    /// Reject unknown collector names and a zero timeout.
    pub fn validate(&self) -> Result<()> {
        if self.tool_timeout_ms == 0 {
            return Err(ExporterError::config_error("tool timeout must be positive"));
        }
        if let Some(unknown) = self
            .disabled
            .iter()
            .find(|name| !COLLECTOR_NAMES.contains(&name.as_str()))
        {
            return Err(ExporterError::config_error(format!(
                "unknown collector {unknown:?}, expected one of {}",
                COLLECTOR_NAMES.join(", ")
            )));
        }
        Ok(())
    }
}

/// Registry with every enabled collector, spawning real tools.
pub fn default_registry(config: &SourceConfig) -> Result<CollectorRegistry> {
    let runner: Arc<dyn CommandRunner> = Arc::new(SystemCommandRunner::new(config.tool_timeout()));
    registry_with_runner(config, runner)
}

/// Registry with every enabled collector, running external tools through `runner`.
pub fn registry_with_runner(
    config: &SourceConfig,
    runner: Arc<dyn CommandRunner>,
) -> Result<CollectorRegistry> {
    config.validate()?;

    let mut registry = CollectorRegistry::new();
    if config.is_enabled("gpu") {
        registry.register(GpuCollector::new(NvidiaSmi::new(
            config.nvidia_smi.as_str(),
            Arc::clone(&runner),
        )));
    }
    if config.is_enabled("disk") {
        registry.register(DiskCollector::new());
    }
    if config.is_enabled("cpu") {
        registry.register(CpuCollector::new(&config.proc_path, &config.sys_path));
    }
    if config.is_enabled("memory") {
        registry.register(MemoryCollector::new(&config.proc_path));
    }
    if config.is_enabled("host") {
        registry.register(HostCollector::new(
            &config.lsb_release_path,
            &config.os_release_path,
        ));
    }
    if config.is_enabled("session") {
        registry.register(SessionCollector::new(config.screen.as_str(), runner));
    }

    info!(collectors = ?registry.names(), "collector registry ready");
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nvidia::CannedRunner;

    #[test]
    fn default_enables_everything() {
        let registry = registry_with_runner(&SourceConfig::default(), Arc::new(CannedRunner::new())).unwrap();
        assert_eq!(registry.names(), COLLECTOR_NAMES.to_vec());
    }

    #[test]
    fn disabled_collectors_are_skipped() {
        let config = SourceConfig::default().with_disabled(["gpu", "session"]);
        let registry = registry_with_runner(&config, Arc::new(CannedRunner::new())).unwrap();
        assert_eq!(registry.names(), vec!["disk", "cpu", "memory", "host"]);
    }

    #[test]
    fn unknown_collector_name_is_rejected() {
        let config = SourceConfig::default().with_disabled(["gpus"]);
        assert!(matches!(config.validate(), Err(ExporterError::Config(_))));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        assert!(SourceConfig::default().with_tool_timeout_ms(0).validate().is_err());
    }
}
