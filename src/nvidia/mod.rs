//! `nvidia-smi` integration: tool invocation, row parsing and the
//! device/process join.

pub mod command;
pub mod csv;
pub mod join;
pub mod records;

pub use command::{CannedRunner, CommandRunner, SystemCommandRunner, ToolQuery};
pub use join::ProcessIndex;
pub use records::{GpuRecord, ProcessRecord, ThrottleReasons};

use crate::error::Result;
use std::sync::Arc;

/// Default name of the GPU query binary, resolved through `PATH`.
pub const DEFAULT_NVIDIA_SMI: &str = "nvidia-smi";

/// Typed front end for the two `nvidia-smi` queries.
#[derive(Clone)]
pub struct NvidiaSmi {
    binary: String,
    runner: Arc<dyn CommandRunner>,
}

impl NvidiaSmi {
    pub fn new(binary: impl Into<String>, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            binary: binary.into(),
            runner,
        }
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// Query every visible GPU. Malformed rows are skipped.
    pub async fn gpus(&self) -> Result<Vec<GpuRecord>> {
        let output = self.runner.run(&records::gpu_query(&self.binary)).await?;
        Ok(records::parse_rows(&output, GpuRecord::from_line))
    }

    /// Query every compute process. Malformed rows are skipped.
    pub async fn processes(&self) -> Result<Vec<ProcessRecord>> {
        let output = self.runner.run(&records::process_query(&self.binary)).await?;
        Ok(records::parse_rows(&output, ProcessRecord::from_line))
    }
}
