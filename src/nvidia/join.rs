//! Association of compute processes with the device they run on.

use crate::nvidia::records::ProcessRecord;
use std::collections::HashMap;

/// Processes grouped by the UUID of the device they run on.
///
/// Built in one pass over the process list. Neither record set is modified.
#[derive(Debug, Default)]
pub struct ProcessIndex<'a> {
    by_device: HashMap<&'a str, Vec<&'a ProcessRecord>>,
}

impl<'a> ProcessIndex<'a> {
    pub fn build(processes: &'a [ProcessRecord]) -> Self {
        let mut by_device: HashMap<&'a str, Vec<&'a ProcessRecord>> = HashMap::new();
        for process in processes {
            by_device
                .entry(process.gpu_uuid.as_str())
                .or_default()
                .push(process);
        }
        Self { by_device }
    }

    /// Processes on the device with `uuid`; empty when there are none.
    pub fn processes_on(&self, uuid: &str) -> &[&'a ProcessRecord] {
        self.by_device
            .get(uuid)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Number of distinct device UUIDs seen in the process list.
    pub fn device_count(&self) -> usize {
        self.by_device.len()
    }
}
