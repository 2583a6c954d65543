//! Data structures for exported metrics.

use serde::{Deserialize, Serialize};

/// The value of a single observation.
///
/// Free text never appears in the value position; textual facts are carried as
/// labels on an `_info` metric with value `1`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    /// A gauge reading. `NaN` marks a reading the source could not provide.
    Number(f64),
    /// A boolean state, rendered as `0` / `1`.
    Flag(bool),
}

impl MetricValue {
    /// Numeric view of the value, with flags mapped to `0.0` / `1.0`.
    pub fn as_f64(&self) -> f64 {
        match *self {
            MetricValue::Number(value) => value,
            MetricValue::Flag(true) => 1.0,
            MetricValue::Flag(false) => 0.0,
        }
    }
}

impl From<f64> for MetricValue {
    fn from(value: f64) -> Self {
        MetricValue::Number(value)
    }
}

impl From<f32> for MetricValue {
    fn from(value: f32) -> Self {
        MetricValue::Number(f64::from(value))
    }
}

impl From<u64> for MetricValue {
    fn from(value: u64) -> Self {
        MetricValue::Number(value as f64)
    }
}

impl From<usize> for MetricValue {
    fn from(value: usize) -> Self {
        MetricValue::Number(value as f64)
    }
}

impl From<bool> for MetricValue {
    fn from(value: bool) -> Self {
        MetricValue::Flag(value)
    }
}

/// Ordered label set. Keys are unique; insertion order is kept for rendering.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Labels(Vec<(String, String)>);

impl Labels {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key` to `value`. An existing key keeps its position and takes the
    /// new value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(existing, _)| *existing == key) {
            Some(slot) => slot.1 = value,
            None => self.0.push((key, value)),
        }
    }

    /// Builder form of [`Labels::insert`].
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One observation: name, ordered labels and value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    /// Stable metric identifier, e.g. `nvidia_gpu_utilization`
    pub name: String,
    /// Labels in collector-defined order
    pub labels: Labels,
    /// Observed value
    pub value: MetricValue,
}

impl Metric {
    /// Create an unlabelled metric.
    pub fn new(name: impl Into<String>, value: impl Into<MetricValue>) -> Self {
        Self {
            name: name.into(),
            labels: Labels::new(),
            value: value.into(),
        }
    }

    /// Create an `_info` style metric: value `1`, facts carried as labels.
    pub fn info(name: impl Into<String>, labels: Labels) -> Self {
        Self::new(name, 1.0).with_labels(&labels)
    }

    /// Append a single label.
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key, value);
        self
    }

    /// Append every label of `labels`, in order.
    pub fn with_labels(mut self, labels: &Labels) -> Self {
        for (key, value) in labels.iter() {
            self.labels.insert(key, value);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_keep_insertion_order() {
        let labels = Labels::new().with("id", "0").with("uuid", "abc").with("name", "A100");
        let keys: Vec<&str> = labels.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["id", "uuid", "name"]);
    }

    #[test]
    fn duplicate_label_key_replaces_in_place() {
        let labels = Labels::new().with("a", "1").with("b", "2").with("a", "3");
        assert_eq!(labels.len(), 2);
        assert_eq!(labels.get("a"), Some("3"));
        assert_eq!(labels.iter().next(), Some(("a", "3")));
    }

    #[test]
    fn flag_values_map_to_zero_and_one() {
        assert_eq!(MetricValue::from(true).as_f64(), 1.0);
        assert_eq!(MetricValue::from(false).as_f64(), 0.0);
        assert_eq!(MetricValue::from(42u64).as_f64(), 42.0);
    }

    #[test]
    fn info_metric_has_value_one() {
        let metric = Metric::info("host_info", Labels::new().with("hostname", "box"));
        assert_eq!(metric.value, MetricValue::Number(1.0));
        assert_eq!(metric.labels.get("hostname"), Some("box"));
    }
}
