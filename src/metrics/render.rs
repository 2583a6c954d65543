//! Text exposition of collected metrics.
//!
//! Every metric becomes one line, `name{k1="v1", k2="v2"} value`. Lines from
//! all collectors are sorted as whole strings before joining, so output does
//! not depend on collector order or scheduling.

use crate::metrics::data::{Labels, Metric, MetricValue};

/// Content type served alongside rendered output.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Render a metric sequence into the exposition text.
pub fn render(metrics: &[Metric]) -> String {
    let mut lines: Vec<String> = metrics.iter().map(render_line).collect();
    lines.sort_unstable();

    let mut body = lines.join("\n");
    if !body.is_empty() {
        body.push('\n');
    }
    body
}

/// Render a single metric line without a trailing newline.
pub fn render_line(metric: &Metric) -> String {
    format!(
        "{}{} {}",
        metric.name,
        format_labels(&metric.labels),
        format_value(metric.value)
    )
}

/// Escape special characters in label values.
pub fn escape_label_value(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => result.push_str("\\\\"),
            '"' => result.push_str("\\\""),
            '\n' => result.push_str("\\n"),
            _ => result.push(c),
        }
    }
    result
}

/// Format a value in locale-independent decimal form.
pub fn format_value(value: MetricValue) -> String {
    match value {
        MetricValue::Flag(flag) => if flag { "1" } else { "0" }.to_string(),
        MetricValue::Number(value) => format_number(value),
    }
}

fn format_number(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value.is_sign_positive() {
            "+Inf".to_string()
        } else {
            "-Inf".to_string()
        }
    } else if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        // f64 Display is the shortest round-trip form and never uses an exponent.
        format!("{}", value)
    }
}

fn format_labels(labels: &Labels) -> String {
    if labels.is_empty() {
        return String::new();
    }

    let parts: Vec<String> = labels
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", k, escape_label_value(v)))
        .collect();

    format!("{{{}}}", parts.join(", "))
}
