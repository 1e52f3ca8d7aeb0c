//! Metric value object produced by collectors.
//!
//! A `Metric` is a single sample ready for exposition: name, an optional
//! pre-formatted label fragment, the numeric value and optional metadata.

use chrono::{DateTime, Utc};

/// Prometheus metric kinds emitted by this exporter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricType {
    Counter,
    Gauge,
}

impl MetricType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::Counter => "counter",
            MetricType::Gauge => "gauge",
        }
    }
}

/// A single named numeric sample.
///
/// Two metrics sharing the same `name` within one response must carry the
/// same help text and type. Producers attach metadata only to the first
/// sample of a name; the renderer emits whatever each sample carries.
#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    pub name: String,
    /// Opaque label fragment such as `device="eth0"`, may be empty.
    pub labels: String,
    pub value: f64,
    pub help: Option<String>,
    pub metric_type: Option<MetricType>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl Metric {
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            labels: String::new(),
            value,
            help: None,
            metric_type: None,
            timestamp: None,
        }
    }

    pub fn gauge(name: impl Into<String>, help: impl Into<String>, value: f64) -> Self {
        Self::new(name, value).with_meta(help, MetricType::Gauge)
    }

    pub fn counter(name: impl Into<String>, help: impl Into<String>, value: f64) -> Self {
        Self::new(name, value).with_meta(help, MetricType::Counter)
    }

    pub fn with_meta(mut self, help: impl Into<String>, metric_type: MetricType) -> Self {
        self.help = Some(help.into());
        self.metric_type = Some(metric_type);
        self
    }

    /// Appends a `key="value"` pair to the label fragment.
    pub fn with_label(mut self, key: &str, value: &str) -> Self {
        if !self.labels.is_empty() {
            self.labels.push(',');
        }
        self.labels.push_str(key);
        self.labels.push_str("=\"");
        self.labels.push_str(&escape_label_value(value));
        self.labels.push('"');
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Drops help and type, used for the second and later samples of a name.
    pub fn without_meta(mut self) -> Self {
        self.help = None;
        self.metric_type = None;
        self
    }
}

/// Escapes a label value for the text exposition format.
pub fn escape_label_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            other => out.push(other),
        }
    }
    out
}

/// Keeps help/type on the first sample only.
///
/// Used by producers that loop over devices and emit the same metric name
/// once per instance.
pub fn strip_repeated_meta(metrics: Vec<Metric>) -> Vec<Metric> {
    let mut seen: Vec<String> = Vec::new();
    metrics
        .into_iter()
        .map(|m| {
            if seen.iter().any(|n| *n == m.name) {
                m.without_meta()
            } else {
                seen.push(m.name.clone());
                m
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_label_appends_pairs() {
        let m = Metric::new("node_fan_speed_rpm", 1200.0)
            .with_label("fan", "1")
            .with_label("model", "a\"b");
        assert_eq!(m.labels, r#"fan="1",model="a\"b""#);
    }

    #[test]
    fn test_strip_repeated_meta() {
        let metrics = vec![
            Metric::counter("rx", "Received", 1.0).with_label("device", "eth0"),
            Metric::counter("rx", "Received", 2.0).with_label("device", "eth1"),
            Metric::gauge("up", "Up", 1.0),
        ];
        let out = strip_repeated_meta(metrics);
        assert!(out[0].help.is_some());
        assert!(out[1].help.is_none());
        assert!(out[1].metric_type.is_none());
        assert!(out[2].help.is_some());
    }
}
