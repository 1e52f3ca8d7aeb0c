//! Text exposition rendering.
//!
//! Each metric becomes optional `# HELP` / `# TYPE` lines followed by
//! `name{node="<host>"[,labels]} value`. Metadata is written for every
//! metric that carries it; there is no de-duplication across samples.

use std::io::{self, Write};

use crate::error::ProducerError;
use crate::metric::{escape_label_value, Metric};

/// Formats a sample value. Finite values use the shortest representation
/// that parses back to the same `f64`.
pub fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value.is_sign_positive() {
            "+Inf".to_string()
        } else {
            "-Inf".to_string()
        }
    } else {
        format!("{value}")
    }
}

/// Series identifier including the `node` label.
pub fn full_name(hostname: &str, metric: &Metric) -> String {
    let node = escape_label_value(hostname);
    if metric.labels.is_empty() {
        format!("{}{{node=\"{}\"}}", metric.name, node)
    } else {
        format!("{}{{node=\"{}\",{}}}", metric.name, node, metric.labels)
    }
}

pub fn write_metric<W: Write + ?Sized>(
    sink: &mut W,
    hostname: &str,
    metric: &Metric,
    with_timestamp: bool,
) -> io::Result<()> {
    if let Some(help) = metric.help.as_deref().filter(|h| !h.is_empty()) {
        writeln!(sink, "# HELP {} {}", metric.name, help)?;
    }
    if let Some(metric_type) = metric.metric_type {
        writeln!(sink, "# TYPE {} {}", metric.name, metric_type.as_str())?;
    }

    let series = full_name(hostname, metric);
    match metric.timestamp.filter(|_| with_timestamp) {
        Some(ts) => writeln!(
            sink,
            "{} {} {}",
            series,
            format_value(metric.value),
            ts.timestamp_millis()
        ),
        None => writeln!(sink, "{} {}", series, format_value(metric.value)),
    }
}

/// Writes the diagnostic comment for a failed producer.
pub fn write_failure<W: Write + ?Sized>(sink: &mut W, error: &ProducerError) -> io::Result<()> {
    writeln!(sink, "## {error}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn render(metric: &Metric, with_timestamp: bool) -> String {
        let mut out = Vec::new();
        write_metric(&mut out, "nas", metric, with_timestamp).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_format_value_tokens() {
        assert_eq!(format_value(f64::NAN), "NaN");
        assert_eq!(format_value(f64::INFINITY), "+Inf");
        assert_eq!(format_value(f64::NEG_INFINITY), "-Inf");
        assert_eq!(format_value(1234.5), "1234.5");
        assert_eq!(format_value(0.1), "0.1");
        assert_eq!(format_value(3.0), "3");
    }

    #[test]
    fn test_metadata_precedes_value() {
        let m = Metric::counter("node_network_receive_bytes_total", "Total number of bytes received", 42.0)
            .with_label("device", "eth0");
        assert_eq!(
            render(&m, false),
            "# HELP node_network_receive_bytes_total Total number of bytes received\n\
             # TYPE node_network_receive_bytes_total counter\n\
             node_network_receive_bytes_total{node=\"nas\",device=\"eth0\"} 42\n"
        );
    }

    #[test]
    fn test_no_metadata_without_help_or_type() {
        let m = Metric::new("node_load1", 0.5);
        assert_eq!(render(&m, false), "node_load1{node=\"nas\"} 0.5\n");
    }

    #[test]
    fn test_timestamp_only_when_enabled() {
        let ts = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        let m = Metric::new("x", 1.0).with_timestamp(ts);
        assert_eq!(render(&m, false), "x{node=\"nas\"} 1\n");
        assert_eq!(render(&m, true), "x{node=\"nas\"} 1 1700000000123\n");
    }

    #[test]
    fn test_hostname_is_escaped() {
        let m = Metric::new("x", 1.0);
        assert_eq!(full_name("a\"b", &m), "x{node=\"a\\\"b\"}");
    }
}
