//! Integration tests for the exposition renderer.

use qnap_node_exporter::render::{format_value, write_metric};
use qnap_node_exporter::Metric;

fn render(metric: &Metric) -> String {
    let mut out = Vec::new();
    write_metric(&mut out, "nas01", metric, false).unwrap();
    String::from_utf8(out).unwrap()
}

fn value_of(line: &str) -> f64 {
    line.rsplit(' ').next().unwrap().parse().unwrap()
}

#[test]
fn test_values_parse_back_exactly() {
    for value in [1234.5, 0.1, 1e-7, 123456789012345.0, -3.25, 0.0] {
        let line = render(&Metric::new("x", value));
        assert_eq!(value_of(line.trim_end()), value, "{line}");
    }
}

#[test]
fn test_nan_is_rendered_as_nan_token() {
    let line = render(&Metric::new("node_network_external_roundtrip_time_ms", f64::NAN));
    assert_eq!(line, "node_network_external_roundtrip_time_ms{node=\"nas01\"} NaN\n");
    assert!(value_of(line.trim_end()).is_nan());
}

#[test]
fn test_infinities() {
    assert_eq!(format_value(f64::INFINITY), "+Inf");
    assert_eq!(format_value(f64::NEG_INFINITY), "-Inf");
}

#[test]
fn test_metadata_emitted_per_instance() {
    let eth0 = Metric::counter("node_network_receive_bytes_total", "Total number of bytes received", 1.0)
        .with_label("device", "eth0");
    let eth1 = eth0.clone();

    let mut out = Vec::new();
    write_metric(&mut out, "nas01", &eth0, false).unwrap();
    write_metric(&mut out, "nas01", &eth1, false).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert_eq!(text.matches("# HELP node_network_receive_bytes_total").count(), 2);
}

#[test]
fn test_label_values_escaped() {
    let m = Metric::new("node_volume_free_bytes", 1.0).with_label("volume", "Data \"main\"\\1");
    assert_eq!(
        render(&m),
        "node_volume_free_bytes{node=\"nas01\",volume=\"Data \\\"main\\\"\\\\1\"} 1\n"
    );
}
