//! Config command implementation.
//!
//! Generates configuration files in various formats.

use std::fs;
use std::path::PathBuf;

use crate::cli::ConfigFormat;
use crate::config::{render_config, Config};

/// Generates configuration files.
pub fn command_config(
    output: Option<PathBuf>,
    format: ConfigFormat,
    commented: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default();
    let output = output.unwrap_or_else(|| PathBuf::from("qnap-node-exporter.yaml"));

    let mut content = render_config(&config, &format)?;
    if commented && matches!(format, ConfigFormat::Yaml) {
        content = add_config_comments(content);
    }

    if output.to_string_lossy() == "-" {
        print!("{}", content);
    } else {
        fs::write(&output, content)?;
        println!("✅ Configuration written to: {}", output.display());
    }

    Ok(())
}

/// Adds comments to YAML configuration.
fn add_config_comments(yaml: String) -> String {
    let comments = r#"# QNAP Node Exporter Configuration
# ================================
#
# Server Configuration
# --------------------
# bind: "0.0.0.0"              # Bind IP (0.0.0.0 = all interfaces)
# port: 9094                   # HTTP port
#
# Logging
# -------
# log_level: "info"            # off, error, warn, info, debug, trace
#
# Feature Flags
# -------------
# enable_telemetry: true       # Append qnap_exporter_* self metrics to /metrics
# render_timestamps: false     # Append sample timestamps (ping, speedtest)
#
# Discovery
# ---------
# env_ttl_secs: 300            # Re-discover hostname, tools, disks, interfaces
# volume_ttl_secs: 60          # Re-read storage volume sizes
# dev_dir: "/dev"              # Block device directory
# net_dir: "/sys/class/net"    # Network interface directory
# thermal_dir: "/sys/class/thermal"  # Fallback temperature source
# flashcache_stats: "/proc/flashcache/CG0/flashcache_stats"
#
# External Network Quality
# ------------------------
# ping_target: null            # Host for round-trip time (needs root or CAP_NET_RAW)
# enable_speedtest: false      # Hourly bandwidth test with speedtest-cli
# speedtest_server: null       # speedtest.net server id (null = closest)
# speedtest_interval_secs: 3600
#
# UPS (Network UPS Tools)
# -----------------------
# enable_ups: true             # Query upsd for UPS variables
# ups_host: "localhost"
# ups_port: 3493
#
# TLS/SSL Configuration
# ---------------------
# enable_tls: false            # Enable HTTPS (default: false)
# tls_cert_path: null          # Path to TLS certificate (PEM format)
# tls_key_path: null           # Path to TLS private key (PEM format)
"#;

    format!("{comments}\n{yaml}")
}
