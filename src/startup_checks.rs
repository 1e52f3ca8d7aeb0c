//! Startup requirement validation for qnap-node-exporter.
//!
//! This module validates that the exporter has the permissions and host
//! facilities its producers rely on before starting.

use nix::unistd::geteuid;
use std::path::Path;
use tracing::{info, warn};

use crate::config::Config;

/// Validate all runtime requirements
pub fn validate_requirements(config: &Config) -> Result<(), ValidationError> {
    info!("🔍 Validating runtime requirements...");

    check_proc_access()?;
    check_ping_privileges(config)?;
    check_tools(config);
    check_directories(config);

    info!("✅ All runtime requirements validated");
    Ok(())
}

/// /proc must be mounted; most producers read from it.
fn check_proc_access() -> Result<(), ValidationError> {
    for file in ["/proc/loadavg", "/proc/meminfo", "/proc/stat"] {
        if !Path::new(file).exists() {
            return Err(ValidationError::ProcUnavailable(file.to_string()));
        }
    }
    info!("✅ /proc is readable");
    Ok(())
}

/// ICMP echo needs root or CAP_NET_RAW.
fn check_ping_privileges(config: &Config) -> Result<(), ValidationError> {
    let Some(target) = config.ping_target.as_deref().filter(|t| !t.is_empty()) else {
        return Ok(());
    };
    if which::which("ping").is_err() {
        return Err(ValidationError::ToolMissing("ping".to_string()));
    }
    if !geteuid().is_root() {
        warn!("⚠️  Not running as root - pinging {} may fail", target);
        warn!("   Recommendation: run as root or grant CAP_NET_RAW to ping");
    } else {
        info!("✅ Running as root (uid=0), ping to {} allowed", target);
    }
    Ok(())
}

/// Optional vendor tools; missing ones only reduce the metric set.
fn check_tools(config: &Config) {
    let mut tools = vec!["getsysinfo", "iostat"];
    if config.enable_speedtest.unwrap_or(false) {
        tools.push("speedtest-cli");
    }
    for tool in tools {
        match which::which(tool) {
            Ok(path) => info!("✅ {} found at {}", tool, path.display()),
            Err(_) => warn!("⚠️  {} not found in PATH - related metrics are skipped", tool),
        }
    }
}

fn check_directories(config: &Config) {
    let dirs = [
        ("device", config.dev_dir.as_deref()),
        ("network", config.net_dir.as_deref()),
    ];
    for (kind, dir) in dirs {
        if let Some(dir) = dir {
            if !dir.is_dir() {
                warn!("⚠️  {} directory {} not found", kind, dir.display());
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("/proc not available: {0} missing")]
    ProcUnavailable(String),

    #[error("Required tool not found in PATH: {0}")]
    ToolMissing(String),
}
