//! Configuration management for qnap-node-exporter.
//!
//! This module handles loading, merging, and validating configuration from files
//! and CLI arguments. It supports YAML, JSON, and TOML formats.

use crate::cli::{Args, ConfigFormat, LogLevel};
use qnap_node_exporter::collector::{ExporterOptions, SpeedtestOptions, UpsOptions};
use qnap_node_exporter::collectors::flashcache::DEFAULT_FLASHCACHE_STATS;
use qnap_node_exporter::collectors::thermal::DEFAULT_THERMAL_DIR;
use qnap_node_exporter::environment::{EnvironmentSettings, DEFAULT_DEV_DIR, DEFAULT_NET_DIR};
use qnap_node_exporter::ups::DEFAULT_NUT_PORT as DEFAULT_UPS_PORT;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

// Default configuration constants
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 9094;
pub const DEFAULT_ENV_TTL_SECS: u64 = 300;
pub const DEFAULT_VOLUME_TTL_SECS: u64 = 60;
pub const DEFAULT_SPEEDTEST_INTERVAL_SECS: u64 = 3600;
pub const DEFAULT_UPS_HOST: &str = "localhost";

/// Exporter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Server configuration
    pub port: Option<u16>,
    pub bind: Option<String>,

    // Logging
    pub log_level: Option<String>,

    // Feature flags
    pub enable_telemetry: Option<bool>,
    #[serde(alias = "render-timestamps")]
    pub render_timestamps: Option<bool>,

    // Discovery
    #[serde(alias = "env-ttl-secs")]
    pub env_ttl_secs: Option<u64>,
    #[serde(alias = "volume-ttl-secs")]
    pub volume_ttl_secs: Option<u64>,
    #[serde(alias = "dev-dir")]
    pub dev_dir: Option<PathBuf>,
    #[serde(alias = "net-dir")]
    pub net_dir: Option<PathBuf>,
    #[serde(alias = "thermal-dir")]
    pub thermal_dir: Option<PathBuf>,
    #[serde(alias = "flashcache-stats")]
    pub flashcache_stats: Option<PathBuf>,

    // External network quality
    #[serde(alias = "ping-target")]
    pub ping_target: Option<String>,
    #[serde(alias = "enable-speedtest")]
    pub enable_speedtest: Option<bool>,
    #[serde(alias = "speedtest-server")]
    pub speedtest_server: Option<u32>,
    #[serde(alias = "speedtest-interval-secs")]
    pub speedtest_interval_secs: Option<u64>,

    // UPS (Network UPS Tools)
    #[serde(alias = "enable-ups")]
    pub enable_ups: Option<bool>,
    #[serde(alias = "ups-host")]
    pub ups_host: Option<String>,
    #[serde(alias = "ups-port")]
    pub ups_port: Option<u16>,

    // TLS/SSL Configuration
    #[serde(alias = "enable-tls")]
    pub enable_tls: Option<bool>,
    #[serde(alias = "tls-cert-path")]
    pub tls_cert_path: Option<String>,
    #[serde(alias = "tls-key-path")]
    pub tls_key_path: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: Some(DEFAULT_BIND_ADDR.to_string()),
            port: Some(DEFAULT_PORT),
            log_level: Some("info".into()),
            enable_telemetry: Some(true),
            render_timestamps: Some(false),
            env_ttl_secs: Some(DEFAULT_ENV_TTL_SECS),
            volume_ttl_secs: Some(DEFAULT_VOLUME_TTL_SECS),
            dev_dir: Some(PathBuf::from(DEFAULT_DEV_DIR)),
            net_dir: Some(PathBuf::from(DEFAULT_NET_DIR)),
            thermal_dir: Some(PathBuf::from(DEFAULT_THERMAL_DIR)),
            flashcache_stats: Some(PathBuf::from(DEFAULT_FLASHCACHE_STATS)),
            ping_target: None,
            enable_speedtest: Some(false),
            speedtest_server: None,
            speedtest_interval_secs: Some(DEFAULT_SPEEDTEST_INTERVAL_SECS),
            enable_ups: Some(true),
            ups_host: Some(DEFAULT_UPS_HOST.to_string()),
            ups_port: Some(DEFAULT_UPS_PORT),
            enable_tls: Some(false),
            tls_cert_path: None,
            tls_key_path: None,
        }
    }
}

impl Config {
    /// Log level from the config file, `info` when unset or unknown.
    pub fn effective_log_level(&self) -> LogLevel {
        self.log_level
            .as_deref()
            .and_then(LogLevel::from_name)
            .unwrap_or_default()
    }

    /// Engine options derived from the effective configuration.
    pub fn exporter_options(&self) -> ExporterOptions {
        let environment = EnvironmentSettings {
            ttl: Duration::from_secs(self.env_ttl_secs.unwrap_or(DEFAULT_ENV_TTL_SECS)),
            dev_dir: self
                .dev_dir
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DEV_DIR)),
            net_dir: self
                .net_dir
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_NET_DIR)),
        };

        let ups = self.enable_ups.unwrap_or(true).then(|| UpsOptions {
            host: self
                .ups_host
                .clone()
                .unwrap_or_else(|| DEFAULT_UPS_HOST.to_string()),
            port: self.ups_port.unwrap_or(DEFAULT_UPS_PORT),
        });

        let speedtest = self.enable_speedtest.unwrap_or(false).then(|| SpeedtestOptions {
            server_id: self.speedtest_server,
            ttl: Duration::from_secs(
                self.speedtest_interval_secs
                    .unwrap_or(DEFAULT_SPEEDTEST_INTERVAL_SECS),
            ),
        });

        ExporterOptions {
            environment,
            volume_ttl: Duration::from_secs(self.volume_ttl_secs.unwrap_or(DEFAULT_VOLUME_TTL_SECS)),
            thermal_dir: self
                .thermal_dir
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_THERMAL_DIR)),
            flashcache_stats: self
                .flashcache_stats
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_FLASHCACHE_STATS)),
            ping_target: self.ping_target.clone().filter(|t| !t.trim().is_empty()),
            ups,
            speedtest,
            render_timestamps: self.render_timestamps.unwrap_or(false),
        }
    }
}

/// Validate effective config (used by --check-config and at startup)
pub fn validate_effective_config(cfg: &Config) -> Result<(), Box<dyn std::error::Error>> {
    for (name, value) in [
        ("env_ttl_secs", cfg.env_ttl_secs),
        ("volume_ttl_secs", cfg.volume_ttl_secs),
        ("speedtest_interval_secs", cfg.speedtest_interval_secs),
    ] {
        if value == Some(0) {
            return Err(format!("{} must be greater than 0", name).into());
        }
    }

    if let Some(level) = cfg.log_level.as_deref() {
        if LogLevel::from_name(level).is_none() {
            return Err(format!(
                "Invalid log_level '{}' (expected off, error, warn, info, debug or trace)",
                level
            )
            .into());
        }
    }

    if let Some(bind) = cfg.bind.as_deref() {
        if bind.parse::<std::net::IpAddr>().is_err() {
            return Err(format!("Invalid bind address '{}'", bind).into());
        }
    }

    if cfg.enable_ups.unwrap_or(true) && cfg.ups_host.as_deref().is_some_and(str::is_empty) {
        return Err("enable_ups is set but ups_host is empty".into());
    }

    if cfg.speedtest_server.is_some() && !cfg.enable_speedtest.unwrap_or(false) {
        return Err("speedtest_server is set but enable_speedtest is false".into());
    }

    // TLS validation
    if cfg.enable_tls.unwrap_or(false) {
        let cert_path = cfg.tls_cert_path.as_deref();
        let key_path = cfg.tls_key_path.as_deref();

        match (cert_path, key_path) {
            (None, None) => {
                return Err(
                    "TLS is enabled but neither tls_cert_path nor tls_key_path are set".into(),
                );
            }
            (Some(_), None) => {
                return Err("TLS is enabled but tls_key_path is not set".into());
            }
            (None, Some(_)) => {
                return Err("TLS is enabled but tls_cert_path is not set".into());
            }
            (Some(cert), Some(key)) => {
                check_pem_file("certificate", cert)?;
                check_pem_file("private key", key)?;
            }
        }
    }

    Ok(())
}

fn check_pem_file(kind: &str, path: &str) -> Result<(), Box<dyn std::error::Error>> {
    match fs::metadata(path) {
        Ok(meta) if meta.len() == 0 => Err(format!("TLS {} file is empty: {}", kind, path).into()),
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(format!("TLS {} file not found: {}", kind, path).into())
        }
        Err(e) => Err(format!("TLS {} file is not readable: {} ({})", kind, path, e).into()),
    }
}

/// Resolves configuration from CLI args, config file, and defaults.
/// This enforces precedence: CLI (if provided) > config file > default.
pub fn resolve_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = if args.no_config {
        Config::default()
    } else {
        load_config(args.config.as_deref())?
    };

    if let Some(bind_ip) = args.bind {
        config.bind = Some(bind_ip.to_string());
    }
    if let Some(cli_port) = args.port {
        config.port = Some(cli_port);
    }
    if let Some(level) = args.log_level {
        config.log_level = Some(level.name());
    }

    if let Some(target) = &args.ping_target {
        config.ping_target = Some(target.clone());
    }
    if args.enable_speedtest {
        config.enable_speedtest = Some(true);
    }
    if let Some(server) = args.speedtest_server {
        config.speedtest_server = Some(server);
    }
    if let Some(host) = &args.ups_host {
        config.ups_host = Some(host.clone());
    }
    if args.disable_ups {
        config.enable_ups = Some(false);
    }
    if args.disable_telemetry {
        config.enable_telemetry = Some(false);
    }
    if args.render_timestamps {
        config.render_timestamps = Some(true);
    }

    // TLS configuration: CLI wins if provided
    if args.enable_tls {
        config.enable_tls = Some(true);
    }
    if let Some(cert_path) = &args.tls_cert {
        config.tls_cert_path = Some(cert_path.to_string_lossy().to_string());
    }
    if let Some(key_path) = &args.tls_key {
        config.tls_key_path = Some(key_path.to_string_lossy().to_string());
    }

    Ok(config)
}

/// Loads a config file, or the first existing default location when no path
/// is given. Missing files yield the defaults.
pub fn load_config(path: Option<&Path>) -> Result<Config, Box<dyn std::error::Error>> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => {
            let defaults = [
                "/etc/qnap-exporter/node-exporter.yaml",
                "/etc/qnap-exporter/node-exporter.yml",
                "/etc/qnap-exporter/node-exporter.json",
                "/etc/qnap-exporter/node-exporter.toml",
                "./qnap-node-exporter.yaml",
                "./qnap-node-exporter.yml",
                "./qnap-node-exporter.json",
                "./qnap-node-exporter.toml",
            ];
            match defaults.iter().find(|p| Path::new(p).exists()) {
                Some(p) => PathBuf::from(p),
                None => return Ok(Config::default()),
            }
        }
    };

    if !path.exists() {
        return Ok(Config::default());
    }

    let content = fs::read_to_string(&path)?;
    let config = parse_config(&path, &content)?;
    info!("Loaded configuration from: {}", path.display());
    Ok(config)
}

/// Parses config text, choosing the format by file extension (YAML default).
pub fn parse_config(path: &Path, content: &str) -> Result<Config, Box<dyn std::error::Error>> {
    let config = match path.extension().and_then(|s| s.to_str()) {
        Some("json") => serde_json::from_str(content)?,
        Some("toml") => toml::from_str(content)?,
        _ => serde_yaml::from_str(content)?,
    };
    Ok(config)
}

/// Serializes the configuration in the requested format.
pub fn render_config(config: &Config, format: &ConfigFormat) -> Result<String, Box<dyn std::error::Error>> {
    let output = match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(config)?,
    };
    Ok(output)
}

/// Shows configuration in requested format
pub fn show_config(
    config: &Config,
    format: ConfigFormat,
    user_config: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if user_config {
        println!("User configuration (effective values):");
    }
    println!("{}", render_config(config, &format)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_effective_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_log_level_from_file_and_cli() {
        let cfg = Config {
            log_level: Some("DEBUG".into()),
            ..Config::default()
        };
        assert_eq!(cfg.effective_log_level(), LogLevel::Debug);
        assert_eq!(Config::default().effective_log_level(), LogLevel::Info);

        let args = Args::parse_from([
            "qnap-node-exporter",
            "--no-config",
            "--log-level",
            "trace",
        ]);
        let resolved = resolve_config(&args).unwrap();
        assert_eq!(resolved.log_level.as_deref(), Some("trace"));
        assert_eq!(resolved.effective_log_level(), LogLevel::Trace);
    }

    #[test]
    fn test_unknown_log_level_rejected() {
        let cfg = Config {
            log_level: Some("verbose".into()),
            ..Config::default()
        };
        let err = validate_effective_config(&cfg).unwrap_err();
        assert!(err.to_string().contains("log_level"));
    }

    #[test]
    fn test_zero_ttl_rejected() {
        let cfg = Config {
            env_ttl_secs: Some(0),
            ..Config::default()
        };
        assert!(validate_effective_config(&cfg).is_err());
    }

    #[test]
    fn test_tls_requires_both_paths() {
        let cfg = Config {
            enable_tls: Some(true),
            tls_cert_path: Some("/tmp/cert.pem".into()),
            ..Config::default()
        };
        let err = validate_effective_config(&cfg).unwrap_err();
        assert!(err.to_string().contains("tls_key_path"));
    }

    #[test]
    fn test_exporter_options_mapping() {
        let cfg = Config {
            ping_target: Some("1.1.1.1".into()),
            enable_speedtest: Some(true),
            speedtest_server: Some(4242),
            enable_ups: Some(false),
            ..Config::default()
        };
        let options = cfg.exporter_options();
        assert_eq!(options.ping_target.as_deref(), Some("1.1.1.1"));
        assert!(options.ups.is_none());
        assert_eq!(options.speedtest.unwrap().server_id, Some(4242));
        assert_eq!(options.environment.ttl, Duration::from_secs(300));
    }

    #[test]
    fn test_parse_config_formats() {
        let yaml = parse_config(Path::new("c.yaml"), "port: 9100\nping_target: 8.8.8.8\n").unwrap();
        assert_eq!(yaml.port, Some(9100));
        assert_eq!(yaml.ping_target.as_deref(), Some("8.8.8.8"));

        let json = parse_config(Path::new("c.json"), r#"{"enable-ups": false}"#).unwrap();
        assert_eq!(json.enable_ups, Some(false));

        let toml = parse_config(Path::new("c.toml"), "volume_ttl_secs = 30\n").unwrap();
        assert_eq!(toml.volume_ttl_secs, Some(30));
    }
}
