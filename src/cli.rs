//! CLI arguments and subcommands for qnap-node-exporter.
//!
//! This module defines the command-line interface structure using the clap library,
//! including all flags, options, and subcommands.

use clap::{Parser, Subcommand, ValueEnum};
use std::net::IpAddr;
use std::path::PathBuf;

/// Log level options for CLI parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Parses a level name as written in a config file (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        <Self as ValueEnum>::from_str(name, true).ok()
    }

    pub fn name(&self) -> String {
        self.to_possible_value()
            .map(|v| v.get_name().to_string())
            .unwrap_or_default()
    }
}

/// Configuration format options for output
#[derive(Debug, Clone, ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

/// Main CLI arguments structure
#[derive(Parser, Debug)]
#[command(
    name = "qnap-node-exporter",
    about = "Prometheus exporter for QNAP NAS health metrics",
    long_about = "Prometheus exporter for QNAP NAS health metrics.\n\n\
                  Reports uptime, load, CPU, memory, temperatures, fans, volumes, disk and \
                  network I/O, UPS state and external network latency/bandwidth of the \
                  machine it runs on.",
    version,
    propagate_version = true
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// HTTP listen port
    #[arg(short = 'p', long)]
    pub port: Option<u16>,

    /// Bind to specific interface/IP
    #[arg(long)]
    pub bind: Option<IpAddr>,

    /// Log level, overrides `log_level` from the config file [default: info]
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Config file (YAML/JSON/TOML)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Disable all config file loading
    #[arg(long)]
    pub no_config: bool,

    /// Print effective merged config and exit
    #[arg(long)]
    pub show_config: bool,

    /// Print only the loaded user config file + full path and exit
    #[arg(long)]
    pub show_user_config: bool,

    /// Output format for --show-config*
    #[arg(long, value_enum, default_value = "yaml")]
    pub config_format: ConfigFormat,

    /// Validate config and exit (return code 1 on error)
    #[arg(long)]
    pub check_config: bool,

    /// Host to measure external round-trip time against
    #[arg(long)]
    pub ping_target: Option<String>,

    /// Run an hourly internet bandwidth test with speedtest-cli
    #[arg(long)]
    pub enable_speedtest: bool,

    /// speedtest.net server id (default: closest server)
    #[arg(long)]
    pub speedtest_server: Option<u32>,

    /// NUT server host for UPS metrics
    #[arg(long)]
    pub ups_host: Option<String>,

    /// Disable UPS metrics
    #[arg(long)]
    pub disable_ups: bool,

    /// Disable internal qnap_exporter_* metrics
    #[arg(long)]
    pub disable_telemetry: bool,

    /// Append sample timestamps where producers provide them
    #[arg(long)]
    pub render_timestamps: bool,

    /// Enable TLS/SSL for HTTPS
    #[arg(long)]
    pub enable_tls: bool,

    /// Path to TLS certificate file (PEM format)
    #[arg(long)]
    pub tls_cert: Option<PathBuf>,

    /// Path to TLS private key file (PEM format)
    #[arg(long)]
    pub tls_key: Option<PathBuf>,
}

/// Subcommands for additional functionality
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate configuration files
    Config {
        /// Output file path
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "yaml")]
        format: ConfigFormat,

        /// Include comments and examples
        #[arg(long)]
        commented: bool,
    },

    /// Run collection passes and print the exposition text
    Test {
        /// Number of test iterations
        #[arg(short = 'n', long, default_value_t = 1)]
        iterations: usize,

        /// Print every metric line, not only the summary
        #[arg(long)]
        verbose: bool,
    },

    /// Check runtime requirements and permissions
    CheckRequirements,
}
