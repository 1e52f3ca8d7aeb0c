//! Internet bandwidth measurement through `speedtest-cli`.
//!
//! Two expiry policies share one producer: the server target list is kept
//! until it is non-empty, while the measurement itself is only repeated
//! once per hour. Between measurements the last results are re-emitted.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::error::{CollectError, Result};
use crate::exec::exec_command;
use crate::metric::Metric;

/// Validity of one bandwidth measurement.
pub const DEFAULT_SPEEDTEST_TTL: Duration = Duration::from_secs(60 * 60);

static SERVER_LINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(\d+)\)\s+(.+?)\s*(?:\[[^\]]*\])?\s*$").expect("valid regex")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeedtestTarget {
    pub id: u32,
    pub name: String,
}

/// Measured throughput in bits per second.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Bandwidth {
    pub download_bps: f64,
    pub upload_bps: f64,
}

pub trait SpeedTester: Send + Sync {
    /// Resolves the servers to measure against. With `server_id` set only
    /// that server is returned, otherwise the closest one.
    fn discover(&self, server_id: Option<u32>) -> Result<Vec<SpeedtestTarget>>;
    fn measure(&self, target: &SpeedtestTarget) -> Result<Bandwidth>;
}

#[derive(Deserialize)]
struct SpeedtestJson {
    download: f64,
    upload: f64,
}

/// Parses `speedtest-cli --list`; servers are listed closest first.
pub fn parse_server_list(output: &str) -> Vec<SpeedtestTarget> {
    output
        .lines()
        .filter_map(|line| SERVER_LINE_RE.captures(line))
        .filter_map(|c| {
            Some(SpeedtestTarget {
                id: c[1].parse().ok()?,
                name: c[2].to_string(),
            })
        })
        .collect()
}

/// [`SpeedTester`] backed by the `speedtest-cli` tool.
#[derive(Debug, Clone)]
pub struct SpeedtestCli {
    pub program: String,
}

impl Default for SpeedtestCli {
    fn default() -> Self {
        Self {
            program: "speedtest-cli".to_string(),
        }
    }
}

impl SpeedTester for SpeedtestCli {
    fn discover(&self, server_id: Option<u32>) -> Result<Vec<SpeedtestTarget>> {
        let servers = parse_server_list(&exec_command(&self.program, &["--list"])?);
        let targets: Vec<SpeedtestTarget> = match server_id {
            Some(id) => servers.into_iter().filter(|s| s.id == id).collect(),
            None => servers.into_iter().take(1).collect(),
        };
        if targets.is_empty() {
            return Err(CollectError::Bandwidth(match server_id {
                Some(id) => format!("server {id} not found"),
                None => "no servers available".to_string(),
            }));
        }
        Ok(targets)
    }

    fn measure(&self, target: &SpeedtestTarget) -> Result<Bandwidth> {
        let id = target.id.to_string();
        let output = exec_command(&self.program, &["--server", &id, "--json"])?;
        let parsed: SpeedtestJson = serde_json::from_str(&output)
            .map_err(|e| CollectError::Bandwidth(format!("decode result: {e}")))?;
        Ok(Bandwidth {
            download_bps: parsed.download,
            upload_bps: parsed.upload,
        })
    }
}

struct Measured {
    target: SpeedtestTarget,
    bandwidth: Bandwidth,
}

#[derive(Default)]
struct BandwidthInner {
    targets: Vec<Measured>,
    last_run: Option<(Instant, DateTime<Utc>)>,
}

/// Memoized speed test targets and results.
pub struct BandwidthState {
    tester: Box<dyn SpeedTester>,
    server_id: Option<u32>,
    ttl: Duration,
    inner: Mutex<BandwidthInner>,
}

impl BandwidthState {
    pub fn new(tester: Box<dyn SpeedTester>, server_id: Option<u32>, ttl: Duration) -> Self {
        Self {
            tester,
            server_id,
            ttl,
            inner: Mutex::new(BandwidthInner::default()),
        }
    }

    /// Returns download and upload metrics, measuring again when expired.
    pub fn collect(&self, now: Instant) -> Result<Vec<Metric>> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|e| CollectError::Bandwidth(format!("lock poisoned: {e}")))?;

        if inner.targets.is_empty() {
            inner.targets = self
                .tester
                .discover(self.server_id)?
                .into_iter()
                .map(|target| Measured {
                    target,
                    bandwidth: Bandwidth::default(),
                })
                .collect();
            info!("Speedtest targets: {}", inner.targets.len());
        }

        let expired = inner
            .last_run
            .map_or(true, |(at, _)| now > at + self.ttl);
        if expired {
            for measured in inner.targets.iter_mut() {
                match self.tester.measure(&measured.target) {
                    Ok(bandwidth) => measured.bandwidth = bandwidth,
                    Err(e) => {
                        warn!("Speedtest against {} failed: {}", measured.target.id, e);
                        return Err(e);
                    }
                }
            }
            inner.last_run = Some((now, Utc::now()));
        }

        let measured_at = inner.last_run.map(|(_, wall)| wall).unwrap_or_else(Utc::now);
        let mut metrics = Vec::with_capacity(inner.targets.len() * 2);
        for (idx, m) in inner.targets.iter().enumerate() {
            let server = m.target.id.to_string();
            let mut download = Metric::gauge(
                "node_network_external_download_speed_bps",
                "Download bandwidth measured by speedtest in bits per second",
                m.bandwidth.download_bps,
            )
            .with_label("server", &server)
            .with_timestamp(measured_at);
            let mut upload = Metric::gauge(
                "node_network_external_upload_speed_bps",
                "Upload bandwidth measured by speedtest in bits per second",
                m.bandwidth.upload_bps,
            )
            .with_label("server", &server)
            .with_timestamp(measured_at);
            if idx > 0 {
                download = download.without_meta();
                upload = upload.without_meta();
            }
            metrics.push(download);
            metrics.push(upload);
        }
        Ok(metrics)
    }
}
