//! Advisory exporter status for the `/status` page.
//!
//! Written by the exporter after each scrape, read by the status handler.
//! Last write wins; there is no consistency guarantee between fields.

use chrono::{DateTime, Utc};
use std::fmt::Write as FmtWrite;
use std::sync::RwLock;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct StatusSnapshot {
    pub started: DateTime<Utc>,
    pub last_fetch: Option<DateTime<Utc>>,
    pub last_fetch_duration: Duration,
    pub metric_count: usize,
    pub failed_producers: usize,
    pub total_fetches: u64,
    pub devices: Vec<String>,
    pub interfaces: Vec<String>,
}

pub struct Status {
    inner: RwLock<StatusSnapshot>,
}

impl Default for Status {
    fn default() -> Self {
        Self::new()
    }
}

impl Status {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(StatusSnapshot {
                started: Utc::now(),
                last_fetch: None,
                last_fetch_duration: Duration::ZERO,
                metric_count: 0,
                failed_producers: 0,
                total_fetches: 0,
                devices: Vec::new(),
                interfaces: Vec::new(),
            }),
        }
    }

    pub fn record_environment(&self, devices: &[String], interfaces: &[String]) {
        if let Ok(mut s) = self.inner.write() {
            s.devices = devices.to_vec();
            s.interfaces = interfaces.to_vec();
        }
    }

    pub fn record_fetch(
        &self,
        started: DateTime<Utc>,
        duration: Duration,
        metric_count: usize,
        failed_producers: usize,
    ) {
        if let Ok(mut s) = self.inner.write() {
            s.last_fetch = Some(started);
            s.last_fetch_duration = duration;
            s.metric_count = metric_count;
            s.failed_producers = failed_producers;
            s.total_fetches += 1;
        }
    }

    pub fn snapshot(&self) -> Option<StatusSnapshot> {
        self.inner.read().ok().map(|s| s.clone())
    }

    /// Plain-text table of the current status.
    pub fn render_table(&self) -> String {
        let Some(s) = self.snapshot() else {
            return "status unavailable\n".to_string();
        };
        let mut out = String::new();
        writeln!(out, "EXPORTER STATUS").ok();
        writeln!(out, "===============").ok();
        writeln!(out).ok();
        let last_fetch = s
            .last_fetch
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "never".to_string());
        let rows = [
            ("Started", s.started.to_rfc3339()),
            ("Last fetch", last_fetch),
            (
                "Last fetch duration",
                format!("{:.3} s", s.last_fetch_duration.as_secs_f64()),
            ),
            ("Metric count", s.metric_count.to_string()),
            ("Failed producers", s.failed_producers.to_string()),
            ("Total fetches", s.total_fetches.to_string()),
            ("Devices", s.devices.join(", ")),
            ("Interfaces", s.interfaces.join(", ")),
        ];
        for (label, value) in rows {
            writeln!(out, "{:22} | {}", label, value).ok();
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_fetch_overwrites() {
        let status = Status::new();
        status.record_fetch(Utc::now(), Duration::from_millis(10), 5, 1);
        status.record_fetch(Utc::now(), Duration::from_millis(20), 7, 0);
        let s = status.snapshot().unwrap();
        assert_eq!(s.metric_count, 7);
        assert_eq!(s.failed_producers, 0);
        assert_eq!(s.total_fetches, 2);
    }

    #[test]
    fn test_render_table_lists_devices() {
        let status = Status::new();
        status.record_environment(&["sda".into(), "sdb".into()], &["eth0".into()]);
        let table = status.render_table();
        assert!(table.contains("sda, sdb"));
        assert!(table.lines().any(|l| l.starts_with("Last fetch") && l.ends_with("| never")));
    }
}
