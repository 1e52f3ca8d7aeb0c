//! Kernel-level host metrics read from the /proc filesystem.
//!
//! Build information, uptime, load averages, CPU utilisation ratios and the
//! full /proc/meminfo table.

use std::path::Path;

use crate::error::{CollectError, Result};
use crate::exec::{exec_command, parse_f64, read_trimmed};
use crate::metric::{strip_repeated_meta, Metric};

pub const PROC_UPTIME: &str = "/proc/uptime";
pub const PROC_LOADAVG: &str = "/proc/loadavg";
pub const PROC_STAT: &str = "/proc/stat";
pub const PROC_MEMINFO: &str = "/proc/meminfo";
pub const KERNEL_RELEASE: &str = "/proc/sys/kernel/osrelease";

/// System load averages for 1, 5, and 15 minute intervals.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadAverage {
    pub one_min: f64,
    pub five_min: f64,
    pub fifteen_min: f64,
}

/// Aggregate CPU jiffies from the first line of /proc/stat.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CpuStat {
    pub user: u64,
    pub nice: u64,
    pub system: u64,
    pub idle: u64,
    pub iowait: u64,
    pub irq: u64,
    pub softirq: u64,
    pub steal: u64,
}

impl CpuStat {
    pub fn total(&self) -> u64 {
        self.user
            + self.nice
            + self.system
            + self.idle
            + self.iowait
            + self.irq
            + self.softirq
            + self.steal
    }

    fn modes(&self) -> [(&'static str, u64); 8] {
        [
            ("user", self.user),
            ("nice", self.nice),
            ("system", self.system),
            ("idle", self.idle),
            ("iowait", self.iowait),
            ("irq", self.irq),
            ("softirq", self.softirq),
            ("steal", self.steal),
        ]
    }
}

/// Build information of the running exporter as a constant `1` gauge.
pub fn collect_build_info() -> Result<Vec<Metric>> {
    let kernel = read_trimmed(KERNEL_RELEASE).unwrap_or_else(|_| "unknown".to_string());
    let revision = option_env!("VERGEN_GIT_SHA").unwrap_or("unknown");
    Ok(vec![Metric::gauge(
        "node_exporter_build_info",
        "Exporter version, git revision and kernel release",
        1.0,
    )
    .with_label("version", env!("CARGO_PKG_VERSION"))
    .with_label("revision", revision)
    .with_label("kernel", &kernel)])
}

/// Parses the first field of /proc/uptime (seconds since boot).
pub fn parse_uptime(content: &str) -> Result<f64> {
    let first = content.split_whitespace().next().unwrap_or("");
    parse_f64("uptime", first)
}

pub fn collect_uptime(path: &Path) -> Result<Vec<Metric>> {
    let uptime = parse_uptime(&read_trimmed(path)?)?;
    Ok(vec![Metric::gauge(
        "node_uptime_seconds",
        "Seconds since the machine booted",
        uptime,
    )])
}

/// Parses /proc/loadavg.
///
/// Format: "0.00 0.01 0.05 1/234 5678"
pub fn parse_load_average(content: &str) -> Result<LoadAverage> {
    let parts: Vec<&str> = content.split_whitespace().collect();
    if parts.len() < 3 {
        return Err(CollectError::parse("load average", content));
    }
    Ok(LoadAverage {
        one_min: parse_f64("1min load average", parts[0])?,
        five_min: parse_f64("5min load average", parts[1])?,
        fifteen_min: parse_f64("15min load average", parts[2])?,
    })
}

pub fn collect_load(path: &Path) -> Result<Vec<Metric>> {
    let load = parse_load_average(&read_trimmed(path)?)?;
    Ok(vec![
        Metric::gauge("node_load1", "1m load average", load.one_min),
        Metric::gauge("node_load5", "5m load average", load.five_min),
        Metric::gauge("node_load15", "15m load average", load.fifteen_min),
    ])
}

/// Parses the aggregate `cpu` line of /proc/stat.
pub fn parse_cpu_stat(content: &str) -> Result<CpuStat> {
    let line = content
        .lines()
        .find(|l| l.starts_with("cpu "))
        .ok_or_else(|| CollectError::parse("cpu line", "/proc/stat"))?;

    let values: Vec<u64> = line
        .split_whitespace()
        .skip(1)
        .map(|v| v.parse::<u64>().map_err(|_| CollectError::parse("cpu jiffies", line)))
        .collect::<Result<_>>()?;
    if values.len() < 4 {
        return Err(CollectError::parse("cpu jiffies", line));
    }

    let at = |i: usize| values.get(i).copied().unwrap_or(0);
    Ok(CpuStat {
        user: at(0),
        nice: at(1),
        system: at(2),
        idle: at(3),
        iowait: at(4),
        irq: at(5),
        softirq: at(6),
        steal: at(7),
    })
}

/// Share of each CPU mode since boot, in the range 0..=1.
pub fn cpu_ratios_from_stat(stat: &CpuStat) -> Vec<(String, f64)> {
    let total = stat.total();
    stat.modes()
        .iter()
        .map(|(mode, value)| {
            let ratio = if total == 0 {
                0.0
            } else {
                *value as f64 / total as f64
            };
            (mode.to_string(), ratio)
        })
        .collect()
}

/// Parses the `avg-cpu` block of `iostat -c` into (mode, ratio) pairs.
///
/// ```text
/// avg-cpu:  %user   %nice %system %iowait  %steal   %idle
///            2.51    0.01    1.22    0.35    0.00   95.91
/// ```
pub fn parse_iostat_cpu(output: &str) -> Result<Vec<(String, f64)>> {
    let mut lines = output.lines();
    let header = lines
        .by_ref()
        .find_map(|l| l.trim_start().strip_prefix("avg-cpu:"))
        .ok_or_else(|| CollectError::parse("iostat avg-cpu header", output))?;
    let values = lines
        .find(|l| !l.trim().is_empty())
        .ok_or_else(|| CollectError::parse("iostat avg-cpu values", output))?;

    let modes: Vec<&str> = header
        .split_whitespace()
        .map(|h| h.trim_start_matches('%'))
        .collect();
    let values: Vec<&str> = values.split_whitespace().collect();
    if modes.len() != values.len() {
        return Err(CollectError::parse("iostat avg-cpu values", output));
    }

    modes
        .into_iter()
        .zip(values)
        .map(|(mode, value)| Ok((mode.to_string(), parse_f64(mode, value)? / 100.0)))
        .collect()
}

/// CPU mode ratios, from `iostat` when it is installed and from /proc/stat
/// otherwise.
pub fn collect_cpu(iostat: Option<&Path>, stat_path: &Path) -> Result<Vec<Metric>> {
    let ratios = match iostat {
        Some(program) => parse_iostat_cpu(&exec_command(program, &["-c"])?)?,
        None => cpu_ratios_from_stat(&parse_cpu_stat(&read_trimmed(stat_path)?)?),
    };

    let metrics = ratios
        .into_iter()
        .map(|(mode, ratio)| {
            Metric::gauge("node_cpu_ratio", "Share of CPU time spent per mode", ratio)
                .with_label("mode", &mode)
        })
        .collect();
    Ok(strip_repeated_meta(metrics))
}

/// Turns a /proc/meminfo key such as `Active(anon)` into a metric name part.
fn sanitize_meminfo_key(key: &str) -> String {
    key.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect::<String>()
        .trim_end_matches('_')
        .to_string()
}

/// Every /proc/meminfo line as a gauge. Values in kB are converted to bytes.
pub fn parse_meminfo(content: &str) -> Result<Vec<Metric>> {
    let mut metrics = Vec::new();
    for line in content.lines() {
        let Some((key, rest)) = line.split_once(':') else {
            continue;
        };
        let mut fields = rest.split_whitespace();
        let Some(raw) = fields.next() else {
            continue;
        };
        let value = parse_f64(key, raw)?;
        let key = sanitize_meminfo_key(key);

        let metric = match fields.next() {
            Some("kB") => Metric::gauge(
                format!("node_memory_{key}_bytes"),
                format!("Memory information field {key}_bytes."),
                value * 1024.0,
            ),
            _ => Metric::gauge(
                format!("node_memory_{key}"),
                format!("Memory information field {key}."),
                value,
            ),
        };
        metrics.push(metric);
    }

    if metrics.is_empty() {
        return Err(CollectError::parse("meminfo", content));
    }
    Ok(metrics)
}

pub fn collect_meminfo(path: &Path) -> Result<Vec<Metric>> {
    parse_meminfo(&read_trimmed(path)?)
}
