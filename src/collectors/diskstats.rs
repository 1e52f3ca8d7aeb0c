//! Disk I/O statistics from /proc/diskstats.
//!
//! Only the block devices found during environment discovery are reported.

use ahash::AHashMap as HashMap;
use std::path::Path;

use crate::environment::EnvironmentSnapshot;
use crate::error::Result;
use crate::exec::read_trimmed;
use crate::metric::{strip_repeated_meta, Metric};

pub const PROC_DISKSTATS: &str = "/proc/diskstats";

/// Kernel sector size used by /proc/diskstats, independent of the device.
const SECTOR_SIZE: f64 = 512.0;

/// Disk statistics for a single device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskStats {
    pub reads_completed: u64,
    pub sectors_read: u64,
    pub time_reading_ms: u64,
    pub writes_completed: u64,
    pub sectors_written: u64,
    pub time_writing_ms: u64,
    pub ios_in_progress: u64,
    pub time_io_ms: u64,
}

/// Parses /proc/diskstats into a map keyed by device name.
///
/// Format: major minor name read_ios read_merges read_sectors read_ticks
/// write_ios write_merges write_sectors write_ticks ios_in_progress
/// time_in_queue weighted_time_in_queue
pub fn parse_diskstats(content: &str) -> HashMap<String, DiskStats> {
    let mut stats = HashMap::new();
    for line in content.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 14 {
            continue;
        }
        let field = |i: usize| parts[i].parse::<u64>().unwrap_or(0);
        stats.insert(
            parts[2].to_string(),
            DiskStats {
                reads_completed: field(3),
                sectors_read: field(5),
                time_reading_ms: field(6),
                writes_completed: field(7),
                sectors_written: field(9),
                time_writing_ms: field(10),
                ios_in_progress: field(11),
                time_io_ms: field(12),
            },
        );
    }
    stats
}

/// Converts the stats of the discovered `devices` into metrics, in device
/// order. Devices missing from the table are skipped.
pub fn diskstats_metrics(stats: &HashMap<String, DiskStats>, devices: &[String]) -> Vec<Metric> {
    let mut metrics = Vec::new();
    for device in devices {
        let Some(s) = stats.get(device) else {
            continue;
        };
        metrics.extend([
            Metric::counter(
                "node_disk_reads_completed_total",
                "The total number of reads completed successfully",
                s.reads_completed as f64,
            )
            .with_label("device", device),
            Metric::counter(
                "node_disk_writes_completed_total",
                "The total number of writes completed successfully",
                s.writes_completed as f64,
            )
            .with_label("device", device),
            Metric::counter(
                "node_disk_read_bytes_total",
                "The total number of bytes read successfully",
                s.sectors_read as f64 * SECTOR_SIZE,
            )
            .with_label("device", device),
            Metric::counter(
                "node_disk_written_bytes_total",
                "The total number of bytes written successfully",
                s.sectors_written as f64 * SECTOR_SIZE,
            )
            .with_label("device", device),
            Metric::counter(
                "node_disk_read_time_seconds_total",
                "The total number of seconds spent by all reads",
                s.time_reading_ms as f64 / 1000.0,
            )
            .with_label("device", device),
            Metric::counter(
                "node_disk_write_time_seconds_total",
                "The total number of seconds spent by all writes",
                s.time_writing_ms as f64 / 1000.0,
            )
            .with_label("device", device),
            Metric::counter(
                "node_disk_io_time_seconds_total",
                "Total seconds spent doing I/Os",
                s.time_io_ms as f64 / 1000.0,
            )
            .with_label("device", device),
            Metric::gauge(
                "node_disk_io_now",
                "The number of I/Os currently in progress",
                s.ios_in_progress as f64,
            )
            .with_label("device", device),
        ]);
    }
    strip_repeated_meta(metrics)
}

pub fn collect_diskstats(env: &EnvironmentSnapshot, path: &Path) -> Result<Vec<Metric>> {
    if env.devices.is_empty() {
        return Ok(Vec::new());
    }
    let stats = parse_diskstats(&read_trimmed(path)?);
    Ok(diskstats_metrics(&stats, &env.devices))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "   8       0 sda 1000 10 20000 500 2000 20 40000 800 1 1200 1300 0 0 0 0
   8       1 sda1 900 10 18000 450 1900 20 38000 700 0 1100 1150 0 0 0 0
 259       0 nvme0n1 50 0 400 10 60 0 800 20 0 30 30
   7       0 loop0 1 0 2 0 0 0 0 0 0 0 0";

    #[test]
    fn test_parse_diskstats() {
        let stats = parse_diskstats(SAMPLE);
        assert_eq!(stats.len(), 4);
        let sda = stats["sda"];
        assert_eq!(sda.reads_completed, 1000);
        assert_eq!(sda.sectors_written, 40000);
        assert_eq!(sda.ios_in_progress, 1);
    }

    #[test]
    fn test_only_discovered_devices_are_reported() {
        let stats = parse_diskstats(SAMPLE);
        let metrics = diskstats_metrics(&stats, &["sda".to_string(), "sdz".to_string()]);
        assert_eq!(metrics.len(), 8);
        assert!(metrics.iter().all(|m| m.labels == r#"device="sda""#));

        let read_bytes = metrics
            .iter()
            .find(|m| m.name == "node_disk_read_bytes_total")
            .unwrap();
        assert_eq!(read_bytes.value, 20000.0 * 512.0);
    }

    #[test]
    fn test_metadata_once_per_name() {
        let stats = parse_diskstats(SAMPLE);
        let metrics = diskstats_metrics(&stats, &["sda".to_string(), "nvme0n1".to_string()]);
        let with_help = metrics
            .iter()
            .filter(|m| m.name == "node_disk_io_now" && m.help.is_some())
            .count();
        assert_eq!(with_help, 1);
    }
}
