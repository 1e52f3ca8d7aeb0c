//! Hardware sensors read through the QNAP `getsysinfo` tool.
//!
//! Temperatures, fan speeds, per-bay disk temperatures and volume usage.
//! When the tool is absent temperatures fall back to the kernel thermal
//! zones; everything else is skipped.

use std::path::Path;
use std::time::Instant;
use tracing::debug;

use crate::collectors::thermal;
use crate::environment::{EnvironmentSnapshot, GETSYSINFO};
use crate::error::Result;
use crate::exec::{exec_command, parse_leading_number};
use crate::metric::{strip_repeated_meta, Metric};
use crate::volumes::{read_volumes, VolumeCache};

/// CPU and system board temperatures.
pub fn collect_temperatures(env: &EnvironmentSnapshot, thermal_dir: &Path) -> Result<Vec<Metric>> {
    let Some(getsysinfo) = env.tool(GETSYSINFO) else {
        return thermal::collect_thermal_zones(thermal_dir);
    };

    let cpu = parse_leading_number("cpu temperature", &exec_command(getsysinfo, &["cputmp"])?)?;
    let sys = parse_leading_number("system temperature", &exec_command(getsysinfo, &["systmp"])?)?;
    Ok(vec![
        Metric::gauge(
            "node_cpu_temperature_celsius",
            "CPU temperature in degrees Celsius",
            cpu,
        ),
        Metric::gauge(
            "node_system_temperature_celsius",
            "System board temperature in degrees Celsius",
            sys,
        ),
    ])
}

/// Speed of each chassis fan. Fans are numbered from 1.
pub fn collect_fans(env: &EnvironmentSnapshot) -> Result<Vec<Metric>> {
    let (Some(getsysinfo), Some(count)) = (
        env.tool(GETSYSINFO),
        env.sensors.fan_count,
    ) else {
        return Ok(Vec::new());
    };

    let mut metrics = Vec::with_capacity(count as usize);
    for fan in 1..=count {
        let index = fan.to_string();
        let output = exec_command(getsysinfo, &["sysfan", &index])?;
        let rpm = parse_leading_number("fan speed", &output)?;
        metrics.push(
            Metric::gauge("node_fan_speed_rpm", "Fan speed in rotations per minute", rpm)
                .with_label("fan", &index),
        );
    }
    Ok(strip_repeated_meta(metrics))
}

/// Temperature of each populated disk bay. Empty bays report `--` and are
/// skipped.
pub fn collect_disk_temperatures(env: &EnvironmentSnapshot) -> Result<Vec<Metric>> {
    let (Some(getsysinfo), Some(bays)) = (
        env.tool(GETSYSINFO),
        env.sensors.disk_bays,
    ) else {
        return Ok(Vec::new());
    };

    let mut metrics = Vec::new();
    for bay in 1..=bays {
        let index = bay.to_string();
        let output = exec_command(getsysinfo, &["hdtmp", &index])?;
        match parse_leading_number("disk temperature", &output) {
            Ok(celsius) => metrics.push(
                Metric::gauge(
                    "node_disk_temperature_celsius",
                    "Disk temperature in degrees Celsius",
                    celsius,
                )
                .with_label("disk", &index),
            ),
            Err(_) => debug!("Disk bay {} reports no temperature: {:?}", bay, output),
        }
    }
    Ok(strip_repeated_meta(metrics))
}

/// Free and total size of each storage volume, cached for the volume TTL.
pub fn collect_volumes(env: &EnvironmentSnapshot, cache: &VolumeCache) -> Result<Vec<Metric>> {
    let Some(getsysinfo) = env.tool(GETSYSINFO) else {
        return Ok(Vec::new());
    };

    let volumes = cache.get_or_refresh(Instant::now(), || read_volumes(getsysinfo))?;
    let mut metrics = Vec::with_capacity(volumes.len() * 2);
    for volume in &volumes {
        metrics.push(
            Metric::gauge(
                "node_volume_free_bytes",
                "Free space of the storage volume in bytes",
                volume.free_bytes,
            )
            .with_label("volume", &volume.description),
        );
        metrics.push(
            Metric::gauge(
                "node_volume_size_bytes",
                "Total size of the storage volume in bytes",
                volume.total_bytes,
            )
            .with_label("volume", &volume.description),
        );
    }
    Ok(strip_repeated_meta(metrics))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::SensorCounts;

    #[test]
    fn test_without_getsysinfo_sensor_producers_are_empty() {
        let env = EnvironmentSnapshot {
            sensors: SensorCounts {
                fan_count: Some(2),
                disk_bays: Some(4),
            },
            ..Default::default()
        };
        assert!(collect_fans(&env).unwrap().is_empty());
        assert!(collect_disk_temperatures(&env).unwrap().is_empty());
        assert!(collect_volumes(&env, &VolumeCache::default()).unwrap().is_empty());
    }

    #[test]
    fn test_temperatures_fall_back_to_thermal_zones() {
        let dir = tempfile::tempdir().unwrap();
        let zone = dir.path().join("thermal_zone0");
        std::fs::create_dir(&zone).unwrap();
        std::fs::write(zone.join("temp"), "41500\n").unwrap();
        std::fs::write(zone.join("type"), "x86_pkg_temp\n").unwrap();

        let metrics = collect_temperatures(&EnvironmentSnapshot::default(), dir.path()).unwrap();
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[0].value, 41.5);
    }
}
