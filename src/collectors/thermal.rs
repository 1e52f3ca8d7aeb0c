//! Kernel thermal zone temperatures.
//!
//! Fallback for hosts without the vendor sensor tool. Reads
//! `<thermal_dir>/thermal_zone*/temp` (millidegrees Celsius) and labels each
//! reading with the zone name and the content of its `type` file.

use std::fs;
use std::path::Path;

use crate::error::{CollectError, Result};
use crate::metric::{strip_repeated_meta, Metric};

pub const DEFAULT_THERMAL_DIR: &str = "/sys/class/thermal";

/// Temperature reading of one thermal zone.
#[derive(Debug, Clone, PartialEq)]
pub struct ThermalReading {
    pub zone: String,
    pub kind: String,
    pub temperature_celsius: f64,
}

/// Reads all thermal zones below `thermal_base`, sorted by zone name.
///
/// A missing base directory yields no readings.
pub fn read_thermal_zones(thermal_base: &Path) -> Result<Vec<ThermalReading>> {
    let mut readings = Vec::new();
    if !thermal_base.exists() {
        return Ok(readings);
    }

    let entries = fs::read_dir(thermal_base).map_err(|e| CollectError::io(thermal_base, e))?;
    for entry in entries.flatten() {
        let path = entry.path();
        let zone = entry.file_name().to_string_lossy().to_string();
        if !zone.starts_with("thermal_zone") {
            continue;
        }

        // Zones without a readable temperature are skipped.
        let Ok(content) = fs::read_to_string(path.join("temp")) else {
            continue;
        };
        let Ok(millidegrees) = content.trim().parse::<i64>() else {
            continue;
        };
        let kind = fs::read_to_string(path.join("type"))
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|_| zone.clone());

        readings.push(ThermalReading {
            zone,
            kind,
            temperature_celsius: millidegrees as f64 / 1000.0,
        });
    }

    readings.sort_by(|a, b| a.zone.cmp(&b.zone));
    Ok(readings)
}

pub fn collect_thermal_zones(thermal_base: &Path) -> Result<Vec<Metric>> {
    let metrics = read_thermal_zones(thermal_base)?
        .into_iter()
        .map(|r| {
            Metric::gauge(
                "node_thermal_zone_temperature_celsius",
                "Thermal zone temperature in degrees Celsius",
                r.temperature_celsius,
            )
            .with_label("zone", &r.zone)
            .with_label("type", &r.kind)
        })
        .collect();
    Ok(strip_repeated_meta(metrics))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_base_is_empty() {
        let result = read_thermal_zones(Path::new("/nonexistent/thermal"));
        assert_eq!(result.unwrap(), Vec::new());
    }

    #[test]
    fn test_read_thermal_zones() {
        let dir = tempfile::tempdir().unwrap();
        for (zone, temp) in [("thermal_zone1", "38000"), ("thermal_zone0", "45250")] {
            let path = dir.path().join(zone);
            fs::create_dir(&path).unwrap();
            fs::write(path.join("temp"), temp).unwrap();
        }
        fs::create_dir(dir.path().join("cooling_device0")).unwrap();

        let readings = read_thermal_zones(dir.path()).unwrap();
        assert_eq!(readings.len(), 2);
        assert_eq!(readings[0].zone, "thermal_zone0");
        assert_eq!(readings[0].kind, "thermal_zone0");
        assert_eq!(readings[0].temperature_celsius, 45.25);

        let metrics = collect_thermal_zones(dir.path()).unwrap();
        assert!(metrics[0].help.is_some());
        assert!(metrics[1].help.is_none());
    }
}
