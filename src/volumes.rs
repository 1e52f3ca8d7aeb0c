//! Storage volume information from `getsysinfo`, cached for one minute.

use std::path::Path;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::error::{CollectError, Result};
use crate::exec::{exec_command, parse_f64};

/// Validity of a volume listing.
pub const DEFAULT_VOLUME_TTL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq)]
pub struct VolumeInfo {
    pub description: String,
    pub free_bytes: f64,
    pub total_bytes: f64,
}

/// Parses sizes as printed by `getsysinfo`, e.g. `"1.23 TB"` or `"512 MB"`.
pub fn parse_size(text: &str) -> Result<f64> {
    let mut parts = text.split_whitespace();
    let number = parts.next().ok_or_else(|| CollectError::parse("size", text))?;
    let value = parse_f64("size", number)?;
    let multiplier = match parts.next().map(|u| u.to_ascii_uppercase()) {
        None => 1.0,
        Some(unit) => match unit.as_str() {
            "B" => 1.0,
            "KB" | "K" => 1024.0,
            "MB" | "M" => 1024.0 * 1024.0,
            "GB" | "G" => 1024.0 * 1024.0 * 1024.0,
            "TB" | "T" => 1024.0 * 1024.0 * 1024.0 * 1024.0,
            "PB" | "P" => 1024.0 * 1024.0 * 1024.0 * 1024.0 * 1024.0,
            _ => return Err(CollectError::parse("size unit", text)),
        },
    };
    Ok(value * multiplier)
}

/// Reads every volume through `getsysinfo`.
pub fn read_volumes(getsysinfo: &Path) -> Result<Vec<VolumeInfo>> {
    let count_text = exec_command(getsysinfo, &["sysvolnum"])?;
    let count: u32 = count_text
        .trim()
        .parse()
        .map_err(|_| CollectError::parse("volume count", &count_text))?;

    let mut volumes = Vec::with_capacity(count as usize);
    for idx in 1..=count {
        let idx = idx.to_string();
        let description = exec_command(getsysinfo, &["vol_desc", &idx])?;
        let free_bytes = parse_size(&exec_command(getsysinfo, &["vol_freesize", &idx])?)?;
        let total_bytes = parse_size(&exec_command(getsysinfo, &["vol_totalsize", &idx])?)?;
        volumes.push(VolumeInfo {
            description,
            free_bytes,
            total_bytes,
        });
    }
    Ok(volumes)
}

struct VolumeSlot {
    volumes: Vec<VolumeInfo>,
    expiry: Option<Instant>,
}

/// Volume listing refreshed lazily on access once expired.
pub struct VolumeCache {
    ttl: Duration,
    slot: Mutex<VolumeSlot>,
}

impl VolumeCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slot: Mutex::new(VolumeSlot {
                volumes: Vec::new(),
                expiry: None,
            }),
        }
    }

    /// Returns the cached volumes, calling `read` when the entry expired.
    ///
    /// A failed refresh keeps the previous expiry so the next request retries.
    pub fn get_or_refresh<F>(&self, now: Instant, read: F) -> Result<Vec<VolumeInfo>>
    where
        F: FnOnce() -> Result<Vec<VolumeInfo>>,
    {
        {
            let slot = self
                .slot
                .lock()
                .map_err(|e| CollectError::Message(format!("volume cache lock: {e}")))?;
            if slot.expiry.is_some_and(|expiry| now <= expiry) {
                return Ok(slot.volumes.clone());
            }
        }

        let volumes = read()?;
        debug!("Refreshed {} volumes", volumes.len());
        let mut slot = self
            .slot
            .lock()
            .map_err(|e| CollectError::Message(format!("volume cache lock: {e}")))?;
        slot.volumes = volumes.clone();
        slot.expiry = Some(now + self.ttl);
        Ok(volumes)
    }
}

impl Default for VolumeCache {
    fn default() -> Self {
        Self::new(DEFAULT_VOLUME_TTL)
    }
}
