//! Host environment discovery with a time-to-live cache.
//!
//! Discovery resolves the hostname, locates auxiliary CLI tools, queries
//! sensor counts and enumerates block devices and network interfaces. The
//! result is cached and rebuilt lazily once it expires. Discovery never
//! fails as a whole: every sub-failure is logged and degrades to an empty
//! or unknown value.

use ahash::AHashMap as HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::error::{CollectError, Result};
use crate::exec::exec_command;

/// Default validity of a discovered environment.
pub const DEFAULT_ENV_TTL: Duration = Duration::from_secs(5 * 60);

pub const DEFAULT_DEV_DIR: &str = "/dev";
pub const DEFAULT_NET_DIR: &str = "/sys/class/net";

/// QNAP system information CLI.
pub const GETSYSINFO: &str = "getsysinfo";
/// sysstat CPU/disk report CLI.
pub const IOSTAT: &str = "iostat";

const DISCOVERED_TOOLS: [&str; 2] = [GETSYSINFO, IOSTAT];

/// A directory entry as seen by discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntryInfo {
    pub name: String,
    pub is_dir: bool,
}

impl DirEntryInfo {
    pub fn file(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_dir: false,
        }
    }
}

/// Number of sensors reported by the vendor tool. `None` means unknown and
/// suppresses the corresponding metrics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SensorCounts {
    pub fan_count: Option<u32>,
    pub disk_bays: Option<u32>,
}

/// Immutable result of one discovery pass.
#[derive(Debug, Clone, Default)]
pub struct EnvironmentSnapshot {
    pub hostname: String,
    pub tool_paths: HashMap<String, PathBuf>,
    pub devices: Vec<String>,
    pub interfaces: Vec<String>,
    pub sensors: SensorCounts,
}

impl EnvironmentSnapshot {
    pub fn tool(&self, name: &str) -> Option<&Path> {
        self.tool_paths.get(name).map(PathBuf::as_path)
    }
}

/// I/O seam used by discovery.
pub trait HostProbe: Send + Sync {
    fn hostname(&self) -> Result<String>;
    fn find_tool(&self, name: &str) -> Result<PathBuf>;
    fn run_tool(&self, path: &Path, args: &[&str]) -> Result<String>;
    fn list_dir(&self, path: &Path) -> Result<Vec<DirEntryInfo>>;
}

/// Probe backed by the real host.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProbe;

impl HostProbe for SystemProbe {
    fn hostname(&self) -> Result<String> {
        match std::env::var("HOSTNAME") {
            Ok(name) if !name.trim().is_empty() => Ok(name.trim().to_string()),
            _ => exec_command("hostname", &[]),
        }
    }

    fn find_tool(&self, name: &str) -> Result<PathBuf> {
        which::which(name).map_err(|e| CollectError::Command {
            program: name.to_string(),
            reason: e.to_string(),
        })
    }

    fn run_tool(&self, path: &Path, args: &[&str]) -> Result<String> {
        exec_command(path, args)
    }

    fn list_dir(&self, path: &Path) -> Result<Vec<DirEntryInfo>> {
        let entries = fs::read_dir(path).map_err(|e| CollectError::io(path, e))?;
        let mut out = Vec::new();
        for entry in entries.flatten() {
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            out.push(DirEntryInfo {
                name: entry.file_name().to_string_lossy().to_string(),
                is_dir,
            });
        }
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }
}

/// Settings for environment discovery.
#[derive(Debug, Clone)]
pub struct EnvironmentSettings {
    pub ttl: Duration,
    pub dev_dir: PathBuf,
    pub net_dir: PathBuf,
}

impl Default for EnvironmentSettings {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_ENV_TTL,
            dev_dir: PathBuf::from(DEFAULT_DEV_DIR),
            net_dir: PathBuf::from(DEFAULT_NET_DIR),
        }
    }
}

/// Keeps whole-disk block devices: `nvme` names of exactly 7 characters
/// (`nvme0n1`) and `sd` names of exactly 3 characters (`sda`).
pub fn filter_block_devices(entries: &[DirEntryInfo]) -> Vec<String> {
    entries
        .iter()
        .filter(|e| !e.is_dir)
        .filter(|e| {
            let name = e.name.as_str();
            (name.starts_with("nvme") && name.len() == 7)
                || (name.starts_with("sd") && name.len() == 3)
        })
        .map(|e| e.name.clone())
        .collect()
}

/// Keeps physical ethernet interfaces (`eth*`).
pub fn filter_interfaces(entries: &[DirEntryInfo]) -> Vec<String> {
    entries
        .iter()
        .filter(|e| e.name.starts_with("eth"))
        .map(|e| e.name.clone())
        .collect()
}

fn query_count(probe: &dyn HostProbe, tool: &Path, arg: &str) -> Option<u32> {
    match probe
        .run_tool(tool, &[arg])
        .and_then(|out| {
            out.trim()
                .parse::<u32>()
                .map_err(|_| CollectError::parse(arg, out))
        }) {
        Ok(count) => Some(count),
        Err(e) => {
            warn!("Failed to query {} {}: {}", tool.display(), arg, e);
            None
        }
    }
}

/// Performs one full discovery pass.
pub fn discover(probe: &dyn HostProbe, settings: &EnvironmentSettings) -> EnvironmentSnapshot {
    info!("Reading environment...");

    let hostname = match probe.hostname() {
        Ok(name) => name,
        Err(e) => {
            warn!("Failed to resolve hostname: {}", e);
            "unknown".to_string()
        }
    };
    info!("Hostname: {}", hostname);

    let mut tool_paths = HashMap::new();
    for tool in DISCOVERED_TOOLS {
        match probe.find_tool(tool) {
            Ok(path) => {
                debug!("Found {} at {}", tool, path.display());
                tool_paths.insert(tool.to_string(), path);
            }
            Err(e) => warn!("Failed to find {}: {}", tool, e),
        }
    }

    let sensors = match tool_paths.get(GETSYSINFO) {
        Some(tool) => SensorCounts {
            disk_bays: query_count(probe, tool, "hdnum"),
            fan_count: query_count(probe, tool, "sysfannum"),
        },
        None => SensorCounts::default(),
    };

    let interfaces = match probe.list_dir(&settings.net_dir) {
        Ok(entries) => filter_interfaces(&entries),
        Err(e) => {
            warn!("Failed to list network interfaces: {}", e);
            Vec::new()
        }
    };

    let devices = match probe.list_dir(&settings.dev_dir) {
        Ok(entries) => filter_block_devices(&entries),
        Err(e) => {
            warn!("Failed to list block devices: {}", e);
            Vec::new()
        }
    };
    info!("Found devices: {:?}, interfaces: {:?}", devices, interfaces);

    EnvironmentSnapshot {
        hostname,
        tool_paths,
        devices,
        interfaces,
        sensors,
    }
}

struct Slot {
    snapshot: Arc<EnvironmentSnapshot>,
    expiry: Option<Instant>,
}

/// Lazily refreshed environment snapshot.
///
/// Concurrent callers racing on an expired entry may each run discovery;
/// the result of the newest request is kept.
pub struct EnvironmentCache {
    probe: Box<dyn HostProbe>,
    settings: EnvironmentSettings,
    slot: RwLock<Slot>,
}

impl EnvironmentCache {
    pub fn new(probe: Box<dyn HostProbe>, settings: EnvironmentSettings) -> Self {
        Self {
            probe,
            settings,
            slot: RwLock::new(Slot {
                snapshot: Arc::new(EnvironmentSnapshot::default()),
                expiry: None,
            }),
        }
    }

    /// Returns a snapshot valid at `now`, rediscovering when expired.
    ///
    /// The new expiry is anchored at `now`, not at discovery completion.
    pub fn ensure_fresh(&self, now: Instant) -> Arc<EnvironmentSnapshot> {
        if let Ok(slot) = self.slot.read() {
            if slot.expiry.is_some_and(|expiry| now <= expiry) {
                return slot.snapshot.clone();
            }
        }

        let snapshot = Arc::new(discover(self.probe.as_ref(), &self.settings));
        self.install(snapshot, now + self.settings.ttl)
    }

    /// Stores a discovery result. Expiry never moves backwards: a result
    /// from an older request that finishes late is discarded.
    fn install(
        &self,
        snapshot: Arc<EnvironmentSnapshot>,
        expiry: Instant,
    ) -> Arc<EnvironmentSnapshot> {
        match self.slot.write() {
            Ok(mut slot) => {
                if slot.expiry.is_some_and(|current| current > expiry) {
                    debug!("Discarding environment discovered for an older request");
                    return slot.snapshot.clone();
                }
                slot.snapshot = snapshot.clone();
                slot.expiry = Some(expiry);
                snapshot
            }
            Err(e) => {
                warn!("Environment cache lock poisoned: {}", e);
                snapshot
            }
        }
    }

    /// Current snapshot without triggering discovery.
    pub fn current(&self) -> Arc<EnvironmentSnapshot> {
        self.slot
            .read()
            .map(|slot| slot.snapshot.clone())
            .unwrap_or_default()
    }
}
