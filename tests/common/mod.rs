//! Shared fixtures for integration tests.

#![allow(dead_code)]

use qnap_node_exporter::environment::DirEntryInfo;
use qnap_node_exporter::error::{CollectError, Result};
use qnap_node_exporter::HostProbe;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Host probe with a fixed view of the machine that counts discoveries.
#[derive(Clone)]
pub struct FakeProbe {
    pub hostname: String,
    pub dev_entries: Vec<DirEntryInfo>,
    pub net_entries: Vec<DirEntryInfo>,
    /// Tools reported as installed under `/fake/bin`.
    pub tools: Vec<&'static str>,
    /// Canned stdout keyed by the first tool argument; others fail.
    pub tool_outputs: Vec<(&'static str, &'static str)>,
    pub discoveries: Arc<AtomicUsize>,
}

impl FakeProbe {
    pub fn new(hostname: &str) -> Self {
        Self {
            hostname: hostname.to_string(),
            dev_entries: vec![
                DirEntryInfo::file("sda"),
                DirEntryInfo::file("sda1"),
                DirEntryInfo::file("nvme0n1"),
            ],
            net_entries: vec![DirEntryInfo::file("eth0"), DirEntryInfo::file("lo")],
            tools: Vec::new(),
            tool_outputs: Vec::new(),
            discoveries: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_tool(mut self, name: &'static str) -> Self {
        self.tools.push(name);
        self
    }

    pub fn with_output(mut self, arg: &'static str, stdout: &'static str) -> Self {
        self.tool_outputs.push((arg, stdout));
        self
    }

    pub fn discovery_count(&self) -> usize {
        self.discoveries.load(Ordering::SeqCst)
    }
}

impl HostProbe for FakeProbe {
    fn hostname(&self) -> Result<String> {
        self.discoveries.fetch_add(1, Ordering::SeqCst);
        Ok(self.hostname.clone())
    }

    fn find_tool(&self, name: &str) -> Result<PathBuf> {
        if self.tools.contains(&name) {
            Ok(PathBuf::from("/fake/bin").join(name))
        } else {
            Err(CollectError::Message(format!("{name} not installed")))
        }
    }

    fn run_tool(&self, path: &Path, args: &[&str]) -> Result<String> {
        let arg = args.first().copied().unwrap_or_default();
        self.tool_outputs
            .iter()
            .find(|(key, _)| *key == arg)
            .map(|(_, stdout)| stdout.to_string())
            .ok_or_else(|| CollectError::Command {
                program: path.display().to_string(),
                reason: format!("{arg}: exit status 1"),
            })
    }

    fn list_dir(&self, path: &Path) -> Result<Vec<DirEntryInfo>> {
        if path.ends_with("net") {
            Ok(self.net_entries.clone())
        } else {
            Ok(self.dev_entries.clone())
        }
    }
}
