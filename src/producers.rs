//! The fixed, ordered producer set.
//!
//! Every slot is always present so that failure ordinals stay stable;
//! producers for disabled features (UPS, ping, bandwidth) return an empty
//! batch. Ordinals in failure messages are 1-based positions in this list:
//!
//! | # | producer     | # | producer          |
//! |---|--------------|---|-------------------|
//! | 1 | build info   | 9 | disk temperatures |
//! | 2 | uptime       | 10| volumes           |
//! | 3 | load average | 11| disk stats        |
//! | 4 | cpu ratios   | 12| flashcache        |
//! | 5 | meminfo      | 13| network counters  |
//! | 6 | ups          | 14| ping              |
//! | 7 | temperatures | 15| bandwidth         |
//! | 8 | fans         |   |                   |

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::bandwidth::{BandwidthState, SpeedtestCli};
use crate::collector::ExporterOptions;
use crate::collectors::{diskstats, flashcache, netdev, sysinfo, system};
use crate::environment::{EnvironmentSnapshot, IOSTAT};
use crate::error::Result;
use crate::metric::Metric;
use crate::ping::{collect_ping_metrics, Pinger, SystemPinger};
use crate::ups::{collect_ups_metrics, UpsState};
use crate::volumes::VolumeCache;

type ProducerFn = dyn Fn(&EnvironmentSnapshot) -> Result<Vec<Metric>> + Send + Sync;

/// A named unit of collection work.
#[derive(Clone)]
pub struct Producer {
    name: &'static str,
    run: Arc<ProducerFn>,
}

impl Producer {
    pub fn new<F>(name: &'static str, run: F) -> Self
    where
        F: Fn(&EnvironmentSnapshot) -> Result<Vec<Metric>> + Send + Sync + 'static,
    {
        Self {
            name,
            run: Arc::new(run),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn run(&self, env: &EnvironmentSnapshot) -> Result<Vec<Metric>> {
        (self.run)(env)
    }
}

impl fmt::Debug for Producer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Producer").field("name", &self.name).finish()
    }
}

/// Stateful sub-resources shared between producer invocations.
pub struct Resources {
    pub volumes: Arc<VolumeCache>,
    pub ups: Option<Arc<UpsState>>,
    pub bandwidth: Option<Arc<BandwidthState>>,
    pub pinger: Arc<dyn Pinger>,
}

impl Resources {
    pub fn from_options(options: &ExporterOptions) -> Self {
        Self {
            volumes: Arc::new(VolumeCache::new(options.volume_ttl)),
            ups: options
                .ups
                .as_ref()
                .map(|ups| Arc::new(UpsState::nut(ups.host.clone(), ups.port))),
            bandwidth: options.speedtest.as_ref().map(|speedtest| {
                Arc::new(BandwidthState::new(
                    Box::new(SpeedtestCli::default()),
                    speedtest.server_id,
                    speedtest.ttl,
                ))
            }),
            pinger: Arc::new(SystemPinger),
        }
    }
}

fn path_producer(
    name: &'static str,
    path: &Path,
    collect: fn(&Path) -> Result<Vec<Metric>>,
) -> Producer {
    let path: PathBuf = path.to_path_buf();
    Producer::new(name, move |_| collect(&path))
}

/// Builds the ordered producer set.
pub fn default_producers(options: &ExporterOptions, resources: &Resources) -> Vec<Producer> {
    let thermal_dir = options.thermal_dir.clone();
    let net_dir = options.environment.net_dir.clone();
    let volumes = resources.volumes.clone();
    let ups = resources.ups.clone();
    let bandwidth = resources.bandwidth.clone();
    let pinger = resources.pinger.clone();
    let ping_target = options.ping_target.clone();

    vec![
        Producer::new("build_info", |_| system::collect_build_info()),
        path_producer("uptime", Path::new(system::PROC_UPTIME), system::collect_uptime),
        path_producer("loadavg", Path::new(system::PROC_LOADAVG), system::collect_load),
        Producer::new("cpu", |env| {
            system::collect_cpu(env.tool(IOSTAT), Path::new(system::PROC_STAT))
        }),
        path_producer("meminfo", Path::new(system::PROC_MEMINFO), system::collect_meminfo),
        Producer::new("ups", move |_| match &ups {
            Some(state) => collect_ups_metrics(state),
            None => Ok(Vec::new()),
        }),
        Producer::new("temperature", move |env| {
            sysinfo::collect_temperatures(env, &thermal_dir)
        }),
        Producer::new("fans", sysinfo::collect_fans),
        Producer::new("disk_temperature", sysinfo::collect_disk_temperatures),
        Producer::new("volumes", move |env| sysinfo::collect_volumes(env, &volumes)),
        Producer::new("diskstats", |env| {
            diskstats::collect_diskstats(env, Path::new(diskstats::PROC_DISKSTATS))
        }),
        path_producer(
            "flashcache",
            &options.flashcache_stats,
            flashcache::collect_flashcache,
        ),
        Producer::new("netdev", move |env| netdev::collect_netdev(env, &net_dir)),
        Producer::new("ping", move |_| match ping_target.as_deref() {
            Some(target) => collect_ping_metrics(pinger.as_ref(), target),
            None => Ok(Vec::new()),
        }),
        Producer::new("bandwidth", move |_| match &bandwidth {
            Some(state) => state.collect(Instant::now()),
            None => Ok(Vec::new()),
        }),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_producer_order_is_fixed() {
        let options = ExporterOptions::default();
        let resources = Resources::from_options(&options);
        let names: Vec<&str> = default_producers(&options, &resources)
            .iter()
            .map(Producer::name)
            .collect();
        assert_eq!(
            names,
            [
                "build_info",
                "uptime",
                "loadavg",
                "cpu",
                "meminfo",
                "ups",
                "temperature",
                "fans",
                "disk_temperature",
                "volumes",
                "diskstats",
                "flashcache",
                "netdev",
                "ping",
                "bandwidth",
            ]
        );
    }

    #[test]
    fn test_disabled_features_yield_empty_batches() {
        let options = ExporterOptions {
            ups: None,
            speedtest: None,
            ping_target: None,
            ..Default::default()
        };
        let resources = Resources::from_options(&options);
        let producers = default_producers(&options, &resources);
        let env = EnvironmentSnapshot::default();
        for name in ["ups", "ping", "bandwidth"] {
            let producer = producers.iter().find(|p| p.name() == name).unwrap();
            assert!(producer.run(&env).unwrap().is_empty(), "{name}");
        }
    }

    #[test]
    fn test_build_info_carries_version() {
        let metrics = system::collect_build_info().unwrap();
        assert_eq!(metrics.len(), 1);
        assert!(metrics[0]
            .labels
            .contains(&format!("version=\"{}\"", env!("CARGO_PKG_VERSION"))));
    }
}
