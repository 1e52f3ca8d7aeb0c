//! Network interface byte counters.
//!
//! Reads `<net_dir>/<iface>/statistics/{rx,tx}_bytes` for every interface
//! found during environment discovery.

use std::path::Path;

use crate::environment::EnvironmentSnapshot;
use crate::error::Result;
use crate::exec::{parse_f64, read_trimmed};
use crate::metric::{strip_repeated_meta, Metric};

/// Byte counters of one interface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NetDevStats {
    pub receive_bytes: f64,
    pub transmit_bytes: f64,
}

pub fn read_interface_stats(net_dir: &Path, interface: &str) -> Result<NetDevStats> {
    let statistics = net_dir.join(interface).join("statistics");
    let rx = read_trimmed(statistics.join("rx_bytes"))?;
    let tx = read_trimmed(statistics.join("tx_bytes"))?;
    Ok(NetDevStats {
        receive_bytes: parse_f64("rx_bytes", &rx)?,
        transmit_bytes: parse_f64("tx_bytes", &tx)?,
    })
}

pub fn collect_netdev(env: &EnvironmentSnapshot, net_dir: &Path) -> Result<Vec<Metric>> {
    let mut metrics = Vec::with_capacity(env.interfaces.len() * 2);
    for interface in &env.interfaces {
        let stats = read_interface_stats(net_dir, interface)?;
        metrics.push(
            Metric::counter(
                "node_network_receive_bytes_total",
                "Total number of bytes received",
                stats.receive_bytes,
            )
            .with_label("device", interface),
        );
        metrics.push(
            Metric::counter(
                "node_network_transmit_bytes_total",
                "Total number of bytes transmitted",
                stats.transmit_bytes,
            )
            .with_label("device", interface),
        );
    }
    Ok(strip_repeated_meta(metrics))
}
