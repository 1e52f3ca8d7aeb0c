//! External round-trip latency via the system `ping` binary.

use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use std::process::Command;
use std::time::Duration;

use crate::error::{CollectError, Result};
use crate::metric::Metric;

/// Upper bound for a single ping probe.
pub const PING_TIMEOUT: Duration = Duration::from_secs(2);

static ADDRESS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^PING \S+?\s?\(([^)]+)\)").expect("valid regex"));
static LOSS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([\d.]+)% packet loss").expect("valid regex"));
static RTT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"= [\d.]+/([\d.]+)/").expect("valid regex"));

#[derive(Debug, Clone, PartialEq)]
pub struct PingStats {
    pub address: String,
    pub avg_rtt: Option<Duration>,
    /// Lost packets in percent.
    pub packet_loss: f64,
}

pub trait Pinger: Send + Sync {
    fn ping(&self, target: &str, timeout: Duration) -> Result<PingStats>;
}

/// Runs one ICMP echo through `ping -n -c 1 -W <timeout>`.
///
/// Works with both iputils and busybox output.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemPinger;

impl Pinger for SystemPinger {
    fn ping(&self, target: &str, timeout: Duration) -> Result<PingStats> {
        let wait = timeout.as_secs().max(1).to_string();
        let output = Command::new("ping")
            .args(["-n", "-c", "1", "-W", &wait, target])
            .output()
            .map_err(|e| CollectError::Ping {
                target: target.to_string(),
                reason: e.to_string(),
            })?;

        // ping exits 1 on packet loss; the statistics are still valid.
        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_ping_output(target, &stdout).map_err(|e| match e {
            CollectError::Ping { target, .. } if !output.stderr.is_empty() => CollectError::Ping {
                target,
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            },
            other => other,
        })
    }
}

pub fn parse_ping_output(target: &str, output: &str) -> Result<PingStats> {
    let address = ADDRESS_RE
        .captures(output)
        .map(|c| c[1].to_string())
        .ok_or_else(|| CollectError::Ping {
            target: target.to_string(),
            reason: "no reply header".into(),
        })?;

    let packet_loss = LOSS_RE
        .captures(output)
        .and_then(|c| c[1].parse::<f64>().ok())
        .ok_or_else(|| CollectError::Ping {
            target: target.to_string(),
            reason: "no packet statistics".into(),
        })?;

    let avg_rtt = RTT_RE
        .captures(output)
        .and_then(|c| c[1].parse::<f64>().ok())
        .map(|ms| Duration::from_secs_f64(ms / 1000.0));

    Ok(PingStats {
        address,
        avg_rtt,
        packet_loss,
    })
}

/// Round-trip time in milliseconds, `NaN` when any packet was lost.
pub fn collect_ping_metrics(pinger: &dyn Pinger, target: &str) -> Result<Vec<Metric>> {
    let stats = pinger.ping(target, PING_TIMEOUT)?;
    let value = match stats.avg_rtt {
        Some(rtt) if stats.packet_loss == 0.0 => rtt.as_secs_f64() * 1000.0,
        _ => f64::NAN,
    };

    Ok(vec![Metric::gauge(
        "node_network_external_roundtrip_time_ms",
        "Round-trip time to the external ping target in milliseconds",
        value,
    )
    .with_label("target", &stats.address)
    .with_timestamp(Utc::now())])
}

#[cfg(test)]
mod tests {
    use super::*;

    const IPUTILS_OK: &str = "PING one.one.one.one (1.1.1.1) 56(84) bytes of data.
64 bytes from one.one.one.one (1.1.1.1): icmp_seq=1 ttl=57 time=12.3 ms

--- one.one.one.one ping statistics ---
1 packets transmitted, 1 received, 0% packet loss, time 0ms
rtt min/avg/max/mdev = 12.345/12.345/12.345/0.000 ms
";

    const BUSYBOX_LOST: &str = "PING 10.0.0.99 (10.0.0.99): 56 data bytes

--- 10.0.0.99 ping statistics ---
1 packets transmitted, 0 packets received, 100% packet loss
";

    const IPUTILS_IPV6_OK: &str = "PING ::1(::1) 56 data bytes
64 bytes from ::1: icmp_seq=1 ttl=64 time=0.030 ms

--- ::1 ping statistics ---
1 packets transmitted, 1 received, 0% packet loss, time 0ms
rtt min/avg/max/mdev = 0.030/0.030/0.030/0.000 ms
";

    struct FixedPinger(PingStats);

    impl Pinger for FixedPinger {
        fn ping(&self, _target: &str, _timeout: Duration) -> Result<PingStats> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn test_parse_iputils_ipv6_literal() {
        let stats = parse_ping_output("::1", IPUTILS_IPV6_OK).unwrap();
        assert_eq!(stats.address, "::1");
        assert_eq!(stats.packet_loss, 0.0);
        let rtt_ms = stats.avg_rtt.unwrap().as_secs_f64() * 1000.0;
        assert!((rtt_ms - 0.030).abs() < 1e-6);
    }

    #[test]
    fn test_parse_iputils_output() {
        let stats = parse_ping_output("one.one.one.one", IPUTILS_OK).unwrap();
        assert_eq!(stats.address, "1.1.1.1");
        assert_eq!(stats.packet_loss, 0.0);
        let rtt_ms = stats.avg_rtt.unwrap().as_secs_f64() * 1000.0;
        assert!((rtt_ms - 12.345).abs() < 1e-6);
    }

    #[test]
    fn test_parse_busybox_loss() {
        let stats = parse_ping_output("10.0.0.99", BUSYBOX_LOST).unwrap();
        assert_eq!(stats.address, "10.0.0.99");
        assert_eq!(stats.packet_loss, 100.0);
        assert!(stats.avg_rtt.is_none());
    }

    #[test]
    fn test_parse_unknown_host() {
        let result = parse_ping_output("nope.invalid", "");
        assert!(matches!(result, Err(CollectError::Ping { .. })));
    }

    #[test]
    fn test_lost_packet_reports_nan() {
        let pinger = FixedPinger(PingStats {
            address: "10.0.0.99".into(),
            avg_rtt: Some(Duration::from_millis(5)),
            packet_loss: 50.0,
        });
        let metrics = collect_ping_metrics(&pinger, "10.0.0.99").unwrap();
        assert_eq!(metrics.len(), 1);
        assert!(metrics[0].value.is_nan());
        assert_eq!(metrics[0].labels, r#"target="10.0.0.99""#);
        assert!(metrics[0].timestamp.is_some());
    }

    #[test]
    fn test_reply_reports_milliseconds() {
        let pinger = FixedPinger(PingStats {
            address: "1.1.1.1".into(),
            avg_rtt: Some(Duration::from_micros(12_500)),
            packet_loss: 0.0,
        });
        let metrics = collect_ping_metrics(&pinger, "1.1.1.1").unwrap();
        assert!((metrics[0].value - 12.5).abs() < 1e-9);
    }
}
