//! Integration tests for the collection orchestrator.
//!
//! These tests run `Exporter` with synthetic producers to verify that every
//! producer reports exactly once, that failures are rendered in place and
//! that slow producers do not hold back fast ones.

mod common;

use chrono::{TimeZone, Utc};
use common::FakeProbe;
use qnap_node_exporter::collector::CollectMessage;
use qnap_node_exporter::environment::EnvironmentSettings;
use qnap_node_exporter::{
    CollectError, EnvironmentCache, Exporter, Metric, Producer, Status,
};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn exporter(producers: Vec<Producer>) -> Exporter {
    let cache = EnvironmentCache::new(
        Box::new(FakeProbe::new("nas01")),
        EnvironmentSettings::default(),
    );
    Exporter::with_producers(cache, producers, Arc::new(Status::new()))
}

fn two_metrics() -> Producer {
    Producer::new("two", |_| {
        Ok(vec![
            Metric::gauge("node_load1", "1m load average", 0.5),
            Metric::new("node_load5", 0.25),
        ])
    })
}

fn refused() -> Producer {
    Producer::new("refused", |_| {
        Err(CollectError::Message("connection refused".into()))
    })
}

fn empty() -> Producer {
    Producer::new("empty", |_| Ok(Vec::new()))
}

#[tokio::test]
async fn test_failure_rendered_between_metrics() {
    let exporter = exporter(vec![two_metrics(), refused(), empty()]);
    let mut out = Vec::new();

    let summary = exporter.write_metrics(&mut out).await.unwrap();
    let text = String::from_utf8(out).unwrap();

    assert_eq!(summary.metric_count, 2);
    assert_eq!(summary.failures, 1);
    assert!(text.contains("# HELP node_load1 1m load average\n"));
    assert!(text.contains("# TYPE node_load1 gauge\n"));
    assert!(text.contains("node_load1{node=\"nas01\"} 0.5\n"));
    assert!(text.contains("node_load5{node=\"nas01\"} 0.25\n"));
    assert!(text.contains("## retrieve metric #2: connection refused\n"));
    assert!(!text.contains("# HELP node_load5"));
}

#[tokio::test]
async fn test_one_message_per_producer() {
    let producers: Vec<Producer> = (0..20)
        .map(|i| {
            if i % 3 == 0 {
                refused()
            } else {
                two_metrics()
            }
        })
        .collect();
    let exporter = exporter(producers);

    let mut collection = exporter.collect().await;
    let mut batches = 0;
    let mut failures = Vec::new();
    while let Some(message) = collection.messages.recv().await {
        match message {
            CollectMessage::Batch(_) => batches += 1,
            CollectMessage::Failed(e) => failures.push(e.ordinal),
        }
    }

    failures.sort_unstable();
    assert_eq!(batches + failures.len(), 20);
    assert_eq!(failures, vec![1, 4, 7, 10, 13, 16, 19]);
}

#[tokio::test]
async fn test_slow_producer_does_not_block_others() {
    let slow = Producer::new("slow", |_| {
        thread::sleep(Duration::from_millis(500));
        Ok(vec![Metric::new("slow", 1.0)])
    });
    let fast = Producer::new("fast", |_| Ok(vec![Metric::new("fast", 1.0)]));
    let exporter = exporter(vec![slow, fast]);

    let mut collection = exporter.collect().await;
    let first = collection.messages.recv().await.unwrap();
    match first {
        CollectMessage::Batch(metrics) => assert_eq!(metrics[0].name, "fast"),
        other => panic!("unexpected {other:?}"),
    }
    assert!(collection.messages.recv().await.is_some());
    assert!(collection.messages.recv().await.is_none());
}

#[tokio::test]
async fn test_panicking_producer_reports_failure() {
    let boom = Producer::new("boom", |_| panic!("sensor exploded"));
    let exporter = exporter(vec![boom, empty()]);
    let mut out = Vec::new();

    let summary = exporter.write_metrics(&mut out).await.unwrap();
    let text = String::from_utf8(out).unwrap();

    assert_eq!(summary.failures, 1);
    assert!(text.contains("## retrieve metric #1: producer panicked: sensor exploded\n"));
}

#[tokio::test]
async fn test_all_producers_fail_yields_only_comments() {
    let exporter = exporter(vec![refused(), refused()]);
    let mut out = Vec::new();

    let summary = exporter.write_metrics(&mut out).await.unwrap();
    let text = String::from_utf8(out).unwrap();

    assert_eq!(summary.metric_count, 0);
    assert_eq!(text.lines().count(), 2);
    assert!(text.lines().all(|l| l.starts_with("## retrieve metric #")));
}

#[tokio::test]
async fn test_write_updates_status() {
    let exporter = exporter(vec![two_metrics(), refused()]);
    let mut out = Vec::new();
    exporter.write_metrics(&mut out).await.unwrap();

    let status = exporter.status().snapshot().unwrap();
    assert_eq!(status.metric_count, 2);
    assert_eq!(status.failed_producers, 1);
    assert_eq!(status.total_fetches, 1);
    assert!(status.last_fetch.is_some());
    assert_eq!(status.interfaces, vec!["eth0".to_string()]);
}

#[tokio::test]
async fn test_timestamps_rendered_when_enabled() {
    let ts = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
    let producer = Producer::new("ping", move |_| {
        Ok(vec![Metric::new("node_network_external_roundtrip_time_ms", f64::NAN)
            .with_label("target", "1.1.1.1")
            .with_timestamp(ts)])
    });

    let plain = exporter(vec![producer.clone()]);
    let mut out = Vec::new();
    plain.write_metrics(&mut out).await.unwrap();
    assert_eq!(
        String::from_utf8(out).unwrap(),
        "node_network_external_roundtrip_time_ms{node=\"nas01\",target=\"1.1.1.1\"} NaN\n"
    );

    let stamped = exporter(vec![producer]).render_timestamps(true);
    let mut out = Vec::new();
    stamped.write_metrics(&mut out).await.unwrap();
    assert!(String::from_utf8(out)
        .unwrap()
        .ends_with("NaN 1700000000000\n"));
}
