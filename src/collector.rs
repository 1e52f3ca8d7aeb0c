//! Collection orchestrator.
//!
//! One scrape refreshes the environment if it expired, runs every producer
//! concurrently on the blocking pool and streams each producer's single
//! outcome through a bounded channel. The channel closes once every task
//! has dropped its sender, which is the completion barrier for a scrape.
//! Results are rendered in arrival order, not producer order.

use chrono::Utc;
use std::any::Any;
use std::io::{self, Write};
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::bandwidth::DEFAULT_SPEEDTEST_TTL;
use crate::collectors::flashcache::DEFAULT_FLASHCACHE_STATS;
use crate::collectors::thermal::DEFAULT_THERMAL_DIR;
use crate::environment::{
    EnvironmentCache, EnvironmentSettings, EnvironmentSnapshot, HostProbe, SystemProbe,
};
use crate::error::{CollectError, ProducerError};
use crate::metric::Metric;
use crate::producers::{default_producers, Producer, Resources};
use crate::render;
use crate::status::Status;
use crate::ups::{UpsState, DEFAULT_NUT_PORT};
use crate::volumes::DEFAULT_VOLUME_TTL;

/// In-flight results buffered between producers and the writer.
const CHANNEL_CAPACITY: usize = 4;

/// Outcome of one producer invocation.
#[derive(Debug)]
pub enum CollectMessage {
    Batch(Vec<Metric>),
    Failed(ProducerError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsOptions {
    pub host: String,
    pub port: u16,
}

impl Default for UpsOptions {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_NUT_PORT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeedtestOptions {
    /// Fixed server, otherwise the closest one is used.
    pub server_id: Option<u32>,
    pub ttl: Duration,
}

impl Default for SpeedtestOptions {
    fn default() -> Self {
        Self {
            server_id: None,
            ttl: DEFAULT_SPEEDTEST_TTL,
        }
    }
}

/// Runtime options of the exporter engine.
#[derive(Debug, Clone)]
pub struct ExporterOptions {
    pub environment: EnvironmentSettings,
    pub volume_ttl: Duration,
    pub thermal_dir: PathBuf,
    pub flashcache_stats: PathBuf,
    /// Host to measure round-trip time against; no ping when unset.
    pub ping_target: Option<String>,
    /// NUT server to query; no UPS metrics when unset.
    pub ups: Option<UpsOptions>,
    /// Bandwidth measurement; disabled when unset.
    pub speedtest: Option<SpeedtestOptions>,
    pub render_timestamps: bool,
}

impl Default for ExporterOptions {
    fn default() -> Self {
        Self {
            environment: EnvironmentSettings::default(),
            volume_ttl: DEFAULT_VOLUME_TTL,
            thermal_dir: PathBuf::from(DEFAULT_THERMAL_DIR),
            flashcache_stats: PathBuf::from(DEFAULT_FLASHCACHE_STATS),
            ping_target: None,
            ups: Some(UpsOptions::default()),
            speedtest: None,
            render_timestamps: false,
        }
    }
}

/// Totals of one `write_metrics` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteSummary {
    pub metric_count: usize,
    pub failures: usize,
}

/// A started collection: the environment it runs against and the stream of
/// producer outcomes.
pub struct Collection {
    pub environment: Arc<EnvironmentSnapshot>,
    pub messages: mpsc::Receiver<CollectMessage>,
}

pub struct Exporter {
    environment: Arc<EnvironmentCache>,
    producers: Vec<Producer>,
    ups: Option<Arc<UpsState>>,
    status: Arc<Status>,
    render_timestamps: bool,
}

impl Exporter {
    /// Exporter for the local host with the full producer set.
    pub fn new(options: ExporterOptions, status: Arc<Status>) -> Self {
        Self::with_probe(options, Box::new(SystemProbe), status)
    }

    pub fn with_probe(
        options: ExporterOptions,
        probe: Box<dyn HostProbe>,
        status: Arc<Status>,
    ) -> Self {
        let resources = Resources::from_options(&options);
        let producers = default_producers(&options, &resources);
        let environment = EnvironmentCache::new(probe, options.environment.clone());
        Self {
            environment: Arc::new(environment),
            producers,
            ups: resources.ups,
            status,
            render_timestamps: options.render_timestamps,
        }
    }

    /// Exporter running an arbitrary producer list.
    pub fn with_producers(
        environment: EnvironmentCache,
        producers: Vec<Producer>,
        status: Arc<Status>,
    ) -> Self {
        Self {
            environment: Arc::new(environment),
            producers,
            ups: None,
            status,
            render_timestamps: false,
        }
    }

    pub fn render_timestamps(mut self, enabled: bool) -> Self {
        self.render_timestamps = enabled;
        self
    }

    pub fn producer_count(&self) -> usize {
        self.producers.len()
    }

    pub fn status(&self) -> &Arc<Status> {
        &self.status
    }

    /// Refreshes the environment if it expired and returns it.
    pub async fn environment(&self) -> Arc<EnvironmentSnapshot> {
        let cache = self.environment.clone();
        let now = Instant::now();
        match tokio::task::spawn_blocking(move || cache.ensure_fresh(now)).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("Environment discovery task failed: {}", e);
                self.environment.current()
            }
        }
    }

    /// Starts all producers and returns the stream of their outcomes.
    ///
    /// Exactly one message is delivered per producer; the receiver yields
    /// `None` after the last one.
    pub async fn collect(&self) -> Collection {
        let environment = self.environment().await;
        self.status
            .record_environment(&environment.devices, &environment.interfaces);

        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        for (idx, producer) in self.producers.iter().enumerate() {
            let tx = tx.clone();
            let producer = producer.clone();
            let env = environment.clone();
            tokio::task::spawn_blocking(move || {
                let message = run_producer(idx + 1, &producer, &env);
                if tx.blocking_send(message).is_err() {
                    debug!("Receiver gone, dropping result of {}", producer.name());
                }
            });
        }
        drop(tx);

        Collection {
            environment,
            messages: rx,
        }
    }

    /// Collects all producers and writes the exposition text to `sink`.
    ///
    /// Producer failures become `## retrieve metric #N: cause` comment
    /// lines; only sink errors abort the write.
    pub async fn write_metrics<W: Write + Send + ?Sized>(
        &self,
        sink: &mut W,
    ) -> io::Result<WriteSummary> {
        let started_at = Utc::now();
        let start = Instant::now();
        let Collection {
            environment,
            mut messages,
        } = self.collect().await;

        let mut summary = WriteSummary::default();
        while let Some(message) = messages.recv().await {
            match message {
                CollectMessage::Batch(metrics) => {
                    summary.metric_count += metrics.len();
                    for metric in &metrics {
                        render::write_metric(
                            sink,
                            &environment.hostname,
                            metric,
                            self.render_timestamps,
                        )?;
                    }
                }
                CollectMessage::Failed(error) => {
                    warn!("{}", error);
                    summary.failures += 1;
                    render::write_failure(sink, &error)?;
                }
            }
        }

        let elapsed = start.elapsed();
        debug!(
            "Wrote {} metrics with {} failures in {:?}",
            summary.metric_count, summary.failures, elapsed
        );
        self.status
            .record_fetch(started_at, elapsed, summary.metric_count, summary.failures);
        Ok(summary)
    }

    /// Releases long-lived connections.
    ///
    /// The UPS logout is blocking network I/O and runs off the async workers.
    pub async fn close(&self) {
        let Some(ups) = self.ups.clone() else {
            return;
        };
        if let Err(e) = tokio::task::spawn_blocking(move || ups.close()).await {
            warn!("UPS disconnect task failed: {}", e);
        }
    }
}

fn run_producer(ordinal: usize, producer: &Producer, env: &EnvironmentSnapshot) -> CollectMessage {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| producer.run(env)))
        .unwrap_or_else(|payload| Err(CollectError::Panicked(panic_message(payload.as_ref()))));
    match outcome {
        Ok(metrics) => CollectMessage::Batch(metrics),
        Err(source) => CollectMessage::Failed(ProducerError { ordinal, source }),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
