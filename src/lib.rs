//! QNAP Node Exporter Library
//!
//! Collection engine for a Prometheus exporter reporting the health of a
//! QNAP NAS: uptime, load, CPU, memory, sensors, volumes, disk and network
//! I/O, UPS state and external network quality. It is framework-agnostic;
//! the binary wires it into an HTTP server.
//!
//! # Architecture
//!
//! - [`environment`]: host discovery (hostname, tools, devices, interfaces),
//!   cached for five minutes.
//! - [`producers`]: the fixed, ordered set of metric producers.
//! - [`collector`]: runs all producers concurrently per scrape and streams
//!   their outcomes into the [`render`]er.
//! - [`ups`], [`bandwidth`], [`volumes`]: state kept across scrapes.
//!
//! # Usage
//!
//! ```rust,no_run
//! use qnap_node_exporter::{Exporter, ExporterOptions, Status};
//! use std::sync::Arc;
//!
//! # async fn run() -> std::io::Result<()> {
//! let exporter = Exporter::new(ExporterOptions::default(), Arc::new(Status::new()));
//! let mut body = Vec::new();
//! let summary = exporter.write_metrics(&mut body).await?;
//! println!("{} metrics, {} failed producers", summary.metric_count, summary.failures);
//! exporter.close().await;
//! # Ok(())
//! # }
//! ```

pub mod bandwidth;
pub mod collector;
pub mod collectors;
pub mod environment;
pub mod error;
pub mod exec;
pub mod metric;
pub mod ping;
pub mod producers;
pub mod render;
pub mod status;
pub mod ups;
pub mod volumes;

// Re-export main types for convenience
pub use collector::{
    CollectMessage, Collection, Exporter, ExporterOptions, SpeedtestOptions, UpsOptions,
    WriteSummary,
};
pub use environment::{EnvironmentCache, EnvironmentSettings, EnvironmentSnapshot, HostProbe};
pub use error::{CollectError, ProducerError};
pub use metric::{Metric, MetricType};
pub use producers::Producer;
pub use status::Status;
