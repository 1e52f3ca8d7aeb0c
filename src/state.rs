//! Application state management for the exporter.
//!
//! This module defines the shared application state that is passed
//! to HTTP handlers.

use prometheus::{Counter, Gauge, Registry};
use qnap_node_exporter::{Exporter, Status};
use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;

/// Type alias for shared application state.
pub type SharedState = Arc<AppState>;

/// Global application state shared across requests.
pub struct AppState {
    pub exporter: Exporter,
    pub status: Arc<Status>,
    pub config: Arc<Config>,
    pub registry: Registry,
    pub scrape_duration: Gauge,
    pub metrics_total: Gauge,
    pub producer_failures: Counter,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}
