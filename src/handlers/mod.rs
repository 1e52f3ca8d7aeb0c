//! HTTP endpoint handlers for the exporter.
//!
//! This module provides handlers for all HTTP endpoints:
//! - `/`: Landing page
//! - `/metrics`: Prometheus metrics endpoint
//! - `/status`: Last scrape and discovery status

pub mod metrics;
pub mod root;
pub mod status;

// Re-export handlers
pub use metrics::metrics_handler;
pub use root::root_handler;
pub use status::status_handler;
