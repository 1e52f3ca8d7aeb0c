//! Metrics endpoint handler for Prometheus scraping.
//!
//! Runs one collection pass per request and returns the exposition text,
//! followed by the exporter's own telemetry unless it is disabled.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
};
use prometheus::{Encoder, TextEncoder};
use std::time::Instant;
use tracing::{debug, error, instrument};

use crate::state::SharedState;

/// Initial buffer capacity for one scrape.
const BUFFER_CAP: usize = 64 * 1024;

const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Error type for metrics endpoint failures.
#[derive(Debug)]
pub enum MetricsError {
    WriteFailed,
    EncodingFailed,
}

impl IntoResponse for MetricsError {
    fn into_response(self) -> axum::response::Response {
        let message = match self {
            MetricsError::WriteFailed => "Failed to write metrics",
            MetricsError::EncodingFailed => "Failed to encode metrics",
        };
        (StatusCode::INTERNAL_SERVER_ERROR, message).into_response()
    }
}

/// Handler for the /metrics endpoint.
#[instrument(skip(state))]
pub async fn metrics_handler(
    State(state): State<SharedState>,
) -> Result<impl IntoResponse, MetricsError> {
    let start = Instant::now();
    debug!("Processing /metrics request");

    let mut buffer = Vec::with_capacity(BUFFER_CAP);
    let summary = state.exporter.write_metrics(&mut buffer).await.map_err(|e| {
        error!("Failed to write metrics: {}", e);
        MetricsError::WriteFailed
    })?;

    state.scrape_duration.set(start.elapsed().as_secs_f64());
    state.metrics_total.set(summary.metric_count as f64);
    state.producer_failures.inc_by(summary.failures as f64);

    if state.config.enable_telemetry.unwrap_or(true) {
        let families = state.registry.gather();
        if TextEncoder::new().encode(&families, &mut buffer).is_err() {
            error!("Failed to encode exporter telemetry");
            return Err(MetricsError::EncodingFailed);
        }
    }

    debug!(
        "Metrics request completed: {} metrics, {} failures, {} bytes, {:.3}ms",
        summary.metric_count,
        summary.failures,
        buffer.len(),
        start.elapsed().as_secs_f64() * 1000.0
    );

    Ok(([(header::CONTENT_TYPE, CONTENT_TYPE)], buffer))
}
