//! Status endpoint handler.
//!
//! Plain-text table with the outcome of the last scrape and the discovered
//! environment.

use axum::{extract::State, response::IntoResponse};
use tracing::{debug, instrument};

use crate::state::SharedState;

/// Handler for the `/status` endpoint.
#[instrument(skip(state))]
pub async fn status_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing /status request");
    let mut out = state.status.render_table();
    out.push_str(&format!(
        "{:22} | {}s\n",
        "Exporter uptime",
        state.start_time.elapsed().as_secs()
    ));
    out
}
