use axum::{extract::State, http::header, response::IntoResponse};
use pkg_constants::network::METRICS_CONTENT_TYPE;

use crate::AppState;

/// Sample process stats and render them in Prometheus text format.
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    state.process.collect(&state.metrics);
    (
        [(header::CONTENT_TYPE, METRICS_CONTENT_TYPE)],
        state.metrics.render(),
    )
}
