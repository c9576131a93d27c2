mod health;
mod index;
mod metrics;
mod verify;

use crate::server::SharedState;
use axum::{
    routing::{get, post},
    Router,
};

pub fn api_routes() -> Router<SharedState> {
    Router::new()
        .route("/", get(index::index))
        .route("/healthcheck", get(health::healthcheck))
        .route("/verify_liveness", post(verify::verify_liveness))
        .route("/metrics", get(metrics::metrics_handler))
}
