use crate::scoring::{Decision, PresenceReport};
use crate::server::SharedState;
use axum::{
    extract::{rejection::JsonRejection, State},
    response::Json,
};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::instrument;

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    #[serde(default)]
    pub frames: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub decision: Decision,
    pub message: String,
    pub presence_percent: f64,
    pub frames_analyzed: usize,
}

impl From<PresenceReport> for VerifyResponse {
    fn from(report: PresenceReport) -> Self {
        Self {
            decision: report.decision,
            message: report.message,
            presence_percent: round_to_tenth(report.presence_percent),
            frames_analyzed: report.frames_analyzed,
        }
    }
}

fn round_to_tenth(percent: f64) -> f64 {
    (percent * 10.0).round() / 10.0
}

/// Score a burst of frames and return the approve/decline decision.
///
/// A body that cannot be read as JSON becomes a Decline carrying the
/// error text; the response is 200 either way so the caller always gets
/// a decision-shaped body.
#[instrument(skip(state, payload))]
pub async fn verify_liveness(
    State(state): State<SharedState>,
    payload: Result<Json<VerifyRequest>, JsonRejection>,
) -> Json<VerifyResponse> {
    state.metrics.record_request("verify_liveness");
    let started = Instant::now();

    let report = match payload {
        Ok(Json(request)) => state.scorer.score(&request.frames),
        Err(rejection) => {
            tracing::warn!(error = %rejection, "Failed to read request body");
            PresenceReport::declined(rejection.to_string())
        }
    };

    state
        .metrics
        .record_scoring_duration(started.elapsed().as_millis() as u64, "verify_liveness");
    state.metrics.record_decision(report.decision);

    Json(VerifyResponse::from(report))
}
