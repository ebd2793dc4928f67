//! Aggregator daemon: HTTP boundary for the vote aggregation service.
//!
//! POST /prove drives one aggregation step; GET /status reports readiness;
//! GET /latest/:election returns the persisted tally for an election.
//! Composition time is unbounded, so every prove request runs under a
//! caller-visible timeout and expiry is reported as a retryable failure.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;

use pcd::TranscriptBackend;
use primitives::{ElectionId, ELECTION_ID_LEN};
use service::{AggregationService, MemStore, StoredTally, SubmitRequest, SubmitResponse};

const DEFAULT_ADDR: &str = "127.0.0.1:8001";
const DEFAULT_TIMEOUT_SECS: u64 = 300;

#[derive(Clone)]
struct AppState {
    service: Arc<AggregationService<TranscriptBackend, MemStore>>,
    prove_timeout: Duration,
}

#[derive(Serialize)]
struct Status {
    ready: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let addr = std::env::var("AGGD_ADDR").unwrap_or_else(|_| DEFAULT_ADDR.to_string());
    let prove_timeout = std::env::var("AGGD_TIMEOUT_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .map(Duration::from_secs)
        .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS));

    let service = Arc::new(AggregationService::new(
        TranscriptBackend::new(),
        MemStore::new(),
    ));
    service
        .ensure_ready()
        .await
        .map_err(|e| anyhow::anyhow!("proving subsystem failed to initialize: {e}"))?;
    log::info!("proving subsystem ready");

    let state = AppState {
        service,
        prove_timeout,
    };
    let app = Router::new()
        .route("/prove", post(prove))
        .route("/status", get(status))
        .route("/latest/:election", get(latest))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    log::info!("aggd listening on {addr}");
    axum::serve(listener, app).await.context("server exited")?;
    Ok(())
}

async fn prove(State(state): State<AppState>, Json(request): Json<SubmitRequest>) -> Json<SubmitResponse> {
    match tokio::time::timeout(state.prove_timeout, state.service.submit(request)).await {
        Ok(response) => Json(response),
        Err(_) => {
            // Expiry never implies success; the caller must retry and only
            // trust states it saw persisted in a success response.
            log::warn!("prove request exceeded {:?}", state.prove_timeout);
            Json(SubmitResponse::from_code("timeout"))
        }
    }
}

async fn status(State(state): State<AppState>) -> Json<Status> {
    Json(Status {
        ready: state.service.is_ready(),
    })
}

async fn latest(
    State(state): State<AppState>,
    Path(election): Path<String>,
) -> Result<Json<StoredTally>, StatusCode> {
    let bytes: [u8; ELECTION_ID_LEN] = hex::decode(&election)
        .ok()
        .and_then(|v| v.try_into().ok())
        .ok_or(StatusCode::BAD_REQUEST)?;
    match state.service.latest(&ElectionId(bytes)).await {
        Ok(Some(stored)) => Ok(Json(stored)),
        Ok(None) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            log::error!("loading latest tally failed: {e}");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}
