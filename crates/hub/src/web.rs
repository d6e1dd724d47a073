use anyhow::{Context, Result};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use std::env;
use std::net::SocketAddr;
use tempwatch_compliance::{parse_reading, validate_reading, Alert, InputError};
use thiserror::Error;
use time::OffsetDateTime;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::state::{SharedState, UnitView};

// ---------------------------------------------------------------------------
// Request / response bodies
// ---------------------------------------------------------------------------

/// A reading as typed by an operator or sent by a client: either a JSON
/// number or the raw text from an input field.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum TempInput {
    Number(f64),
    Text(String),
}

impl TempInput {
    fn validate(&self) -> Result<f64, InputError> {
        match self {
            TempInput::Number(t) => validate_reading(*t),
            TempInput::Text(s) => parse_reading(s),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ReadingRequest {
    pub temp: TempInput,
}

#[derive(Serialize)]
pub struct ReadingResponse {
    pub unit: UnitView,
    pub alerts: Vec<Alert>,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("unknown unit '{0}'")]
    UnknownUnit(String),

    #[error(transparent)]
    InvalidReading(#[from] InputError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::UnknownUnit(_) => StatusCode::NOT_FOUND,
            ApiError::InvalidReading(_) => StatusCode::UNPROCESSABLE_ENTITY,
        };
        let body = serde_json::json!({ "error": self.to_string() });
        (status, Json(body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// Routes
// ---------------------------------------------------------------------------

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/api/status", get(api_status))
        .route("/api/units/{unit_id}", get(api_unit))
        .route("/api/units/{unit_id}/readings", post(api_record_reading))
        .with_state(state)
}

async fn api_status(State(state): State<SharedState>) -> impl IntoResponse {
    let st = state.read().await;
    Json(st.to_status(OffsetDateTime::now_utc()))
}

async fn api_unit(
    State(state): State<SharedState>,
    Path(unit_id): Path<String>,
) -> Result<Json<UnitView>, ApiError> {
    let st = state.read().await;
    st.unit_view(&unit_id, OffsetDateTime::now_utc())
        .map(Json)
        .ok_or(ApiError::UnknownUnit(unit_id))
}

async fn api_record_reading(
    State(state): State<SharedState>,
    Path(unit_id): Path<String>,
    Json(req): Json<ReadingRequest>,
) -> Result<Json<ReadingResponse>, ApiError> {
    // Hold the write lock across evaluate + store so no other reading for
    // this unit can slip in between.
    let mut st = state.write().await;

    let temp = match req.temp.validate() {
        Ok(t) => t,
        Err(e) => {
            warn!(unit = %unit_id, "rejected reading: {e}");
            st.record_error(format!("{unit_id}: rejected reading: {e}"));
            return Err(e.into());
        }
    };

    let now = OffsetDateTime::now_utc();
    let eval = st
        .record_reading(&unit_id, temp, now)
        .ok_or_else(|| ApiError::UnknownUnit(unit_id.clone()))?;
    let unit = st
        .unit_view(&unit_id, now)
        .ok_or_else(|| ApiError::UnknownUnit(unit_id.clone()))?;

    Ok(Json(ReadingResponse {
        unit,
        alerts: eval.alerts,
    }))
}

// ---------------------------------------------------------------------------
// Server entry-point
// ---------------------------------------------------------------------------

pub async fn serve(state: SharedState) -> Result<()> {
    let port: u16 = env::var("WEB_PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind web port {port}"))?;

    info!(%addr, "web api listening");

    axum::serve(listener, router(state))
        .await
        .context("web server error")
}

// ===========================================================================
// Tests
// ===========================================================================
