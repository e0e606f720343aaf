//! Progress view and tracker lifecycle endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use domain::StockSymbol;
use monitor::ProgressView;
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct SelectionRequest {
    pub symbol: String,
}

#[derive(Serialize)]
pub struct DismissResponse {
    pub dismissed: bool,
}

/// GET /progress returns what the UI should render.
pub async fn get(State(state): State<Arc<AppState>>) -> Result<Json<ProgressView>, ApiError> {
    Ok(Json(state.monitor.view().await?))
}

/// POST /progress/dismiss closes the notification and clears a finished
/// tracker.
#[tracing::instrument(skip(state))]
pub async fn dismiss(
    State(state): State<Arc<AppState>>,
) -> Result<Json<DismissResponse>, ApiError> {
    let dismissed = state.monitor.dismiss().await?;
    Ok(Json(DismissResponse { dismissed }))
}

/// POST /progress/reset abandons whatever is being tracked.
#[tracing::instrument(skip(state))]
pub async fn reset(State(state): State<Arc<AppState>>) -> Result<StatusCode, ApiError> {
    state.monitor.reset().await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /selection switches the instrument; tracking for another instrument
/// is abandoned.
#[tracing::instrument(skip(state, req), fields(symbol = %req.symbol))]
pub async fn select(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SelectionRequest>,
) -> Result<Json<ProgressView>, ApiError> {
    let symbol = StockSymbol::new(&req.symbol);
    if !symbol.is_well_formed() {
        return Err(ApiError::BadRequest(format!(
            "Invalid stock symbol: {}",
            req.symbol
        )));
    }

    state.monitor.select_instrument(symbol).await?;
    Ok(Json(state.monitor.view().await?))
}
