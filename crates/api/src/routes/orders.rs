//! Order submission and cancellation endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::SagaId;
use domain::OrderRequest;
use monitor::{CancelOutcome, SagaHandle};

use super::AppState;
use crate::error::ApiError;

/// POST /orders submits a buy order and starts tracking its saga.
#[tracing::instrument(skip(state, request), fields(symbol = %request.stock_symbol))]
pub async fn submit(
    State(state): State<Arc<AppState>>,
    Json(request): Json<OrderRequest>,
) -> Result<(StatusCode, Json<SagaHandle>), ApiError> {
    let handle = state.monitor.submit(request).await?;
    Ok((StatusCode::CREATED, Json(handle)))
}

/// POST /orders/{saga_id}/cancel requests compensation of the tracked saga.
///
/// `202 Accepted` when a cancel request went out, `200 OK` when one was
/// already in flight or the saga is already compensating.
#[tracing::instrument(skip(state))]
pub async fn cancel(
    State(state): State<Arc<AppState>>,
    Path(saga_id): Path<String>,
) -> Result<(StatusCode, Json<CancelOutcome>), ApiError> {
    if saga_id.trim().is_empty() {
        return Err(ApiError::BadRequest("Saga id is required".to_string()));
    }

    let outcome = state.monitor.cancel(SagaId::new(saga_id)).await?;
    let status = match outcome {
        CancelOutcome::Requested { .. } => StatusCode::ACCEPTED,
        CancelOutcome::AlreadyInFlight | CancelOutcome::AlreadyCompensating => StatusCode::OK,
    };
    Ok((status, Json(outcome)))
}
