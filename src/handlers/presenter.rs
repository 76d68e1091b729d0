// handlers/presenter.rs - POST / on the presenter server

use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    response::Json,
};
use serde_json::Value;
use std::sync::Arc;

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::{parse_json, require_json};
use crate::presenter::{PresenterContext, PresenterRequest};

/// POST / - body `[{"presenter": "<name>", "data": {...}}]`, answered with a bare array
pub async fn handle_presenters(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Vec<Value>>, ApiError> {
    require_json(&headers)?;
    let payload = parse_json(&body)?;
    let principal = state.authenticator.authenticate(&headers).await?;
    let requests: Vec<PresenterRequest> = serde_json::from_value(payload)
        .map_err(|e| ApiError::validation_error(format!("Invalid presenter payload: {}", e)))?;

    let ctx = PresenterContext {
        user_id: principal.user_id,
        datastore: Arc::clone(&state.datastore),
    };
    let results = tokio::time::timeout(state.worker_timeout, state.presenters.handle(&ctx, &requests))
        .await
        .map_err(|_| ApiError::service_unavailable("Request timed out"))??;

    tracing::debug!("Presented {} result(s) for user {}", results.len(), principal.user_id);
    Ok(Json(results))
}
