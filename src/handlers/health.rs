use axum::{extract::State, http::StatusCode, response::Json};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::app::AppState;
use crate::datastore::Filter;
use crate::models::Collection;

/// GET /health - liveness plus a datastore probe
pub async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<Value>) {
    let now = chrono::Utc::now();

    match state
        .datastore
        .exists(Collection::Organisation, &Filter::eq("id", 1))
        .await
    {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "datastore": "ok"
                }
            })),
        ),
        Err(e) => {
            tracing::warn!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "message": "datastore unavailable",
                    "data": {
                        "status": "degraded",
                        "timestamp": now
                    }
                })),
            )
        }
    }
}
