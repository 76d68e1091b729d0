// handlers/action.rs - POST / on the action server

use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
};
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

use crate::action::ActionResults;
use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::{parse_json, require_json, ApiResponse, ApiResult};

/**
 * POST / - Execute a list of actions as one transaction
 *
 * Body: `[{"action": "<name>", "data": [{...}, ...]}, ...]`
 *
 * @returns one result list per action, `{"id": n}` per created instance
 */
pub async fn handle_actions(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<ActionResults> {
    require_json(&headers)?;
    let payload = parse_json(&body)?;
    let principal = state.authenticator.authenticate(&headers).await?;
    let requests = state.executor.parse_payload(&payload)?;

    let request_id = Uuid::new_v4();
    let span = tracing::info_span!("action_request", %request_id, user_id = principal.user_id);
    let names: Vec<&str> = requests.iter().map(|r| r.action.as_str()).collect();
    span.in_scope(|| tracing::info!("Handling actions {:?}", names));

    let work = state
        .executor
        .execute(principal.user_id, &requests)
        .instrument(span.clone());
    let results = tokio::time::timeout(state.worker_timeout, work)
        .await
        .map_err(|_| {
            span.in_scope(|| tracing::warn!("Request exceeded {:?}", state.worker_timeout));
            ApiError::service_unavailable("Request timed out")
        })??;

    span.in_scope(|| tracing::info!("Actions handled successfully"));
    Ok(ApiResponse::success(results))
}
