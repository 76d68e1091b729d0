// handlers/mod.rs - one module per endpoint
//
// Action server:    POST /         → action::handle_actions
// Presenter server: POST /         → presenter::handle_presenters
// Both:             GET  /health   → health::health
pub mod action;
pub mod health;
pub mod presenter;

use crate::error::ApiError;

/// Fallback for every method other than POST on `/`
pub async fn method_not_allowed() -> ApiError {
    ApiError::method_not_allowed()
}
