use axum::{
    routing::{get, post},
    Router,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::action::{ActionExecutor, ActionRegistry, RegistryError, RetryPolicy, SchemaError};
use crate::auth::{AuthError, Authenticator, TokenAuthenticator};
use crate::config::{AppConfig, ConfigError, DatastoreBackend};
use crate::datastore::{Datastore, DatastoreError, HttpDatastore, MemoryDatastore};
use crate::handlers;
use crate::permissions::{PermissionCatalog, PermissionCatalogError, PermissionGate};
use crate::presenter::PresenterRegistry;

/// Anything that stops the service from starting
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Permissions(#[from] PermissionCatalogError),

    #[error("Authentication setup failed: {0}")]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Datastore setup failed: {0}")]
    Datastore(#[from] DatastoreError),
}

/// Immutable state shared by every request
pub struct AppState {
    pub executor: ActionExecutor,
    pub presenters: PresenterRegistry,
    pub datastore: Arc<dyn Datastore>,
    pub authenticator: Arc<dyn Authenticator>,
    pub worker_timeout: Duration,
    pub enable_cors: bool,
}

impl AppState {
    /// Build registries and compile every schema; fails before any listener binds
    pub fn build(config: &AppConfig, datastore: Arc<dyn Datastore>) -> Result<Self, StartupError> {
        let registry = Arc::new(ActionRegistry::build()?);
        let catalog = Arc::new(PermissionCatalog::embedded()?);
        let retry = RetryPolicy {
            max_retries: config.action.max_retries,
            backoff: Duration::from_millis(config.action.retry_backoff_ms),
        };
        let executor = ActionExecutor::new(
            registry,
            Arc::clone(&datastore),
            PermissionGate::new(catalog),
            retry,
        )?;
        let authenticator = TokenAuthenticator::new(
            &config.security.token_secret,
            config.security.allow_guest,
        )?;

        Ok(Self {
            executor,
            presenters: PresenterRegistry::build(),
            datastore,
            authenticator: Arc::new(authenticator),
            worker_timeout: config.server.worker_timeout(),
            enable_cors: config.security.enable_cors,
        })
    }
}

/// Datastore backend selected by the configuration
pub async fn build_datastore(config: &AppConfig) -> Result<Arc<dyn Datastore>, StartupError> {
    let datastore = &config.datastore;
    match datastore.backend {
        DatastoreBackend::Http => {
            let reader = datastore.reader.url("datastore reader")?;
            let writer = datastore.writer.url("datastore writer")?;
            tracing::info!("Using datastore reader {} and writer {}", reader, writer);
            let http = HttpDatastore::new(
                reader,
                writer,
                Duration::from_secs(datastore.request_timeout_secs),
            )?;
            Ok(Arc::new(http))
        }
        DatastoreBackend::Memory => {
            let memory = match &datastore.initial_data {
                Some(path) => {
                    tracing::info!("Loading initial data from {}", path);
                    MemoryDatastore::from_file(path).await?
                }
                None => {
                    tracing::info!("Seeding memory datastore with the default superadmin");
                    MemoryDatastore::from_models(json!({
                        "organisation/1": {"name": "Organisation"},
                        "user/1": {
                            "username": "admin",
                            "organisation_management_level": "superadmin",
                            "is_active": true,
                        },
                    }))
                    .await?
                }
            };
            Ok(Arc::new(memory))
        }
    }
}

pub fn action_router(state: Arc<AppState>) -> Router {
    let router = Router::new()
        .route(
            "/",
            post(handlers::action::handle_actions).fallback(handlers::method_not_allowed),
        )
        .route("/health", get(handlers::health::health));
    finish(router, state)
}

pub fn presenter_router(state: Arc<AppState>) -> Router {
    let router = Router::new()
        .route(
            "/",
            post(handlers::presenter::handle_presenters).fallback(handlers::method_not_allowed),
        )
        .route("/health", get(handlers::health::health));
    finish(router, state)
}

fn finish(router: Router<Arc<AppState>>, state: Arc<AppState>) -> Router {
    let enable_cors = state.enable_cors;
    let router = router.with_state(state).layer(TraceLayer::new_for_http());
    if enable_cors {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    async fn state() -> Arc<AppState> {
        let config = AppConfig::development();
        let datastore = build_datastore(&config).await.unwrap();
        Arc::new(AppState::build(&config, datastore).unwrap())
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_method_not_allowed() {
        let response = action_router(state().await)
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(body_json(response).await["code"], "METHOD_NOT_ALLOWED");
    }

    #[tokio::test]
    async fn test_wrong_media_type() {
        let request = Request::post("/")
            .header(header::CONTENT_TYPE, "text/plain")
            .body(Body::from("[]"))
            .unwrap();
        let response = action_router(state().await).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await["message"],
            crate::middleware::json::WRONG_MEDIA_TYPE
        );
    }

    #[tokio::test]
    async fn test_presenter_router() {
        let request = Request::post("/")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"[{"presenter": "whoami"}]"#))
            .unwrap();
        let response = presenter_router(state().await).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, serde_json::json!([{"user_id": 0, "guest": true}]));
    }

    #[test]
    fn test_missing_secret_fails_startup() {
        let mut config = AppConfig::production();
        config.security.token_secret.clear();
        let datastore: Arc<dyn Datastore> = Arc::new(MemoryDatastore::new());
        assert!(matches!(
            AppState::build(&config, datastore),
            Err(StartupError::Auth(AuthError::InvalidSecret))
        ));
    }
}
