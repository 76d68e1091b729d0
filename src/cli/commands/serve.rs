use anyhow::Context;
use axum::Router;
use std::sync::Arc;

use crate::app::{self, AppState};
use crate::config::{AppConfig, Component};

pub async fn handle(config: &AppConfig, component: Option<Component>) -> anyhow::Result<()> {
    // CLI flag wins over BACKEND_COMPONENT
    let component = component.unwrap_or(config.server.component);

    let datastore = app::build_datastore(config).await?;
    let state = Arc::new(AppState::build(config, datastore)?);
    tracing::info!(
        "Starting {} component(s) in {:?} mode, worker timeout {:?}",
        component,
        config.environment,
        state.worker_timeout
    );

    match component {
        Component::Action => {
            serve("action", &config.server.action_address, app::action_router(state)).await
        }
        Component::Presenter => {
            serve(
                "presenter",
                &config.server.presenter_address,
                app::presenter_router(state),
            )
            .await
        }
        Component::All => {
            tokio::try_join!(
                serve(
                    "action",
                    &config.server.action_address,
                    app::action_router(Arc::clone(&state)),
                ),
                serve(
                    "presenter",
                    &config.server.presenter_address,
                    app::presenter_router(state),
                ),
            )?;
            Ok(())
        }
    }
}

async fn serve(name: &str, address: &str, router: Router) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .with_context(|| format!("failed to bind {} server to {}", name, address))?;

    tracing::info!("{} server listening on http://{}", name, address);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal(name.to_string()))
        .await
        .with_context(|| format!("{} server failed", name))?;

    tracing::info!("{} server stopped", name);
    Ok(())
}

async fn shutdown_signal(name: String) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Cannot listen for shutdown signal: {}", e);
        // keep serving rather than stopping immediately
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down {} server", name);
}
