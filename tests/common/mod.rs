#![allow(dead_code)]

use std::sync::Arc;

use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde_json::{json, Value};

use meeting_backend::app::{self, AppState};
use meeting_backend::auth::{generate_token, Claims, AUTHENTICATION_HEADER};
use meeting_backend::config::AppConfig;
use meeting_backend::datastore::{Datastore, MemoryDatastore};
use meeting_backend::models::Fqid;

pub const SECRET: &str = "integration-test-secret";
pub const ADMIN: u64 = 1;

/// Action and presenter servers running in-process on their own ports
pub struct TestServer {
    pub action_url: String,
    pub presenter_url: String,
    pub memory: Arc<MemoryDatastore>,
    client: reqwest::Client,
}

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::development();
    config.security.token_secret = SECRET.to_string();
    config.action.retry_backoff_ms = 1;
    config
}

/// Organisation plus superadmin `user/1`, merged with `models`
pub async fn seeded_memory(models: Value) -> Result<Arc<MemoryDatastore>> {
    let memory = MemoryDatastore::from_models(json!({
        "organisation/1": {"name": "test organisation"},
        "user/1": {
            "username": "admin",
            "organisation_management_level": "superadmin",
        },
    }))
    .await?;
    memory.set_models(models).await?;
    Ok(Arc::new(memory))
}

impl TestServer {
    pub async fn start(models: Value) -> Result<Self> {
        let memory = seeded_memory(models).await?;
        Self::start_with(memory.clone(), memory as Arc<dyn Datastore>, test_config()).await
    }

    /// `datastore` serves the requests, `memory` is what the test inspects
    pub async fn start_with(
        memory: Arc<MemoryDatastore>,
        datastore: Arc<dyn Datastore>,
        config: AppConfig,
    ) -> Result<Self> {
        let state = Arc::new(AppState::build(&config, datastore)?);
        let action_url = spawn(app::action_router(Arc::clone(&state))).await?;
        let presenter_url = spawn(app::presenter_router(state)).await?;

        Ok(Self {
            action_url,
            presenter_url,
            memory,
            client: reqwest::Client::new(),
        })
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// POST a JSON body to the action server as `user_id`; `None` sends no token
    pub async fn post_actions(&self, user_id: Option<u64>, body: Value) -> Result<(StatusCode, Value)> {
        self.post(&self.action_url, user_id, body).await
    }

    pub async fn post_presenters(&self, user_id: Option<u64>, body: Value) -> Result<(StatusCode, Value)> {
        self.post(&self.presenter_url, user_id, body).await
    }

    /// Single action as the superadmin
    pub async fn action(&self, name: &str, data: Value) -> Result<(StatusCode, Value)> {
        self.post_actions(Some(ADMIN), json!([{"action": name, "data": [data]}]))
            .await
    }

    async fn post(&self, url: &str, user_id: Option<u64>, body: Value) -> Result<(StatusCode, Value)> {
        let mut request = self.client.post(url).json(&body);
        if let Some(user_id) = user_id {
            request = request.header(AUTHENTICATION_HEADER, format!("bearer {}", token(user_id)?));
        }
        let res = request.send().await?;
        let status = res.status();
        let body = res.json::<Value>().await.context("response is not JSON")?;
        Ok((status, body))
    }

    pub async fn get_model(&self, fqid: &str) -> Result<Value> {
        let fqid: Fqid = fqid.parse()?;
        let entity = self.memory.get(fqid, &[]).await?;
        Ok(Value::Object(entity.data))
    }

    pub async fn model_exists(&self, fqid: &str) -> Result<bool> {
        let fqid: Fqid = fqid.parse()?;
        Ok(self.memory.get(fqid, &[]).await.is_ok())
    }
}

pub fn token(user_id: u64) -> Result<String> {
    Ok(generate_token(SECRET, &Claims::new(user_id, None, 1))?)
}

async fn spawn(router: axum::Router) -> Result<String> {
    // Pick an unused port for isolation
    let port = portpicker::pick_unused_port().context("failed to pick free port")?;
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
        .await
        .with_context(|| format!("failed to bind port {}", port))?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    Ok(format!("http://127.0.0.1:{}/", port))
}
