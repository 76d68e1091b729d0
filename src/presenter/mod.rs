pub mod presenters;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

use crate::datastore::{Datastore, DatastoreError};

#[derive(Debug, Error)]
pub enum PresenterError {
    #[error("Presenter {0} does not exist.")]
    Unknown(String),

    #[error("{0}")]
    InvalidData(String),

    #[error(transparent)]
    Datastore(#[from] DatastoreError),
}

/// One element of the presenter request body
#[derive(Debug, Clone, Deserialize)]
pub struct PresenterRequest {
    pub presenter: String,
    #[serde(default)]
    pub data: Value,
}

pub struct PresenterContext {
    pub user_id: u64,
    pub datastore: Arc<dyn Datastore>,
}

/// Read-only view computed from the datastore
#[async_trait]
pub trait Presenter: Send + Sync {
    fn name(&self) -> &'static str;

    async fn present(&self, ctx: &PresenterContext, data: &Value) -> Result<Value, PresenterError>;
}

#[derive(Default)]
pub struct PresenterRegistry {
    presenters: BTreeMap<&'static str, Arc<dyn Presenter>>,
}

impl PresenterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in presenter
    pub fn build() -> Self {
        let mut registry = Self::new();
        registry.register(presenters::ServerTime);
        registry.register(presenters::WhoAmI);
        registry
    }

    pub fn register(&mut self, presenter: impl Presenter + 'static) {
        self.presenters.insert(presenter.name(), Arc::new(presenter));
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.presenters.keys().copied()
    }

    /// Run all requests in order, one result each
    pub async fn handle(
        &self,
        ctx: &PresenterContext,
        requests: &[PresenterRequest],
    ) -> Result<Vec<Value>, PresenterError> {
        let mut results = Vec::with_capacity(requests.len());
        for request in requests {
            let presenter = self
                .presenters
                .get(request.presenter.as_str())
                .ok_or_else(|| PresenterError::Unknown(request.presenter.clone()))?;
            tracing::debug!("Running presenter {}", request.presenter);
            results.push(presenter.present(ctx, &request.data).await?);
        }
        Ok(results)
    }
}
