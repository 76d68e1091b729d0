use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::action::base::{Action, Instance};
use crate::action::context::{into_instance, ActionContext};
use crate::action::error::{ActionError, ActionResult};
use crate::action::registry::ActionRegistry;
use crate::action::schema::{payload_schema, SchemaError, SchemaValidator};
use crate::datastore::Datastore;
use crate::permissions::PermissionGate;

/// One element of the request body
#[derive(Debug, Clone, Deserialize)]
pub struct ActionRequest {
    pub action: String,
    pub data: Vec<Value>,
}

/// Results of one request: one list per action, one entry per instance
pub type ActionResults = Vec<Vec<Option<Value>>>;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    /// Multiplied by the attempt number before each retry
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: Duration::from_millis(50),
        }
    }
}

/// Runs a list of action requests as one transaction
pub struct ActionExecutor {
    registry: Arc<ActionRegistry>,
    datastore: Arc<dyn Datastore>,
    gate: PermissionGate,
    retry: RetryPolicy,
    payload: SchemaValidator,
}

impl ActionExecutor {
    pub fn new(
        registry: Arc<ActionRegistry>,
        datastore: Arc<dyn Datastore>,
        gate: PermissionGate,
        retry: RetryPolicy,
    ) -> Result<Self, SchemaError> {
        Ok(Self {
            registry,
            datastore,
            gate,
            retry,
            payload: SchemaValidator::compile(payload_schema())?,
        })
    }

    pub fn registry(&self) -> &Arc<ActionRegistry> {
        &self.registry
    }

    /// Validate the request body against the payload schema
    pub fn parse_payload(&self, body: &Value) -> ActionResult<Vec<ActionRequest>> {
        self.payload.validate(body)?;
        serde_json::from_value(body.clone()).map_err(|e| ActionError::Validation(e.to_string()))
    }

    /// Execute all requests, re-running the whole request on commit conflicts
    pub async fn execute(&self, user_id: u64, requests: &[ActionRequest]) -> ActionResult<ActionResults> {
        let mut attempt: u32 = 0;
        loop {
            match self.execute_once(user_id, requests).await {
                Err(err) if err.is_conflict() && attempt < self.retry.max_retries => {
                    attempt += 1;
                    tracing::warn!(
                        "Datastore conflict, retrying request ({}/{}): {}",
                        attempt,
                        self.retry.max_retries,
                        err
                    );
                    tokio::time::sleep(self.retry.backoff * attempt).await;
                }
                Err(err) if err.is_conflict() => {
                    tracing::warn!("Giving up after {} retries: {}", attempt, err);
                    return Err(err);
                }
                result => return result,
            }
        }
    }

    async fn execute_once(&self, user_id: u64, requests: &[ActionRequest]) -> ActionResult<ActionResults> {
        // Phase 1: resolve names and validate every instance
        let mut resolved: Vec<(Arc<dyn Action>, Vec<Instance>)> = Vec::with_capacity(requests.len());
        for request in requests {
            let registered = self.registry.get_public(&request.action)?;
            let mut instances = Vec::with_capacity(request.data.len());
            for value in &request.data {
                registered.validator.validate(value)?;
                instances.push(into_instance(value.clone())?);
            }
            resolved.push((Arc::clone(&registered.action), instances));
        }
        tracing::debug!("Validated {} action request(s)", resolved.len());

        // Phase 2: permissions
        let mut ctx = ActionContext::new(user_id, Arc::clone(&self.datastore), Arc::clone(&self.registry));
        for (action, instances) in &resolved {
            for instance in instances {
                let requirement = action.permission(instance, user_id);
                self.gate
                    .check(
                        ctx.datastore(),
                        user_id,
                        action.name(),
                        action.collection(),
                        &requirement,
                        instance,
                    )
                    .await?;
            }
        }

        // Phase 3: handlers in request order
        let mut results = Vec::with_capacity(resolved.len());
        for (action, instances) in resolved {
            let name = action.name();
            match ctx.execute_action(action, instances).await {
                Ok(result) => results.push(result),
                Err(err) => {
                    tracing::warn!("Action {} failed: {}", name, err);
                    return Err(err);
                }
            }
        }

        if ctx.operations().is_empty() {
            tracing::debug!("Request produced no writes");
            return Ok(results);
        }

        let write = ctx.into_write_request();
        let count = write.operations.len();
        let position = self.datastore.write(write).await?;
        tracing::info!("Committed {} operation(s) at position {}", count, position);
        Ok(results)
    }
}
