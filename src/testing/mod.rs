use serde_json::{json, Value};
use std::sync::Arc;

use crate::action::{
    ActionContext, ActionExecutor, ActionRegistry, ActionRequest, ActionResult, ActionResults,
    RetryPolicy,
};
use crate::datastore::{Datastore, MemoryDatastore};
use crate::models::{Entity, Fqid};
use crate::permissions::{Permission, PermissionCatalog, PermissionGate};

/// Id of the superadmin every context is seeded with
pub const ADMIN_USER_ID: u64 = 1;

/// In-memory fixture for action tests
pub struct TestContext {
    pub datastore: Arc<MemoryDatastore>,
    pub registry: Arc<ActionRegistry>,
    pub executor: ActionExecutor,
}

impl TestContext {
    /// Fresh datastore holding the organisation and a superadmin
    pub async fn new() -> Self {
        let datastore = Arc::new(
            MemoryDatastore::from_models(json!({
                "organisation/1": {"name": "test organisation"},
                "user/1": {
                    "username": "admin",
                    "organisation_management_level": "superadmin",
                },
            }))
            .await
            .expect("seed datastore"),
        );
        let registry = Arc::new(ActionRegistry::build().expect("build registry"));
        let catalog = Arc::new(PermissionCatalog::embedded().expect("permission catalog"));
        let executor = ActionExecutor::new(
            Arc::clone(&registry),
            datastore.clone() as Arc<dyn Datastore>,
            PermissionGate::new(catalog),
            RetryPolicy::default(),
        )
        .expect("build executor");

        Self {
            datastore,
            registry,
            executor,
        }
    }

    pub async fn set_models(&self, models: Value) {
        self.datastore.set_models(models).await.expect("set models");
    }

    /// Context for calling action internals directly
    pub fn action_context(&self, user_id: u64) -> ActionContext {
        ActionContext::new(
            user_id,
            self.datastore.clone() as Arc<dyn Datastore>,
            Arc::clone(&self.registry),
        )
    }

    /// Run one action as the superadmin; `data` is one instance or a list
    pub async fn request(&self, action: &str, data: Value) -> ActionResult<Vec<Option<Value>>> {
        self.request_as(ADMIN_USER_ID, action, data).await
    }

    pub async fn request_as(
        &self,
        user_id: u64,
        action: &str,
        data: Value,
    ) -> ActionResult<Vec<Option<Value>>> {
        let data = match data {
            Value::Array(items) => items,
            single => vec![single],
        };
        let requests = vec![ActionRequest {
            action: action.to_string(),
            data,
        }];
        let mut results = self.executor.execute(user_id, &requests).await?;
        Ok(results.pop().unwrap_or_default())
    }

    /// Run a full `[{action, data}]` payload as the superadmin
    pub async fn request_multi(&self, payload: Value) -> ActionResult<ActionResults> {
        let requests = self.executor.parse_payload(&payload)?;
        self.executor.execute(ADMIN_USER_ID, &requests).await
    }

    pub async fn get_model(&self, fqid: &str) -> Entity {
        let fqid: Fqid = fqid.parse().expect("valid fqid");
        self.datastore
            .get(fqid, &[])
            .await
            .unwrap_or_else(|e| panic!("{}: {}", fqid, e))
            .data
    }

    pub async fn model_exists(&self, fqid: &str) -> bool {
        let fqid: Fqid = fqid.parse().expect("valid fqid");
        self.datastore.get(fqid, &[]).await.is_ok()
    }

    /// Create `user/<user_id>` as the only member of a new group
    /// `group/<100 + user_id>` in `meeting_id` holding `permissions`
    pub async fn create_user_with_permissions(
        &self,
        user_id: u64,
        meeting_id: u64,
        permissions: &[Permission],
    ) {
        let group_id = 100 + user_id;
        let permissions: Vec<&str> = permissions.iter().map(Permission::as_str).collect();
        self.set_models(json!({
            format!("user/{}", user_id): {
                "username": format!("user{}", user_id),
                "group_ids": { meeting_id.to_string(): [group_id] },
            },
            format!("group/{}", group_id): {
                "name": "test group",
                "meeting_id": meeting_id,
                "user_ids": [user_id],
                "permissions": permissions,
            },
        }))
        .await;
    }
}
