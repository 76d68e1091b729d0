use async_trait::async_trait;
use serde_json::{json, Value};

use crate::auth::GUEST_USER_ID;
use crate::datastore::DatastoreError;
use crate::models::{Collection, Fqid};
use crate::presenter::{Presenter, PresenterContext, PresenterError};

/// Current server time in unix seconds
#[derive(Debug, Default)]
pub struct ServerTime;

#[async_trait]
impl Presenter for ServerTime {
    fn name(&self) -> &'static str {
        "server_time"
    }

    async fn present(&self, _ctx: &PresenterContext, _data: &Value) -> Result<Value, PresenterError> {
        Ok(json!({ "server_time": chrono::Utc::now().timestamp() }))
    }
}

/// The requesting user
#[derive(Debug, Default)]
pub struct WhoAmI;

#[async_trait]
impl Presenter for WhoAmI {
    fn name(&self) -> &'static str {
        "whoami"
    }

    async fn present(&self, ctx: &PresenterContext, _data: &Value) -> Result<Value, PresenterError> {
        let mut result = json!({
            "user_id": ctx.user_id,
            "guest": ctx.user_id == GUEST_USER_ID,
        });
        if ctx.user_id == GUEST_USER_ID {
            return Ok(result);
        }

        match ctx
            .datastore
            .get(Fqid::new(Collection::User, ctx.user_id), &["username"])
            .await
        {
            Ok(user) => {
                if let Some(username) = user.data.get("username") {
                    result["username"] = username.clone();
                }
            }
            Err(DatastoreError::NotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }
        Ok(result)
    }
}
