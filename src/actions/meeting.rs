use async_trait::async_trait;
use serde_json::Value;

use crate::action::{Action, ActionKind, DefaultSchema, Instance, SchemaError};
use crate::models::Collection;
use crate::permissions::PermissionRequirement;

/// `meeting.create`, allowed for managers of the target committee
#[derive(Debug, Default)]
pub struct MeetingCreate;

#[async_trait]
impl Action for MeetingCreate {
    fn name(&self) -> &'static str {
        "meeting.create"
    }

    fn collection(&self) -> Collection {
        Collection::Meeting
    }

    fn kind(&self) -> ActionKind {
        ActionKind::Create
    }

    fn schema(&self) -> Result<Value, SchemaError> {
        DefaultSchema::create(
            Collection::Meeting,
            &["committee_id", "name"],
            &[
                "welcome_title",
                "welcome_text",
                "description",
                "location",
                "start_time",
                "end_time",
                "projector_countdown_default_time",
            ],
        )
        .build()
    }

    fn permission(&self, _instance: &Instance, _user_id: u64) -> PermissionRequirement {
        PermissionRequirement::Committee {
            field: "committee_id",
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::action::ActionError;
    use crate::testing::TestContext;
    use serde_json::json;

    #[tokio::test]
    async fn test_create_links_committee_and_applies_defaults() {
        let ctx = TestContext::new().await;
        ctx.set_models(json!({"committee/1": {"name": "c"}})).await;

        let results = ctx
            .request("meeting.create", json!({"committee_id": 1, "name": "Plenum"}))
            .await
            .unwrap();
        assert_eq!(results, vec![Some(json!({"id": 1}))]);

        let meeting = ctx.get_model("meeting/1").await;
        assert_eq!(meeting["name"], "Plenum");
        assert_eq!(meeting["poll_couple_countdown"], true);
        assert_eq!(meeting["projector_countdown_default_time"], 60);
        assert_eq!(ctx.get_model("committee/1").await["meeting_ids"], json!([1]));
    }

    #[tokio::test]
    async fn test_create_sanitizes_welcome_text() {
        let ctx = TestContext::new().await;
        ctx.set_models(json!({"committee/1": {"name": "c"}})).await;

        ctx.request(
            "meeting.create",
            json!({
                "committee_id": 1,
                "name": "m",
                "welcome_text": "<p>hi</p><script>alert(1)</script>",
            }),
        )
        .await
        .unwrap();
        assert_eq!(
            ctx.get_model("meeting/1").await["welcome_text"],
            "<p>hi</p>&lt;script&gt;alert(1)&lt;/script&gt;"
        );
    }

    #[tokio::test]
    async fn test_committee_manager_may_create() {
        let ctx = TestContext::new().await;
        ctx.set_models(json!({
            "committee/1": {"name": "c", "manager_ids": [5]},
            "user/5": {"username": "manager", "committee_as_manager_ids": [1]},
            "user/6": {"username": "other"},
        }))
        .await;

        ctx.request_as(5, "meeting.create", json!({"committee_id": 1, "name": "m"}))
            .await
            .unwrap();

        let err = ctx
            .request_as(6, "meeting.create", json!({"committee_id": 1, "name": "m"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::PermissionDenied(_)));
        assert!(!ctx.model_exists("meeting/2").await);
    }

    #[tokio::test]
    async fn test_missing_committee() {
        let ctx = TestContext::new().await;
        let err = ctx
            .request("meeting.create", json!({"committee_id": 7, "name": "m"}))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "The following committees were not found: [7]");
    }

    #[tokio::test]
    async fn test_name_is_required() {
        let ctx = TestContext::new().await;
        let err = ctx
            .request("meeting.create", json!({"committee_id": 1}))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "data must contain ['name'] properties");
    }
}
