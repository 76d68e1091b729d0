use async_trait::async_trait;
use serde_json::Value;

use crate::action::{
    id_field, Action, ActionContext, ActionError, ActionKind, ActionResult, CountdownCommand, CountdownControl,
    DefaultSchema, Instance, ProjectorCountdownControl, SchemaError,
};
use crate::models::{Collection, Fqid};
use crate::permissions::{perms, MeetingScope, PermissionRequirement};

/// One step of the poll lifecycle `created → started → finished → published`
#[derive(Debug)]
pub struct PollTransition {
    name: &'static str,
    verb: &'static str,
    from: &'static str,
    to: &'static str,
    /// Applied to the meeting's poll countdown when it is coupled
    countdown: Option<CountdownCommand>,
    control: ProjectorCountdownControl,
}

impl PollTransition {
    pub fn start() -> Self {
        Self::new("poll.start", "start", "created", "started", Some(CountdownCommand::Restart))
    }

    pub fn stop() -> Self {
        Self::new("poll.stop", "stop", "started", "finished", Some(CountdownCommand::Reset))
    }

    pub fn publish() -> Self {
        Self::new("poll.publish", "publish", "finished", "published", None)
    }

    fn new(
        name: &'static str,
        verb: &'static str,
        from: &'static str,
        to: &'static str,
        countdown: Option<CountdownCommand>,
    ) -> Self {
        Self {
            name,
            verb,
            from,
            to,
            countdown,
            control: ProjectorCountdownControl,
        }
    }
}

#[async_trait]
impl Action for PollTransition {
    fn name(&self) -> &'static str {
        self.name
    }

    fn collection(&self) -> Collection {
        Collection::Poll
    }

    fn kind(&self) -> ActionKind {
        ActionKind::Update
    }

    fn schema(&self) -> Result<Value, SchemaError> {
        DefaultSchema::update(Collection::Poll, &[])
            .title(format!("{} schema", self.name))
            .build()
    }

    fn permission(&self, _instance: &Instance, _user_id: u64) -> PermissionRequirement {
        PermissionRequirement::Meeting {
            permission: perms::POLL_CAN_MANAGE,
            scope: MeetingScope::Own,
        }
    }

    async fn update_instance(&self, ctx: &mut ActionContext, mut instance: Instance) -> ActionResult<Instance> {
        let id = id_field(&instance, "id")?;
        let poll = ctx
            .datastore()
            .get(Fqid::new(Collection::Poll, id), &["state", "meeting_id"])
            .await?;
        if poll.get("state").and_then(Value::as_str) != Some(self.from) {
            return Err(ActionError::action(format!(
                "Cannot {} poll {}, because it is not in state {}.",
                self.verb, id, self.from
            )));
        }
        instance.insert("state".to_string(), Value::from(self.to));

        let (Some(command), Some(meeting_id)) =
            (self.countdown, poll.get("meeting_id").and_then(Value::as_u64))
        else {
            return Ok(instance);
        };
        let meeting = ctx
            .datastore()
            .get(
                Fqid::new(Collection::Meeting, meeting_id),
                &["poll_couple_countdown", "poll_countdown_id"],
            )
            .await?;
        let coupled = meeting
            .get("poll_couple_countdown")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if let (true, Some(countdown_id)) = (coupled, meeting.get("poll_countdown_id").and_then(Value::as_u64)) {
            self.control.control(ctx, countdown_id, command).await?;
        }
        Ok(instance)
    }
}

#[cfg(test)]
mod tests {
    use crate::action::ActionError;
    use crate::permissions::perms;
    use crate::testing::TestContext;
    use serde_json::json;

    async fn context(state: &str) -> TestContext {
        let ctx = TestContext::new().await;
        ctx.set_models(json!({
            "meeting/1": {
                "name": "m",
                "poll_ids": [111],
                "poll_couple_countdown": true,
                "poll_countdown_id": 1,
                "projector_countdown_ids": [1],
            },
            "poll/111": {"meeting_id": 1, "state": state},
            "projector_countdown/1": {
                "title": "poll countdown",
                "meeting_id": 1,
                "default_time": 60,
                "running": false,
                "countdown_time": 60,
                "used_as_poll_countdown_meeting_id": 1,
            },
        }))
        .await;
        ctx
    }

    #[tokio::test]
    async fn test_start_restarts_coupled_countdown() {
        let ctx = context("created").await;
        ctx.request("poll.start", json!({"id": 111})).await.unwrap();

        assert_eq!(ctx.get_model("poll/111").await["state"], "started");
        let countdown = ctx.get_model("projector_countdown/1").await;
        assert_eq!(countdown["running"], true);
        assert!(countdown["countdown_time"].as_f64().unwrap() > 1_000_000_000.0);
    }

    #[tokio::test]
    async fn test_start_without_coupling_leaves_countdown() {
        let ctx = context("created").await;
        ctx.set_models(json!({
            "meeting/1": {"name": "m", "poll_ids": [111], "poll_couple_countdown": false, "poll_countdown_id": 1},
        }))
        .await;
        ctx.request("poll.start", json!({"id": 111})).await.unwrap();

        let countdown = ctx.get_model("projector_countdown/1").await;
        assert_eq!(countdown["running"], false);
        assert_eq!(countdown["countdown_time"], 60);
    }

    #[tokio::test]
    async fn test_start_wrong_state() {
        let ctx = context("started").await;
        let err = ctx.request("poll.start", json!({"id": 111})).await.unwrap_err();
        assert_eq!(
            err,
            ActionError::Action("Cannot start poll 111, because it is not in state created.".to_string())
        );
        assert_eq!(ctx.get_model("poll/111").await["state"], "started");
    }

    #[tokio::test]
    async fn test_stop_resets_countdown() {
        let ctx = context("started").await;
        ctx.set_models(json!({
            "projector_countdown/1": {
                "title": "poll countdown",
                "meeting_id": 1,
                "default_time": 60,
                "running": true,
                "countdown_time": 1.0e12,
                "used_as_poll_countdown_meeting_id": 1,
            },
        }))
        .await;
        ctx.request("poll.stop", json!({"id": 111})).await.unwrap();

        assert_eq!(ctx.get_model("poll/111").await["state"], "finished");
        let countdown = ctx.get_model("projector_countdown/1").await;
        assert_eq!(countdown["running"], false);
        assert_eq!(countdown["countdown_time"].as_f64(), Some(60.0));
    }

    #[tokio::test]
    async fn test_publish() {
        let ctx = context("finished").await;
        ctx.request("poll.publish", json!({"id": 111})).await.unwrap();
        assert_eq!(ctx.get_model("poll/111").await["state"], "published");

        let err = ctx.request("poll.publish", json!({"id": 111})).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Cannot publish poll 111, because it is not in state finished."
        );
    }

    #[tokio::test]
    async fn test_missing_poll() {
        let ctx = context("created").await;
        let err = ctx.request("poll.start", json!({"id": 5})).await.unwrap_err();
        assert_eq!(err.to_string(), "Model 'poll/5' does not exist.");
    }

    #[tokio::test]
    async fn test_start_permissions() {
        let ctx = context("created").await;
        ctx.create_user_with_permissions(20, 1, &[perms::PROJECTOR_CAN_MANAGE]).await;
        ctx.create_user_with_permissions(21, 1, &[perms::POLL_CAN_MANAGE]).await;

        let err = ctx.request_as(20, "poll.start", json!({"id": 111})).await.unwrap_err();
        assert!(matches!(err, ActionError::PermissionDenied(_)));
        assert_eq!(ctx.get_model("poll/111").await["state"], "created");

        ctx.request_as(21, "poll.start", json!({"id": 111})).await.unwrap();
        assert_eq!(ctx.get_model("poll/111").await["state"], "started");
    }

    #[tokio::test]
    async fn test_meeting_admin_passes() {
        let ctx = context("created").await;
        ctx.create_user_with_permissions(20, 1, &[]).await;
        ctx.set_models(json!({
            "meeting/1": {
                "name": "m",
                "poll_ids": [111],
                "admin_group_id": 120,
                "group_ids": [120],
            },
        }))
        .await;

        ctx.request_as(20, "poll.start", json!({"id": 111})).await.unwrap();
        assert_eq!(ctx.get_model("poll/111").await["state"], "started");
    }

    #[tokio::test]
    async fn test_guest_is_denied() {
        let ctx = context("created").await;
        let err = ctx
            .request_as(crate::auth::GUEST_USER_ID, "poll.start", json!({"id": 111}))
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::PermissionDenied(_)));
    }
}
