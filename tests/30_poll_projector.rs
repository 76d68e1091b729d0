mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{json, Value};

use common::TestServer;

fn poll_models(state: &str) -> Value {
    json!({
        "meeting/1": {
            "name": "m",
            "poll_ids": [111],
            "poll_couple_countdown": true,
            "poll_countdown_id": 1,
            "projector_countdown_ids": [1],
            "group_ids": [5],
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
        "group/5": {"name": "delegates", "meeting_id": 1, "user_ids": [7], "permissions": []},
        "user/7": {"username": "delegate", "group_ids": {"1": [5]}},
    })
}

#[tokio::test]
async fn poll_start_restarts_countdown() -> Result<()> {
    let server = TestServer::start(poll_models("created")).await?;

    let (status, body) = server.action("poll.start", json!({"id": 111})).await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["results"], json!([[null]]));

    assert_eq!(server.get_model("poll/111").await?["state"], "started");
    let countdown = server.get_model("projector_countdown/1").await?;
    assert_eq!(countdown["running"], true);
    Ok(())
}

#[tokio::test]
async fn poll_start_twice() -> Result<()> {
    let server = TestServer::start(poll_models("created")).await?;

    let (status, _) = server.action("poll.start", json!({"id": 111})).await?;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = server.action("poll.start", json!({"id": 111})).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["message"],
        "Cannot start poll 111, because it is not in state created."
    );
    assert_eq!(server.get_model("poll/111").await?["state"], "started");
    Ok(())
}

#[tokio::test]
async fn poll_start_missing_permission() -> Result<()> {
    let server = TestServer::start(poll_models("created")).await?;
    let payload = json!([{"action": "poll.start", "data": [{"id": 111}]}]);

    let (status, body) = server.post_actions(Some(7), payload).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(
        body["message"],
        "You are not allowed to perform action poll.start. Missing permission: poll.can_manage"
    );
    assert_eq!(server.get_model("poll/111").await?["state"], "created");
    Ok(())
}

#[tokio::test]
async fn poll_start_with_group_permission() -> Result<()> {
    let mut models = poll_models("created");
    models["group/5"]["permissions"] = json!(["poll.can_manage"]);
    let server = TestServer::start(models).await?;

    let payload = json!([{"action": "poll.start", "data": [{"id": 111}]}]);
    let (status, body) = server.post_actions(Some(7), payload).await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(server.get_model("poll/111").await?["state"], "started");
    Ok(())
}

fn projector_models() -> Value {
    json!({
        "meeting/1": {"name": "one"},
        "meeting/2": {"name": "two"},
        "assignment/1": {"title": "a", "meeting_id": 1, "projection_ids": [10]},
        "projector/1": {"meeting_id": 1, "preview_projection_ids": [10]},
        "projector/3": {"meeting_id": 1},
        "projector/4": {"meeting_id": 2},
        "projection/10": {
            "meeting_id": 1,
            "content_object_id": "assignment/1",
            "preview_projector_id": 1,
            "weight": 10,
        },
    })
}

#[tokio::test]
async fn add_to_preview_weights() -> Result<()> {
    let server = TestServer::start(projector_models()).await?;

    let (status, body) = server
        .action(
            "projector.add_to_preview",
            json!({"ids": [1, 3], "content_object_id": "assignment/1"}),
        )
        .await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["results"], json!([[]]));

    assert_eq!(server.get_model("projection/11").await?["weight"], 11);
    assert_eq!(server.get_model("projection/12").await?["weight"], 1);
    assert_eq!(
        server.get_model("projector/3").await?["preview_projection_ids"],
        json!([12])
    );
    Ok(())
}

#[tokio::test]
async fn add_to_preview_rejects_duplicates() -> Result<()> {
    let server = TestServer::start(projector_models()).await?;

    let (status, body) = server
        .action(
            "projector.add_to_preview",
            json!({"ids": [1, 1], "content_object_id": "assignment/1"}),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "data.ids must contain unique items");
    assert!(!server.model_exists("projection/11").await?);
    Ok(())
}

#[tokio::test]
async fn add_to_preview_foreign_meeting() -> Result<()> {
    let server = TestServer::start(projector_models()).await?;

    let (status, body) = server
        .action(
            "projector.add_to_preview",
            json!({"ids": [4], "content_object_id": "assignment/1"}),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["message"],
        "The following models do not belong to meeting 1: ['projector/4']"
    );
    assert!(!server.model_exists("projection/11").await?);
    assert!(server.get_model("projector/4").await?.get("preview_projection_ids").is_none());
    Ok(())
}

#[tokio::test]
async fn add_to_preview_rejects_unparsable_content_object() -> Result<()> {
    let server = TestServer::start(projector_models()).await?;

    let (status, body) = server
        .action("projector.add_to_preview", json!({"ids": [1], "content_object_id": "foo/1"}))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);
    assert_eq!(body["message"], "content_object_id is invalid. Unknown collection: foo");

    let (status, body) = server
        .action(
            "projector.add_to_preview",
            json!({"ids": [1], "content_object_id": "assignment/99999999999999999999999"}),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);
    assert_eq!(
        body["message"],
        "content_object_id is invalid. Invalid fqid: assignment/99999999999999999999999"
    );
    assert!(!server.model_exists("projection/11").await?);
    Ok(())
}

#[tokio::test]
async fn poll_start_rejects_out_of_range_id() -> Result<()> {
    let server = TestServer::start(poll_models("created")).await?;

    let (status, body) = server.action("poll.start", json!({"id": 1e20})).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert_eq!(server.get_model("poll/111").await?["state"], "created");
    Ok(())
}
