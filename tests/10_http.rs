mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{json, Value};

use common::TestServer;

#[tokio::test]
async fn health_endpoint_responds() -> Result<()> {
    let server = TestServer::start(json!({})).await?;

    for base in [&server.action_url, &server.presenter_url] {
        let res = server.client().get(format!("{}health", base)).send().await?;
        assert_eq!(res.status(), StatusCode::OK);
        let body = res.json::<Value>().await?;
        assert_eq!(body["data"]["status"], "ok");
    }
    Ok(())
}

#[tokio::test]
async fn only_post_is_allowed() -> Result<()> {
    let server = TestServer::start(json!({})).await?;

    let res = server.client().get(&server.action_url).send().await?;
    assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);
    let body = res.json::<Value>().await?;
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Method not allowed. Use POST instead.");

    let res = server.client().put(&server.presenter_url).send().await?;
    assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);
    Ok(())
}

#[tokio::test]
async fn wrong_media_type() -> Result<()> {
    let server = TestServer::start(json!({})).await?;

    let res = server
        .client()
        .post(&server.action_url)
        .header("Content-Type", "text/plain")
        .body("[]")
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body = res.json::<Value>().await?;
    assert_eq!(
        body["message"],
        "Wrong media type. Use 'Content-Type: application/json' instead."
    );
    Ok(())
}

#[tokio::test]
async fn invalid_json() -> Result<()> {
    let server = TestServer::start(json!({})).await?;

    let res = server
        .client()
        .post(&server.action_url)
        .header("Content-Type", "application/json")
        .body("[{\"action\": ")
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body = res.json::<Value>().await?;
    assert!(body["message"].as_str().unwrap_or_default().starts_with("Invalid JSON"), "{}", body);
    Ok(())
}

#[tokio::test]
async fn unknown_and_internal_actions() -> Result<()> {
    let server = TestServer::start(json!({})).await?;

    let (status, body) = server.action("fake_model.create", json!({})).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Action fake_model.create does not exist.");

    let (status, body) = server.action("projection.create", json!({})).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Action projection.create does not exist.");
    Ok(())
}

#[tokio::test]
async fn payload_must_be_a_list_of_requests() -> Result<()> {
    let server = TestServer::start(json!({})).await?;

    let (status, body) = server
        .post_actions(Some(common::ADMIN), json!({"action": "poll.start", "data": [{"id": 1}]}))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
    Ok(())
}

#[tokio::test]
async fn authentication() -> Result<()> {
    let server = TestServer::start(json!({"meeting/1": {"name": "m"}})).await?;

    // guest without a token: permission check fails, not authentication
    let payload = json!([{"action": "user.create_temporary", "data": [{"username": "x", "meeting_id": 1}]}]);
    let (status, _) = server.post_actions(None, payload.clone()).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let res = server
        .client()
        .post(&server.action_url)
        .header(meeting_backend::auth::AUTHENTICATION_HEADER, "bearer not-a-jwt")
        .json(&payload)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body = res.json::<Value>().await?;
    assert_eq!(body["code"], "AUTHENTICATION_ERROR");
    Ok(())
}

#[tokio::test]
async fn guests_can_be_disabled() -> Result<()> {
    let memory = common::seeded_memory(json!({})).await?;
    let mut config = common::test_config();
    config.security.allow_guest = false;
    let server = TestServer::start_with(memory.clone(), memory, config).await?;

    let (status, body) = server
        .post_presenters(None, json!([{"presenter": "whoami"}]))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Missing Authentication header");
    Ok(())
}
