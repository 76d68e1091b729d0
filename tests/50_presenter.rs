mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::json;

use common::TestServer;

#[tokio::test]
async fn presenter_results_are_a_bare_array() -> Result<()> {
    let server = TestServer::start(json!({})).await?;

    let (status, body) = server
        .post_presenters(
            Some(common::ADMIN),
            json!([{"presenter": "whoami"}, {"presenter": "server_time", "data": {}}]),
        )
        .await?;
    assert_eq!(status, StatusCode::OK, "{}", body);

    let results = body.as_array().expect("array body");
    assert_eq!(results.len(), 2);
    assert_eq!(results[0], json!({"user_id": 1, "guest": false, "username": "admin"}));
    assert!(results[1]["server_time"].as_i64().unwrap_or_default() > 1_500_000_000);
    Ok(())
}

#[tokio::test]
async fn guest_whoami() -> Result<()> {
    let server = TestServer::start(json!({})).await?;

    let (status, body) = server
        .post_presenters(None, json!([{"presenter": "whoami"}]))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([{"user_id": 0, "guest": true}]));
    Ok(())
}

#[tokio::test]
async fn unknown_presenter() -> Result<()> {
    let server = TestServer::start(json!({})).await?;

    let (status, body) = server
        .post_presenters(Some(common::ADMIN), json!([{"presenter": "agenda_tree"}]))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Presenter agenda_tree does not exist.");
    Ok(())
}

#[tokio::test]
async fn presenter_payload_must_be_a_list() -> Result<()> {
    let server = TestServer::start(json!({})).await?;

    let (status, body) = server
        .post_presenters(Some(common::ADMIN), json!({"presenter": "whoami"}))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
    Ok(())
}
