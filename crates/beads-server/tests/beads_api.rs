//! Bead API Integration Tests
//!
//! Mutations over HTTP, the events they publish and the ledger query API.

mod common;

use beads_protocol::Topic;
use beads_server::config::Settings;
use common::{spawn_app, TestResult};
use reqwest::StatusCode;
use serde_json::{json, Value};

#[tokio::test]
async fn test_health_check() -> TestResult {
    let app = spawn_app(Settings::default()).await;
    let body: Value = app.client.get(app.url("/api")).send().await?.json().await?;
    assert_eq!(body, json!({ "status": "ok" }));
    Ok(())
}

#[tokio::test]
async fn test_bead_lifecycle() -> TestResult {
    let app = spawn_app(Settings::default()).await;
    let mut stream = app.open_stream("?topics=beads.bead.*", None).await;

    let bead = app.create_bead("Write docs").await;
    assert_eq!(bead["id"], "bd-1");
    assert_eq!(bead["status"], "open");
    assert_eq!(bead["priority"], 2);

    let updated: Value = app
        .client
        .patch(app.url("/api/beads/bd-1"))
        .json(&json!({ "priority": 0, "assignee": "ann" }))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    assert_eq!(updated["priority"], 0);
    assert_eq!(updated["assignee"], "ann");

    let closed: Value = app
        .client
        .post(app.url("/api/beads/bd-1/close"))
        .json(&json!({ "reason": "shipped" }))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    assert_eq!(closed["status"], "closed");
    assert_eq!(closed["close_reason"], "shipped");

    let again = app
        .client
        .post(app.url("/api/beads/bd-1/close"))
        .send()
        .await?;
    assert_eq!(again.status(), StatusCode::CONFLICT);

    app.client
        .post(app.url("/api/beads/bd-1/reopen"))
        .send()
        .await?
        .error_for_status()?;
    app.client
        .delete(app.url("/api/beads/bd-1"))
        .send()
        .await?
        .error_for_status()?;

    let missing = app.client.get(app.url("/api/beads/bd-1")).send().await?;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    let body: Value = missing.json().await?;
    assert!(body["error"].as_str().unwrap().contains("bd-1"));

    let mut topics = Vec::new();
    for _ in 0..5 {
        let (_, topic, _) = stream.next_event().await;
        topics.push(topic);
    }
    assert_eq!(
        topics,
        vec![
            Topic::BEAD_CREATED,
            Topic::BEAD_UPDATED,
            Topic::BEAD_CLOSED,
            Topic::BEAD_REOPENED,
            Topic::BEAD_DELETED,
        ]
    );

    Ok(())
}

#[tokio::test]
async fn test_invalid_input_publishes_nothing() -> TestResult {
    let app = spawn_app(Settings::default()).await;

    let response = app
        .client
        .post(app.url("/api/beads"))
        .json(&json!({ "title": "  " }))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(app.state.hub.last_sequence(), 0);

    Ok(())
}

#[tokio::test]
async fn test_dependencies_and_ready_work() -> TestResult {
    let app = spawn_app(Settings::default()).await;
    app.create_bead("Build").await;
    app.create_bead("Design").await;

    app.client
        .post(app.url("/api/beads/bd-1/dependencies"))
        .json(&json!({ "depends_on": "bd-2" }))
        .send()
        .await?
        .error_for_status()?;

    let cycle = app
        .client
        .post(app.url("/api/beads/bd-2/dependencies"))
        .json(&json!({ "depends_on": "bd-1", "kind": "blocks" }))
        .send()
        .await?;
    assert_eq!(cycle.status(), StatusCode::BAD_REQUEST);

    let ready: Vec<Value> = app
        .client
        .get(app.url("/api/beads/ready"))
        .send()
        .await?
        .json()
        .await?;
    let ids: Vec<&str> = ready.iter().filter_map(|b| b["id"].as_str()).collect();
    assert_eq!(ids, vec!["bd-2"]);

    let detail: Value = app
        .client
        .get(app.url("/api/beads/bd-1"))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(detail["title"], "Build");
    assert_eq!(detail["dependencies"]["depends_on"][0]["to_id"], "bd-2");

    app.client
        .delete(app.url("/api/beads/bd-1/dependencies/bd-2"))
        .send()
        .await?
        .error_for_status()?;

    let ready: Vec<Value> = app
        .client
        .get(app.url("/api/beads/ready"))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(ready.len(), 2);

    Ok(())
}

#[tokio::test]
async fn test_labels_and_filtering() -> TestResult {
    let app = spawn_app(Settings::default()).await;
    app.create_bead("Frontend").await;
    app.create_bead("Backend").await;

    app.client
        .post(app.url("/api/beads/bd-1/labels"))
        .json(&json!({ "label": "ui" }))
        .send()
        .await?
        .error_for_status()?;

    let listed: Vec<Value> = app
        .client
        .get(app.url("/api/beads?label=ui"))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["id"], "bd-1");

    let removed = app
        .client
        .delete(app.url("/api/beads/bd-1/labels/ui"))
        .send()
        .await?;
    assert_eq!(removed.status(), StatusCode::OK);

    let removed_again = app
        .client
        .delete(app.url("/api/beads/bd-1/labels/ui"))
        .send()
        .await?;
    assert_eq!(removed_again.status(), StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn test_ledger_records_actor_and_correlation() -> TestResult {
    let app = spawn_app(Settings::default()).await;
    app.create_bead("Audited").await;

    app.client
        .post(app.url("/api/beads/bd-1/comments"))
        .header("X-Beads-Actor", "alice")
        .header("X-Request-Id", "req-123")
        .json(&json!({ "text": "looks good" }))
        .send()
        .await?
        .error_for_status()?;

    let page: Value = app
        .client
        .get(app.url("/api/events?topics=beads.comment.>"))
        .send()
        .await?
        .json()
        .await?;
    let events = page["events"].as_array().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["topic"], Topic::COMMENT_ADDED);
    assert_eq!(events[0]["actor"], "alice");
    assert_eq!(events[0]["correlation_id"], "req-123");
    assert_eq!(events[0]["payload"]["author"], "alice");
    assert_eq!(page["next_cursor"], 2);

    let page: Value = app
        .client
        .get(app.url("/api/events?after=2"))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(page["events"], json!([]));
    assert_eq!(page["next_cursor"], 2);

    Ok(())
}

#[tokio::test]
async fn test_api_requires_token_when_configured() -> TestResult {
    let mut settings = Settings::default();
    settings.user_token = "secret".to_string();
    let app = spawn_app(settings).await;

    let response = app.client.get(app.url("/api/beads")).send().await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .client
        .get(app.url("/api/beads"))
        .bearer_auth("secret")
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    Ok(())
}
