use std::time::Duration;

use bulkctl::config::AppConfig;
use bulkctl::context::AppContext;
use bulkctl::core::{BulkResource, JobOutcome, JobPhase};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn context(server: &MockServer) -> AppContext {
    let config = AppConfig {
        base_url: server.uri(),
        refresh_grace_ms: 50,
        max_stream_secs: 10,
        ..AppConfig::default()
    };
    AppContext::new(config).expect("valid config")
}

async fn mount_status(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/seo/bulk-update-status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "totalWorkspaces": 3,
            "workspacesWithAltTexts": 3,
            "workspacesNeedingUpdate": 0
        })))
        .mount(server)
        .await;
}

fn status_requests(requests: &[wiremock::Request]) -> usize {
    requests
        .iter()
        .filter(|r| r.url.path() == "/api/seo/bulk-update-status")
        .count()
}

#[tokio::test]
async fn completed_job_refreshes_status_once() {
    let server = MockServer::start().await;
    let body = concat!(
        "data: {\"stage\":\"Processing\",\"current\":1,\"total\":3,\"percentage\":33,\"message\":\"\",\"errors\":[\"img 5 failed\"],\"processed\":[{\"workspaceId\":1,\"workspaceName\":\"A\",\"altTextsGenerated\":2,\"success\":true}]}\n",
        "data: {\"final\":true,\"current\":3,\"total\":3,\"percentage\":100,\"message\":\"Done\",\"errors\":[\"img 5 failed\"],\"processed\":[{\"workspaceId\":1,\"workspaceName\":\"A\",\"altTextsGenerated\":2,\"success\":true}]}\n",
    );
    Mock::given(method("POST"))
        .and(path("/api/seo/bulk-update-alt-texts"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .expect(1)
        .mount(&server)
        .await;
    mount_status(&server).await;

    let ctx = context(&server);
    let outcome = ctx
        .runner
        .start(BulkResource::AltTexts)
        .await
        .unwrap()
        .wait()
        .await;

    let JobOutcome::Completed { last, status } = outcome else {
        panic!("expected completion, got {outcome:?}");
    };
    assert_eq!(last.errors, vec!["img 5 failed".to_string()]);
    assert_eq!(status.unwrap().workspaces_needing_update, 0);

    let requests = server.received_requests().await.unwrap();
    assert_eq!(status_requests(&requests), 1);

    let state = ctx.runner.tracker().state().await;
    assert_eq!(state.phase, JobPhase::Completed);
    let cached = ctx.runner.status().get().await.unwrap();
    assert!(!cached.stale);
}

#[tokio::test]
async fn stream_without_final_frame_is_incomplete() {
    let server = MockServer::start().await;
    let body = "data: {\"stage\":\"Processing\",\"current\":1,\"total\":3,\"percentage\":33,\"message\":\"\",\"errors\":[],\"processed\":[]}\n";
    Mock::given(method("POST"))
        .and(path("/api/seo/bulk-update-alt-texts"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;
    mount_status(&server).await;

    let ctx = context(&server);
    let outcome = ctx
        .runner
        .start(BulkResource::AltTexts)
        .await
        .unwrap()
        .wait()
        .await;
    tokio::time::sleep(Duration::from_millis(150)).await;

    assert!(matches!(outcome, JobOutcome::Incomplete { last: Some(_) }));
    let requests = server.received_requests().await.unwrap();
    assert_eq!(status_requests(&requests), 0);
    assert!(ctx.runner.tracker().state().await.phase.can_trigger());
}

#[tokio::test]
async fn failed_refresh_keeps_previous_status() {
    let server = MockServer::start().await;
    let body = "data: {\"final\":true,\"current\":0,\"total\":0,\"percentage\":100,\"message\":\"Nothing to do\",\"errors\":[],\"processed\":[]}\n";
    Mock::given(method("POST"))
        .and(path("/api/seo/bulk-update-alt-texts"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/seo/bulk-update-status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "totalWorkspaces": 5,
            "workspacesWithAltTexts": 1,
            "workspacesNeedingUpdate": 4
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    let ctx = context(&server);
    ctx.runner.refresh_status().await.unwrap();

    // Later status requests fall through to wiremock's default 404.
    let outcome = ctx
        .runner
        .start(BulkResource::AltTexts)
        .await
        .unwrap()
        .wait()
        .await;

    assert!(matches!(outcome, JobOutcome::Completed { status: None, .. }));
    let cached = ctx.runner.status().get().await.unwrap();
    assert!(cached.stale);
    assert_eq!(cached.status.total_workspaces, 5);
    assert_eq!(cached.status.workspaces_needing_update, 4);
}
