//! End-to-end tests for the batch crawl
//!
//! A mock API stands in for the remote source; batches are written to a
//! temporary data tree.

mod common;

use common::{api_responder, api_submission, fast_config, status_body};
use serde_json::json;
use std::sync::Arc;
use subcrawl::resume::batch_resume_point;
use subcrawl::{CrawlContext, CrawlError, LegacyArchive, Orchestrator};
use subcrawl_common::{BatchRange, Outcome};
use wiremock::{
    matchers::{header, method, path, path_regex},
    Mock, MockServer, ResponseTemplate,
};

async fn mount_api(server: &MockServer, registered: u64) {
    Mock::given(method("GET"))
        .and(path_regex(r"^/submission/\d+\.json$"))
        .respond_with(api_responder)
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/status.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(status_body(registered)))
        .mount(server)
        .await;
}

fn orchestrator(ctx: &CrawlContext) -> Orchestrator {
    Orchestrator::from_context(ctx, Arc::new(LegacyArchive::empty()))
}

// ============================================================================
// Batch loop
// ============================================================================

#[tokio::test]
async fn test_crawl_writes_complete_batches() {
    let server = MockServer::start().await;
    mount_api(&server, 500).await;

    let dir = tempfile::tempdir().unwrap();
    let ctx = CrawlContext::new(fast_config(dir.path()).with_api_urls([server.uri()])).unwrap();
    let orchestrator = orchestrator(&ctx);

    let summary = orchestrator.run(1, Some(200)).await.unwrap();
    assert_eq!(summary.batches_written, 2);
    assert_eq!(summary.batches_skipped, 0);
    assert_eq!(summary.absent, 20);
    assert_eq!(summary.found, 180);

    let first = dir.path().join("data/00/00/batch-00000000-00000100.json");
    let second = dir.path().join("data/00/00/batch-00000100-00000200.json");
    assert!(first.exists());
    assert!(second.exists());
    assert!(!dir.path().join("data/00/00/batch-00000200-00000300.json").exists());

    let raw: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&second).unwrap()).unwrap();
    let entries = raw.as_object().unwrap();
    assert_eq!(entries.len(), 100);
    assert!(raw["110"].is_null());
    assert_eq!(
        raw["123"],
        json!({
            "id": 123,
            "username": "artist4",
            "title": "Piece 123",
            "description": "Made with care.",
            "keywords": ["ink", "study"],
            "date": "2019-06-01T12:00:00Z",
            "rating": "General",
            "filename": "https://d.example.net/art/artist4/123.png"
        })
    );

    assert_eq!(orchestrator.resume_point().unwrap(), Some(200));
}

#[tokio::test]
async fn test_rerun_over_stored_range_makes_no_requests() {
    let dir = tempfile::tempdir().unwrap();

    {
        let server = MockServer::start().await;
        mount_api(&server, 500).await;
        let ctx =
            CrawlContext::new(fast_config(dir.path()).with_api_urls([server.uri()])).unwrap();
        orchestrator(&ctx).run(0, Some(100)).await.unwrap();
    }

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let ctx = CrawlContext::new(fast_config(dir.path()).with_api_urls([server.uri()])).unwrap();
    let summary = orchestrator(&ctx).run(0, Some(100)).await.unwrap();
    assert_eq!(summary.batches_skipped, 1);
    assert_eq!(summary.batches_written, 0);

    server.verify().await;
}

#[tokio::test]
async fn test_truncated_batch_is_refetched_and_replaced() {
    let server = MockServer::start().await;
    mount_api(&server, 500).await;

    let dir = tempfile::tempdir().unwrap();
    let batch = dir.path().join("data/00/00/batch-00000000-00000100.json");
    std::fs::create_dir_all(batch.parent().unwrap()).unwrap();
    std::fs::write(&batch, br#"{"0": null, "1": {"id": 1, "userna"#).unwrap();

    let ctx = CrawlContext::new(fast_config(dir.path()).with_api_urls([server.uri()])).unwrap();
    let summary = orchestrator(&ctx).run(0, Some(100)).await.unwrap();
    assert_eq!(summary.batches_written, 1);
    assert_eq!(summary.batches_skipped, 0);

    let raw: serde_json::Value = serde_json::from_slice(&std::fs::read(&batch).unwrap()).unwrap();
    assert_eq!(raw.as_object().unwrap().len(), 100);
    assert_eq!(raw["1"]["title"], "Piece 1");
    assert!(ctx.store.is_complete(BatchRange::containing(0)).await.unwrap());
}

#[tokio::test]
async fn test_end_bound_excludes_batch_starting_at_end() {
    let server = MockServer::start().await;
    mount_api(&server, 500).await;

    let dir = tempfile::tempdir().unwrap();
    let ctx = CrawlContext::new(fast_config(dir.path()).with_api_urls([server.uri()])).unwrap();

    // 150 lies inside [100, 200), so that batch is fetched in full
    let summary = orchestrator(&ctx).run(100, Some(150)).await.unwrap();
    assert_eq!(summary.batches_written, 1);
    assert!(ctx.store.is_complete(BatchRange::containing(199)).await.unwrap());
    assert_eq!(batch_resume_point(&dir.path().join("data")).unwrap(), Some(200));
}

// ============================================================================
// Failure handling
// ============================================================================

#[tokio::test]
async fn test_no_source_configured_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = CrawlContext::new(fast_config(dir.path())).unwrap();

    let err = orchestrator(&ctx).run(0, Some(100)).await.unwrap_err();
    assert!(matches!(err, CrawlError::Config(_)));
    assert!(!ctx.store.exists(BatchRange::containing(0)).await.unwrap());
}

#[tokio::test]
async fn test_exhausted_retries_fail_batch_without_writing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/submission/42.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"title": 5})))
        .expect(3)
        .mount(&server)
        .await;
    mount_api(&server, 500).await;

    let dir = tempfile::tempdir().unwrap();
    let ctx = CrawlContext::new(fast_config(dir.path()).with_api_urls([server.uri()])).unwrap();

    let err = orchestrator(&ctx).run(0, Some(100)).await.unwrap_err();
    match err {
        CrawlError::RetriesExhausted { id, attempts, .. } => {
            assert_eq!(id, 42);
            assert_eq!(attempts, 3);
        },
        other => panic!("unexpected error: {other}"),
    }
    assert!(!ctx.store.exists(BatchRange::containing(0)).await.unwrap());
}

#[tokio::test]
async fn test_transient_failure_recovers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/submission/7.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    mount_api(&server, 500).await;

    let dir = tempfile::tempdir().unwrap();
    let ctx = CrawlContext::new(fast_config(dir.path()).with_api_urls([server.uri()])).unwrap();
    orchestrator(&ctx).run(0, Some(100)).await.unwrap();

    assert_eq!(
        ctx.store.lookup(7).await.unwrap(),
        Some(Outcome::Found(
            subcrawl::sources::submission::ApiSubmission::from_value(api_submission(7))
                .unwrap()
                .into_record(7)
                .unwrap()
        ))
    );
}

// ============================================================================
// Governor
// ============================================================================

#[tokio::test]
async fn test_congestion_signal_carries_across_batches() {
    let dir = tempfile::tempdir().unwrap();

    let busy = MockServer::start().await;
    mount_api(&busy, 25_000).await;
    let ctx = CrawlContext::new(fast_config(dir.path()).with_api_urls([busy.uri()])).unwrap();
    orchestrator(&ctx).run(0, Some(100)).await.unwrap();
    assert!(ctx.governor.is_congested());

    // Same governor, quiet site: the next batch clears the flag
    let quiet = MockServer::start().await;
    mount_api(&quiet, 800).await;
    let config = (*ctx.config).clone().with_api_urls([quiet.uri()]);
    let quiet_ctx = CrawlContext {
        config: Arc::new(config),
        ..ctx.clone()
    };
    orchestrator(&quiet_ctx).run(100, Some(200)).await.unwrap();
    assert!(!ctx.governor.is_congested());
}

#[tokio::test]
async fn test_status_failure_leaves_flag_untouched() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/submission/\d+\.json$"))
        .respond_with(api_responder)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/status.json"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let ctx = CrawlContext::new(fast_config(dir.path()).with_api_urls([server.uri()])).unwrap();
    ctx.governor.report(Some(true));

    let summary = orchestrator(&ctx).run(0, Some(100)).await.unwrap();
    assert_eq!(summary.batches_written, 1);
    assert!(ctx.governor.is_congested());
}

// ============================================================================
// Upload sink
// ============================================================================

#[tokio::test]
async fn test_upload_sink_replaces_local_write() {
    let server = MockServer::start().await;
    mount_api(&server, 500).await;
    Mock::given(method("POST"))
        .and(path("/data/00/00/batch-00000000-00000100.json"))
        .and(header("Authorization", "secret-key"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = fast_config(dir.path())
        .with_api_urls([server.uri()])
        .with_upload(format!("{}/data/", server.uri()), "secret-key");
    let ctx = CrawlContext::new(config).unwrap();

    orchestrator(&ctx).run(0, Some(100)).await.unwrap();
    assert!(!dir.path().join("data/00/00/batch-00000000-00000100.json").exists());

    let uploads: Vec<_> = server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.method.as_str() == "POST")
        .collect();
    assert_eq!(uploads.len(), 1);
    let body: serde_json::Value = serde_json::from_slice(&uploads[0].body).unwrap();
    assert_eq!(body.as_object().unwrap().len(), 100);
    assert!(body["0"].is_null());
    assert_eq!(body["1"]["username"], "artist1");
}

// ============================================================================
// Legacy archives
// ============================================================================

#[tokio::test]
async fn test_legacy_entries_take_precedence_over_api() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/submission/5.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(api_submission(5)))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/submission/6.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(api_submission(6)))
        .expect(0)
        .mount(&server)
        .await;
    mount_api(&server, 500).await;

    let dir = tempfile::tempdir().unwrap();
    let legacy_dir = dir.path().join("legacy");
    std::fs::create_dir_all(legacy_dir.join("00/00")).unwrap();
    let mut legacy_five = api_submission(5);
    legacy_five["profile_name"] = json!("legacyartist");
    std::fs::write(
        legacy_dir.join("00/00/batch-00000001-00000100.json"),
        serde_json::to_vec(&json!({
            "5": {"data": legacy_five, "comments": []},
            "6": {"data": {}, "comments": []}
        }))
        .unwrap(),
    )
    .unwrap();

    let ctx = CrawlContext::new(fast_config(dir.path()).with_api_urls([server.uri()])).unwrap();
    let legacy = LegacyArchive::discover(&legacy_dir).unwrap();
    Orchestrator::from_context(&ctx, Arc::new(legacy))
        .run(0, Some(100))
        .await
        .unwrap();

    let five = ctx.store.lookup(5).await.unwrap().unwrap();
    assert_eq!(five.record().unwrap().username, "legacyartist");
    assert_eq!(ctx.store.lookup(6).await.unwrap(), Some(Outcome::Absent));
    // Covered by the legacy range but missing from the file: served by the API
    let seven = ctx.store.lookup(7).await.unwrap().unwrap();
    assert_eq!(seven.record().unwrap().username, "artist0");

    server.verify().await;
}

#[test]
fn test_bad_legacy_file_name_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("batch-1-100.json"), b"{}").unwrap();

    let err = LegacyArchive::discover(dir.path()).err().unwrap();
    assert!(err.is_fatal());
}
