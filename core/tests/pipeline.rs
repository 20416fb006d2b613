//! End-to-end tests of the upload enqueuer and report pipeline against
//! a real Postgres database, with the object store and LLM swapped for
//! their in-memory/scripted fakes.
//!
//! Requires `DATABASE_URL` to point at a scratch database. Run with:
//!
//! ```bash
//! DATABASE_URL=postgres://localhost/reportomat_test \
//!   cargo test --features testing --test pipeline -- --ignored --nocapture
//! ```

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;

use reportomat_common::{FakeClock, FixedJitter, RecordingEventSink};
use reportomat_core::{enqueue_upload, get_report, process_claimed_job, Core, ReportError, UploadError, UploadRequest};
use reportomat_database::{Database, JobRepository};
use reportomat_llm::fake::FakeLlmAdapter;
use reportomat_storage::fake::FakeObjectStore;
use reportomat_types::{FileStatus, UserId, WorkerId};

fn test_core(llm: FakeLlmAdapter) -> Core {
    let url = std::env::var("DATABASE_URL")
        .expect("DATABASE_URL must be set to run the core integration tests");
    let db = Database::connect(&url, Duration::from_secs(30))
        .expect("failed to connect to test database");

    Core::new(
        JobRepository::new(db),
        Arc::new(FakeObjectStore::new()),
        "reportomat-test".to_string(),
        Arc::new(llm),
        Duration::from_secs(30),
        Arc::new(FakeClock::new(Utc::now())),
        Arc::new(FixedJitter(0.0)),
        Arc::new(RecordingEventSink::default()),
        slog::Logger::root(slog::Discard, slog::o!()),
    )
}

#[tokio::test]
#[ignore]
async fn upload_then_process_then_read_report_round_trip() {
    let core = test_core(FakeLlmAdapter::always_succeeding(json!({
        "summary": "call went well",
        "items": [{"label": "next_step", "detail": "follow up next week"}],
    })));

    let owner = UserId("u-round-trip".to_string());
    let outcome = enqueue_upload(
        &core,
        UploadRequest {
            user_id: owner.clone(),
            original_filename: "call.txt".to_string(),
            mime_type: Some("text/plain".to_string()),
            size_bytes: 11,
            bytes: b"hello there".to_vec(),
        },
    )
    .await
    .expect("upload should succeed");

    assert_eq!(outcome.status, FileStatus::Queued);

    let worker = WorkerId("worker-a".to_string());
    let claimed = core
        .repo
        .claim(&worker, core.clock.now())
        .expect("claim should not error")
        .expect("the freshly enqueued job should be claimable");

    process_claimed_job(&core, claimed).await;

    let report = get_report(&core, &owner, outcome.file_id)
        .await
        .expect("the report should be ready after processing");

    assert_eq!(report.status, FileStatus::Succeeded);
    assert_eq!(report.report["summary"], "call went well");
}

#[tokio::test]
#[ignore]
async fn report_is_not_ready_before_processing_completes() {
    let core = test_core(FakeLlmAdapter::always_succeeding(json!({"summary": "x", "items": []})));
    let owner = UserId("u-not-ready".to_string());

    let outcome = enqueue_upload(
        &core,
        UploadRequest {
            user_id: owner.clone(),
            original_filename: "call.txt".to_string(),
            mime_type: None,
            size_bytes: 5,
            bytes: b"hello".to_vec(),
        },
    )
    .await
    .unwrap();

    let err = get_report(&core, &owner, outcome.file_id).await.unwrap_err();
    assert!(matches!(err, ReportError::NotReady));
}

#[tokio::test]
#[ignore]
async fn a_different_owner_cannot_read_the_report() {
    let core = test_core(FakeLlmAdapter::always_succeeding(json!({"summary": "x", "items": []})));
    let owner = UserId("u-owner".to_string());
    let stranger = UserId("u-stranger".to_string());

    let outcome = enqueue_upload(
        &core,
        UploadRequest {
            user_id: owner,
            original_filename: "call.txt".to_string(),
            mime_type: None,
            size_bytes: 5,
            bytes: b"hello".to_vec(),
        },
    )
    .await
    .unwrap();

    let err = get_report(&core, &stranger, outcome.file_id).await.unwrap_err();
    assert!(matches!(err, ReportError::NotFound));
}

#[tokio::test]
#[ignore]
async fn upload_rejects_unsupported_file_extensions() {
    let core = test_core(FakeLlmAdapter::always_succeeding(json!({"summary": "x", "items": []})));

    let err = enqueue_upload(
        &core,
        UploadRequest {
            user_id: UserId("u-bad-ext".to_string()),
            original_filename: "call.mp3".to_string(),
            mime_type: None,
            size_bytes: 5,
            bytes: b"hello".to_vec(),
        },
    )
    .await
    .unwrap_err();

    assert!(matches!(err, UploadError::InvalidFileType));
}

#[tokio::test]
#[ignore]
async fn empty_transcript_fails_the_job_without_a_retry() {
    let core = test_core(FakeLlmAdapter::always_succeeding(json!({"summary": "x", "items": []})));
    let owner = UserId("u-empty".to_string());

    let outcome = enqueue_upload(
        &core,
        UploadRequest {
            user_id: owner.clone(),
            original_filename: "call.txt".to_string(),
            mime_type: None,
            size_bytes: 3,
            bytes: b"   ".to_vec(),
        },
    )
    .await
    .unwrap();

    let worker = WorkerId("worker-a".to_string());
    let claimed = core.repo.claim(&worker, core.clock.now()).unwrap().unwrap();
    process_claimed_job(&core, claimed).await;

    let err = get_report(&core, &owner, outcome.file_id).await.unwrap_err();
    assert!(matches!(err, ReportError::NotReady));
}
