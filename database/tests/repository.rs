//! Exercises `JobRepository` against a real Postgres database.
//!
//! Requires `DATABASE_URL` to point at a scratch database (migrations
//! are applied automatically on connect). Run with:
//!
//! ```bash
//! DATABASE_URL=postgres://localhost/reportomat_test \
//!   cargo test --test repository -- --ignored --nocapture
//! ```

use std::time::Duration;

use chrono::Utc;

use reportomat_common::FakeClock;
use reportomat_database::{Database, EnqueueOutcome, JobRepository, NewFile};
use reportomat_types::{defaults, ErrorCode, FileId, FileStatus, UserId, WorkerId};

fn test_repo() -> JobRepository {
    let url = std::env::var("DATABASE_URL")
        .expect("DATABASE_URL must be set to run the repository integration tests");
    let db = Database::connect(&url, Duration::from_secs(30))
        .expect("failed to connect to test database");
    JobRepository::new(db)
}

fn new_file(repo: &JobRepository, user_id: &str) -> FileId {
    let file_id = FileId::generate();
    let now = Utc::now();
    repo.insert_file(NewFile {
        id: file_id.to_string(),
        user_id: user_id.to_string(),
        storage_bucket: "reportomat-test".to_string(),
        storage_key_original: format!("users/{user_id}/files/{file_id}/original.txt"),
        original_filename: "call.txt".to_string(),
        extension: "txt".to_string(),
        mime_type: Some("text/plain".to_string()),
        size_bytes: 128,
        status: FileStatus::Uploading.as_str().to_string(),
        created_at: now,
        updated_at: now,
    })
    .expect("insert_file failed");
    file_id
}

#[test]
#[ignore]
fn enqueue_is_idempotent_per_file() {
    let repo = test_repo();
    let file_id = new_file(&repo, "u-enqueue-idempotent");
    let now = Utc::now();

    assert_eq!(repo.enqueue(file_id, now).unwrap(), EnqueueOutcome::Inserted);
    assert_eq!(repo.enqueue(file_id, now).unwrap(), EnqueueOutcome::AlreadyEnqueued);
}

#[test]
#[ignore]
fn claim_heartbeat_and_finalize_success_round_trip() {
    let repo = test_repo();
    let file_id = new_file(&repo, "u-claim-success");
    let now = Utc::now();
    repo.enqueue(file_id, now).unwrap();
    repo.mark_file_queued(file_id, now).unwrap();

    let worker = WorkerId("worker-a".to_string());
    let claimed = repo.claim(&worker, now).unwrap().expect("a queued job should be claimable");
    assert_eq!(claimed.file.id, file_id.to_string());

    assert!(repo.heartbeat(claimed.job.id.parse().unwrap(), &worker, now).unwrap());

    repo.finalize_success(
        claimed.job.id.parse().unwrap(),
        file_id,
        &format!("users/u-claim-success/files/{file_id}/report.json"),
        "v1",
        "v1",
        now,
    )
    .unwrap();

    let owner = UserId("u-claim-success".to_string());
    let row = repo.get_file_for_owner(file_id, &owner).unwrap().expect("file should exist");
    assert_eq!(row.status, FileStatus::Succeeded.as_str());
}

#[test]
#[ignore]
fn claim_is_exclusive_to_one_worker_at_a_time() {
    let repo = test_repo();
    let file_id = new_file(&repo, "u-claim-exclusive");
    let now = Utc::now();
    repo.enqueue(file_id, now).unwrap();

    let worker_a = WorkerId("worker-a".to_string());
    let worker_b = WorkerId("worker-b".to_string());

    let first = repo.claim(&worker_a, now).unwrap();
    assert!(first.is_some());

    let second = repo.claim(&worker_b, now).unwrap();
    assert!(second.is_none(), "a locked, non-stale job must not be claimable by another worker");
}

#[test]
#[ignore]
fn finalize_failure_reschedules_when_retriable_with_attempts_remaining() {
    use reportomat_types::Classified;

    let repo = test_repo();
    let file_id = new_file(&repo, "u-retry");
    let now = Utc::now();
    repo.enqueue(file_id, now).unwrap();

    let worker = WorkerId("worker-a".to_string());
    let claimed = repo.claim(&worker, now).unwrap().unwrap();
    let job_id = claimed.job.id.parse().unwrap();

    let err = Classified::new(ErrorCode::LlmTimeout, true, "timed out");
    repo.finalize_failure(job_id, file_id, &err, now, 30_000).unwrap();

    let owner = UserId("u-retry".to_string());
    let row = repo.get_file_for_owner(file_id, &owner).unwrap().unwrap();
    assert_eq!(row.status, FileStatus::Queued.as_str());
}

#[test]
#[ignore]
fn finalize_failure_is_terminal_for_a_fatal_error() {
    use reportomat_types::Classified;

    let repo = test_repo();
    let file_id = new_file(&repo, "u-fatal");
    let now = Utc::now();
    repo.enqueue(file_id, now).unwrap();

    let worker = WorkerId("worker-a".to_string());
    let claimed = repo.claim(&worker, now).unwrap().unwrap();
    let job_id = claimed.job.id.parse().unwrap();

    let err = Classified::fatal(ErrorCode::SchemaValidationFailed, "bad payload");
    repo.finalize_failure(job_id, file_id, &err, now, 30_000).unwrap();

    let owner = UserId("u-fatal".to_string());
    let row = repo.get_file_for_owner(file_id, &owner).unwrap().unwrap();
    assert_eq!(row.status, FileStatus::Failed.as_str());
    assert_eq!(row.error_code.as_deref(), Some("schema_validation_failed"));
}

#[test]
#[ignore]
fn a_stale_lease_is_reclaimed_by_another_worker_and_the_original_heartbeat_fails() {
    let repo = test_repo();
    let file_id = new_file(&repo, "u-stale-lease");

    let clock = FakeClock::new(Utc::now());
    let worker_a = WorkerId("worker-a".to_string());
    let worker_b = WorkerId("worker-b".to_string());

    repo.enqueue(file_id, clock.now()).unwrap();

    let first = repo.claim(&worker_a, clock.now()).unwrap().expect("should be claimable");
    let job_id = first.job.id.parse().unwrap();

    // Not yet stale: a second worker must not be able to steal the lease.
    assert!(repo.claim(&worker_b, clock.now()).unwrap().is_none());

    clock.advance(chrono::Duration::seconds(defaults::LOCK_TTL_SECONDS + 1));

    let second = repo
        .claim(&worker_b, clock.now())
        .unwrap()
        .expect("a stale lease should be reclaimable by another worker");
    assert_eq!(second.job.id, first.job.id);
    assert_eq!(second.job.locked_by.as_deref(), Some("worker-b"));

    // The original lessee no longer holds the lease.
    assert!(!repo.heartbeat(job_id, &worker_a, clock.now()).unwrap());
    assert!(repo.heartbeat(job_id, &worker_b, clock.now()).unwrap());
}

#[test]
#[ignore]
fn repeated_retriable_failures_exhaust_attempts_and_become_terminal() {
    use reportomat_types::Classified;

    let repo = test_repo();
    let file_id = new_file(&repo, "u-exhaust-attempts");

    let clock = FakeClock::new(Utc::now());
    let worker = WorkerId("worker-a".to_string());
    let err = Classified::new(ErrorCode::LlmTimeout, true, "timed out");

    repo.enqueue(file_id, clock.now()).unwrap();

    for attempt in 1..=defaults::MAX_ATTEMPTS {
        let claimed = repo
            .claim(&worker, clock.now())
            .unwrap()
            .unwrap_or_else(|| panic!("job should be claimable on attempt {attempt}"));
        let job_id = claimed.job.id.parse().unwrap();
        assert_eq!(claimed.job.attempts, attempt);

        repo.finalize_failure(job_id, file_id, &err, clock.now(), 0).unwrap();

        let owner = UserId("u-exhaust-attempts".to_string());
        let row = repo.get_file_for_owner(file_id, &owner).unwrap().unwrap();

        if attempt < defaults::MAX_ATTEMPTS {
            assert_eq!(
                row.status,
                FileStatus::Queued.as_str(),
                "attempt {attempt} of {} should still be retriable",
                defaults::MAX_ATTEMPTS
            );
        } else {
            assert_eq!(
                row.status,
                FileStatus::Failed.as_str(),
                "attempt {attempt} exhausts max_attempts and must be terminal"
            );
        }
    }
}
