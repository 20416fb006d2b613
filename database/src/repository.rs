use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::OptionalExtension;

use reportomat_types::{
    defaults, sanitize, Classified, ErrorCode, FileId, FileStatus, JobId,
    JobStatus, UserId, WorkerId,
};

use crate::error::{classify_diesel_error, OResult, OperationError};
use crate::models::{ClaimedJob, FileRow, NewFile, NewProcessingJob, ProcessingJobRow};
use crate::pool::Database;
use crate::schema::{files, processing_jobs};

/// The result of `enqueue`: a fresh job was inserted, or one already
/// existed for this `file_id` and the unique violation was folded into
/// a success outcome per §4.5/§8 property 5.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Inserted,
    AlreadyEnqueued,
}

#[derive(Debug, Clone)]
pub struct FileContext {
    pub file_id: FileId,
    pub user_id: UserId,
    pub storage_key_original: String,
}

/// The queue's durable operations: enqueue, claim, heartbeat, finalize,
/// and the file-metadata transitions the upload enqueuer and report
/// pipeline need. Every method here either completes in a single
/// statement or wraps its statements in one transaction -- nothing here
/// leaves `files` and `processing_jobs` observably inconsistent with
/// each other.
#[derive(Clone)]
pub struct JobRepository {
    db: Database,
}

impl JobRepository {
    pub fn new(db: Database) -> Self {
        JobRepository { db }
    }

    pub fn insert_file(&self, new: NewFile) -> OResult<FileRow> {
        let mut conn = self.db.get()?;
        diesel::insert_into(files::table)
            .values(&new)
            .execute(&mut conn)
            .map_err(|e| classify_diesel_error(e, ErrorCode::DbUpdateFailed))?;

        files::table
            .filter(files::id.eq(&new.id))
            .first::<FileRow>(&mut conn)
            .map_err(|e| classify_diesel_error(e, ErrorCode::DbUpdateFailed))
    }

    pub fn mark_file_queued(&self, file_id: FileId, now: DateTime<Utc>) -> OResult<()> {
        let mut conn = self.db.get()?;
        diesel::update(files::table.filter(files::id.eq(file_id.to_string())))
            .set((
                files::status.eq(FileStatus::Queued.as_str()),
                files::queued_at.eq(now),
                files::updated_at.eq(now),
            ))
            .execute(&mut conn)
            .map_err(|e| classify_diesel_error(e, ErrorCode::DbUpdateFailed))?;
        Ok(())
    }

    /// Best-effort: callers (the upload enqueuer's compensation path)
    /// are expected to log rather than propagate a failure here.
    pub fn mark_file_failed(
        &self,
        file_id: FileId,
        code: ErrorCode,
        message: &str,
        now: DateTime<Utc>,
    ) -> OResult<()> {
        let mut conn = self.db.get()?;
        diesel::update(files::table.filter(files::id.eq(file_id.to_string())))
            .set((
                files::status.eq(FileStatus::Failed.as_str()),
                files::error_code.eq(code.as_str()),
                files::error_message.eq(sanitize(message)),
                files::processed_at.eq(now),
                files::updated_at.eq(now),
            ))
            .execute(&mut conn)
            .map_err(|e| classify_diesel_error(e, ErrorCode::DbUpdateFailed))?;
        Ok(())
    }

    pub fn enqueue(&self, file_id: FileId, now: DateTime<Utc>) -> OResult<EnqueueOutcome> {
        let mut conn = self.db.get()?;
        let new_job = NewProcessingJob {
            id: JobId::generate().to_string(),
            file_id: file_id.to_string(),
            status: JobStatus::Queued.as_str().to_string(),
            attempts: 0,
            max_attempts: defaults::MAX_ATTEMPTS,
            next_run_at: now,
            lock_ttl_seconds: defaults::LOCK_TTL_SECONDS,
            created_at: now,
            updated_at: now,
        };

        match diesel::insert_into(processing_jobs::table)
            .values(&new_job)
            .execute(&mut conn)
        {
            Ok(_) => Ok(EnqueueOutcome::Inserted),
            Err(e) => match classify_diesel_error(e, ErrorCode::EnqueueFailed) {
                OperationError::Conflict(_) => Ok(EnqueueOutcome::AlreadyEnqueued),
                other => Err(other),
            },
        }
    }

    /// Claim one eligible job: either a freshly queued one, or one
    /// whose lease has gone stale (§4.5). Atomically flips the job to
    /// `processing` and the file to `processing_run` in one
    /// transaction so a reader never observes a claimed job against an
    /// unclaimed-looking file.
    pub fn claim(
        &self,
        worker_id: &WorkerId,
        now: DateTime<Utc>,
    ) -> OResult<Option<ClaimedJob>> {
        let mut conn = self.db.get()?;

        conn.transaction::<_, OperationError, _>(|conn| {
            let claimed: Option<ProcessingJobRow> = diesel::sql_query(
                r#"
                WITH candidate AS (
                    SELECT id FROM processing_jobs
                    WHERE (status = 'queued' AND next_run_at <= $1)
                       OR (status = 'processing'
                           AND COALESCE(heartbeat_at, locked_at)
                               + make_interval(secs => lock_ttl_seconds) < $1)
                    ORDER BY next_run_at, id
                    FOR UPDATE SKIP LOCKED
                    LIMIT 1
                )
                UPDATE processing_jobs AS j
                SET status = 'processing',
                    locked_at = $1,
                    locked_by = $2,
                    heartbeat_at = $1,
                    attempts = j.attempts + 1,
                    updated_at = $1
                FROM candidate
                WHERE j.id = candidate.id
                RETURNING j.*
                "#,
            )
            .bind::<diesel::sql_types::Timestamptz, _>(now)
            .bind::<diesel::sql_types::Text, _>(worker_id.to_string())
            .get_result(conn)
            .optional()
            .map_err(|e| classify_diesel_error(e, ErrorCode::DbUpdateFailed))?;

            let Some(job) = claimed else {
                return Ok(None);
            };

            diesel::update(files::table.filter(files::id.eq(&job.file_id)))
                .set((
                    files::status.eq(FileStatus::ProcessingRun.as_str()),
                    files::started_at.eq(now),
                    files::updated_at.eq(now),
                ))
                .execute(conn)
                .map_err(|e| classify_diesel_error(e, ErrorCode::DbUpdateFailed))?;

            let file = files::table
                .filter(files::id.eq(&job.file_id))
                .first::<FileRow>(conn)
                .map_err(|e| classify_diesel_error(e, ErrorCode::DbUpdateFailed))?;

            Ok(Some(ClaimedJob { job, file }))
        })
    }

    /// Extends a lease. Returns `false` (rather than an error) when no
    /// row matched -- the worker's lease is gone and it must abort
    /// (§5, §8 property 4).
    pub fn heartbeat(
        &self,
        job_id: JobId,
        worker_id: &WorkerId,
        now: DateTime<Utc>,
    ) -> OResult<bool> {
        let mut conn = self.db.get()?;
        let rows = diesel::update(
            processing_jobs::table
                .filter(processing_jobs::id.eq(job_id.to_string()))
                .filter(processing_jobs::locked_by.eq(worker_id.to_string()))
                .filter(processing_jobs::status.eq(JobStatus::Processing.as_str())),
        )
        .set((
            processing_jobs::heartbeat_at.eq(now),
            processing_jobs::updated_at.eq(now),
        ))
        .execute(&mut conn)
        .map_err(|e| classify_diesel_error(e, ErrorCode::DbUpdateFailed))?;

        Ok(rows == 1)
    }

    pub fn get_file_context(&self, file_id: FileId) -> OResult<FileContext> {
        let mut conn = self.db.get()?;
        let row = files::table
            .filter(files::id.eq(file_id.to_string()))
            .first::<FileRow>(&mut conn)
            .optional()
            .map_err(|e| classify_diesel_error(e, ErrorCode::DbUpdateFailed))?;

        match row {
            Some(f) => Ok(FileContext {
                file_id,
                user_id: UserId(f.user_id),
                storage_key_original: f.storage_key_original,
            }),
            None => Err(OperationError::Classified(Classified::fatal(
                ErrorCode::FileContextNotFound,
                "file context not found",
            ))),
        }
    }

    pub fn get_file_for_owner(
        &self,
        file_id: FileId,
        owner: &UserId,
    ) -> OResult<Option<FileRow>> {
        let mut conn = self.db.get()?;
        files::table
            .filter(files::id.eq(file_id.to_string()))
            .filter(files::user_id.eq(owner.to_string()))
            .first::<FileRow>(&mut conn)
            .optional()
            .map_err(|e| classify_diesel_error(e, ErrorCode::DbUpdateFailed))
    }

    pub fn save_report_metadata(
        &self,
        file_id: FileId,
        storage_key_report: &str,
        prompt_version: &str,
        schema_version: &str,
        now: DateTime<Utc>,
    ) -> OResult<()> {
        let mut conn = self.db.get()?;
        diesel::update(files::table.filter(files::id.eq(file_id.to_string())))
            .set((
                files::storage_key_report.eq(storage_key_report),
                files::prompt_version.eq(prompt_version),
                files::schema_version.eq(schema_version),
                files::updated_at.eq(now),
            ))
            .execute(&mut conn)
            .map_err(|e| classify_diesel_error(e, ErrorCode::DbUpdateFailed))?;
        Ok(())
    }

    pub fn save_raw_metadata(
        &self,
        file_id: FileId,
        storage_key_raw_llm_output: &str,
        now: DateTime<Utc>,
    ) -> OResult<()> {
        let mut conn = self.db.get()?;
        diesel::update(files::table.filter(files::id.eq(file_id.to_string())))
            .set((
                files::storage_key_raw_llm_output.eq(storage_key_raw_llm_output),
                files::updated_at.eq(now),
            ))
            .execute(&mut conn)
            .map_err(|e| classify_diesel_error(e, ErrorCode::DbUpdateFailed))?;
        Ok(())
    }

    /// Transitions the job+file pair to their terminal success state in
    /// one transaction (§4.5).
    pub fn finalize_success(
        &self,
        job_id: JobId,
        file_id: FileId,
        storage_key_report: &str,
        prompt_version: &str,
        schema_version: &str,
        now: DateTime<Utc>,
    ) -> OResult<()> {
        let mut conn = self.db.get()?;
        conn.transaction::<_, OperationError, _>(|conn| {
            diesel::update(
                processing_jobs::table.filter(processing_jobs::id.eq(job_id.to_string())),
            )
            .set((
                processing_jobs::status.eq(JobStatus::Succeeded.as_str()),
                processing_jobs::locked_at.eq(None::<DateTime<Utc>>),
                processing_jobs::locked_by.eq(None::<String>),
                processing_jobs::heartbeat_at.eq(None::<DateTime<Utc>>),
                processing_jobs::updated_at.eq(now),
            ))
            .execute(conn)
            .map_err(|e| classify_diesel_error(e, ErrorCode::DbUpdateFailed))?;

            diesel::update(files::table.filter(files::id.eq(file_id.to_string())))
                .set((
                    files::status.eq(FileStatus::Succeeded.as_str()),
                    files::storage_key_report.eq(storage_key_report),
                    files::prompt_version.eq(prompt_version),
                    files::schema_version.eq(schema_version),
                    files::error_code.eq(None::<String>),
                    files::error_message.eq(None::<String>),
                    files::processed_at.eq(now),
                    files::updated_at.eq(now),
                ))
                .execute(conn)
                .map_err(|e| classify_diesel_error(e, ErrorCode::DbUpdateFailed))?;

            Ok(())
        })
    }

    /// Either reschedules (retriable, attempts remain) or terminally
    /// fails the job+file pair, per §4.5's finalize_failure contract.
    pub fn finalize_failure(
        &self,
        job_id: JobId,
        file_id: FileId,
        err: &Classified,
        now: DateTime<Utc>,
        backoff_ms: i64,
    ) -> OResult<()> {
        let mut conn = self.db.get()?;
        conn.transaction::<_, OperationError, _>(|conn| {
            let job = processing_jobs::table
                .filter(processing_jobs::id.eq(job_id.to_string()))
                .first::<ProcessingJobRow>(conn)
                .map_err(|e| classify_diesel_error(e, ErrorCode::DbUpdateFailed))?;

            let will_retry = err.retriable && job.attempts < job.max_attempts;

            if will_retry {
                let next_run_at = now + chrono::Duration::milliseconds(backoff_ms);
                diesel::update(
                    processing_jobs::table.filter(processing_jobs::id.eq(&job.id)),
                )
                .set((
                    processing_jobs::status.eq(JobStatus::Queued.as_str()),
                    processing_jobs::next_run_at.eq(next_run_at),
                    processing_jobs::locked_at.eq(None::<DateTime<Utc>>),
                    processing_jobs::locked_by.eq(None::<String>),
                    processing_jobs::heartbeat_at.eq(None::<DateTime<Utc>>),
                    processing_jobs::last_error_code.eq(err.code.as_str()),
                    processing_jobs::last_error_message.eq(&err.message),
                    processing_jobs::updated_at.eq(now),
                ))
                .execute(conn)
                .map_err(|e| classify_diesel_error(e, ErrorCode::DbUpdateFailed))?;

                diesel::update(files::table.filter(files::id.eq(file_id.to_string())))
                    .set((
                        files::status.eq(FileStatus::Queued.as_str()),
                        files::updated_at.eq(now),
                    ))
                    .execute(conn)
                    .map_err(|e| classify_diesel_error(e, ErrorCode::DbUpdateFailed))?;
            } else {
                diesel::update(
                    processing_jobs::table.filter(processing_jobs::id.eq(&job.id)),
                )
                .set((
                    processing_jobs::status.eq(JobStatus::Failed.as_str()),
                    processing_jobs::locked_at.eq(None::<DateTime<Utc>>),
                    processing_jobs::locked_by.eq(None::<String>),
                    processing_jobs::heartbeat_at.eq(None::<DateTime<Utc>>),
                    processing_jobs::last_error_code.eq(err.code.as_str()),
                    processing_jobs::last_error_message.eq(&err.message),
                    processing_jobs::updated_at.eq(now),
                ))
                .execute(conn)
                .map_err(|e| classify_diesel_error(e, ErrorCode::DbUpdateFailed))?;

                diesel::update(files::table.filter(files::id.eq(file_id.to_string())))
                    .set((
                        files::status.eq(FileStatus::Failed.as_str()),
                        files::error_code.eq(err.code.as_str()),
                        files::error_message.eq(&err.message),
                        files::processed_at.eq(now),
                        files::updated_at.eq(now),
                    ))
                    .execute(conn)
                    .map_err(|e| classify_diesel_error(e, ErrorCode::DbUpdateFailed))?;
            }

            Ok(())
        })
    }
}
