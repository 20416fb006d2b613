use chrono::{DateTime, Utc};
use diesel::prelude::*;

use crate::schema::{files, processing_jobs};

#[derive(Queryable, QueryableByName, Identifiable, Debug, Clone)]
#[diesel(table_name = files)]
pub struct FileRow {
    pub id: String,
    pub user_id: String,
    pub storage_bucket: String,
    pub storage_key_original: String,
    pub original_filename: String,
    pub extension: String,
    pub mime_type: Option<String>,
    pub size_bytes: i64,
    pub status: String,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub storage_key_report: Option<String>,
    pub storage_key_raw_llm_output: Option<String>,
    pub prompt_version: Option<String>,
    pub schema_version: Option<String>,
    pub processing_attempts: i32,
    pub queued_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = files)]
pub struct NewFile {
    pub id: String,
    pub user_id: String,
    pub storage_bucket: String,
    pub storage_key_original: String,
    pub original_filename: String,
    pub extension: String,
    pub mime_type: Option<String>,
    pub size_bytes: i64,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Queryable, QueryableByName, Identifiable, Debug, Clone)]
#[diesel(table_name = processing_jobs)]
pub struct ProcessingJobRow {
    pub id: String,
    pub file_id: String,
    pub status: String,
    pub attempts: i32,
    pub max_attempts: i32,
    pub next_run_at: DateTime<Utc>,
    pub locked_at: Option<DateTime<Utc>>,
    pub locked_by: Option<String>,
    pub heartbeat_at: Option<DateTime<Utc>>,
    pub lock_ttl_seconds: i64,
    pub last_error_code: Option<String>,
    pub last_error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = processing_jobs)]
pub struct NewProcessingJob {
    pub id: String,
    pub file_id: String,
    pub status: String,
    pub attempts: i32,
    pub max_attempts: i32,
    pub next_run_at: DateTime<Utc>,
    pub lock_ttl_seconds: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A job together with the file context the processor needs; this is
/// what `claim` hands back to the caller.
#[derive(Debug, Clone)]
pub struct ClaimedJob {
    pub job: ProcessingJobRow,
    pub file: FileRow,
}
