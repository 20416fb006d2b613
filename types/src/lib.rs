mod error;
mod ids;
mod report;
mod status;

pub use error::{
    is_transient_network_code, is_transient_sqlstate, is_transient_status,
    sanitize, Classified, ErrorCode, SANITIZE_MAX_CHARS,
};
pub use ids::{FileId, JobId, UserId, WorkerId};
pub use report::{
    ValidationErrorEntry, ValidationFailure, ACTIVE_REPORT_PROMPT_VERSION,
    ACTIVE_REPORT_SCHEMA_VERSION, MAX_VALIDATION_ERRORS,
};
pub use status::{FileExtension, FileStatus, JobStatus};

/// Files larger than this are rejected by the upload enqueuer with
/// `file_too_large` (§3, §4.6).
pub const MAX_FILE_SIZE_BYTES: u64 = 10 * 1024 * 1024;

/// Default values for the worker runtime and job repository, per §4.5
/// and §4.8.
pub mod defaults {
    pub const MAX_ATTEMPTS: i32 = 4;
    pub const LOCK_TTL_SECONDS: i64 = 300;
    pub const WORKER_CONCURRENCY: usize = 2;
    pub const WORKER_POLL_MS: u64 = 1000;
    pub const WORKER_LLM_TIMEOUT_MS: u64 = 60_000;
    pub const BACKOFF_BASE_MS: i64 = 30_000;
    pub const BACKOFF_MULTIPLIER: i64 = 4;
    pub const BACKOFF_JITTER_FRACTION: f64 = 0.20;
}

/// Compute the storage key for a file's original upload, rendered
/// report, or raw LLM diagnostic dump, per the layout fixed in §6.
pub fn storage_key_original(
    user_id: &UserId,
    file_id: FileId,
    ext: FileExtension,
) -> String {
    format!("users/{}/files/{}/original.{}", user_id, file_id, ext.as_str())
}

pub fn storage_key_report(user_id: &UserId, file_id: FileId) -> String {
    format!("users/{}/files/{}/report.json", user_id, file_id)
}

pub fn storage_key_raw_llm_output(user_id: &UserId, file_id: FileId) -> String {
    format!("users/{}/files/{}/raw_llm_output.json", user_id, file_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_keys_follow_the_fixed_layout() {
        let u = UserId::from("u1");
        let f: FileId = "01ARZ3NDEKTSV4RRFFQ69G5FAV".parse().unwrap();
        assert_eq!(
            storage_key_original(&u, f, FileExtension::Txt),
            format!("users/u1/files/{f}/original.txt")
        );
        assert_eq!(
            storage_key_report(&u, f),
            format!("users/u1/files/{f}/report.json")
        );
    }

    #[test]
    fn extension_from_filename_is_case_insensitive() {
        assert_eq!(
            FileExtension::from_filename("call.VTT"),
            Some(FileExtension::Vtt)
        );
        assert_eq!(FileExtension::from_filename("call.mp3"), None);
        assert_eq!(FileExtension::from_filename("noext"), None);
    }
}
