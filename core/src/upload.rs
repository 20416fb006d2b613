use reportomat_common::event_sink::FieldValue;
use reportomat_database::{EnqueueOutcome, NewFile, OperationError};
use reportomat_types::{
    storage_key_original, Classified, ErrorCode, FileExtension, FileId, FileStatus, UserId,
    MAX_FILE_SIZE_BYTES,
};
use slog::{error, info, o};

use crate::Core;

#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub user_id: UserId,
    pub original_filename: String,
    pub mime_type: Option<String>,
    pub size_bytes: u64,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct UploadOutcome {
    pub file_id: FileId,
    pub status: FileStatus,
}

#[derive(Debug, Clone)]
pub enum UploadError {
    InvalidFileType,
    FileTooLarge,
    UploadFailed(Classified),
}

/// Implements §4.6 end to end: validate, persist the row, write the
/// object, enqueue the job, and -- on any failure past the object
/// write -- compensate best-effort so no `files` row is left claiming
/// a job or object that doesn't exist.
pub async fn enqueue_upload(
    core: &Core,
    req: UploadRequest,
) -> Result<UploadOutcome, UploadError> {
    let ext = FileExtension::from_filename(&req.original_filename)
        .ok_or(UploadError::InvalidFileType)?;

    if req.size_bytes > MAX_FILE_SIZE_BYTES {
        return Err(UploadError::FileTooLarge);
    }

    let file_id = FileId::generate();
    let now = core.clock.now();
    let key = storage_key_original(&req.user_id, file_id, ext);
    let log = core.log.new(o!("file_id" => file_id.to_string(), "user_id" => req.user_id.to_string()));

    core.repo
        .insert_file(NewFile {
            id: file_id.to_string(),
            user_id: req.user_id.0.clone(),
            storage_bucket: core.bucket.clone(),
            storage_key_original: key.clone(),
            original_filename: req.original_filename.clone(),
            extension: ext.as_str().to_string(),
            mime_type: req.mime_type.clone(),
            size_bytes: req.size_bytes as i64,
            status: FileStatus::Uploading.as_str().to_string(),
            created_at: now,
            updated_at: now,
        })
        .map_err(|e| UploadError::UploadFailed(operation_to_classified(e, ErrorCode::S3PutFailed)))?;

    if let Err(put_err) = core.storage.put_bytes(&key, req.bytes).await {
        error!(log, "upload object write failed"; "error" => %put_err);
        let _ = core.repo.mark_file_failed(
            file_id,
            ErrorCode::S3PutFailed,
            &put_err.message,
            core.clock.now(),
        );
        return Err(UploadError::UploadFailed(put_err));
    }

    match core.repo.enqueue(file_id, now) {
        Ok(EnqueueOutcome::Inserted) | Ok(EnqueueOutcome::AlreadyEnqueued) => {}
        Err(enqueue_err) => {
            let classified = operation_to_classified(enqueue_err, ErrorCode::EnqueueFailed);
            let delete_failed = core.storage.delete(&key).await.is_err();

            let _ = core.repo.mark_file_failed(
                file_id,
                ErrorCode::EnqueueFailed,
                &classified.message,
                core.clock.now(),
            );

            core.events.emit(
                "orphan_file_without_job",
                [
                    ("user_id".to_string(), FieldValue::from(req.user_id.0.clone())),
                    ("file_id".to_string(), FieldValue::from(file_id.to_string())),
                    ("key".to_string(), FieldValue::from(key.clone())),
                    ("error".to_string(), FieldValue::from(classified.message.clone())),
                ]
                .into_iter()
                .collect(),
            );

            if delete_failed {
                core.events.emit(
                    "orphan_s3_object",
                    [
                        ("user_id".to_string(), FieldValue::from(req.user_id.0.clone())),
                        ("file_id".to_string(), FieldValue::from(file_id.to_string())),
                        ("key".to_string(), FieldValue::from(key.clone())),
                    ]
                    .into_iter()
                    .collect(),
                );
            }

            return Err(UploadError::UploadFailed(classified));
        }
    }

    let _ = core.repo.mark_file_queued(file_id, core.clock.now());
    info!(log, "file queued for processing"; "key" => %key);

    Ok(UploadOutcome { file_id, status: FileStatus::Queued })
}

fn operation_to_classified(e: OperationError, code: ErrorCode) -> Classified {
    match e {
        OperationError::Classified(c) => c,
        OperationError::Conflict(msg) => Classified::fatal(code, msg),
        OperationError::NotFound => Classified::fatal(code, "not found"),
        OperationError::Other(err) => Classified::fatal(code, err.to_string()),
    }
}
