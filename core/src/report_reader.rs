use serde_json::Value;

use reportomat_common::event_sink::FieldValue;
use reportomat_types::{FileId, FileStatus, UserId};

use crate::Core;

#[derive(Debug, Clone)]
pub struct ReportView {
    pub id: FileId,
    pub status: FileStatus,
    pub storage_key_report: String,
    pub report: Value,
}

#[derive(Debug, Clone)]
pub enum ReportError {
    NotFound,
    NotReady,
    FetchFailed(String),
}

/// Implements §4.9. Non-existence and non-ownership both surface as
/// `NotFound` so a caller never learns from the error alone whether a
/// file id belongs to someone else.
pub async fn get_report(
    core: &Core,
    owner_id: &UserId,
    file_id: FileId,
) -> Result<ReportView, ReportError> {
    let file = core
        .repo
        .get_file_for_owner(file_id, owner_id)
        .map_err(|e| ReportError::FetchFailed(e.to_string()))?
        .ok_or(ReportError::NotFound)?;

    let status: FileStatus = match file.status.as_str() {
        "uploading" => FileStatus::Uploading,
        "queued" => FileStatus::Queued,
        "processing_run" => FileStatus::ProcessingRun,
        "succeeded" => FileStatus::Succeeded,
        "failed" => FileStatus::Failed,
        other => return Err(ReportError::FetchFailed(format!("unknown file status {other}"))),
    };

    let storage_key_report = match (status, file.storage_key_report) {
        (FileStatus::Succeeded, Some(key)) => key,
        _ => return Err(ReportError::NotReady),
    };

    let text = core.storage.get_text(&storage_key_report).await.map_err(|e| {
        emit_fetch_failed(core, owner_id, file_id, &e.message);
        ReportError::FetchFailed(e.message)
    })?;

    let report: Value = serde_json::from_str(&text).map_err(|e| {
        let message = format!("malformed report json: {e}");
        emit_fetch_failed(core, owner_id, file_id, &message);
        ReportError::FetchFailed(message)
    })?;

    Ok(ReportView { id: file_id, status, storage_key_report, report })
}

fn emit_fetch_failed(core: &Core, owner_id: &UserId, file_id: FileId, error: &str) {
    core.events.emit(
        "report_fetch_failed",
        [
            ("user_id".to_string(), FieldValue::from(owner_id.0.clone())),
            ("file_id".to_string(), FieldValue::from(file_id.to_string())),
            ("error".to_string(), FieldValue::from(error.to_string())),
        ]
        .into_iter()
        .collect(),
    );
}
