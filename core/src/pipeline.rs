use slog::{error, info, o, warn, Logger};

use reportomat_common::backoff_ms;
use reportomat_common::event_sink::FieldValue;
use reportomat_database::ClaimedJob;
use reportomat_types::{
    storage_key_raw_llm_output, storage_key_report, Classified, ErrorCode, FileId, JobId,
    UserId, ACTIVE_REPORT_PROMPT_VERSION, ACTIVE_REPORT_SCHEMA_VERSION,
};
use reportomat_llm::LlmRequest;

use crate::Core;

/// Runs §4.7 for one claimed job, then finalizes success or failure
/// against the repository. The worker runtime owns heartbeating and
/// claim scheduling; this function only runs the pipeline itself.
pub async fn process_claimed_job(core: &Core, claimed: ClaimedJob) {
    let job_id: JobId = claimed
        .job
        .id
        .parse()
        .expect("job id column always holds a valid ulid");
    let file_id: FileId = claimed
        .job
        .file_id
        .parse()
        .expect("file id column always holds a valid ulid");

    let log = core.log.new(o!(
        "job_id" => job_id.to_string(),
        "file_id" => file_id.to_string(),
    ));

    let now = core.clock.now();

    match run_pipeline(core, &claimed, file_id, &log).await {
        Ok(storage_key_report) => {
            if let Err(e) = core.repo.finalize_success(
                job_id,
                file_id,
                &storage_key_report,
                ACTIVE_REPORT_PROMPT_VERSION,
                ACTIVE_REPORT_SCHEMA_VERSION,
                now,
            ) {
                error!(log, "finalize_success failed"; "error" => %e);
            } else {
                info!(log, "job finalized successfully");
            }
        }
        Err(classified) => {
            let backoff = backoff_ms(claimed.job.attempts as u32, core.jitter.as_ref());
            if let Err(e) =
                core.repo.finalize_failure(job_id, file_id, &classified, now, backoff)
            {
                error!(log, "finalize_failure failed"; "error" => %e);
            } else {
                info!(log, "job finalized with failure";
                    "code" => %classified.code, "retriable" => classified.retriable);
            }
        }
    }
}

async fn run_pipeline(
    core: &Core,
    claimed: &ClaimedJob,
    file_id: FileId,
    log: &Logger,
) -> Result<String, Classified> {
    let user_id = UserId(claimed.file.user_id.clone());
    let original_key = claimed.file.storage_key_original.clone();

    let transcript = core.storage.get_text(&original_key).await?;
    let trimmed = transcript.trim();
    if trimmed.is_empty() {
        return Err(Classified::fatal(
            ErrorCode::EmptyOriginalTranscript,
            "original transcript is empty after trimming whitespace",
        ));
    }

    let response = core
        .llm
        .generate_report(LlmRequest {
            transcript_text: trimmed.to_string(),
            prompt_version: ACTIVE_REPORT_PROMPT_VERSION.to_string(),
            schema_version: ACTIVE_REPORT_SCHEMA_VERSION.to_string(),
            timeout: core.llm_timeout,
        })
        .await?;

    if let Err(failure) =
        reportomat_validator::validate(&response.parsed_json, &response.schema_version)
    {
        let raw_key = storage_key_raw_llm_output(&user_id, file_id);
        if let Err(write_err) = core.storage.put_text(&raw_key, response.raw_text.clone()).await {
            warn!(log, "raw llm output write failed"; "error" => %write_err, "code" => %ErrorCode::S3WriteFailed);
        } else if let Err(e) = core.repo.save_raw_metadata(file_id, &raw_key, core.clock.now()) {
            warn!(log, "raw_output_metadata_update_failed"; "error" => %e);
            core.events.emit(
                "raw_output_metadata_update_failed",
                [
                    ("user_id".to_string(), FieldValue::from(user_id.0.clone())),
                    ("file_id".to_string(), FieldValue::from(file_id.to_string())),
                    ("error".to_string(), FieldValue::from(e.to_string())),
                ]
                .into_iter()
                .collect(),
            );
        }

        return Err(Classified::fatal(
            ErrorCode::SchemaValidationFailed,
            failure.summary,
        ));
    }

    let report_key = storage_key_report(&user_id, file_id);
    core.storage.put_text(&report_key, response.raw_text.clone()).await?;

    if let Err(e) = core.repo.save_report_metadata(
        file_id,
        &report_key,
        &response.prompt_version,
        &response.schema_version,
        core.clock.now(),
    ) {
        let delete_failed = core.storage.delete(&report_key).await.is_err();
        if delete_failed {
            core.events.emit(
                "orphan_report_object",
                [
                    ("user_id".to_string(), FieldValue::from(user_id.0.clone())),
                    ("file_id".to_string(), FieldValue::from(file_id.to_string())),
                    ("key".to_string(), FieldValue::from(report_key.clone())),
                ]
                .into_iter()
                .collect(),
            );
        }

        let retriable = matches!(e, reportomat_database::OperationError::Classified(ref c) if c.retriable);
        return Err(Classified::new(
            ErrorCode::DbUpdateFailed,
            retriable,
            e.to_string(),
        ));
    }

    Ok(report_key)
}
