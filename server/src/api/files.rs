use super::prelude::*;

use reportomat_core::{enqueue_upload, get_report, ReportError, UploadError, UploadRequest};
use reportomat_types::FileId;

#[derive(Deserialize, JsonSchema)]
pub(crate) struct UploadQuery {
    filename: String,
    mime_type: Option<String>,
}

#[derive(Serialize, JsonSchema)]
pub(crate) struct UploadResponse {
    file_id: String,
    status: String,
}

#[derive(Deserialize, JsonSchema)]
pub(crate) struct FilePath {
    id: String,
}

impl FilePath {
    fn file_id(&self) -> Result<FileId, HttpError> {
        self.id.parse().map_err(|_| {
            HttpError::for_client_error(
                Some("invalid_id".to_string()),
                StatusCode::BAD_REQUEST,
                "file id is not a valid identifier".to_string(),
            )
        })
    }
}

#[derive(Serialize, JsonSchema)]
pub(crate) struct ReportResponse {
    id: String,
    status: String,
    storage_key_report: String,
    report: serde_json::Value,
}

/// §4.6's upload enqueuer, fronted by the HTTP seam described in
/// §4.12. The body is the raw file bytes -- multipart parsing is out
/// of scope, handled upstream of this crate.
#[endpoint {
    method = POST,
    path = "/api/files/upload",
}]
pub(crate) async fn upload_file(
    rqctx: RequestContext<Arc<Core>>,
    query: TypedQuery<UploadQuery>,
    body: UntypedBody,
) -> Result<HttpResponseCreated<UploadResponse>, HttpError> {
    let core = rqctx.context();
    let owner_id = owner_id_from_request(&rqctx)?;
    let q = query.into_inner();
    let bytes = body.as_bytes().to_vec();

    info!(rqctx.log, "upload request"; "user_id" => %owner_id, "filename" => &q.filename, "size_bytes" => bytes.len());

    let req = UploadRequest {
        user_id: owner_id,
        original_filename: q.filename,
        mime_type: q.mime_type,
        size_bytes: bytes.len() as u64,
        bytes,
    };

    match enqueue_upload(core, req).await {
        Ok(outcome) => Ok(HttpResponseCreated(UploadResponse {
            file_id: outcome.file_id.to_string(),
            status: outcome.status.to_string(),
        })),
        Err(UploadError::InvalidFileType) => Err(HttpError::for_client_error(
            Some("invalid_file_type".to_string()),
            StatusCode::BAD_REQUEST,
            "file extension must be .txt or .vtt".to_string(),
        )),
        Err(UploadError::FileTooLarge) => Err(HttpError::for_client_error(
            Some("file_too_large".to_string()),
            StatusCode::PAYLOAD_TOO_LARGE,
            "file exceeds the maximum allowed size".to_string(),
        )),
        Err(UploadError::UploadFailed(c)) => {
            error!(rqctx.log, "upload failed"; "code" => %c.code, "message" => %c.message);
            Err(HttpError::for_internal_error("upload_failed".to_string()))
        }
    }
}

/// §4.9's owner report reader.
#[endpoint {
    method = GET,
    path = "/api/files/{id}/report",
}]
pub(crate) async fn get_file_report(
    rqctx: RequestContext<Arc<Core>>,
    path: TypedPath<FilePath>,
) -> Result<HttpResponseOk<ReportResponse>, HttpError> {
    let core = rqctx.context();
    let owner_id = owner_id_from_request(&rqctx)?;
    let file_id = path.into_inner().file_id()?;

    match get_report(core, &owner_id, file_id).await {
        Ok(view) => Ok(HttpResponseOk(ReportResponse {
            id: view.id.to_string(),
            status: view.status.to_string(),
            storage_key_report: view.storage_key_report,
            report: view.report,
        })),
        Err(ReportError::NotFound) => Err(HttpError::for_client_error(
            None,
            StatusCode::NOT_FOUND,
            "no such file".to_string(),
        )),
        Err(ReportError::NotReady) => Err(HttpError::for_client_error(
            Some("report_not_ready".to_string()),
            StatusCode::CONFLICT,
            "report is not ready".to_string(),
        )),
        Err(ReportError::FetchFailed(msg)) => {
            error!(rqctx.log, "report fetch failed"; "error" => %msg);
            Err(HttpError::for_internal_error("report_fetch_failed".to_string()))
        }
    }
}
