use std::sync::Arc;

use dropshot::{HttpError, RequestContext};
use http::StatusCode;

use reportomat_core::Core;
use reportomat_types::UserId;

pub mod files;
mod prelude;

/// The header the out-of-scope auth collaborator is expected to set
/// once a request has been authenticated. Credential verification and
/// multipart parsing live upstream of this crate (§4.12); this is the
/// one seam where their output enters the core.
const OWNER_ID_HEADER: &str = "x-reportomat-user-id";

pub(crate) fn owner_id_from_request(
    rqctx: &RequestContext<Arc<Core>>,
) -> Result<UserId, HttpError> {
    rqctx
        .request
        .headers()
        .get(OWNER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .map(UserId::from)
        .ok_or_else(|| {
            HttpError::for_client_error(
                None,
                StatusCode::UNAUTHORIZED,
                "missing owner identity".to_string(),
            )
        })
}
