pub(crate) use std::sync::Arc;

pub(crate) use dropshot::{
    endpoint, HttpError, HttpResponseCreated, HttpResponseOk, Path as TypedPath,
    Query as TypedQuery, RequestContext, UntypedBody,
};
pub(crate) use http::StatusCode;
pub(crate) use schemars::JsonSchema;
pub(crate) use serde::{Deserialize, Serialize};
#[allow(unused_imports)]
pub(crate) use slog::{error, info, o, warn};

pub(crate) use reportomat_core::Core;

pub(crate) use super::owner_id_from_request;
