use reportomat_types::Classified;

/// Mirrors the teacher's `db::OperationError`: most database failures
/// are internal errors, but a handful of outcomes are meaningful to the
/// caller and must be distinguished rather than flattened to "internal
/// error". `Conflict` there is a unique-violation the caller treats as
/// idempotent success (§4.5's enqueue contract); `Classified` carries
/// the retriable flag the worker needs to decide reschedule vs. fail.
#[derive(Debug, thiserror::Error)]
pub enum OperationError {
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("not found")]
    NotFound,
    #[error(transparent)]
    Classified(#[from] Classified),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type OResult<T> = std::result::Result<T, OperationError>;

/// Classify a diesel error using the SQLSTATE-driven rules of §4.1,
/// folding it into a `Classified` so the repository's callers never see
/// a raw `diesel::result::Error`.
pub fn classify_diesel_error(
    e: diesel::result::Error,
    code: reportomat_types::ErrorCode,
) -> OperationError {
    use diesel::result::{DatabaseErrorKind, Error as DslError};

    match e {
        DslError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
            OperationError::Conflict(info.message().to_string())
        }
        DslError::DatabaseError(_, ref info) => {
            let sqlstate = info
                .details()
                .and_then(|d| d.split_whitespace().next())
                .unwrap_or("");
            let retriable = reportomat_types::is_transient_sqlstate(sqlstate);
            OperationError::Classified(Classified::new(
                code,
                retriable,
                info.message(),
            ))
        }
        DslError::NotFound => OperationError::NotFound,
        other => OperationError::Classified(Classified::new(
            code,
            false,
            other.to_string(),
        )),
    }
}
