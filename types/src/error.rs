use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The closed set of error codes the core can produce, each carrying a
/// fixed retriable/fatal classification. Unknown causes must be mapped
/// onto one of these before they leave the local classification layer;
/// see each adapter's `classify` function.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    LlmTimeout,
    LlmRateLimited,
    LlmTransient,
    LlmCallFailed,
    SchemaValidationFailed,
    FileContextNotFound,
    EmptyOriginalTranscript,
    EnqueueFailed,
    S3ReadFailed,
    S3WriteFailed,
    S3PutFailed,
    DbUpdateFailed,
    InvalidFileType,
    FileTooLarge,
}

impl ErrorCode {
    /// Whether this code, taken alone, is eligible for the backoff
    /// reschedule. `S3ReadFailed`/`S3WriteFailed`/`DbUpdateFailed` are
    /// only retriable when the underlying transport classifies as
    /// transient; callers construct a `Classified` rather than relying
    /// on this default for those three.
    pub fn default_retriable(self) -> bool {
        use ErrorCode::*;
        matches!(self, LlmTimeout | LlmRateLimited | LlmTransient)
    }

    pub fn as_str(self) -> &'static str {
        use ErrorCode::*;
        match self {
            LlmTimeout => "llm_timeout",
            LlmRateLimited => "llm_rate_limited",
            LlmTransient => "llm_transient",
            LlmCallFailed => "llm_call_failed",
            SchemaValidationFailed => "schema_validation_failed",
            FileContextNotFound => "file_context_not_found",
            EmptyOriginalTranscript => "empty_original_transcript",
            EnqueueFailed => "enqueue_failed",
            S3ReadFailed => "s3_read_failed",
            S3WriteFailed => "s3_write_failed",
            S3PutFailed => "s3_put_failed",
            DbUpdateFailed => "db_update_failed",
            InvalidFileType => "invalid_file_type",
            FileTooLarge => "file_too_large",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An error code paired with an explicit retriable flag and a sanitized
/// message, as produced by every I/O classification point in the core.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
pub struct Classified {
    pub code: ErrorCode,
    pub retriable: bool,
    pub message: String,
}

impl Classified {
    pub fn new(
        code: ErrorCode,
        retriable: bool,
        message: impl AsRef<str>,
    ) -> Self {
        Classified { code, retriable, message: sanitize(message.as_ref()) }
    }

    pub fn fatal(code: ErrorCode, message: impl AsRef<str>) -> Self {
        Self::new(code, false, message)
    }
}

impl std::fmt::Display for Classified {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for Classified {}

/// Maximum length, in characters, of any sanitized error message the
/// core emits in logs or user-visible responses.
pub const SANITIZE_MAX_CHARS: usize = 280;

/// Whitespace-collapse, trim, and truncate a raw error message so that
/// it is safe to log or return to a caller. Never passes through raw
/// model output, transcripts, or credentials -- callers are responsible
/// for not feeding those in to begin with.
pub fn sanitize(raw: &str) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    let trimmed = collapsed.trim();

    if trimmed.chars().count() <= SANITIZE_MAX_CHARS {
        trimmed.to_string()
    } else {
        trimmed.chars().take(SANITIZE_MAX_CHARS).collect()
    }
}

/// Classify a raw transport-level code (an HTTP status, or a POSIX-ish
/// network error name) as transient for the purposes of §4.1's retry
/// rules. Used by the storage and LLM adapters, which each wrap this
/// with their own fatal-code fallback.
pub fn is_transient_status(status: u16) -> bool {
    status == 429 || (500..=599).contains(&status)
}

const TRANSIENT_NETWORK_CODES: &[&str] = &[
    "ECONNRESET",
    "ECONNREFUSED",
    "ENETUNREACH",
    "EHOSTUNREACH",
    "ETIMEDOUT",
    "EAI_AGAIN",
];

pub fn is_transient_network_code(code: &str) -> bool {
    TRANSIENT_NETWORK_CODES.contains(&code)
}

/// Classify a Postgres SQLSTATE per §4.1: class `08` (connection
/// exception) and `53` (insufficient resources) are transient, as are
/// the two explicit serialization/deadlock codes.
pub fn is_transient_sqlstate(code: &str) -> bool {
    code.starts_with("08")
        || code.starts_with("53")
        || code == "40001"
        || code == "40P01"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_collapses_and_trims() {
        assert_eq!(sanitize("  a\n\tb   c  "), "a b c");
    }

    #[test]
    fn sanitize_truncates_to_280_chars() {
        let long = "x".repeat(500);
        let out = sanitize(&long);
        assert_eq!(out.chars().count(), SANITIZE_MAX_CHARS);
    }

    #[test]
    fn sqlstate_classes_08_and_53_are_transient() {
        assert!(is_transient_sqlstate("08006"));
        assert!(is_transient_sqlstate("53300"));
        assert!(is_transient_sqlstate("40001"));
        assert!(is_transient_sqlstate("40P01"));
        assert!(!is_transient_sqlstate("23505"));
    }

    #[test]
    fn status_5xx_and_429_are_transient() {
        assert!(is_transient_status(429));
        assert!(is_transient_status(503));
        assert!(!is_transient_status(404));
    }
}
