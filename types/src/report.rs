/// The prompt/schema version pair the validator and LLM adapter
/// currently accept. Bumping either requires adding a new compiled
/// schema to the validator's cache (see `reportomat_validator`).
pub const ACTIVE_REPORT_PROMPT_VERSION: &str = "v1";
pub const ACTIVE_REPORT_SCHEMA_VERSION: &str = "v1";

/// A single entry in a schema validation failure report.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize, schemars::JsonSchema)]
pub struct ValidationErrorEntry {
    pub instance_path: String,
    pub keyword: String,
    pub message: String,
}

/// The bounded output of a failed schema validation, per §4.4: `summary`
/// is sanitized and capped at 280 characters, `errors` is capped at
/// `MAX_VALIDATION_ERRORS` entries.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize, schemars::JsonSchema)]
pub struct ValidationFailure {
    pub summary: String,
    pub errors: Vec<ValidationErrorEntry>,
}

pub const MAX_VALIDATION_ERRORS: usize = 20;
