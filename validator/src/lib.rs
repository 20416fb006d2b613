use std::collections::HashMap;
use std::sync::OnceLock;

use jsonschema::JSONSchema;
use serde_json::Value;

use reportomat_types::{
    sanitize, ValidationErrorEntry, ValidationFailure, MAX_VALIDATION_ERRORS,
};

const REPORT_V1: &str = include_str!("schemas/report_v1.json");

/// Schemas are embedded at compile time and compiled once on first use,
/// per version, matching §4.4's "compiled schemas are cached per
/// version". New versions are added here, never by mutating v1's file.
fn compiled_schemas() -> &'static HashMap<&'static str, JSONSchema<'static>> {
    static SCHEMAS: OnceLock<HashMap<&'static str, JSONSchema<'static>>> = OnceLock::new();
    SCHEMAS.get_or_init(|| {
        let mut map = HashMap::new();
        map.insert("v1", compile_schema(REPORT_V1));
        map
    })
}

fn compile_schema(raw: &'static str) -> JSONSchema<'static> {
    let value: &'static Value =
        Box::leak(Box::new(serde_json::from_str(raw).expect("embedded schema is valid JSON")));
    JSONSchema::compile(value).expect("embedded schema compiles")
}

/// Validate a parsed LLM report payload against the named schema
/// version. Bounded on failure: `summary` is sanitized and ≤ 280
/// chars, `errors` holds at most `MAX_VALIDATION_ERRORS` entries.
pub fn validate(payload: &Value, schema_version: &str) -> Result<(), ValidationFailure> {
    let schema = match compiled_schemas().get(schema_version) {
        Some(s) => s,
        None => {
            return Err(ValidationFailure {
                summary: sanitize(&format!("unknown schema version {schema_version}")),
                errors: Vec::new(),
            })
        }
    };

    match schema.validate(payload) {
        Ok(()) => Ok(()),
        Err(errors) => {
            let errors: Vec<ValidationErrorEntry> = errors
                .take(MAX_VALIDATION_ERRORS)
                .map(|e| ValidationErrorEntry {
                    instance_path: e.instance_path.to_string(),
                    keyword: format!("{:?}", e.kind),
                    message: sanitize(&e.to_string()),
                })
                .collect();

            let summary = sanitize(&format!(
                "schema validation failed for {schema_version}: {} error(s)",
                errors.len()
            ));

            Err(ValidationFailure { summary, errors })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn valid_payload_passes() {
        let payload = json!({"summary": "ok", "items": []});
        assert!(validate(&payload, "v1").is_ok());
    }

    #[test]
    fn payload_missing_required_fields_fails() {
        let payload = json!({"oops": 1});
        let err = validate(&payload, "v1").unwrap_err();
        assert!(!err.errors.is_empty());
        assert!(err.summary.contains("schema validation failed"));
    }

    #[test]
    fn unknown_schema_version_fails_closed() {
        let payload = json!({"summary": "ok", "items": []});
        let err = validate(&payload, "v99").unwrap_err();
        assert!(err.summary.contains("unknown schema version"));
    }
}
