//! Validation of structured LLM replies.
//!
//! The judge and the extractor ask the model for a JSON object. Replies are
//! free text, so the object is first located in the reply, then checked
//! against an embedded JSON Schema before it is deserialized.

use lazy_static::lazy_static;
use regex::Regex;
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::OnceLock;
use thiserror::Error;

const JUDGE_DIMENSION_SCHEMA_JSON: &str = include_str!("../schemas/judge_dimension.schema.json");
const CRITICAL_ERRORS_SCHEMA_JSON: &str = include_str!("../schemas/critical_errors.schema.json");
const EXTRACTION_SCHEMA_JSON: &str = include_str!("../schemas/extraction.schema.json");

static JUDGE_DIMENSION_SCHEMA: OnceLock<Result<jsonschema::Validator, String>> = OnceLock::new();
static CRITICAL_ERRORS_SCHEMA: OnceLock<Result<jsonschema::Validator, String>> = OnceLock::new();
static EXTRACTION_SCHEMA: OnceLock<Result<jsonschema::Validator, String>> = OnceLock::new();

lazy_static! {
    static ref FENCED_JSON: Regex = Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```").unwrap();
}

/// Shapes of structured reply the runtime asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputSchema {
    /// `{score: int, explanation: string}`
    JudgeDimension,
    /// `{critical_errors: [string]}`
    CriticalErrors,
    /// One field per extracted decision document.
    Extraction,
}

impl OutputSchema {
    pub fn name(&self) -> &'static str {
        match self {
            OutputSchema::JudgeDimension => "judge_dimension",
            OutputSchema::CriticalErrors => "critical_errors",
            OutputSchema::Extraction => "extraction",
        }
    }

    fn validator(&self) -> Result<&'static jsonschema::Validator, String> {
        let (cell, source) = match self {
            OutputSchema::JudgeDimension => (&JUDGE_DIMENSION_SCHEMA, JUDGE_DIMENSION_SCHEMA_JSON),
            OutputSchema::CriticalErrors => (&CRITICAL_ERRORS_SCHEMA, CRITICAL_ERRORS_SCHEMA_JSON),
            OutputSchema::Extraction => (&EXTRACTION_SCHEMA, EXTRACTION_SCHEMA_JSON),
        };

        cell.get_or_init(|| {
            let schema_value: serde_json::Value = serde_json::from_str(source)
                .map_err(|e| format!("Invalid schema JSON: {}", e))?;
            jsonschema::options()
                .build(&schema_value)
                .map_err(|e| format!("Failed to compile schema: {}", e))
        })
        .as_ref()
        .map_err(Clone::clone)
    }
}

impl fmt::Display for OutputSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A reply that could not be turned into the requested structure.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("No JSON object found in reply: {snippet}")]
    NoJson { snippet: String },

    #[error("Reply does not match {schema} schema: {}", .errors.join("; "))]
    Schema {
        schema: OutputSchema,
        errors: Vec<String>,
    },

    #[error("Reply JSON could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Locate a JSON object in an LLM reply.
///
/// Tried in order: the whole reply, a fenced ```json block, and the span
/// from the first `{` to the last `}`.
pub fn extract_json(text: &str) -> Result<serde_json::Value, ValidationError> {
    let trimmed = text.trim();

    let fenced = FENCED_JSON
        .captures(trimmed)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str());
    let braced = match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start < end => Some(&trimmed[start..=end]),
        _ => None,
    };

    [Some(trimmed), fenced, braced]
        .into_iter()
        .flatten()
        .filter_map(|candidate| serde_json::from_str::<serde_json::Value>(candidate).ok())
        .find(|value| value.is_object())
        .ok_or_else(|| ValidationError::NoJson {
            snippet: trimmed.chars().take(120).collect(),
        })
}

/// Validate a JSON value against one of the embedded schemas.
pub fn validate_output(schema: OutputSchema, value: &serde_json::Value) -> Result<(), ValidationError> {
    let validator = schema.validator().map_err(|e| ValidationError::Schema {
        schema,
        errors: vec![e],
    })?;

    let errors: Vec<String> = validator
        .iter_errors(value)
        .map(|e| format!("{} at {}", e, e.instance_path))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::Schema { schema, errors })
    }
}

/// Extract, validate and decode a structured reply.
pub fn parse_output<T: DeserializeOwned>(schema: OutputSchema, text: &str) -> Result<T, ValidationError> {
    let value = extract_json(text)?;
    validate_output(schema, &value)?;
    Ok(serde_json::from_value(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Deserialize)]
    struct DimensionReply {
        score: i64,
        explanation: String,
    }

    #[test]
    fn test_extract_raw_json() {
        let value = extract_json(r#"  {"score": 4, "explanation": "ok"} "#).unwrap();
        assert_eq!(value["score"], 4);
    }

    #[test]
    fn test_extract_fenced_json() {
        let reply = "Voici mon évaluation :\n```json\n{\"score\": 2, \"explanation\": \"lacunes\"}\n```\nMerci.";
        let value = extract_json(reply).unwrap();
        assert_eq!(value["score"], 2);
    }

    #[test]
    fn test_extract_braced_span() {
        let reply = "Score final {\"score\": 5, \"explanation\": \"parfait\"} fin";
        let value = extract_json(reply).unwrap();
        assert_eq!(value["explanation"], "parfait");
    }

    #[test]
    fn test_extract_no_json() {
        let err = extract_json("Je ne peux pas évaluer ce document.").unwrap_err();
        assert!(matches!(err, ValidationError::NoJson { .. }));
    }

    #[test]
    fn test_judge_dimension_schema() {
        assert!(validate_output(OutputSchema::JudgeDimension, &json!({"score": 3, "explanation": "x"})).is_ok());
        assert!(validate_output(OutputSchema::JudgeDimension, &json!({"score": 4.5, "explanation": "x"})).is_ok());
        assert!(validate_output(OutputSchema::JudgeDimension, &json!({"score": "3", "explanation": "x"})).is_err());
        assert!(validate_output(OutputSchema::JudgeDimension, &json!({"explanation": "x"})).is_err());
    }

    #[test]
    fn test_critical_errors_schema() {
        assert!(validate_output(OutputSchema::CriticalErrors, &json!({"critical_errors": []})).is_ok());
        let err = validate_output(OutputSchema::CriticalErrors, &json!({"critical_errors": "none"})).unwrap_err();
        assert!(err.to_string().contains("critical_errors"));
    }

    #[test]
    fn test_extraction_schema_accepts_lists() {
        let value = json!({
            "parties": ["Sophie Martin (demanderesse)", "Menuiserie Léman Sàrl"],
            "facts_timeline": "2021: contrat\n2022: résiliation",
            "evidence": "Contrat du 3 mars",
            "legal_bases": "Art. 97 CO",
            "arguments": "...",
            "considerations": "...",
            "judgment": "..."
        });
        assert!(validate_output(OutputSchema::Extraction, &value).is_ok());
    }

    #[test]
    fn test_extraction_schema_missing_field() {
        let err = validate_output(OutputSchema::Extraction, &json!({"parties": "x"})).unwrap_err();
        match err {
            ValidationError::Schema { schema, errors } => {
                assert_eq!(schema, OutputSchema::Extraction);
                assert!(!errors.is_empty());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_parse_output() {
        let reply: DimensionReply =
            parse_output(OutputSchema::JudgeDimension, "```json\n{\"score\": 7, \"explanation\": \"trop\"}\n```").unwrap();
        assert_eq!(reply.score, 7);
        assert_eq!(reply.explanation, "trop");
    }
}
