//! Evaluation rubrics.
//!
//! A rubric is a list of weighted dimensions, each with a 1..=5 scoring
//! scale. The judge scores every dimension separately and the overall score
//! is the weight-averaged sum.
//!
//! Built-in rubrics cover the five evaluable steps. A rubric directory may
//! override any of them with `<step>.yaml`:
//!
//! ```yaml
//! step_name: qualification
//! dimensions:
//!   - name: Completeness
//!     description: Does the situation report capture all relevant aspects?
//!     weight: 1.0
//!     criteria:
//!       1: Missing multiple critical elements
//!       2: ...
//!       5: Fully comprehensive
//! ```

mod builtin;
pub mod schema;

pub use builtin::builtin_rubric;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::step::EvalStep;

/// Tolerance for the weight sum check.
pub const WEIGHT_TOLERANCE: f64 = 1e-6;

/// Errors from rubric loading and validation.
#[derive(Error, Debug)]
pub enum RubricError {
    #[error("Failed to read rubric {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid rubric YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid rubric structure: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Rubric schema validation failed: {}", .0.join("; "))]
    Schema(Vec<String>),

    #[error("Invalid rubric: {0}")]
    Invalid(String),
}

/// One scored dimension of a rubric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dimension {
    pub name: String,
    pub description: String,
    pub weight: f64,
    /// Score (1..=5) to criterion text.
    pub criteria: BTreeMap<u8, String>,
}

impl Dimension {
    /// Criteria as judge prompt lines: `Score 1: ...`.
    pub fn criteria_text(&self) -> String {
        self.criteria
            .iter()
            .map(|(score, text)| format!("Score {}: {}", score, text))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Weighted dimensions for one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rubric {
    pub step_name: String,
    pub dimensions: Vec<Dimension>,
}

impl Rubric {
    /// Parse and validate a rubric from YAML text.
    pub fn from_yaml(yaml: &str) -> Result<Self, RubricError> {
        let raw: serde_yaml::Value = serde_yaml::from_str(yaml)?;
        let json = schema::yaml_to_json(&raw);
        schema::validate_rubric_schema(&json).map_err(RubricError::Schema)?;

        let rubric: Rubric = serde_json::from_value(json)?;
        rubric.validate()?;
        Ok(rubric)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, RubricError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| RubricError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&text)
    }

    /// Check the invariants the schema cannot express.
    pub fn validate(&self) -> Result<(), RubricError> {
        if self.dimensions.is_empty() {
            return Err(RubricError::Invalid(format!(
                "rubric '{}' has no dimensions",
                self.step_name
            )));
        }

        let mut seen = HashSet::new();
        for dim in &self.dimensions {
            if !seen.insert(dim.name.as_str()) {
                return Err(RubricError::Invalid(format!(
                    "duplicate dimension '{}'",
                    dim.name
                )));
            }
            if !(dim.weight > 0.0 && dim.weight <= 1.0) {
                return Err(RubricError::Invalid(format!(
                    "dimension '{}' has weight {} outside (0, 1]",
                    dim.name, dim.weight
                )));
            }
            if !dim.criteria.keys().copied().eq(1..=5) {
                return Err(RubricError::Invalid(format!(
                    "dimension '{}' must define criteria for scores 1 to 5",
                    dim.name
                )));
            }
        }

        let total = self.total_weight();
        if (total - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(RubricError::Invalid(format!(
                "weights of '{}' sum to {}, expected 1.0",
                self.step_name, total
            )));
        }

        Ok(())
    }

    pub fn total_weight(&self) -> f64 {
        self.dimensions.iter().map(|d| d.weight).sum()
    }

    pub fn dimension(&self, name: &str) -> Option<&Dimension> {
        self.dimensions.iter().find(|d| d.name == name)
    }

    /// Σ score × weight over the rubric's dimensions.
    ///
    /// Dimensions without a score contribute nothing.
    pub fn weighted_score(&self, scores: &BTreeMap<String, u8>) -> f64 {
        self.dimensions
            .iter()
            .filter_map(|d| scores.get(&d.name).map(|s| f64::from(*s) * d.weight))
            .sum()
    }

    /// Markdown description of the rubric for judge prompts.
    pub fn to_text(&self) -> String {
        let mut lines = vec![format!("# Evaluation Rubric: {}\n", self.step_name)];

        for dim in &self.dimensions {
            lines.push(format!("## {} (weight: {})", dim.name, dim.weight));
            lines.push(format!("{}\n", dim.description));
            lines.push("Scoring criteria:".to_string());
            for (score, text) in &dim.criteria {
                lines.push(format!("- **{}**: {}", score, text));
            }
            lines.push(String::new());
        }

        lines.join("\n")
    }
}

/// Rubric for a step: `<override_dir>/<step>.yaml` when present, the
/// built-in rubric otherwise.
pub fn get_rubric(step: EvalStep, override_dir: Option<&Path>) -> Result<Rubric, RubricError> {
    if let Some(dir) = override_dir {
        let path = dir.join(format!("{}.yaml", step.as_str()));
        if path.is_file() {
            let rubric = Rubric::from_yaml_file(&path)?;
            if rubric.step_name != step.as_str() {
                tracing::warn!(
                    path = %path.display(),
                    declared = %rubric.step_name,
                    step = %step,
                    "Rubric file declares a different step name"
                );
            }
            tracing::debug!(path = %path.display(), "Loaded rubric override");
            return Ok(rubric);
        }
    }

    Ok(builtin_rubric(step))
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_YAML: &str = r#"
step_name: qualification
dimensions:
  - name: Clarity
    description: Is it clear?
    weight: 0.4
    criteria:
      1: Unclear
      2: Somewhat unclear
      3: Adequate
      4: Clear
      5: Crystal clear
  - name: Accuracy
    description: Is it accurate?
    weight: 0.6
    criteria:
      1: Wrong
      2: Mostly wrong
      3: Mixed
      4: Mostly right
      5: Right
"#;

    #[test]
    fn test_builtin_weights_sum_to_one() {
        for step in EvalStep::all() {
            let rubric = builtin_rubric(*step);
            assert_eq!(rubric.step_name, step.as_str());
            assert_eq!(rubric.dimensions.len(), 5);
            rubric.validate().unwrap();
        }
    }

    #[test]
    fn test_weighted_score_bounds() {
        for step in EvalStep::all() {
            let rubric = builtin_rubric(*step);
            let all = |s: u8| -> BTreeMap<String, u8> {
                rubric.dimensions.iter().map(|d| (d.name.clone(), s)).collect()
            };
            assert!((rubric.weighted_score(&all(1)) - 1.0).abs() < 1e-9);
            assert!((rubric.weighted_score(&all(5)) - 5.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_weighted_score_mixed() {
        let rubric = Rubric::from_yaml(VALID_YAML).unwrap();
        let scores = BTreeMap::from([("Clarity".to_string(), 5), ("Accuracy".to_string(), 3)]);
        assert!((rubric.weighted_score(&scores) - 3.8).abs() < 1e-9);
    }

    #[test]
    fn test_from_yaml_valid() {
        let rubric = Rubric::from_yaml(VALID_YAML).unwrap();
        assert_eq!(rubric.dimensions.len(), 2);
        assert_eq!(rubric.dimensions[0].criteria[&5], "Crystal clear");
    }

    #[test]
    fn test_from_yaml_bad_weight_sum() {
        let yaml = VALID_YAML.replace("weight: 0.6", "weight: 0.5");
        let err = Rubric::from_yaml(&yaml).unwrap_err();
        assert!(matches!(err, RubricError::Invalid(_)));
        assert!(err.to_string().contains("sum"));
    }

    #[test]
    fn test_from_yaml_duplicate_dimension() {
        let yaml = VALID_YAML.replace("name: Accuracy", "name: Clarity");
        assert!(matches!(Rubric::from_yaml(&yaml), Err(RubricError::Invalid(_))));
    }

    #[test]
    fn test_from_yaml_missing_criterion_fails_schema() {
        let yaml = VALID_YAML.replace("      5: Right\n", "");
        assert!(matches!(Rubric::from_yaml(&yaml), Err(RubricError::Schema(_))));
    }

    #[test]
    fn test_to_text_format() {
        let text = builtin_rubric(EvalStep::Qualification).to_text();
        assert!(text.starts_with("# Evaluation Rubric: qualification\n\n## Completeness (weight: 0.3)\n"));
        assert!(text.contains("Scoring criteria:\n- **1**: Missing multiple critical elements"));
        assert!(text.contains("## Clarity (weight: 0.1)"));
    }

    #[test]
    fn test_criteria_text() {
        let rubric = builtin_rubric(EvalStep::FactualRecord);
        let text = rubric.dimensions[0].criteria_text();
        assert!(text.starts_with("Score 1: Missing many critical facts\nScore 2:"));
        assert_eq!(text.lines().count(), 5);
    }

    #[test]
    fn test_get_rubric_prefers_override() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("qualification.yaml"), VALID_YAML).unwrap();

        let overridden = get_rubric(EvalStep::Qualification, Some(dir.path())).unwrap();
        assert_eq!(overridden.dimensions.len(), 2);

        let builtin = get_rubric(EvalStep::Recommendations, Some(dir.path())).unwrap();
        assert_eq!(builtin, builtin_rubric(EvalStep::Recommendations));
    }
}
