//! Rubric-driven LLM judge.
//!
//! A prediction is scored against its ground truth one rubric dimension at
//! a time, then a final call lists critical errors. Every reply must carry a
//! JSON object matching the embedded schema; anything else fails the case.

use serde::Deserialize;
use thiserror::Error;

use lexic_core::{
    parse_output, DimensionScore, EvalStep, OutputSchema, Rubric, StepEvaluation, ValidationError,
};

use crate::client::LlmClient;
use crate::prompts::{PromptCategory, PromptError, PromptLibrary, PromptTemplate};
use crate::providers::ProviderError;

/// Errors from judging a prediction.
#[derive(Error, Debug)]
pub enum JudgeError {
    #[error("LLM call failed: {0}")]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Prompt(#[from] PromptError),

    #[error("Malformed judge reply for {target}: {source}")]
    MalformedOutput {
        target: String,
        #[source]
        source: ValidationError,
    },
}

#[derive(Debug, Deserialize)]
struct DimensionReply {
    score: f64,
    explanation: String,
}

#[derive(Debug, Deserialize)]
struct CriticalErrorsReply {
    critical_errors: Vec<String>,
}

/// Scores predictions for one step with its rubric.
pub struct Judge {
    step: EvalStep,
    rubric: Rubric,
    client: LlmClient,
    dimension_prompt: PromptTemplate,
    errors_prompt: PromptTemplate,
}

impl Judge {
    pub fn new(
        step: EvalStep,
        rubric: Rubric,
        prompts: &PromptLibrary,
        client: LlmClient,
    ) -> Result<Self, JudgeError> {
        Ok(Self {
            step,
            rubric,
            client,
            dimension_prompt: prompts.get(PromptCategory::Judge, "evaluate_dimension")?.clone(),
            errors_prompt: prompts
                .get(PromptCategory::Judge, "identify_critical_errors")?
                .clone(),
        })
    }

    pub fn rubric(&self) -> &Rubric {
        &self.rubric
    }

    /// Score `prediction` against `ground_truth` on every dimension, then
    /// collect critical errors.
    pub async fn evaluate(
        &self,
        case_id: &str,
        prediction: &str,
        ground_truth: &str,
    ) -> Result<StepEvaluation, JudgeError> {
        let mut scores = Vec::with_capacity(self.rubric.dimensions.len());

        for dim in &self.rubric.dimensions {
            let criteria = dim.criteria_text();
            let messages = self.dimension_prompt.render(&[
                ("dimension_name", dim.name.as_str()),
                ("dimension_description", dim.description.as_str()),
                ("scoring_criteria", criteria.as_str()),
                ("prediction", prediction),
                ("ground_truth", ground_truth),
            ])?;
            let reply = self.client.complete(messages).await?;
            let parsed: DimensionReply = parse_output(OutputSchema::JudgeDimension, &reply)
                .map_err(|source| JudgeError::MalformedOutput {
                    target: dim.name.clone(),
                    source,
                })?;

            let score = clamp_score(parsed.score);
            if f64::from(score) != parsed.score.round() {
                tracing::warn!(
                    case_id,
                    dimension = %dim.name,
                    raw = parsed.score,
                    clamped = score,
                    "Judge score out of range"
                );
            }
            tracing::debug!(case_id, dimension = %dim.name, score, "Dimension scored");

            scores.push(DimensionScore {
                dimension: dim.name.clone(),
                score,
                explanation: parsed.explanation.trim().to_string(),
            });
        }

        let rubric_text = self.rubric.to_text();
        let messages = self.errors_prompt.render(&[
            ("prediction", prediction),
            ("ground_truth", ground_truth),
            ("rubric", rubric_text.as_str()),
        ])?;
        let reply = self.client.complete(messages).await?;
        let parsed: CriticalErrorsReply = parse_output(OutputSchema::CriticalErrors, &reply)
            .map_err(|source| JudgeError::MalformedOutput {
                target: "critical_errors".to_string(),
                source,
            })?;
        let critical_errors: Vec<String> = parsed
            .critical_errors
            .into_iter()
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty())
            .collect();

        let evaluation =
            StepEvaluation::from_scores(case_id, self.step, &self.rubric, scores, critical_errors);
        tracing::info!(
            case_id,
            step = %self.step,
            overall_score = evaluation.overall_score,
            critical_errors = evaluation.critical_errors.len(),
            "Case judged"
        );
        Ok(evaluation)
    }
}

/// Nearest whole score in 1..=5.
fn clamp_score(raw: f64) -> u8 {
    raw.round().clamp(1.0, 5.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelRole;
    use crate::testing::{runtime, ScriptedProvider};
    use lexic_core::builtin_rubric;

    fn dim_reply(score: i64) -> String {
        format!(r#"{{"score": {}, "explanation": "Analyse de la dimension."}}"#, score)
    }

    #[test]
    fn test_clamp_score() {
        assert_eq!(clamp_score(0.0), 1);
        assert_eq!(clamp_score(-3.0), 1);
        assert_eq!(clamp_score(3.0), 3);
        assert_eq!(clamp_score(7.0), 5);
        assert_eq!(clamp_score(4.0), 4);
        assert_eq!(clamp_score(3.4), 3);
        assert_eq!(clamp_score(4.5), 5);
    }

    #[tokio::test]
    async fn test_evaluate_scores_every_dimension() {
        let dir = tempfile::tempdir().unwrap();
        let rubric = builtin_rubric(EvalStep::Qualification);
        let n = rubric.dimensions.len();

        let mut replies: Vec<String> = (0..n).map(|_| dim_reply(4)).collect();
        replies.push(
            "Voici mon analyse:\n```json\n{\"critical_errors\": [\"Délai de prescription omis\", \"  \"]}\n```"
                .to_string(),
        );
        let provider = ScriptedProvider::new(replies);
        let rt = runtime(dir.path(), provider.clone());
        let judge = Judge::new(
            EvalStep::Qualification,
            rubric,
            &rt.prompts,
            rt.client(ModelRole::Judge),
        )
        .unwrap();

        let eval = judge.evaluate("case_001_pl", "prédiction", "référence").await.unwrap();

        assert_eq!(eval.scores.len(), n);
        assert!(eval.scores.iter().all(|s| s.score == 4));
        assert!((eval.overall_score - 4.0).abs() < 1e-9);
        assert_eq!(eval.critical_errors, vec!["Délai de prescription omis".to_string()]);
        assert_eq!(provider.request_count(), n + 1);

        // Judge calls are deterministic.
        let requests = provider.requests.lock();
        assert!(requests.iter().all(|(_, config)| config.temperature == 0.0));
        assert!(requests[0].0[1].content.contains("Score 1:"));
    }

    #[tokio::test]
    async fn test_out_of_range_scores_are_clamped() {
        let dir = tempfile::tempdir().unwrap();
        let rubric = builtin_rubric(EvalStep::InitialAnalysis);
        let n = rubric.dimensions.len();

        let mut replies = vec![dim_reply(9)];
        replies.extend((1..n).map(|_| dim_reply(0)));
        replies.push(r#"{"critical_errors": []}"#.to_string());
        let rt = runtime(dir.path(), ScriptedProvider::new(replies));
        let judge = Judge::new(
            EvalStep::InitialAnalysis,
            rubric,
            &rt.prompts,
            rt.client(ModelRole::Judge),
        )
        .unwrap();

        let eval = judge.evaluate("c", "p", "g").await.unwrap();
        assert_eq!(eval.scores[0].score, 5);
        assert!(eval.scores[1..].iter().all(|s| s.score == 1));
        assert!(eval.critical_errors.is_empty());
    }

    #[tokio::test]
    async fn test_float_scores_are_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let rubric = builtin_rubric(EvalStep::Qualification);
        let n = rubric.dimensions.len();

        let mut replies = vec![r#"{"score": 4.0, "explanation": "Qualification correcte."}"#.to_string()];
        replies.extend((1..n).map(|_| r#"{"score": 2.6, "explanation": "Partielle."}"#.to_string()));
        replies.push(r#"{"critical_errors": []}"#.to_string());
        let rt = runtime(dir.path(), ScriptedProvider::new(replies));
        let judge = Judge::new(
            EvalStep::Qualification,
            rubric,
            &rt.prompts,
            rt.client(ModelRole::Judge),
        )
        .unwrap();

        let eval = judge.evaluate("c", "p", "g").await.unwrap();
        assert_eq!(eval.scores[0].score, 4);
        assert!(eval.scores[1..].iter().all(|s| s.score == 3));
    }

    #[tokio::test]
    async fn test_malformed_reply_fails() {
        let dir = tempfile::tempdir().unwrap();
        let provider = ScriptedProvider::new(["Je donnerais environ 4 sur 5."]);
        let rt = runtime(dir.path(), provider);
        let judge = Judge::new(
            EvalStep::Recommendations,
            builtin_rubric(EvalStep::Recommendations),
            &rt.prompts,
            rt.client(ModelRole::Judge),
        )
        .unwrap();

        let err = judge.evaluate("c", "p", "g").await.unwrap_err();
        assert!(matches!(
            err,
            JudgeError::MalformedOutput { source: ValidationError::NoJson { .. }, .. }
        ));
    }

    #[tokio::test]
    async fn test_schema_violation_fails() {
        let dir = tempfile::tempdir().unwrap();
        let provider = ScriptedProvider::new([r#"{"score": "quatre", "explanation": "x"}"#]);
        let rt = runtime(dir.path(), provider);
        let judge = Judge::new(
            EvalStep::Qualification,
            builtin_rubric(EvalStep::Qualification),
            &rt.prompts,
            rt.client(ModelRole::Judge),
        )
        .unwrap();

        let err = judge.evaluate("c", "p", "g").await.unwrap_err();
        assert!(matches!(
            err,
            JudgeError::MalformedOutput { source: ValidationError::Schema { .. }, .. }
        ));
    }
}
