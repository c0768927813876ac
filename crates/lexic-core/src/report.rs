//! Evaluation results, run statistics and their markdown rendering.

use serde::{Deserialize, Serialize};

use crate::rubric::Rubric;
use crate::step::EvalStep;

/// Judge output for one rubric dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionScore {
    pub dimension: String,
    /// Always within 1..=5.
    pub score: u8,
    pub explanation: String,
}

/// Judged result of one case at one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepEvaluation {
    pub case_id: String,
    pub step: EvalStep,
    /// Dimension scores in rubric order.
    pub scores: Vec<DimensionScore>,
    pub critical_errors: Vec<String>,
    pub overall_score: f64,
}

impl StepEvaluation {
    /// Build an evaluation, computing the rubric-weighted overall score.
    pub fn from_scores(
        case_id: impl Into<String>,
        step: EvalStep,
        rubric: &Rubric,
        scores: Vec<DimensionScore>,
        critical_errors: Vec<String>,
    ) -> Self {
        let by_name = scores
            .iter()
            .map(|s| (s.dimension.clone(), s.score))
            .collect();
        let overall_score = rubric.weighted_score(&by_name);

        Self {
            case_id: case_id.into(),
            step,
            scores,
            critical_errors,
            overall_score,
        }
    }

    pub fn score(&self, dimension: &str) -> Option<u8> {
        self.scores
            .iter()
            .find(|s| s.dimension == dimension)
            .map(|s| s.score)
    }

    pub fn has_errors(&self) -> bool {
        !self.critical_errors.is_empty()
    }
}

/// Aggregate statistics over the successful cases of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub step: EvalStep,
    /// Cases that produced an evaluation.
    pub n_cases: usize,
    /// Cases that failed before producing an evaluation.
    pub n_failed: usize,
    pub mean_overall_score: f64,
    pub min_overall_score: f64,
    pub max_overall_score: f64,
    /// Mean score per dimension, in rubric order of the first result.
    pub dimension_means: Vec<(String, f64)>,
    pub cases_with_errors: usize,
    pub total_errors: usize,
}

/// Summarize a run. Returns `None` when no case succeeded.
pub fn summarize(step: EvalStep, results: &[StepEvaluation], n_failed: usize) -> Option<RunSummary> {
    let first = results.first()?;
    let n = results.len() as f64;

    let overall: Vec<f64> = results.iter().map(|r| r.overall_score).collect();
    let mean_overall_score = overall.iter().sum::<f64>() / n;
    let min_overall_score = overall.iter().copied().fold(f64::INFINITY, f64::min);
    let max_overall_score = overall.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    let dimension_means = first
        .scores
        .iter()
        .map(|dim| {
            let values: Vec<f64> = results
                .iter()
                .filter_map(|r| r.score(&dim.dimension))
                .map(f64::from)
                .collect();
            let mean = values.iter().sum::<f64>() / values.len().max(1) as f64;
            (dim.dimension.clone(), mean)
        })
        .collect();

    Some(RunSummary {
        step,
        n_cases: results.len(),
        n_failed,
        mean_overall_score,
        min_overall_score,
        max_overall_score,
        dimension_means,
        cases_with_errors: results.iter().filter(|r| r.has_errors()).count(),
        total_errors: results.iter().map(|r| r.critical_errors.len()).sum(),
    })
}

/// Markdown body of a `<case>_evaluation.md` file.
pub fn format_evaluation(eval: &StepEvaluation) -> String {
    let mut lines = vec!["# Evaluation Result\n".to_string()];

    lines.push(format!("**Overall Score**: {:.2}/5.00\n", eval.overall_score));

    lines.push("## Dimension Scores\n".to_string());
    for dim in &eval.scores {
        lines.push(format!("### {}: {}/5", dim.dimension, dim.score));
        lines.push(format!("{}\n", dim.explanation));
    }

    if eval.critical_errors.is_empty() {
        lines.push("## Critical Errors\n\nNone identified.".to_string());
    } else {
        lines.push("## Critical Errors\n".to_string());
        for error in &eval.critical_errors {
            lines.push(format!("- {}", error));
        }
    }

    lines.join("\n")
}

/// Markdown body of a run's `summary.md`.
pub fn format_summary(summary: &RunSummary, results: &[StepEvaluation]) -> String {
    let mut lines = vec![format!("# Evaluation Summary: {}\n", summary.step)];

    lines.push("## Overall Statistics\n".to_string());
    lines.push(format!("- **Mean Score**: {:.2}/5.00", summary.mean_overall_score));
    lines.push(format!("- **Min Score**: {:.2}/5.00", summary.min_overall_score));
    lines.push(format!("- **Max Score**: {:.2}/5.00", summary.max_overall_score));
    lines.push(format!(
        "- **Cases with Errors**: {}/{}",
        summary.cases_with_errors,
        results.len()
    ));
    lines.push(format!("- **Total Errors**: {}", summary.total_errors));
    if summary.n_failed > 0 {
        lines.push(format!("- **Failed Cases**: {}", summary.n_failed));
    }
    lines.push(String::new());

    lines.push("## Dimension Means\n".to_string());
    for (dim, mean) in &summary.dimension_means {
        lines.push(format!("- **{}**: {:.2}/5.00", dim, mean));
    }

    lines.push("\n## Per-Case Scores\n".to_string());
    lines.push("| Case ID | Overall Score | Errors |".to_string());
    lines.push("|---------|--------------|--------|".to_string());
    for result in results {
        lines.push(format!(
            "| {} | {:.2} | {} |",
            result.case_id,
            result.overall_score,
            result.critical_errors.len()
        ));
    }

    lines.join("\n")
}
