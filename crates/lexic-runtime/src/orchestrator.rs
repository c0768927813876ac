//! Per-step evaluation runs.
//!
//! For each case the step's agent drafts a prediction from the case's
//! ground-truth inputs, the judge scores it against the expected document,
//! and every artifact lands in `eval_runs/<step>_<timestamp>/`:
//!
//! ```text
//! <case>_inputs.md  <case>_prediction.md  <case>_ground_truth.md
//! <case>_evaluation.md  summary.md
//! ```
//!
//! Parameters, aggregate metrics and the run directory go to the tracker.

use chrono::Local;
use serde_yaml::Value as YamlValue;
use std::path::{Path, PathBuf};

use lexic_core::{
    format_evaluation, format_summary, get_rubric, metadata, summarize, write_markdown, EvalStep,
    RunSummary, StepEvaluation,
};

use crate::agents::AgentRegistry;
use crate::config::ModelRole;
use crate::judge::Judge;
use crate::tracking::{RunStatus, Tracker};
use crate::{LexicRuntime, RuntimeError};

/// Artifact directory name in the tracking run.
pub const ARTIFACT_PATH: &str = "evaluation_results";

/// Result of one step's evaluation run.
#[derive(Debug, Clone, Default)]
pub struct EvaluationOutcome {
    pub step: Option<EvalStep>,
    pub run_name: Option<String>,
    pub run_id: Option<String>,
    pub run_dir: Option<PathBuf>,
    pub results: Vec<StepEvaluation>,
    /// Cases that failed, with the error message.
    pub failed: Vec<(String, String)>,
    /// `None` when no case was evaluated successfully.
    pub summary: Option<RunSummary>,
}

impl EvaluationOutcome {
    fn empty(step: EvalStep) -> Self {
        Self {
            step: Some(step),
            ..Self::default()
        }
    }
}

/// Runs agents and judge over the synthetic cases.
pub struct EvaluationOrchestrator<'a> {
    runtime: &'a LexicRuntime,
    agents: AgentRegistry,
    tracker: Box<dyn Tracker>,
}

impl<'a> EvaluationOrchestrator<'a> {
    pub fn new(runtime: &'a LexicRuntime, tracker: Box<dyn Tracker>) -> Result<Self, RuntimeError> {
        Ok(Self {
            runtime,
            agents: AgentRegistry::from_runtime(runtime)?,
            tracker,
        })
    }

    /// Replace the agents, e.g. with hand-written implementations.
    pub fn with_agents(mut self, agents: AgentRegistry) -> Self {
        self.agents = agents;
        self
    }

    fn judge(&self, step: EvalStep) -> Result<Judge, RuntimeError> {
        let rubric = get_rubric(step, self.runtime.config.rubrics_dir.as_deref())?;
        Ok(Judge::new(
            step,
            rubric,
            &self.runtime.prompts,
            self.runtime.client(ModelRole::Judge),
        )?)
    }

    /// Evaluate one case at `step`, writing its documents to `output_dir`.
    pub async fn evaluate_case(
        &self,
        step: EvalStep,
        case_id: &str,
        output_dir: &Path,
    ) -> Result<StepEvaluation, RuntimeError> {
        let judge = self.judge(step)?;
        self.evaluate_case_with(&judge, step, case_id, output_dir).await
    }

    async fn evaluate_case_with(
        &self,
        judge: &Judge,
        step: EvalStep,
        case_id: &str,
        output_dir: &Path,
    ) -> Result<StepEvaluation, RuntimeError> {
        let store = &self.runtime.store;

        let mut inputs: Vec<(&str, String)> = Vec::with_capacity(step.inputs().len());
        for (name, doc) in step.inputs() {
            inputs.push((*name, store.load_case_step(case_id, *doc)?.content));
        }
        let ground_truth = store.load_case_step(case_id, step.ground_truth())?.content;

        tracing::info!(case_id, %step, "Running agent");
        let pairs: Vec<(&str, &str)> = inputs.iter().map(|(k, v)| (*k, v.as_str())).collect();
        let prediction = self.agents.for_step(step)?.run(&pairs).await?;

        let meta = metadata([("case_id", case_id), ("step", step.as_str())]);
        let inputs_body = inputs
            .iter()
            .map(|(key, value)| format!("## {}\n\n{}", key, value))
            .collect::<Vec<_>>()
            .join("\n\n");
        write_markdown(
            output_dir.join(format!("{}_inputs.md", case_id)),
            &meta,
            &format!("# Inputs\n\n{}", inputs_body),
        )?;
        write_markdown(
            output_dir.join(format!("{}_prediction.md", case_id)),
            &meta,
            &format!("# Prediction\n\n{}", prediction),
        )?;
        write_markdown(
            output_dir.join(format!("{}_ground_truth.md", case_id)),
            &meta,
            &format!("# Ground Truth\n\n{}", ground_truth),
        )?;

        tracing::info!(case_id, %step, "Judging prediction");
        let evaluation = judge.evaluate(case_id, &prediction, &ground_truth).await?;

        let mut eval_meta = meta;
        eval_meta.insert("overall_score".to_string(), YamlValue::from(evaluation.overall_score));
        write_markdown(
            output_dir.join(format!("{}_evaluation.md", case_id)),
            &eval_meta,
            &format_evaluation(&evaluation),
        )?;

        Ok(evaluation)
    }

    /// Evaluate the first `n_cases` cases (all when `None`) at `step` in a
    /// tracked run.
    pub async fn run_evaluation(
        &self,
        step: EvalStep,
        n_cases: Option<usize>,
        experiment: Option<&str>,
    ) -> Result<EvaluationOutcome, RuntimeError> {
        let store = &self.runtime.store;
        let mut cases = store.list_cases()?;
        if let Some(n) = n_cases {
            cases.truncate(n);
        }
        if cases.is_empty() {
            tracing::warn!(dir = %store.cases_dir().display(), "No cases found");
            return Ok(EvaluationOutcome::empty(step));
        }

        let timestamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
        let run_name = format!("{}_{}", step, timestamp);
        let run_dir = store.eval_runs_dir().join(&run_name);
        std::fs::create_dir_all(&run_dir).map_err(|e| RuntimeError::Write {
            path: run_dir.display().to_string(),
            message: e.to_string(),
        })?;

        let experiment = experiment.unwrap_or(self.runtime.config.mlflow.experiment.as_str());
        tracing::info!(%step, cases = cases.len(), experiment, run = %run_name, "Starting evaluation");
        self.runtime.usage.reset();
        let run_id = self.tracker.start_run(experiment, &run_name).await?;

        let mut outcome = EvaluationOutcome {
            step: Some(step),
            run_name: Some(run_name),
            run_id: Some(run_id),
            run_dir: Some(run_dir.clone()),
            ..EvaluationOutcome::default()
        };
        let tracked = self
            .run_tracked(step, &cases, &run_dir, &timestamp, &mut outcome)
            .await;

        let status = match (&tracked, &outcome.summary) {
            (Ok(()), Some(_)) => RunStatus::Finished,
            _ => RunStatus::Failed,
        };
        let ended = self.tracker.end_run(status).await;

        tracked?;
        ended?;
        if outcome.summary.is_none() {
            tracing::error!(%step, failed = outcome.failed.len(), "No successful evaluations");
        }
        Ok(outcome)
    }

    async fn run_tracked(
        &self,
        step: EvalStep,
        cases: &[String],
        run_dir: &Path,
        timestamp: &str,
        outcome: &mut EvaluationOutcome,
    ) -> Result<(), RuntimeError> {
        let config = &self.runtime.config;
        let n_cases = cases.len().to_string();
        for (key, value) in [
            ("step", step.as_str()),
            ("n_cases", n_cases.as_str()),
            ("model", config.model_for(ModelRole::Agent)),
            ("judge_model", config.model_for(ModelRole::Judge)),
        ] {
            self.tracker.log_param(key, value).await?;
        }

        let judge = self.judge(step)?;
        for case_id in cases {
            match self.evaluate_case_with(&judge, step, case_id, run_dir).await {
                Ok(evaluation) => outcome.results.push(evaluation),
                Err(e) => {
                    tracing::error!(case_id = %case_id, %step, error = %e, "Case evaluation failed");
                    outcome.failed.push((case_id.clone(), e.to_string()));
                }
            }
        }

        let Some(summary) = summarize(step, &outcome.results, outcome.failed.len()) else {
            return Ok(());
        };

        self.tracker.log_metrics(&run_metrics(&summary)).await?;
        self.tracker.log_metrics(&self.runtime.usage.metrics()).await?;

        let mut summary_meta = metadata([("step", step.as_str()), ("timestamp", timestamp)]);
        summary_meta.insert("n_cases".to_string(), YamlValue::from(cases.len() as u64));
        write_markdown(
            run_dir.join("summary.md"),
            &summary_meta,
            &format_summary(&summary, &outcome.results),
        )?;

        self.tracker.log_artifacts(run_dir, ARTIFACT_PATH).await?;
        tracing::info!(
            %step,
            mean_overall_score = summary.mean_overall_score,
            dir = %run_dir.display(),
            "Evaluation complete"
        );
        outcome.summary = Some(summary);
        Ok(())
    }
}

/// Tracker metrics for a run summary.
pub fn run_metrics(summary: &RunSummary) -> Vec<(String, f64)> {
    let mut metrics = vec![
        ("mean_overall_score".to_string(), summary.mean_overall_score),
        ("min_overall_score".to_string(), summary.min_overall_score),
        ("max_overall_score".to_string(), summary.max_overall_score),
    ];
    for (dim, mean) in &summary.dimension_means {
        metrics.push((format!("mean_{}", dim), *mean));
    }
    metrics.push(("cases_with_errors".to_string(), summary.cases_with_errors as f64));
    metrics.push(("total_errors".to_string(), summary.total_errors as f64));
    metrics
}
