//! Lexic CLI
//!
//! Drives the evaluation harness end to end:
//! - `extract`: split court decisions into structured documents
//! - `generate`: build synthetic cases backwards from the decisions
//! - `eval`: run one step's agent and judge over the cases, tracked in MLflow
//! - `pipeline`: run the full drafting pipeline on cases
//! - `rubric`: print a step's rubric

use anyhow::{bail, Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lexic_core::{get_rubric, EvalStep};
use lexic_runtime::orchestrator::{EvaluationOrchestrator, EvaluationOutcome};
use lexic_runtime::pipeline::Pipeline;
use lexic_runtime::synthetic::{CaseGenerator, DecisionExtractor, DocFilter};
use lexic_runtime::tracking::tracker_for;
use lexic_runtime::{LexicConfig, LexicRuntime, ModelRole};

#[derive(Parser)]
#[command(name = "lexic")]
#[command(about = "Lexic - evaluation harness for legal drafting agents", long_about = None)]
#[command(version)]
struct Cli {
    /// Data directory (overrides config and LEXIC_DATA_DIR)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// YAML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract structured documents from every court decision
    Extract,

    /// Generate plaintiff and defendant cases from extracted decisions
    Generate {
        /// Only use the first N decisions
        #[arg(long)]
        n_decisions: Option<usize>,

        /// Only produce these document numbers, e.g. 01,01b,03
        #[arg(long)]
        docs: Option<DocFilter>,
    },

    /// Evaluate a pipeline step against ground truth
    Eval {
        /// Step name, or `all`
        #[arg(long)]
        step: String,

        /// Evaluate only the first N cases
        #[arg(long)]
        n_cases: Option<usize>,

        /// MLflow experiment (default from config)
        #[arg(long)]
        experiment: Option<String>,

        /// Do not record the run in MLflow
        #[arg(long)]
        no_tracking: bool,
    },

    /// Run the full drafting pipeline on cases
    Pipeline {
        /// Run a single case
        #[arg(long)]
        case: Option<String>,

        /// Run only the first N cases
        #[arg(long)]
        n_cases: Option<usize>,

        /// Output directory (default: <data>/pipeline_runs/<timestamp>)
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },

    /// Print the rubric for a step
    Rubric {
        step: EvalStep,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = LexicConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }

    match cli.command {
        Commands::Rubric { step } => {
            let rubric = get_rubric(step, config.rubrics_dir.as_deref())
                .with_context(|| format!("Failed to load rubric for {}", step))?;
            println!("{}", rubric.to_text());
            Ok(())
        }
        Commands::Extract => extract(&build_runtime(config)?).await,
        Commands::Generate { n_decisions, docs } => {
            generate(&build_runtime(config)?, n_decisions, docs.unwrap_or_default()).await
        }
        Commands::Eval {
            step,
            n_cases,
            experiment,
            no_tracking,
        } => {
            let steps = parse_steps(&step)?;
            eval(&build_runtime(config)?, &steps, n_cases, experiment.as_deref(), no_tracking).await
        }
        Commands::Pipeline {
            case,
            n_cases,
            output_dir,
        } => pipeline(&build_runtime(config)?, case, n_cases, output_dir).await,
    }
}

/// Validate the configuration and build the provider stack. Commands that
/// call a model need this; `rubric` does not.
fn build_runtime(config: LexicConfig) -> Result<LexicRuntime> {
    config.validate().context("Invalid configuration")?;
    LexicRuntime::from_config(config).context("Failed to build runtime")
}

async fn extract(runtime: &LexicRuntime) -> Result<()> {
    println!("Model: {}", runtime.config.model_for(ModelRole::Extraction));
    println!("Decisions: {}", runtime.store.decisions_dir().display());

    let extractor = DecisionExtractor::from_runtime(runtime)?;
    let report = extractor.extract_all_decisions().await?;

    println!(
        "\nExtracted {}/{} decisions",
        report.completed.len(),
        report.total()
    );
    for (id, error) in &report.failed {
        println!("  ✗ {}: {}", id, error);
    }
    print_usage(runtime);
    Ok(())
}

async fn generate(runtime: &LexicRuntime, n_decisions: Option<usize>, docs: DocFilter) -> Result<()> {
    println!("Model: {}", runtime.config.model_for(ModelRole::Generation));
    println!("Input: {}", runtime.store.decisions_dir().display());
    println!("Output: {}", runtime.store.cases_dir().display());

    let generator = CaseGenerator::from_runtime(runtime);
    let report = generator.generate_all_synthetic_cases(n_decisions, &docs).await?;

    println!("\nGenerated {}/{} cases", report.completed.len(), report.total());
    for (id, error) in &report.failed {
        println!("  ✗ {}: {}", id, error);
    }
    print_usage(runtime);
    Ok(())
}

fn parse_steps(step: &str) -> Result<Vec<EvalStep>> {
    if step == "all" {
        return Ok(EvalStep::all().to_vec());
    }
    let parsed: EvalStep = step.parse()?;
    Ok(vec![parsed])
}

async fn eval(
    runtime: &LexicRuntime,
    steps: &[EvalStep],
    n_cases: Option<usize>,
    experiment: Option<&str>,
    no_tracking: bool,
) -> Result<()> {
    let config = &runtime.config;
    println!("Agent model: {}", config.model_for(ModelRole::Agent));
    println!("Judge model: {}", config.model_for(ModelRole::Judge));
    println!("Cases: {}", runtime.store.cases_dir().display());
    if !no_tracking {
        println!("MLflow: {}", config.mlflow.tracking_uri);
    }

    let tracker = tracker_for(&config.mlflow, !no_tracking);
    let orchestrator = EvaluationOrchestrator::new(runtime, tracker)?;

    let mut outcomes: Vec<EvaluationOutcome> = Vec::with_capacity(steps.len());
    for step in steps {
        println!("\n=== {} ===", step);
        let outcome = orchestrator
            .run_evaluation(*step, n_cases, experiment)
            .await
            .with_context(|| format!("Evaluation of {} failed", step))?;
        print_outcome(&outcome);
        outcomes.push(outcome);
    }

    if steps.len() > 1 {
        println!("\n=== Overall summary ===");
        for outcome in &outcomes {
            if let (Some(step), Some(summary)) = (outcome.step, &outcome.summary) {
                println!("{}: {:.2}/5.00", step, summary.mean_overall_score);
            }
        }
    }
    Ok(())
}

fn print_outcome(outcome: &EvaluationOutcome) {
    let Some(summary) = &outcome.summary else {
        if outcome.run_dir.is_none() {
            println!("No cases found");
        } else {
            println!("No successful evaluations ({} failed)", outcome.failed.len());
        }
        return;
    };

    println!("Mean overall score: {:.2}/5.00", summary.mean_overall_score);
    for (dim, mean) in &summary.dimension_means {
        println!("  {}: {:.2}/5.00", dim, mean);
    }
    if !outcome.failed.is_empty() {
        println!("Failed cases: {}", outcome.failed.len());
    }
    if let Some(dir) = &outcome.run_dir {
        println!("Results: {}", dir.display());
    }
    if let Some(run_id) = &outcome.run_id {
        println!("Run: {}", run_id);
    }
}

async fn pipeline(
    runtime: &LexicRuntime,
    case: Option<String>,
    n_cases: Option<usize>,
    output_dir: Option<PathBuf>,
) -> Result<()> {
    let store = &runtime.store;
    let cases = match case {
        Some(case_id) => {
            if !store.case_path(&case_id).is_dir() {
                bail!("Case directory not found: {}", store.case_path(&case_id).display());
            }
            vec![case_id]
        }
        None => {
            let mut cases = store.list_cases()?;
            if let Some(n) = n_cases {
                cases.truncate(n);
            }
            cases
        }
    };

    let output_base = output_dir.unwrap_or_else(|| {
        store
            .pipeline_runs_dir()
            .join(Local::now().format("%Y%m%d_%H%M%S").to_string())
    });
    let model = runtime.config.model_for(ModelRole::Agent);
    println!("Model: {}", model);
    println!("Output: {}", output_base.display());
    println!("Running pipeline on {} case(s)", cases.len());

    let pipeline = Pipeline::from_runtime(runtime)?;
    let mut completed = 0;
    for case_id in &cases {
        let case_dir = output_base.join(case_id);
        match pipeline.run_pipeline_on_case(store, case_id, &case_dir, model).await {
            Ok(outputs) => {
                completed += 1;
                println!("  ✓ {} ({} documents)", case_id, outputs.len());
            }
            Err(e) => {
                tracing::error!(case_id = %case_id, error = %e, "Pipeline failed");
                println!("  ✗ {}: {}", case_id, e);
            }
        }
    }

    println!("\nCompleted {}/{} cases", completed, cases.len());
    print_usage(runtime);
    Ok(())
}

fn print_usage(runtime: &LexicRuntime) {
    let total = runtime.usage.total();
    println!(
        "Tokens: {} prompt, {} completion, {} calls, ~${:.2}",
        total.prompt_tokens, total.completion_tokens, total.llm_calls, total.estimated_cost
    );
}
