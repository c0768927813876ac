//! # lexic-core
//!
//! Deterministic building blocks for the Lexic evaluation harness.
//!
//! This crate never calls an LLM. It owns everything that can be decided
//! from files alone:
//! - Markdown documents with YAML frontmatter (the only persisted format)
//! - The on-disk layout of court decisions, synthetic cases and eval runs
//! - The evaluable pipeline steps and which case files feed them
//! - Rubrics and the rubric-weighted overall score
//! - Schema validation of structured LLM replies
//! - Summary statistics and markdown reports
//!
//! ## Example
//!
//! ```rust,ignore
//! use lexic_core::{get_rubric, CaseStore, EvalStep};
//!
//! let store = CaseStore::new("data");
//! let rubric = get_rubric(EvalStep::Qualification, None)?;
//! for case_id in store.list_cases()? {
//!     let gt = store.load_case_step(&case_id, EvalStep::Qualification.ground_truth())?;
//!     println!("{}: {} chars of ground truth", case_id, gt.content.len());
//! }
//! ```

pub mod case;
pub mod markdown;
pub mod report;
pub mod rubric;
pub mod step;
pub mod validation;

// Re-export main types at crate root
pub use case::{CaseDocument, CaseStore, DecisionDocument, PartyRole};
pub use markdown::{
    metadata, parse_markdown, read_markdown, render_markdown, write_markdown, Document, Metadata,
};
pub use report::{
    format_evaluation, format_summary, summarize, DimensionScore, RunSummary, StepEvaluation,
};
pub use rubric::{builtin_rubric, get_rubric, Dimension, Rubric, RubricError};
pub use step::EvalStep;
pub use validation::{extract_json, parse_output, validate_output, OutputSchema, ValidationError};

use std::path::PathBuf;
use thiserror::Error;

/// Errors from file handling and case layout.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("File not found: {0}")]
    NotFound(PathBuf),

    #[error("Invalid YAML frontmatter in {path}: {source}")]
    Frontmatter {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Failed to serialize frontmatter: {0}")]
    Serialize(#[from] serde_yaml::Error),

    #[error("Unknown pipeline step: '{0}'")]
    UnknownStep(String),
}

impl CoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            return Self::NotFound(path);
        }
        Self::Io { path, source }
    }
}
