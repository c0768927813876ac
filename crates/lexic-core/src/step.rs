//! Evaluable pipeline steps.
//!
//! Only five of the pipeline's outputs are scored against ground truth.
//! Each step knows which synthetic case files feed its agent and which file
//! holds the expected output.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::case::CaseDocument;
use crate::CoreError;

/// A pipeline step that has a rubric and a ground-truth document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvalStep {
    Qualification,
    InitialAnalysis,
    FactualRecord,
    LegalArguments,
    Recommendations,
}

impl EvalStep {
    pub fn all() -> &'static [EvalStep] {
        &[
            EvalStep::Qualification,
            EvalStep::InitialAnalysis,
            EvalStep::FactualRecord,
            EvalStep::LegalArguments,
            EvalStep::Recommendations,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EvalStep::Qualification => "qualification",
            EvalStep::InitialAnalysis => "initial_analysis",
            EvalStep::FactualRecord => "factual_record",
            EvalStep::LegalArguments => "legal_arguments",
            EvalStep::Recommendations => "recommendations",
        }
    }

    /// Agent input field name paired with the case file that supplies it.
    pub fn inputs(&self) -> &'static [(&'static str, CaseDocument)] {
        match self {
            EvalStep::Qualification => &[("client_request", CaseDocument::ClientRequest)],
            EvalStep::InitialAnalysis => &[("qualification", CaseDocument::Qualification)],
            EvalStep::FactualRecord => &[
                ("initial_facts", CaseDocument::InitialFacts),
                ("investigation_report", CaseDocument::InvestigationReport),
            ],
            EvalStep::LegalArguments => &[
                ("factual_record", CaseDocument::FinalFactualRecord),
                ("legal_basis", CaseDocument::LegalBases),
            ],
            EvalStep::Recommendations => &[
                ("considerations", CaseDocument::Considerations),
                ("judgment", CaseDocument::Judgment),
                ("client_objectives", CaseDocument::Qualification),
            ],
        }
    }

    /// Case file holding the expected output of this step.
    pub fn ground_truth(&self) -> CaseDocument {
        match self {
            EvalStep::Qualification => CaseDocument::Qualification,
            EvalStep::InitialAnalysis => CaseDocument::InitialAnalysis,
            EvalStep::FactualRecord => CaseDocument::FinalFactualRecord,
            EvalStep::LegalArguments => CaseDocument::LegalArguments,
            EvalStep::Recommendations => CaseDocument::Recommendations,
        }
    }
}

impl fmt::Display for EvalStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EvalStep {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EvalStep::all()
            .iter()
            .copied()
            .find(|step| step.as_str() == s)
            .ok_or_else(|| CoreError::UnknownStep(s.to_string()))
    }
}
