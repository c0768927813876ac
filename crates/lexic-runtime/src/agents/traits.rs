//! Agent trait and common types.

use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

use lexic_core::EvalStep;

use crate::prompts::PromptError;
use crate::providers::ProviderError;

/// Errors from drafting agents.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("LLM call failed: {0}")]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Prompt(#[from] PromptError),

    #[error("Agent {0} returned an empty document")]
    EmptyOutput(AgentKind),

    #[error("No agent registered for {0}")]
    NotRegistered(AgentKind),
}

/// The ten drafting agents of the forward pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AgentKind {
    Qualification,
    InitialAnalysis,
    InvestigationOrder,
    InvestigationReport,
    FactualRecord,
    LegalBasis,
    Arguments,
    Considerations,
    Judgment,
    Recommendations,
}

impl AgentKind {
    /// Pipeline order.
    pub fn all() -> &'static [AgentKind] {
        &[
            AgentKind::Qualification,
            AgentKind::InitialAnalysis,
            AgentKind::InvestigationOrder,
            AgentKind::InvestigationReport,
            AgentKind::FactualRecord,
            AgentKind::LegalBasis,
            AgentKind::Arguments,
            AgentKind::Considerations,
            AgentKind::Judgment,
            AgentKind::Recommendations,
        ]
    }

    /// Name of the agent's prompt template and of its output field.
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentKind::Qualification => "qualification",
            AgentKind::InitialAnalysis => "initial_analysis",
            AgentKind::InvestigationOrder => "investigation_order",
            AgentKind::InvestigationReport => "investigation_report",
            AgentKind::FactualRecord => "factual_record",
            AgentKind::LegalBasis => "legal_basis",
            AgentKind::Arguments => "arguments",
            AgentKind::Considerations => "considerations",
            AgentKind::Judgment => "judgment",
            AgentKind::Recommendations => "recommendations",
        }
    }

    /// Input field names, in prompt order.
    pub fn inputs(&self) -> &'static [&'static str] {
        match self {
            AgentKind::Qualification => &["client_request"],
            AgentKind::InitialAnalysis => &["qualification"],
            AgentKind::InvestigationOrder => &["initial_analysis"],
            AgentKind::InvestigationReport => &["investigation_order", "client_persona", "initial_facts"],
            AgentKind::FactualRecord => &["initial_facts", "investigation_report"],
            AgentKind::LegalBasis => &["factual_record"],
            AgentKind::Arguments => &["factual_record", "legal_basis"],
            AgentKind::Considerations => &["arguments", "factual_record"],
            AgentKind::Judgment => &["considerations", "factual_record"],
            AgentKind::Recommendations => &["considerations", "judgment", "client_objectives"],
        }
    }

    pub fn output(&self) -> &'static str {
        self.as_str()
    }

    /// The agent whose output is judged at an evaluation step.
    pub fn for_step(step: EvalStep) -> AgentKind {
        match step {
            EvalStep::Qualification => AgentKind::Qualification,
            EvalStep::InitialAnalysis => AgentKind::InitialAnalysis,
            EvalStep::FactualRecord => AgentKind::FactualRecord,
            EvalStep::LegalArguments => AgentKind::Arguments,
            EvalStep::Recommendations => AgentKind::Recommendations,
        }
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A drafting agent: named inputs in, one markdown document out.
#[async_trait]
pub trait Agent: Send + Sync {
    fn kind(&self) -> AgentKind;

    /// Produce the agent's document. `inputs` pairs field names with values;
    /// every name in [`AgentKind::inputs`] must be present.
    async fn run(&self, inputs: &[(&str, &str)]) -> Result<String, AgentError>;
}
