//! Synthetic data: court decisions in, evaluation cases out.
//!
//! [`extract`] splits each source decision into structured documents and
//! replaces anonymised party names with fictional ones. [`generate`] then
//! works backwards from the decision to the documents a lawyer would have
//! produced before the trial, once per side of the dispute.

pub mod extract;
pub mod generate;

pub use extract::{apply_name_mapping, parse_name_mapping, DecisionExtractor, ExtractionOutcome};
pub use generate::{CaseGenerator, DocFilter};

/// Result of a batch over several decisions or cases.
///
/// Items that fail are logged and recorded here; the batch keeps going.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct BatchReport {
    pub completed: Vec<String>,
    pub failed: Vec<(String, String)>,
}

impl BatchReport {
    pub fn record_ok(&mut self, id: impl Into<String>) {
        self.completed.push(id.into());
    }

    pub fn record_failure(&mut self, id: impl Into<String>, error: impl ToString) {
        self.failed.push((id.into(), error.to_string()));
    }

    pub fn total(&self) -> usize {
        self.completed.len() + self.failed.len()
    }
}
