//! On-disk layout of decisions, synthetic cases and run outputs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::markdown::{read_markdown, Document};
use crate::CoreError;

pub const DECISIONS_DIR: &str = "court_decisions";
pub const CASES_DIR: &str = "synthetic_cases";
pub const EVAL_RUNS_DIR: &str = "eval_runs";
pub const PIPELINE_RUNS_DIR: &str = "pipeline_runs";
pub const NAME_MAPPING_FILE: &str = "name_mapping.json";

/// Files of a synthetic case, in generation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseDocument {
    Metadata,
    ClientPersona,
    ClientRequest,
    InitialFacts,
    Qualification,
    InitialAnalysis,
    InvestigationOrder,
    InvestigationReport,
    InitialFactualRecord,
    FinalFactualRecord,
    LegalBases,
    LegalArguments,
    Considerations,
    Judgment,
    Recommendations,
}

impl CaseDocument {
    pub fn all() -> &'static [CaseDocument] {
        use CaseDocument::*;
        &[
            Metadata,
            ClientPersona,
            ClientRequest,
            InitialFacts,
            Qualification,
            InitialAnalysis,
            InvestigationOrder,
            InvestigationReport,
            InitialFactualRecord,
            FinalFactualRecord,
            LegalBases,
            LegalArguments,
            Considerations,
            Judgment,
            Recommendations,
        ]
    }

    /// Document number used by the `--docs` filter. `metadata.md` has none.
    pub fn number(&self) -> Option<&'static str> {
        use CaseDocument::*;
        Some(match self {
            Metadata => return None,
            ClientPersona => "01",
            ClientRequest => "01b",
            InitialFacts => "02",
            Qualification => "03",
            InitialAnalysis => "04",
            InvestigationOrder => "05",
            InvestigationReport => "06",
            InitialFactualRecord => "09",
            FinalFactualRecord => "10",
            LegalBases => "11",
            LegalArguments => "12",
            Considerations => "13",
            Judgment => "14",
            Recommendations => "15",
        })
    }

    pub fn file_name(&self) -> &'static str {
        use CaseDocument::*;
        match self {
            Metadata => "metadata.md",
            ClientPersona => "01_client_persona.md",
            ClientRequest => "01b_client_request.md",
            InitialFacts => "02_initial_facts_known.md",
            Qualification => "03_gt_qualification.md",
            InitialAnalysis => "04_gt_initial_analysis.md",
            InvestigationOrder => "05_gt_investigation_order_1.md",
            InvestigationReport => "06_gt_investigation_report_1.md",
            InitialFactualRecord => "09_gt_initial_factual_record.md",
            FinalFactualRecord => "10_gt_final_factual_record.md",
            LegalBases => "11_gt_applicable_legal_bases.md",
            LegalArguments => "12_gt_legal_arguments.md",
            Considerations => "13_gt_considerations.md",
            Judgment => "14_gt_judgment.md",
            Recommendations => "15_gt_recommendations.md",
        }
    }

    /// Heading written at the top of the generated document.
    pub fn title(&self) -> &'static str {
        use CaseDocument::*;
        match self {
            Metadata => "Case Metadata",
            ClientPersona => "Client Persona",
            ClientRequest => "Client Request",
            InitialFacts => "Initial Facts",
            Qualification => "Ground Truth: Qualification",
            InitialAnalysis => "Ground Truth: Initial Analysis",
            InvestigationOrder => "Ground Truth: Investigation Order",
            InvestigationReport => "Ground Truth: Investigation Report",
            InitialFactualRecord => "Ground Truth: Initial Factual Record",
            FinalFactualRecord => "Ground Truth: Final Factual Record",
            LegalBases => "Ground Truth: Legal Bases",
            LegalArguments => "Ground Truth: Legal Arguments",
            Considerations => "Ground Truth: Considerations",
            Judgment => "Ground Truth: Judgment",
            Recommendations => "Ground Truth: Recommendations",
        }
    }

    pub fn from_number(number: &str) -> Option<CaseDocument> {
        Self::all()
            .iter()
            .copied()
            .find(|doc| doc.number() == Some(number))
    }
}

/// Structured documents extracted from one court decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionDocument {
    FullText,
    Parties,
    FactsTimeline,
    Evidence,
    LegalBases,
    Arguments,
    Considerations,
    Judgment,
}

impl DecisionDocument {
    pub fn all() -> &'static [DecisionDocument] {
        use DecisionDocument::*;
        &[
            FullText,
            Parties,
            FactsTimeline,
            Evidence,
            LegalBases,
            Arguments,
            Considerations,
            Judgment,
        ]
    }

    /// The documents produced by the extract-all call.
    pub fn extracted() -> &'static [DecisionDocument] {
        &Self::all()[1..]
    }

    /// Field name in the extraction reply, and file stem on disk.
    pub fn key(&self) -> &'static str {
        use DecisionDocument::*;
        match self {
            FullText => "full_text",
            Parties => "parties",
            FactsTimeline => "facts_timeline",
            Evidence => "evidence",
            LegalBases => "legal_bases",
            Arguments => "arguments",
            Considerations => "considerations",
            Judgment => "judgment",
        }
    }

    pub fn file_name(&self) -> String {
        format!("{}.md", self.key())
    }

    pub fn title(&self) -> &'static str {
        use DecisionDocument::*;
        match self {
            FullText => "Full Text",
            Parties => "Parties",
            FactsTimeline => "Facts Timeline",
            Evidence => "Evidence",
            LegalBases => "Legal Bases",
            Arguments => "Legal Arguments",
            Considerations => "Legal Considerations",
            Judgment => "Judgment",
        }
    }
}

/// Which side of the dispute a synthetic client stands on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PartyRole {
    #[serde(rename = "demandeur")]
    Plaintiff,
    #[serde(rename = "défendeur")]
    Defendant,
}

impl PartyRole {
    pub fn all() -> &'static [PartyRole] {
        &[PartyRole::Plaintiff, PartyRole::Defendant]
    }

    /// The French role name used in prompts and metadata.
    pub fn as_str(&self) -> &'static str {
        match self {
            PartyRole::Plaintiff => "demandeur",
            PartyRole::Defendant => "défendeur",
        }
    }

    pub fn case_suffix(&self) -> &'static str {
        match self {
            PartyRole::Plaintiff => "_pl",
            PartyRole::Defendant => "_df",
        }
    }

    /// `case_007` + plaintiff → `case_007_pl`.
    pub fn case_id(&self, base: &str) -> String {
        format!("{}{}", base, self.case_suffix())
    }
}

impl fmt::Display for PartyRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Paths and loaders over a Lexic data directory.
#[derive(Debug, Clone)]
pub struct CaseStore {
    root: PathBuf,
}

impl CaseStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn decisions_dir(&self) -> PathBuf {
        self.root.join(DECISIONS_DIR)
    }

    pub fn cases_dir(&self) -> PathBuf {
        self.root.join(CASES_DIR)
    }

    pub fn eval_runs_dir(&self) -> PathBuf {
        self.root.join(EVAL_RUNS_DIR)
    }

    pub fn pipeline_runs_dir(&self) -> PathBuf {
        self.root.join(PIPELINE_RUNS_DIR)
    }

    /// Create every top-level data directory.
    pub fn ensure_dirs(&self) -> Result<(), CoreError> {
        for dir in [
            self.decisions_dir(),
            self.cases_dir(),
            self.eval_runs_dir(),
            self.pipeline_runs_dir(),
        ] {
            fs::create_dir_all(&dir).map_err(|e| CoreError::io(&dir, e))?;
        }
        Ok(())
    }

    pub fn list_cases(&self) -> Result<Vec<String>, CoreError> {
        list_subdirs(&self.cases_dir())
    }

    pub fn list_decisions(&self) -> Result<Vec<String>, CoreError> {
        list_subdirs(&self.decisions_dir())
    }

    /// Source documents (`.md` or `.txt`) sitting directly in the decisions
    /// directory, sorted by file name.
    pub fn list_decision_sources(&self) -> Result<Vec<PathBuf>, CoreError> {
        let dir = self.decisions_dir();
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut sources = Vec::new();
        for entry in fs::read_dir(&dir).map_err(|e| CoreError::io(&dir, e))? {
            let path = entry.map_err(|e| CoreError::io(&dir, e))?.path();
            let is_source = path.is_file()
                && path
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| ext == "md" || ext == "txt");
            if is_source {
                sources.push(path);
            }
        }
        sources.sort();
        Ok(sources)
    }

    pub fn case_path(&self, case_id: &str) -> PathBuf {
        self.cases_dir().join(case_id)
    }

    pub fn decision_path(&self, decision_id: &str) -> PathBuf {
        self.decisions_dir().join(decision_id)
    }

    pub fn case_file(&self, case_id: &str, doc: CaseDocument) -> PathBuf {
        self.case_path(case_id).join(doc.file_name())
    }

    pub fn decision_file(&self, decision_id: &str, doc: DecisionDocument) -> PathBuf {
        self.decision_path(decision_id).join(doc.file_name())
    }

    /// Load one document of a synthetic case.
    pub fn load_case_step(&self, case_id: &str, doc: CaseDocument) -> Result<Document, CoreError> {
        read_markdown(self.case_file(case_id, doc))
    }

    /// Load every document of an extracted decision, keyed by document.
    pub fn load_decision(
        &self,
        decision_id: &str,
    ) -> Result<BTreeMap<DecisionDocument, String>, CoreError> {
        DecisionDocument::all()
            .iter()
            .map(|doc| {
                let loaded = read_markdown(self.decision_file(decision_id, *doc))?;
                Ok((*doc, loaded.content))
            })
            .collect()
    }
}

fn list_subdirs(dir: &Path) -> Result<Vec<String>, CoreError> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut names = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| CoreError::io(dir, e))? {
        let entry = entry.map_err(|e| CoreError::io(dir, e))?;
        if !entry.path().is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.starts_with('.') {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}
